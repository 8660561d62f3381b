//! Pull-based access to the untagged responses of one command cycle.

use tokio::io::{AsyncRead, AsyncWrite};

use super::{Response, ResponseCollection};
use crate::connection::{ImapClient, StartTls};
use crate::error::Result;
use crate::types::Tag;

/// Untagged responses of a running command, read only when pulled.
///
/// Holds the client borrow until dropped, so no other command can start
/// mid-cycle. Tagged and continuation responses are kept in
/// [`UntaggedStream::collection`] and validated when the cycle ends.
pub struct UntaggedStream<'c, S> {
    client: &'c mut ImapClient<S>,
    end_tag: Tag,
    collection: ResponseCollection,
    finished: bool,
}

impl<'c, S> UntaggedStream<'c, S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + StartTls,
{
    pub(crate) fn new(client: &'c mut ImapClient<S>, end_tag: Tag) -> Self {
        Self {
            client,
            end_tag,
            collection: ResponseCollection::new(),
            finished: false,
        }
    }

    /// Returns the next untagged response, or `None` once the cycle has
    /// completed successfully.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors and when the terminal response is `NO`/`BAD`;
    /// the stream is finished afterwards.
    pub async fn next(&mut self) -> Result<Option<Response>> {
        if self.finished {
            return Ok(None);
        }

        loop {
            let response = match self.client.next_cycle_response(&self.end_tag).await {
                Ok(response) => response,
                Err(err) => {
                    self.finished = true;
                    return Err(self.client.log_error(err));
                }
            };

            if response.is_untagged() {
                return Ok(Some(response));
            }

            let terminal = ImapClient::<S>::is_terminal(&response, &self.end_tag);
            self.collection.push(response);
            if terminal {
                self.finished = true;
                self.client.finish_stream(&self.end_tag);
                return match std::mem::take(&mut self.collection).validate() {
                    Ok(collection) => {
                        self.collection = collection;
                        Ok(None)
                    }
                    Err(err) => Err(self.client.log_error(err)),
                };
            }
        }
    }

    /// Returns the tagged and continuation responses read so far.
    #[must_use]
    pub const fn collection(&self) -> &ResponseCollection {
        &self.collection
    }

    /// Returns true once the terminal response was read.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns the tag of the streamed command.
    #[must_use]
    pub const fn tag(&self) -> &Tag {
        &self.end_tag
    }
}
