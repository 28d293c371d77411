use std::pin::Pin;

use crate::errors::SourceError;
use crate::model::RunRequest;

/// Raw body chunks of an open run stream.
pub type EventByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, SourceError>> + Send + 'static>>;

/// Transport seam used by the session controller.
///
/// `open` resolves once the agent has accepted the request with a 2xx status;
/// a non-2xx answer must be returned as `SourceError::Status` without reading
/// the body as a stream. Dropping the returned stream closes the transport.
#[async_trait::async_trait]
pub trait EventSource: Send + Sync {
    async fn open(&self, request: &RunRequest) -> Result<EventByteStream, SourceError>;
}
