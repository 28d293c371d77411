/// Errors returned by an `EventSource` while opening or reading the run
/// stream, before they are folded into session state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The agent answered the run request with a non-2xx status.
    #[error("HTTP error! status: {status_code}: {message}")]
    Status { status_code: u16, message: String },
    /// The request could not be sent or no response arrived.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// Reading the response body failed mid-stream.
    #[error("stream error: {message}")]
    Stream { message: String },
}

impl SourceError {
    /// Creates a non-2xx status error.
    pub fn status(status_code: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status_code,
            message: message.into(),
        }
    }

    /// Creates a request-level transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a mid-stream read error.
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream {
            message: message.into(),
        }
    }

    /// Returns the HTTP status code, when the error carries one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status_code, .. } => Some(*status_code),
            Self::Transport { .. } | Self::Stream { .. } => None,
        }
    }
}

/// Terminal reason recorded when a session ends in `Errored`.
///
/// The `Display` text is used verbatim as the message of the synthesized
/// `error` log entry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum SessionFault {
    /// The run request failed outright or was answered with a non-2xx status.
    #[error("Failed to start: {message}")]
    Transport { message: String },
    /// The stream broke while being read.
    #[error("Stream connection error: {message}")]
    Stream { message: String },
    /// The stream ended before a terminal record arrived.
    #[error("connection closed unexpectedly")]
    UnexpectedClose,
    /// The agent itself sent an `error` record.
    #[error("{message}")]
    Reported { message: String },
}

impl SessionFault {
    pub(crate) fn from_open_error(err: &SourceError) -> Self {
        Self::Transport {
            message: err.to_string(),
        }
    }

    pub(crate) fn from_read_error(err: &SourceError) -> Self {
        match err {
            SourceError::Stream { message } | SourceError::Transport { message } => Self::Stream {
                message: message.clone(),
            },
            SourceError::Status { .. } => Self::Stream {
                message: err.to_string(),
            },
        }
    }
}

/// A `data: ` line whose payload could not be turned into a record.
///
/// Recoverable: the line is skipped and the stream keeps going.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed frame ({reason}): {line}")]
pub struct MalformedFrame {
    /// The offending line with the `data: ` prefix removed.
    pub line: String,
    /// Parser message.
    pub reason: String,
}

/// Top-level error type for the public API outside of a running session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MonitorError {
    /// Invalid client or environment configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid caller input (for example a run request with zero retries).
    #[error("validation error: {0}")]
    Validation(String),
    /// Transport failure on one of the auxiliary endpoints.
    #[error(transparent)]
    Source(SourceError),
    /// Response body did not have the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<SourceError> for MonitorError {
    fn from(value: SourceError) -> Self {
        MonitorError::Source(value)
    }
}
