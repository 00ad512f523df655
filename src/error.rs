use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("authentication failed ({status}): {message}")]
    Authentication { status: u16, message: String },

    #[error("remote error {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("framing error: {0}")]
    Framing(String),

    #[error("unexpected response format: {keys:?}")]
    UnexpectedFormat { keys: Vec<String> },

    #[error("query timed out after {polls} polls ({budget:?})")]
    Timeout { polls: u32, budget: Duration },

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("unexpected response shape: {0}")]
    Decode(String),
}

impl Error {
    /// Short stable name of the error kind, used in log fields and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Transport(_) => "TransportError",
            Error::Authentication { .. } => "AuthenticationError",
            Error::Remote { .. } => "RemoteError",
            Error::Framing(_) => "FramingError",
            Error::UnexpectedFormat { .. } => "UnexpectedFormatError",
            Error::Timeout { .. } => "TimeoutError",
            Error::Validation(_) => "ValidationError",
            Error::Decode(_) => "DecodeError",
        }
    }

    /// Map a non-success HTTP status into the matching error.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Error::Authentication {
                status,
                message: if body.is_empty() {
                    if status == 401 {
                        "authentication failed".to_string()
                    } else {
                        "access forbidden".to_string()
                    }
                } else {
                    body
                },
            },
            _ => Error::Remote { status, body },
        }
    }
}
