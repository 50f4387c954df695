use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised while fetching records from the telematics API.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("telematics HTTP error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("telematics API returned status {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("telematics API reported an error: {0}")]
    Remote(String),
    #[error("failed to decode telematics response: {0}")]
    Decode(String),
    #[error("expected a JSON {expected} from the telematics API, found {found}")]
    UnexpectedBody {
        expected: &'static str,
        found: &'static str,
    },
    #[error("failed to decompress telematics response: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub fn status(status: StatusCode) -> Self {
        ClientError::Status {
            status,
            message: status_message(status),
        }
    }

    /// True when the request never produced a usable response.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }
}

/// Human readable explanation for a non-success status.
pub fn status_message(status: StatusCode) -> String {
    match status.as_u16() {
        400..=451 => "Request contains bad syntax or cannot be fulfilled.".to_string(),
        500..=511 => "Internal Server Error.".to_string(),
        _ => status
            .canonical_reason()
            .unwrap_or("Unexpected response status.")
            .to_string(),
    }
}
