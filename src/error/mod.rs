//! Error types for the BallCam client.

use thiserror::Error;

/// Primary error type for all client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Transport failure: the request never produced a response.
    #[error("Network error: {0}")]
    Network(String),

    /// The service answered with a non-success status.
    #[error("Service error (status {status}): {body}")]
    Service { status: u16, body: String },

    /// The service answered, but the payload did not match the contract.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// `Poller::start` was called while a poll loop is still live.
    #[error("Poller is already running; call stop() first")]
    AlreadyRunning,

    /// `download_and_install` was called without a checked update.
    #[error("No pending update to install")]
    NoPendingUpdate,

    #[error("IO error: {0}")]
    Io(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl ClientError {
    /// Create a service error from a status code and response body.
    pub fn service(status: u16, body: impl Into<String>) -> Self {
        Self::Service {
            status,
            body: body.into(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::MalformedResponse(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(error: serde_json::Error) -> Self {
        Self::MalformedResponse(error.to_string())
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ClientError>;
