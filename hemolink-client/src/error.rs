use shared::models::ErrorResponse;
use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

/// Failures surfaced by the messaging core.
///
/// Every variant owns plain data so a single failure can be handed to all
/// callers waiting on a coalesced request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("network error: {message}")]
    Network { message: String },

    #[error("request to {url} failed with status {status}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },

    /// The backend answered 2xx with `success: false`.
    #[error("request rejected by server: {message}")]
    Rejected { message: String },

    #[error("failed to decode response: {message}")]
    Decode { message: String },

    #[error("invalid endpoint {path}: {message}")]
    InvalidUrl { path: String, message: String },

    #[error("transport error: {reason}")]
    Transport { reason: String },
}

impl ClientError {
    pub fn status(url: impl Into<String>, status: u16, body: &str) -> Self {
        Self::Status {
            url: url.into(),
            status,
            message: ErrorResponse::describe(body),
        }
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode {
                message: err.to_string(),
            }
        } else {
            Self::Network {
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode {
            message: err.to_string(),
        }
    }
}
