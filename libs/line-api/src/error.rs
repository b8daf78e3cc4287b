use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LineApiError {
    #[error("line api configuration error: {0}")]
    Config(String),
    #[error("line api transport error on {endpoint}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("line api {endpoint} returned {status}: {message}")]
    Remote {
        endpoint: &'static str,
        status: StatusCode,
        message: String,
    },
    #[error("line api {endpoint} response could not be decoded")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

impl LineApiError {
    /// Upstream HTTP status, when the platform answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            LineApiError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}
