//! Error type shared by every layer of the client.

use crate::transport::status::Action;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RiakError {
    /// No response reached us at all (connection refused, DNS failure, or an
    /// absent result in a batch).
    #[error("could not reach Riak server at {url}: {reason}")]
    ServerUnreachable { url: String, reason: String },

    #[error("{method} {url} failed: {source}")]
    Transport {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not initialize HTTP client: {0}")]
    ClientInit(#[source] reqwest::Error),

    /// A response arrived but its status is not accepted by any of the
    /// candidate actions.
    #[error("{message}")]
    UnexpectedStatus {
        url: String,
        status: u16,
        status_line: String,
        actions: Vec<Action>,
        message: String,
    },

    #[error("data error: {0}")]
    Data(String),

    #[error("invalid JSON in response from {url}: {source}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("object in bucket `{bucket}` has no key")]
    MissingKey { bucket: String },
}

impl RiakError {
    /// Shortcut for a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }

    /// HTTP status carried by the error, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type RiakResult<T> = Result<T, RiakError>;
