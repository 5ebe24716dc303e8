//! RPC error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("HTTP error calling {endpoint} at {url}: {source}")]
    Http {
        endpoint: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {endpoint} at {url}: {body}")]
    HttpStatus {
        endpoint: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("JSON parse error in {endpoint}: {source}")]
    Json {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    /// The backend answered `success: false`.
    #[error("{endpoint} rejected: {}", .message.as_deref().unwrap_or("no reason given"))]
    Rejected {
        endpoint: String,
        status: u16,
        message: Option<String>,
    },

    #[error("{endpoint}: response is missing `{field}`")]
    MissingField { endpoint: String, field: &'static str },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl RpcError {
    /// Whether a retry has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { source, .. } => source.is_timeout() || source.is_connect(),
            Self::HttpStatus { status, .. } => matches!(status, 502..=504),
            _ => false,
        }
    }

    /// Backend-supplied message, if the backend rejected the call.
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            Self::Rejected { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// True when the backend no longer recognises our session.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::Rejected { status: 401, .. } | Self::HttpStatus { status: 401, .. }
        )
    }
}
