//! Classified transport errors.
//!
//! Every failure from the request layer is one of these variants. The split
//! drives retry policy: [`ApiError::Client`] is terminal (the request itself
//! is wrong and will not heal on a resend), everything else is transient and
//! eligible for retry by the executor. Streaming calls are never retried
//! regardless of variant, because fragments may already have reached the
//! caller's sink.

use std::time::Duration;
use thiserror::Error;

/// Error returned by the request layer.
///
/// Every variant carries a human-readable message via `Display`, so a UI
/// layer can render the error text directly as message content.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection-level failure: DNS, TCP, TLS, or a broken transfer.
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The attempt exceeded its deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// 4xx response. Terminal: the request is malformed or unauthorized
    /// and a retry would fail the same way.
    #[error("{message}")]
    Client {
        status: u16,
        message: String,
        /// Machine-readable code from the error body, when present.
        code: Option<String>,
    },

    /// 5xx (or any other unclassified non-success) response. Retryable.
    #[error("{message}")]
    Server {
        status: u16,
        message: String,
        code: Option<String>,
    },

    /// Success status, but the body did not match its declared content type.
    #[error("failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),

    /// A successful response whose byte stream could not be read.
    #[error("response stream unreadable: {0}")]
    StreamUnreadable(#[source] reqwest::Error),

    /// Every attempt failed without a captured error. Exists so the executor
    /// never has to unwrap the cannot-happen empty case.
    #[error("exhausted {0} retries without a response")]
    RetriesExhausted(u32),
}

impl ApiError {
    /// Whether this error must not be retried.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Client { .. })
    }

    /// HTTP status code, for the variants that carry one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Client { status, .. } | Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Machine-readable error code from the response body, when present.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Client { code, .. } | Self::Server { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}
