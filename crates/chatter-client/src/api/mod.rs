//! The transport layer: request specs, retry with backoff, response
//! decoding, and chunked streaming.
//!
//! These modules sit between the typed endpoint wrappers on
//! [`ApiClient`](crate::ApiClient) and the network:
//!
//! - [`request`] — [`RequestSpec`]: target, method, headers, body, and
//!   per-call overrides for timeout and retry budget.
//! - [`retry`] — [`RetryConfig`]: integer exponential backoff
//!   (`base * 2^attempt`, no jitter).
//! - [`error`] — [`ApiError`], the classified error taxonomy. Client (4xx)
//!   errors are terminal; everything else is retryable.
//! - [`decode`] — success/failure classification, `detail`/`error_code`
//!   extraction from error bodies, JSON-vs-text payload split.
//! - [`executor`] — the attempt loop behind
//!   [`ApiClient::execute`](crate::ApiClient::execute).
//! - [`streaming`] — the chunked-stream consumer behind
//!   [`ApiClient::stream`](crate::ApiClient::stream), with stateful UTF-8
//!   decoding across chunk boundaries.

pub mod decode;
pub mod error;
pub mod executor;
pub mod request;
pub mod retry;
pub mod streaming;

pub use decode::Payload;
pub use error::ApiError;
pub use request::{Body, FormFile, RequestSpec};
pub use retry::RetryConfig;
