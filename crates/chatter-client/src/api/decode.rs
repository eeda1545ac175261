//! Response decoding and error classification.
//!
//! A non-success response carries an optional structured body in the
//! backend's `ErrorResponse` shape: `detail` or `message` for the human
//! text, `error_code` for a machine code. Absence of a parseable body is
//! tolerated; the status line is synthesized into a message instead.

use reqwest::{Response, StatusCode, header::CONTENT_TYPE};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::trace;

use super::error::ApiError;

/// Decoded success payload.
///
/// The content-type header decides the variant: a JSON-ish type is parsed
/// into a structured value, everything else is returned as raw text.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(serde_json::Value),
    Text(String),
}

impl Payload {
    /// Deserialize the payload into a concrete type.
    ///
    /// Text payloads are parsed as JSON too, so endpoints served with a
    /// sloppy content type still decode.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        match self {
            Self::Json(value) => serde_json::from_value(value).map_err(ApiError::Decode),
            Self::Text(text) => serde_json::from_str(&text).map_err(ApiError::Decode),
        }
    }

    /// The payload as display text.
    pub fn into_text(self) -> String {
        match self {
            Self::Json(value) => value.to_string(),
            Self::Text(text) => text,
        }
    }
}

/// Wire shape of a structured error body.
#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<String>,
    message: Option<String>,
    error_code: Option<String>,
}

/// Classify a non-success status plus whatever body text was readable.
pub(crate) fn classify_failure(status: StatusCode, body: Option<&str>) -> ApiError {
    let parsed = body.and_then(|b| serde_json::from_str::<ErrorBody>(b).ok());
    let code = parsed.as_ref().and_then(|e| e.error_code.clone());
    let message = parsed
        .and_then(|e| e.detail.or(e.message))
        .unwrap_or_else(|| {
            format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("unknown status")
            )
        });

    if status.is_client_error() {
        ApiError::Client {
            status: status.as_u16(),
            message,
            code,
        }
    } else {
        ApiError::Server {
            status: status.as_u16(),
            message,
            code,
        }
    }
}

/// Decode a completed response into a payload or a classified error.
pub(crate) async fn decode_response(resp: Response) -> Result<Payload, ApiError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.ok();
        return Err(classify_failure(status, body.as_deref()));
    }

    let is_json = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("json"));
    let text = resp.text().await.map_err(ApiError::Network)?;
    trace!(json = is_json, bytes = text.len(), "decoding response body");

    if is_json {
        serde_json::from_str(&text)
            .map(Payload::Json)
            .map_err(ApiError::Decode)
    } else {
        Ok(Payload::Text(text))
    }
}
