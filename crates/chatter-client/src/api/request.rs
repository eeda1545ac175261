//! Request descriptions: target, method, headers, body, and per-call
//! overrides for the timeout and retry budget.

use reqwest::Method;
use std::time::Duration;

/// One file in a multipart upload.
#[derive(Debug, Clone)]
pub struct FormFile {
    /// Form field name (the backend expects `files`).
    pub field: String,
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl FormFile {
    pub fn new(field: impl Into<String>, filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            field: field.into(),
            filename: filename.into(),
            bytes,
        }
    }
}

/// Request body forms accepted by the executor.
#[derive(Debug, Clone)]
pub enum Body {
    /// Sent verbatim, no default content type.
    Text(String),
    /// Serialized to JSON at send time. A `content-type: application/json`
    /// header is applied unless the spec carries its own.
    Json(serde_json::Value),
    /// Multipart form data. No default content type is set here: the
    /// transport must pick its own boundary parameter.
    Form(Vec<FormFile>),
}

/// Description of one logical call.
///
/// `path` is joined onto the client's base URL unless it is already an
/// absolute URL. `timeout`, `max_retries`, and `retry_base_delay` override
/// the process-wide defaults from
/// [`ClientConfig`](crate::ClientConfig) when set.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub path: String,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<Body>,
    pub timeout: Option<Duration>,
    pub max_retries: Option<u32>,
    pub retry_base_delay: Option<Duration>,
}

impl RequestSpec {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            headers: Vec::new(),
            body: None,
            timeout: None,
            max_retries: None,
            retry_base_delay: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Add a header. Headers set here win over body-derived defaults.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach a JSON body.
    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.body = Some(Body::Json(value));
        self
    }

    /// Attach a raw text body.
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = Some(Body::Text(body.into()));
        self
    }

    /// Attach a multipart form body.
    pub fn form(mut self, files: Vec<FormFile>) -> Self {
        self.body = Some(Body::Form(files));
        self
    }

    /// Override the per-attempt deadline for this call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override the retry budget for this call.
    pub fn retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Override the base backoff delay for this call.
    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = Some(delay);
        self
    }
}
