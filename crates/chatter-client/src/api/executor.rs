//! The retry loop: bounded attempts, exponential backoff, per-attempt
//! deadlines, and the terminal short-circuit for client errors.

use std::time::{Duration, Instant};

use reqwest::RequestBuilder;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::decode::{Payload, decode_response};
use super::error::ApiError;
use super::request::{Body, RequestSpec};
use super::retry::RetryConfig;
use crate::ApiClient;

impl ApiClient {
    /// Issue one logical call with retries and return the decoded payload.
    ///
    /// Performs up to `retries + 1` attempts, each under its own deadline.
    /// A 4xx response aborts the loop immediately; timeouts, network
    /// failures, 5xx responses, and decode failures are retried after an
    /// exponential backoff sleep. The last observed error is surfaced when
    /// the budget runs out.
    pub async fn execute(&self, spec: RequestSpec) -> Result<Payload, ApiError> {
        let timeout = spec.timeout.unwrap_or(self.config.timeout);
        let retry = RetryConfig {
            max_retries: spec.max_retries.unwrap_or(self.config.max_retries),
            base_delay: spec.retry_base_delay.unwrap_or(self.config.retry_base_delay),
        };
        let mut last_err: Option<ApiError> = None;

        for attempt in 0..=retry.max_retries {
            match self.attempt(&spec, timeout).await {
                Ok(payload) => {
                    if attempt > 0 {
                        debug!(attempt, path = %spec.path, "request succeeded after retry");
                    }
                    return Ok(payload);
                }
                Err(err) if err.is_terminal() => {
                    debug!(path = %spec.path, error = %err, "terminal error, not retrying");
                    return Err(err);
                }
                Err(err) => {
                    warn!(attempt, path = %spec.path, error = %err, "attempt failed");
                    last_err = Some(err);
                    if attempt < retry.max_retries {
                        let delay = retry.delay_for_attempt(attempt);
                        debug!(?delay, "backing off before next attempt");
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(last_err.unwrap_or(ApiError::RetriesExhausted(retry.max_retries)))
    }

    /// `execute` plus deserialization into a concrete type.
    pub async fn execute_json<T: DeserializeOwned>(&self, spec: RequestSpec) -> Result<T, ApiError> {
        self.execute(spec).await?.into_json()
    }

    /// One attempt under its own deadline.
    ///
    /// The deadline covers send through body read. When it elapses the
    /// attempt future is dropped, which aborts the in-flight I/O; retries
    /// already scheduled by [`execute`](Self::execute) are unaffected.
    async fn attempt(&self, spec: &RequestSpec, timeout: Duration) -> Result<Payload, ApiError> {
        let request = self.build_request(spec);
        let start = Instant::now();

        let outcome = tokio::time::timeout(timeout, async {
            let resp = request.send().await.map_err(|e| {
                if e.is_timeout() {
                    ApiError::Timeout(timeout)
                } else {
                    ApiError::Network(e)
                }
            })?;
            debug!(
                status = resp.status().as_u16(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "response headers received"
            );
            decode_response(resp).await
        })
        .await;

        match outcome {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout(timeout)),
        }
    }

    /// Build the transport request for a spec. Shared with the stream
    /// consumer.
    pub(crate) fn build_request(&self, spec: &RequestSpec) -> RequestBuilder {
        let url = if spec.path.starts_with("http://") || spec.path.starts_with("https://") {
            spec.path.clone()
        } else {
            format!(
                "{}{}",
                self.config.base_url.trim_end_matches('/'),
                spec.path
            )
        };

        let mut request = self.http.request(spec.method.clone(), &url);

        match &spec.body {
            None => {}
            Some(Body::Text(text)) => request = request.body(text.clone()),
            Some(Body::Json(value)) => request = request.json(value),
            Some(Body::Form(files)) => {
                // Multipart must carry the transport's own boundary header,
                // so no default content type is set for it.
                let mut form = reqwest::multipart::Form::new();
                for file in files {
                    let part = reqwest::multipart::Part::bytes(file.bytes.clone())
                        .file_name(file.filename.clone());
                    form = form.part(file.field.clone(), part);
                }
                request = request.multipart(form);
            }
        }

        // Spec headers last, with replace semantics: `RequestBuilder::header`
        // appends, so going through `headers` lets a caller-supplied content
        // type displace the JSON default applied above instead of riding
        // alongside it.
        if !spec.headers.is_empty() {
            let mut headers = HeaderMap::new();
            for (name, value) in &spec.headers {
                match (
                    HeaderName::from_bytes(name.as_bytes()),
                    HeaderValue::from_str(value),
                ) {
                    (Ok(name), Ok(value)) => {
                        headers.append(name, value);
                    }
                    _ => warn!(header = %name, "invalid header dropped"),
                }
            }
            request = request.headers(headers);
        }

        request
    }
}
