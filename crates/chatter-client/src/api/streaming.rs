//! Chunked response streaming with incremental UTF-8 decoding.
//!
//! The ask and chatbot endpoints answer a single POST with a chunked
//! plain-text token stream and no message framing: the client treats the
//! body as a flat character sequence. Chunks split on byte boundaries, so a
//! multi-byte character can straddle two reads; [`Utf8Decoder`] carries the
//! partial tail across reads instead of emitting corrupted text.
//!
//! Streaming calls are never retried. Fragments may already have reached
//! the sink, and a clean retry cannot be guaranteed, so every failure
//! surfaces immediately.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::decode::classify_failure;
use super::error::ApiError;
use super::request::RequestSpec;
use crate::ApiClient;

// ── Incremental UTF-8 decoding ─────────────────────────────────────

/// Stateful byte-to-text decoder.
///
/// Complete characters are returned per chunk; an incomplete trailing
/// sequence is buffered until the bytes that close it arrive. Invalid
/// sequences become U+FFFD rather than being dropped.
#[derive(Default)]
pub(crate) struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk, returning every complete character.
    pub(crate) fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let bytes = std::mem::take(&mut self.pending);
        let mut out = String::with_capacity(bytes.len());

        let mut pos = 0;
        while pos < bytes.len() {
            match std::str::from_utf8(&bytes[pos..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    pos = bytes.len();
                }
                Err(err) => {
                    let valid_up_to = pos + err.valid_up_to();
                    if let Ok(valid) = std::str::from_utf8(&bytes[pos..valid_up_to]) {
                        out.push_str(valid);
                    }
                    pos = valid_up_to;
                    match err.error_len() {
                        // Truncated sequence at the end: keep it for the
                        // next chunk.
                        None => {
                            self.pending = bytes[pos..].to_vec();
                            return out;
                        }
                        Some(invalid) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            pos += invalid;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush at end of stream. A leftover partial sequence can never be
    /// completed, so it decodes to a single replacement character.
    pub(crate) fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }
}

// ── Stream consumer ────────────────────────────────────────────────

impl ApiClient {
    /// Open a streaming call and deliver decoded text fragments to `sink`,
    /// in arrival order, until the source is exhausted.
    ///
    /// The sink runs synchronously per fragment; nothing is buffered ahead
    /// of it, so the first fragment lands as soon as the first chunk
    /// decodes.
    pub async fn stream(
        &self,
        spec: RequestSpec,
        sink: impl FnMut(&str),
    ) -> Result<(), ApiError> {
        self.stream_with_cancel(spec, CancellationToken::new(), sink)
            .await
    }

    /// Like [`stream`](Self::stream), stopping early when `cancel` fires.
    ///
    /// Cancellation aborts the current read and suppresses further sink
    /// invocations; fragments already delivered stay delivered. A cancelled
    /// stream returns `Ok(())` since the caller asked for the stop.
    pub async fn stream_with_cancel(
        &self,
        spec: RequestSpec,
        cancel: CancellationToken,
        mut sink: impl FnMut(&str),
    ) -> Result<(), ApiError> {
        // The per-call timeout bounds connection, response headers, and the
        // error-body read. A healthy stream body has no deadline and can run
        // arbitrarily long.
        let timeout = spec.timeout.unwrap_or(self.config.timeout);
        let request = self.build_request(&spec);
        debug!(path = %spec.path, "opening stream");

        let mut resp = tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            sent = tokio::time::timeout(timeout, request.send()) => match sent {
                Err(_) => return Err(ApiError::Timeout(timeout)),
                Ok(resp) => resp.map_err(|e| {
                    if e.is_timeout() {
                        ApiError::Timeout(timeout)
                    } else {
                        ApiError::Network(e)
                    }
                })?,
            },
        };

        let status = resp.status();
        if !status.is_success() {
            // A stalled error body must not hang the call; on elapse the
            // status line alone drives classification.
            let body = tokio::time::timeout(timeout, resp.text())
                .await
                .ok()
                .and_then(Result::ok);
            return Err(classify_failure(status, body.as_deref()));
        }

        let mut decoder = Utf8Decoder::new();
        let mut fragments = 0usize;
        loop {
            let chunk = tokio::select! {
                () = cancel.cancelled() => {
                    debug!(fragments, "stream cancelled by caller");
                    return Ok(());
                }
                chunk = resp.chunk() => chunk.map_err(ApiError::StreamUnreadable)?,
            };
            let Some(bytes) = chunk else { break };
            let text = decoder.decode(&bytes);
            if !text.is_empty() {
                fragments += 1;
                sink(&text);
            }
        }

        let tail = decoder.finish();
        if !tail.is_empty() {
            fragments += 1;
            sink(&tail);
        }

        debug!(fragments, "stream complete");
        Ok(())
    }
}
