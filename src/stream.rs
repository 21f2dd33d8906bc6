//! Streaming response decoding for AIBud
//!
//! Inference backends deliver tokens as a line-framed byte stream: Ollama
//! emits newline-delimited JSON objects with a `response` field, while
//! OpenAI-compatible APIs emit server-sent-event `data:` lines with the token
//! at `choices[0].delta.content` and a literal `data: [DONE]` sentinel.
//!
//! [`StreamDecoder`] turns raw byte chunks into decoded token strings
//! regardless of where chunk boundaries fall, and [`run_token_stream`] drives
//! a response body through the decoder with cooperative cancellation.

use crate::error::{AibudError, Result};

use bytes::Bytes;
use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Line-framing convention used by an inference backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFraming {
    /// Each line is a standalone JSON object with a `response` string field
    Ndjson,
    /// Each line is prefixed `data: ` and carries a JSON object with the
    /// token at `choices[0].delta.content`; `data: [DONE]` terminates
    Sse,
}

/// How a token stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The byte source signalled end-of-stream or the SSE sentinel arrived
    Completed,
    /// The consumer requested early termination; not an error
    Cancelled,
}

/// Incremental decoder from byte chunks to token strings
///
/// The decoder buffers raw bytes and cuts only at newline bytes, which is
/// safe for UTF-8 because continuation bytes never collide with `\n`; a
/// multi-byte sequence split across chunks is reassembled before decoding.
/// Malformed lines are logged and skipped without aborting the stream.
///
/// # Examples
///
/// ```
/// use aibud::stream::{StreamDecoder, StreamFraming};
///
/// let mut decoder = StreamDecoder::new(StreamFraming::Ndjson);
/// let tokens = decoder.push_chunk(b"{\"response\":\"Hel\"}\n{\"response\":\"lo\"}\n");
/// assert_eq!(tokens, vec!["Hel".to_string(), "lo".to_string()]);
/// ```
#[derive(Debug)]
pub struct StreamDecoder {
    framing: StreamFraming,
    pending: Vec<u8>,
    done: bool,
}

impl StreamDecoder {
    /// Create a decoder for the given framing
    pub fn new(framing: StreamFraming) -> Self {
        Self {
            framing,
            pending: Vec::new(),
            done: false,
        }
    }

    /// Whether the terminating sentinel has been observed (`sse` only)
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed a chunk of bytes, returning every token completed by it
    ///
    /// The final, possibly-incomplete line segment is retained for the next
    /// chunk. After the sentinel has been observed all further input is
    /// ignored.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        if self.done {
            return Vec::new();
        }

        self.pending.extend_from_slice(chunk);

        let mut tokens = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
            if let Some(token) = self.decode_line(&text) {
                tokens.push(token);
            }
            if self.done {
                self.pending.clear();
                break;
            }
        }
        tokens
    }

    /// Flush the trailing unterminated segment as a final line
    ///
    /// Call once when the byte source signals end-of-stream.
    pub fn finish(&mut self) -> Vec<String> {
        if self.done || self.pending.is_empty() {
            return Vec::new();
        }
        let rest = std::mem::take(&mut self.pending);
        let text = String::from_utf8_lossy(&rest).into_owned();
        self.decode_line(&text).into_iter().collect()
    }

    /// Decode a single complete line into a token, if it carries one
    fn decode_line(&mut self, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let payload = match self.framing {
            StreamFraming::Ndjson => line,
            StreamFraming::Sse => {
                // Lines without a data: prefix (comments, event fields) carry
                // no token payload.
                let data = line.strip_prefix("data:")?.trim();
                if data == "[DONE]" {
                    self.done = true;
                    return None;
                }
                return extract_sse_token(data);
            }
        };

        match serde_json::from_str::<serde_json::Value>(payload) {
            Ok(value) => value
                .get("response")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            Err(err) => {
                tracing::warn!("Skipping malformed streamed line: {}", err);
                None
            }
        }
    }
}

/// Extract the delta token from an SSE chat-completion payload
fn extract_sse_token(data: &str) -> Option<String> {
    match serde_json::from_str::<serde_json::Value>(data) {
        Ok(value) => value
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("delta"))
            .and_then(|d| d.get("content"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        Err(err) => {
            tracing::warn!("Skipping malformed streamed line: {}", err);
            None
        }
    }
}

/// Drive a response byte stream through a decoder, forwarding tokens
///
/// Decoded tokens are pushed to `token_tx` as they complete. The call
/// terminates when the byte source ends, the SSE sentinel arrives, or
/// `cancel` fires; cancellation abandons the in-flight read promptly and
/// delivers no further tokens.
///
/// # Errors
///
/// Returns a provider error when the underlying transport fails mid-stream.
/// Cancellation is reported through [`StreamOutcome::Cancelled`], never as an
/// error.
pub async fn run_token_stream(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>>,
    framing: StreamFraming,
    token_tx: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
) -> Result<StreamOutcome> {
    use futures::StreamExt;

    let mut decoder = StreamDecoder::new(framing);

    tokio::pin!(byte_stream);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Token stream cancelled by consumer");
                return Ok(StreamOutcome::Cancelled);
            }
            chunk = byte_stream.next() => {
                match chunk {
                    None => break,
                    Some(Ok(bytes)) => {
                        for token in decoder.push_chunk(&bytes) {
                            if token_tx.send(token).is_err() {
                                // Receiver dropped; treat like a stop request.
                                return Ok(StreamOutcome::Cancelled);
                            }
                        }
                        if decoder.is_done() {
                            return Ok(StreamOutcome::Completed);
                        }
                    }
                    Some(Err(err)) => {
                        return Err(AibudError::Provider(format!(
                            "Stream transport failed: {}",
                            err
                        ))
                        .into());
                    }
                }
            }
        }
    }

    for token in decoder.finish() {
        let _ = token_tx.send(token);
    }
    Ok(StreamOutcome::Completed)
}
