//! Incremental consumer for chunked reply bodies.
//!
//! Bytes arrive in arbitrary fragments. They are decoded with a stateful
//! UTF-8 decoder (a character split across two fragments is held back until
//! it is complete), appended to the accumulated reply, and the observer is
//! handed the whole accumulated text after every fragment.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid UTF-8 in response stream at byte {offset}")]
    Invalid { offset: usize },
    #[error("response stream ended inside a character ({pending} dangling bytes)")]
    Truncated { pending: usize },
}

/// UTF-8 decoder that tolerates multi-byte characters split across chunks.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
    consumed: usize,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk. An incomplete trailing sequence is buffered and
    /// prefixed to the following chunk.
    pub fn decode(&mut self, chunk: &[u8]) -> Result<String, DecodeError> {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(chunk);

        let valid = match std::str::from_utf8(&buf) {
            Ok(_) => buf.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => {
                return Err(DecodeError::Invalid {
                    offset: self.consumed + e.valid_up_to(),
                })
            }
        };

        self.pending = buf.split_off(valid);
        self.consumed += valid;
        String::from_utf8(buf).map_err(|e| DecodeError::Invalid {
            offset: self.consumed + e.utf8_error().valid_up_to(),
        })
    }

    /// Bytes held back waiting for the rest of a character.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Called at end of stream; leftover bytes mean the body was cut short.
    pub fn finish(&mut self) -> Result<(), DecodeError> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            Err(DecodeError::Truncated {
                pending: std::mem::take(&mut self.pending).len(),
            })
        }
    }
}

/// Accumulated reply for one in-flight stream.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StreamState {
    accumulated_text: String,
    done: bool,
}

impl StreamState {
    pub fn push(&mut self, text: &str) {
        self.accumulated_text.push_str(text);
    }

    pub fn text(&self) -> &str {
        &self.accumulated_text
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    fn finish(&mut self) {
        self.done = true;
    }
}

/// Receives the progress of one stream, in byte order.
pub trait StreamObserver {
    /// Called after every decoded chunk with the full text so far.
    fn on_chunk(&mut self, full_text: &str);
    fn on_done(&mut self);
    fn on_error(&mut self, message: String);

    /// Polled before each read and each callback; returning true stops the
    /// loop without further callbacks.
    fn is_cancelled(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed { chunks: usize },
    Failed,
    Cancelled,
}

pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Drive the read loop over a response body.
///
/// A non-success `status` is reported through `on_error` without reading the
/// body.
pub async fn consume_stream<S, E, O>(
    status: u16,
    mut body: S,
    observer: &mut O,
) -> StreamOutcome
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
    O: StreamObserver + ?Sized,
{
    if !is_success(status) {
        observer.on_error(Error::Status(status).to_string());
        return StreamOutcome::Failed;
    }

    let mut state = StreamState::default();
    let mut decoder = Utf8Decoder::new();
    let mut chunks = 0;

    loop {
        if observer.is_cancelled() {
            debug!(chunks, "stream cancelled");
            return StreamOutcome::Cancelled;
        }

        match body.next().await {
            Some(Ok(bytes)) => {
                let text = match decoder.decode(&bytes) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "failed to decode stream chunk");
                        observer.on_error(e.to_string());
                        return StreamOutcome::Failed;
                    }
                };
                if text.is_empty() {
                    continue;
                }

                state.push(&text);
                chunks += 1;
                if observer.is_cancelled() {
                    debug!(chunks, "stream cancelled");
                    return StreamOutcome::Cancelled;
                }
                observer.on_chunk(state.text());
            }
            Some(Err(e)) => {
                warn!(error = %e, "stream read failed");
                observer.on_error(e.to_string());
                return StreamOutcome::Failed;
            }
            None => {
                if let Err(e) = decoder.finish() {
                    warn!(error = %e, "stream ended mid-character");
                    observer.on_error(e.to_string());
                    return StreamOutcome::Failed;
                }
                state.finish();
                debug!(chunks, bytes = state.text().len(), "stream complete");
                observer.on_done();
                return StreamOutcome::Completed { chunks };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::format_message;
    use futures_util::stream;

    #[derive(Default)]
    struct Recorder {
        chunks: Vec<String>,
        done: bool,
        error: Option<String>,
        cancel_after: Option<usize>,
    }

    impl StreamObserver for Recorder {
        fn on_chunk(&mut self, full_text: &str) {
            self.chunks.push(full_text.to_string());
        }

        fn on_done(&mut self) {
            self.done = true;
        }

        fn on_error(&mut self, message: String) {
            self.error = Some(message);
        }

        fn is_cancelled(&self) -> bool {
            self.cancel_after
                .map(|n| self.chunks.len() >= n)
                .unwrap_or(false)
        }
    }

    fn body(parts: Vec<&'static [u8]>) -> impl Stream<Item = Result<Bytes, String>> + Unpin {
        stream::iter(parts.into_iter().map(|p| Ok(Bytes::from_static(p))))
    }

    #[test]
    fn test_decoder_holds_split_character() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"caf\xC3").as_deref(), Ok("caf"));
        assert_eq!(decoder.pending(), 1);
        assert_eq!(decoder.decode(b"\xA9!").as_deref(), Ok("\u{e9}!"));
        assert_eq!(decoder.finish(), Ok(()));
    }

    #[test]
    fn test_decoder_four_byte_sequence_over_three_chunks() {
        let mut decoder = Utf8Decoder::new();
        let crab = "\u{1F980}".as_bytes();
        assert_eq!(decoder.decode(&crab[..1]).as_deref(), Ok(""));
        assert_eq!(decoder.decode(&crab[1..3]).as_deref(), Ok(""));
        assert_eq!(decoder.decode(&crab[3..]).as_deref(), Ok("\u{1F980}"));
    }

    #[test]
    fn test_decoder_rejects_invalid_bytes() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"ok"), Ok("ok".to_string()));
        assert_eq!(
            decoder.decode(b"\xFFx"),
            Err(DecodeError::Invalid { offset: 2 })
        );
    }

    #[test]
    fn test_decoder_truncated_at_end() {
        let mut decoder = Utf8Decoder::new();
        decoder.decode(b"\xE2\x82").ok();
        assert_eq!(decoder.finish(), Err(DecodeError::Truncated { pending: 2 }));
    }

    #[tokio::test]
    async fn test_chunks_receive_full_text() {
        let mut rec = Recorder::default();
        let outcome = consume_stream(200, body(vec![b"He", b"llo **wor", b"ld**"]), &mut rec).await;

        assert_eq!(outcome, StreamOutcome::Completed { chunks: 3 });
        assert_eq!(rec.chunks, vec!["He", "Hello **wor", "Hello **world**"]);
        assert!(rec.done);
        assert!(rec.error.is_none());

        let last = rec.chunks.last().map(String::as_str).unwrap_or_default();
        assert_eq!(format_message(last), "Hello <strong>world</strong>");
    }

    #[tokio::test]
    async fn test_split_character_never_replaced() {
        let mut rec = Recorder::default();
        consume_stream(200, body(vec![b"na\xC3", b"\xAFve"]), &mut rec).await;
        assert_eq!(rec.chunks, vec!["na", "na\u{ef}ve"]);
        assert!(rec.chunks.iter().all(|c| !c.contains('\u{FFFD}')));
    }

    #[tokio::test]
    async fn test_error_status_skips_body() {
        let mut rec = Recorder::default();
        let outcome = consume_stream(500, body(vec![b"ignored"]), &mut rec).await;
        assert_eq!(outcome, StreamOutcome::Failed);
        assert_eq!(rec.error.as_deref(), Some("Server error: 500"));
        assert!(rec.chunks.is_empty());
        assert!(!rec.done);
    }

    #[tokio::test]
    async fn test_read_failure_mid_stream() {
        let parts: Vec<Result<Bytes, String>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err("connection reset".to_string()),
            Ok(Bytes::from_static(b"never")),
        ];
        let mut rec = Recorder::default();
        let outcome = consume_stream(200, stream::iter(parts), &mut rec).await;
        assert_eq!(outcome, StreamOutcome::Failed);
        assert_eq!(rec.chunks, vec!["partial"]);
        assert_eq!(rec.error.as_deref(), Some("connection reset"));
        assert!(!rec.done);
    }

    #[tokio::test]
    async fn test_truncated_body_is_an_error() {
        let mut rec = Recorder::default();
        let outcome = consume_stream(200, body(vec![b"ok", b"\xF0\x9F"]), &mut rec).await;
        assert_eq!(outcome, StreamOutcome::Failed);
        assert!(rec.error.is_some());
        assert!(!rec.done);
    }

    #[tokio::test]
    async fn test_cancellation_stops_reading() {
        let mut rec = Recorder {
            cancel_after: Some(1),
            ..Recorder::default()
        };
        let outcome = consume_stream(200, body(vec![b"a", b"b", b"c"]), &mut rec).await;
        assert_eq!(outcome, StreamOutcome::Cancelled);
        assert_eq!(rec.chunks, vec!["a"]);
        assert!(!rec.done);
        assert!(rec.error.is_none());
    }

    #[tokio::test]
    async fn test_empty_stream_is_done() {
        let mut rec = Recorder::default();
        let outcome = consume_stream(200, body(vec![]), &mut rec).await;
        assert_eq!(outcome, StreamOutcome::Completed { chunks: 0 });
        assert!(rec.done);
    }

    #[test]
    fn test_stream_state_accumulates() {
        let mut state = StreamState::default();
        state.push("a");
        state.push("b");
        assert_eq!(state.text(), "ab");
        assert!(!state.is_done());
        state.finish();
        assert!(state.is_done());
    }
}
