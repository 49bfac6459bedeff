//! SSE streaming parser for chat completions.
//!
//! Converts a raw byte stream into ordered [`StreamEvent`] values.
//! Handles `data: [DONE]`, partial lines, UTF-8 sequences split across
//! chunks, and in-band error payloads.

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use std::fmt::Display;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::CompletionError;
use crate::types::truncate_to_char_boundary;

/// One event from a streaming chat completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A non-empty text fragment, in arrival order.
    Fragment(String),
    /// The endpoint signalled the end of the completion.
    Done,
}

/// Raw streaming chunk from the endpoint.
#[derive(Debug, serde::Deserialize)]
struct StreamChunkRaw {
    #[serde(default)]
    choices: Vec<StreamChoiceRaw>,
    #[serde(default)]
    error: Option<StreamErrorRaw>,
}

#[derive(Debug, serde::Deserialize)]
struct StreamChoiceRaw {
    #[serde(default)]
    delta: Option<DeltaRaw>,
}

#[derive(Debug, serde::Deserialize)]
struct DeltaRaw {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct StreamErrorRaw {
    message: String,
}

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, String>> + Send>>;

/// Stream adapter that converts raw SSE bytes into [`StreamEvent`] values.
///
/// Yields nothing after `Done` or after the first error. A byte stream that
/// ends without `Done` simply ends; callers decide what a missing completion
/// signal means.
pub struct CompletionStream {
    inner: ByteStream,
    buffer: String,
    pending: Vec<u8>,
    eof: bool,
    finished: bool,
}

impl std::fmt::Debug for CompletionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionStream")
            .field("buffer", &self.buffer)
            .field("pending", &self.pending)
            .field("eof", &self.eof)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl CompletionStream {
    /// Wrap any byte stream whose errors can be displayed.
    pub fn new<S, E>(byte_stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Display,
    {
        Self {
            inner: Box::pin(byte_stream.map(|r| r.map_err(|e| e.to_string()))),
            buffer: String::new(),
            pending: Vec::new(),
            eof: false,
            finished: false,
        }
    }

    fn fail(&mut self, error: CompletionError) -> Poll<Option<<Self as Stream>::Item>> {
        self.finished = true;
        Poll::Ready(Some(Err(error)))
    }

    /// Move every complete UTF-8 sequence from `pending` into `buffer`.
    fn decode_pending(&mut self) -> Result<(), CompletionError> {
        match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                self.buffer.push_str(text);
                self.pending.clear();
                Ok(())
            }
            Err(e) if e.error_len().is_none() => {
                let valid = e.valid_up_to();
                // Only the incomplete tail stays pending
                let text = String::from_utf8_lossy(&self.pending[..valid]).into_owned();
                self.buffer.push_str(&text);
                self.pending.drain(..valid);
                Ok(())
            }
            Err(e) => Err(CompletionError::Parse(format!("Invalid UTF-8 in stream: {}", e))),
        }
    }
}

impl Stream for CompletionStream {
    type Item = Result<StreamEvent, CompletionError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if this.finished {
                return Poll::Ready(None);
            }

            if let Some(item) = try_parse_line(&mut this.buffer) {
                if !matches!(item, Ok(StreamEvent::Fragment(_))) {
                    this.finished = true;
                }
                return Poll::Ready(Some(item));
            }

            if this.eof {
                this.finished = true;
                if !this.pending.is_empty() {
                    return Poll::Ready(Some(Err(CompletionError::Parse(
                        "Stream ended inside a UTF-8 sequence".into(),
                    ))));
                }
                return Poll::Ready(None);
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.pending.extend_from_slice(&bytes);
                    if let Err(e) = this.decode_pending() {
                        return this.fail(e);
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    return this.fail(CompletionError::Stream(e));
                }
                Poll::Ready(None) => {
                    this.eof = true;
                    // Flush a trailing line that had no newline
                    if !this.buffer.trim().is_empty() && !this.buffer.ends_with('\n') {
                        this.buffer.push('\n');
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Try to extract and parse the next meaningful SSE line from the buffer.
/// Returns `None` if no complete line with an event is available yet.
fn try_parse_line(buffer: &mut String) -> Option<Result<StreamEvent, CompletionError>> {
    loop {
        let newline_pos = buffer.find('\n')?;
        let line = buffer[..newline_pos].trim().to_string();
        buffer.drain(..=newline_pos);

        // SSE uses blank lines as event separators
        if line.is_empty() {
            continue;
        }

        // Skip non-data lines ("event:", "id:", "retry:", comments)
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();

        if data == "[DONE]" {
            return Some(Ok(StreamEvent::Done));
        }

        let raw = match serde_json::from_str::<StreamChunkRaw>(data) {
            Ok(raw) => raw,
            Err(e) => {
                return Some(Err(CompletionError::Parse(format!(
                    "Failed to parse stream chunk: {} (data: {})",
                    e,
                    truncate_to_char_boundary(data, 200)
                ))));
            }
        };

        if let Some(error) = raw.error {
            return Some(Err(CompletionError::Stream(format!(
                "Endpoint reported an error mid-stream: {}",
                error.message
            ))));
        }

        let delta = raw
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta)
            .and_then(|d| d.content)
            .unwrap_or_default();

        // Role-only and finish chunks carry no text
        if delta.is_empty() {
            continue;
        }

        return Some(Ok(StreamEvent::Fragment(delta)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sse(lines: &[&str]) -> Vec<Result<Bytes, String>> {
        lines
            .iter()
            .map(|line| Ok(Bytes::from(format!("{}\n", line))))
            .collect()
    }

    fn delta(text: &str) -> String {
        format!(
            r#"data: {{"choices":[{{"delta":{{"content":{}}}}}]}}"#,
            serde_json::to_string(text).unwrap()
        )
    }

    #[tokio::test]
    async fn test_parse_fragments_then_done() {
        let hel = delta("Hel");
        let lo = delta("lo!");
        let data = sse(&[&hel, "", &lo, "", "data: [DONE]"]);

        let mut stream = CompletionStream::new(futures::stream::iter(data));

        assert_eq!(stream.next().await.unwrap().unwrap(), StreamEvent::Fragment("Hel".into()));
        assert_eq!(stream.next().await.unwrap().unwrap(), StreamEvent::Fragment("lo!".into()));
        assert_eq!(stream.next().await.unwrap().unwrap(), StreamEvent::Done);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_role_only_and_empty_deltas_are_skipped() {
        let hi = delta("Hi");
        let data = sse(&[
            r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#,
            r#"data: {"choices":[{"delta":{}}]}"#,
            &hi,
            r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
            "data: [DONE]",
        ]);

        let events: Vec<_> = CompletionStream::new(futures::stream::iter(data))
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(
            events,
            vec![StreamEvent::Fragment("Hi".into()), StreamEvent::Done]
        );
    }

    #[tokio::test]
    async fn test_line_split_across_chunks() {
        let line = format!("{}\n\ndata: [DONE]\n", delta("Hello"));
        let (a, b) = line.split_at(17);
        let data: Vec<Result<Bytes, String>> = vec![
            Ok(Bytes::from(a.to_string())),
            Ok(Bytes::from(b.to_string())),
        ];

        let mut stream = CompletionStream::new(futures::stream::iter(data));
        assert_eq!(stream.next().await.unwrap().unwrap(), StreamEvent::Fragment("Hello".into()));
        assert_eq!(stream.next().await.unwrap().unwrap(), StreamEvent::Done);
    }

    #[tokio::test]
    async fn test_multibyte_char_split_across_chunks() {
        let line = format!("{}\ndata: [DONE]\n", delta("世界"));
        let bytes = line.into_bytes();
        let split = bytes.iter().position(|b| *b >= 0x80).unwrap() + 1;
        let data: Vec<Result<Bytes, String>> = vec![
            Ok(Bytes::copy_from_slice(&bytes[..split])),
            Ok(Bytes::copy_from_slice(&bytes[split..])),
        ];

        let mut stream = CompletionStream::new(futures::stream::iter(data));
        assert_eq!(stream.next().await.unwrap().unwrap(), StreamEvent::Fragment("世界".into()));
    }

    #[tokio::test]
    async fn test_transport_error_mid_stream() {
        let hel = delta("Hel");
        let mut data = sse(&[&hel]);
        data.push(Err("connection reset".to_string()));

        let mut stream = CompletionStream::new(futures::stream::iter(data));
        assert_eq!(stream.next().await.unwrap().unwrap(), StreamEvent::Fragment("Hel".into()));

        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, CompletionError::Stream(_)));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_in_band_error_payload() {
        let data = sse(&[r#"data: {"error":{"message":"overloaded"}}"#]);

        let mut stream = CompletionStream::new(futures::stream::iter(data));
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(err.to_string().contains("overloaded"));
    }

    #[tokio::test]
    async fn test_missing_done_just_ends() {
        let hel = delta("Hel");
        let data = sse(&[&hel]);

        let mut stream = CompletionStream::new(futures::stream::iter(data));
        assert_eq!(stream.next().await.unwrap().unwrap(), StreamEvent::Fragment("Hel".into()));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_trailing_line_without_newline() {
        let data: Vec<Result<Bytes, String>> = vec![Ok(Bytes::from("data: [DONE]"))];

        let mut stream = CompletionStream::new(futures::stream::iter(data));
        assert_eq!(stream.next().await.unwrap().unwrap(), StreamEvent::Done);
    }

    #[tokio::test]
    async fn test_malformed_chunk_is_parse_error() {
        let data = sse(&["data: {not json"]);

        let mut stream = CompletionStream::new(futures::stream::iter(data));
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, CompletionError::Parse(_)));
    }
}
