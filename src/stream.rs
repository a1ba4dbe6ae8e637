//! Incremental decoding of the streamed chat-completion response
//!
//! The endpoint frames its response as newline-delimited chunks. Lines
//! prefixed with `data:` carry a JSON chunk of shape
//! `{choices: [{delta: {content?}}], usage?: {...}}`; the literal payload
//! `[DONE]` terminates the stream. `StreamDecoder` is fed raw bytes as they
//! arrive and yields increments one at a time, so content decoded before a
//! malformed line is never lost and the decoder stays independent of the
//! HTTP transport.

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Maximum bytes buffered while waiting for a line terminator. A single
/// line longer than this is treated as a decode failure.
const MAX_BUFFER_SIZE: usize = 1024 * 1024;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// A decode failure, carrying the triggering error's description.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct DecodeError(pub String);

/// One decoded unit from the live stream: a content fragment (possibly
/// empty) and, when the chunk carried one, a usage snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamIncrement {
    /// Incremental content from the first choice's delta. Empty when the
    /// chunk carried no content.
    pub content: String,
    /// Usage totals reported by this chunk, if any.
    pub usage: Option<UsageSnapshot>,
}

/// Token-usage totals as reported by a single chunk. Each field is optional
/// on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct UsageSnapshot {
    /// Prompt token count.
    #[serde(default)]
    pub prompt_tokens: Option<u64>,
    /// Completion token count.
    #[serde(default)]
    pub completion_tokens: Option<u64>,
    /// Total token count.
    #[serde(default)]
    pub total_tokens: Option<u64>,
}

/// Running usage aggregate with sticky per-field updates: a field already
/// set is never overwritten by an absent value, so the final aggregate
/// reflects the most recent report of each field independently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageAggregate {
    /// Last reported prompt token count.
    pub prompt_tokens: Option<u64>,
    /// Last reported completion token count.
    pub completion_tokens: Option<u64>,
    /// Last reported total token count.
    pub total_tokens: Option<u64>,
}

impl UsageAggregate {
    /// Fold one snapshot into the aggregate.
    pub fn apply(&mut self, snapshot: &UsageSnapshot) {
        if let Some(v) = snapshot.prompt_tokens {
            self.prompt_tokens = Some(v);
        }
        if let Some(v) = snapshot.completion_tokens {
            self.completion_tokens = Some(v);
        }
        if let Some(v) = snapshot.total_tokens {
            self.total_tokens = Some(v);
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<UsageSnapshot>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Line-oriented decoder over the response byte stream.
///
/// Feed raw bytes with [`feed`](Self::feed), then drain completed
/// increments with [`next_increment`](Self::next_increment). The sequence
/// is finite and non-restartable: once the `[DONE]` sentinel is seen,
/// remaining and future input is discarded.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buffer: String,
    done: bool,
}

impl StreamDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the end-of-stream sentinel has been observed.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Buffer raw bytes from the transport.
    pub fn feed(&mut self, bytes: &[u8]) {
        if self.done {
            debug!(discarded = bytes.len(), "input after stream terminator");
            return;
        }
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
    }

    /// Decode the next complete increment, if one is buffered.
    ///
    /// Returns `Ok(None)` when no complete event line remains, including
    /// after the terminator. A malformed payload is an immediate error;
    /// the decoder must not be used further after one.
    pub fn next_increment(&mut self) -> Result<Option<StreamIncrement>, DecodeError> {
        while !self.done {
            let Some(newline) = self.buffer.find('\n') else {
                if self.buffer.len() > MAX_BUFFER_SIZE {
                    return Err(DecodeError(format!(
                        "stream line exceeded {} byte buffer without a terminator",
                        MAX_BUFFER_SIZE
                    )));
                }
                return Ok(None);
            };
            let line: String = self.buffer.drain(..=newline).collect();
            if let Some(increment) = self.decode_line(line.trim())? {
                return Ok(Some(increment));
            }
        }
        Ok(None)
    }

    /// Decode whatever remains in the buffer as the final line.
    ///
    /// Servers may close the stream without terminating the last event
    /// line; the remainder is still a candidate event and must not be
    /// dropped. Call once after the transport reports end of stream,
    /// after draining [`next_increment`](Self::next_increment).
    pub fn finish(&mut self) -> Result<Option<StreamIncrement>, DecodeError> {
        if self.done || self.buffer.is_empty() {
            return Ok(None);
        }
        let line = std::mem::take(&mut self.buffer);
        self.decode_line(line.trim())
    }

    /// Decode one trimmed line. Lines without the recognized prefix are
    /// ignored; the sentinel flips `done` and drops buffered input.
    fn decode_line(&mut self, line: &str) -> Result<Option<StreamIncrement>, DecodeError> {
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            return Ok(None);
        };
        let payload = payload.trim_start();

        if payload == DONE_SENTINEL {
            self.done = true;
            self.buffer.clear();
            return Ok(None);
        }

        let chunk: ChatChunk =
            serde_json::from_str(payload).map_err(|e| DecodeError(e.to_string()))?;
        let content = chunk
            .choices
            .first()
            .and_then(|choice| choice.delta.content.clone())
            .unwrap_or_default();
        Ok(Some(StreamIncrement {
            content,
            usage: chunk.usage,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feed one chunk and drain every increment it completed.
    fn feed_and_drain(decoder: &mut StreamDecoder, input: &[u8]) -> Vec<StreamIncrement> {
        decoder.feed(input);
        let mut increments = Vec::new();
        while let Some(increment) = decoder.next_increment().unwrap() {
            increments.push(increment);
        }
        increments
    }

    #[test]
    fn decodes_content_chunks() {
        let mut decoder = StreamDecoder::new();
        let increments = feed_and_drain(
            &mut decoder,
            b"data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\
              data: {\"choices\":[{\"delta\":{\"content\":\" world\"}}]}\n",
        );
        assert_eq!(increments.len(), 2);
        assert_eq!(increments[0].content, "Hello");
        assert_eq!(increments[1].content, " world");
        assert!(increments[0].usage.is_none());
        assert!(!decoder.is_done());
    }

    #[test]
    fn handles_chunk_split_across_feeds() {
        let mut decoder = StreamDecoder::new();
        assert!(feed_and_drain(&mut decoder, b"data: {\"choices\":[{\"del").is_empty());
        let increments = feed_and_drain(&mut decoder, b"ta\":{\"content\":\"hi\"}}]}\n");
        assert_eq!(increments.len(), 1);
        assert_eq!(increments[0].content, "hi");
    }

    #[test]
    fn done_sentinel_terminates() {
        let mut decoder = StreamDecoder::new();
        let increments = feed_and_drain(
            &mut decoder,
            b"data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\ndata: [DONE]\n",
        );
        assert_eq!(increments.len(), 1);
        assert!(decoder.is_done());
    }

    #[test]
    fn input_after_done_is_discarded() {
        let mut decoder = StreamDecoder::new();
        feed_and_drain(&mut decoder, b"data: [DONE]\n");
        let increments = feed_and_drain(
            &mut decoder,
            b"data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n",
        );
        assert!(increments.is_empty());
    }

    #[test]
    fn ignores_lines_without_prefix() {
        let mut decoder = StreamDecoder::new();
        let increments = feed_and_drain(
            &mut decoder,
            b": keep-alive\n\nevent: message\ndata: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n",
        );
        assert_eq!(increments.len(), 1);
        assert_eq!(increments[0].content, "a");
    }

    #[test]
    fn crlf_lines_are_trimmed() {
        let mut decoder = StreamDecoder::new();
        let increments = feed_and_drain(
            &mut decoder,
            b"data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\r\ndata: [DONE]\r\n",
        );
        assert_eq!(increments.len(), 1);
        assert_eq!(increments[0].content, "b");
        assert!(decoder.is_done());
    }

    #[test]
    fn missing_content_field_yields_empty_fragment() {
        let mut decoder = StreamDecoder::new();
        let increments = feed_and_drain(&mut decoder, b"data: {\"choices\":[{\"delta\":{}}]}\n");
        assert_eq!(increments.len(), 1);
        assert_eq!(increments[0].content, "");
    }

    #[test]
    fn usage_only_chunk_with_empty_choices() {
        let mut decoder = StreamDecoder::new();
        let increments = feed_and_drain(
            &mut decoder,
            b"data: {\"choices\":[],\"usage\":{\"prompt_tokens\":10,\"completion_tokens\":3,\"total_tokens\":13}}\n",
        );
        assert_eq!(increments.len(), 1);
        assert_eq!(increments[0].content, "");
        let usage = increments[0].usage.unwrap();
        assert_eq!(usage.prompt_tokens, Some(10));
        assert_eq!(usage.completion_tokens, Some(3));
        assert_eq!(usage.total_tokens, Some(13));
    }

    #[test]
    fn malformed_payload_is_a_decode_error() {
        let mut decoder = StreamDecoder::new();
        decoder.feed(b"data: {not json}\n");
        let err = decoder.next_increment().unwrap_err();
        assert!(!err.0.is_empty());
    }

    #[test]
    fn increments_before_a_malformed_line_are_preserved() {
        let mut decoder = StreamDecoder::new();
        decoder.feed(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"keep\"}}]}\ndata: {broken\n",
        );
        let first = decoder.next_increment().unwrap().unwrap();
        assert_eq!(first.content, "keep");
        assert!(decoder.next_increment().is_err());
    }

    #[test]
    fn oversized_line_is_a_decode_error() {
        let mut decoder = StreamDecoder::new();
        decoder.feed(&vec![b'a'; MAX_BUFFER_SIZE + 1]);
        assert!(decoder.next_increment().is_err());
    }

    #[test]
    fn data_prefix_without_space_is_accepted() {
        let mut decoder = StreamDecoder::new();
        let increments = feed_and_drain(
            &mut decoder,
            b"data:{\"choices\":[{\"delta\":{\"content\":\"c\"}}]}\n",
        );
        assert_eq!(increments.len(), 1);
        assert_eq!(increments[0].content, "c");
    }

    #[test]
    fn finish_decodes_unterminated_final_line() {
        let mut decoder = StreamDecoder::new();
        let increments = feed_and_drain(
            &mut decoder,
            b"data: {\"choices\":[{\"delta\":{\"content\":\"head\"}}]}\ndata: {\"choices\":[{\"delta\":{\"content\":\" tail\"}}]}",
        );
        assert_eq!(increments.len(), 1);
        assert_eq!(increments[0].content, "head");

        let last = decoder.finish().unwrap().unwrap();
        assert_eq!(last.content, " tail");
        assert!(decoder.finish().unwrap().is_none());
    }

    #[test]
    fn finish_with_empty_or_finished_buffer_yields_nothing() {
        let mut decoder = StreamDecoder::new();
        assert!(decoder.finish().unwrap().is_none());

        decoder.feed(b"data: [DONE]");
        assert!(decoder.finish().unwrap().is_none());
        assert!(decoder.is_done());
    }

    #[test]
    fn finish_ignores_unprefixed_remainder() {
        let mut decoder = StreamDecoder::new();
        decoder.feed(b": trailing comment");
        assert!(decoder.finish().unwrap().is_none());
    }

    #[test]
    fn finish_surfaces_malformed_remainder() {
        let mut decoder = StreamDecoder::new();
        decoder.feed(b"data: {\"choices\":");
        assert!(decoder.finish().is_err());
    }

    #[test]
    fn usage_aggregate_is_sticky_per_field() {
        let mut aggregate = UsageAggregate::default();
        aggregate.apply(&UsageSnapshot {
            prompt_tokens: Some(12),
            completion_tokens: None,
            total_tokens: None,
        });
        aggregate.apply(&UsageSnapshot {
            prompt_tokens: None,
            completion_tokens: Some(5),
            total_tokens: None,
        });
        // An absent field never clears a previously seen value.
        assert_eq!(aggregate.prompt_tokens, Some(12));
        assert_eq!(aggregate.completion_tokens, Some(5));
        assert_eq!(aggregate.total_tokens, None);

        aggregate.apply(&UsageSnapshot {
            prompt_tokens: Some(20),
            completion_tokens: None,
            total_tokens: Some(25),
        });
        assert_eq!(aggregate.prompt_tokens, Some(20));
        assert_eq!(aggregate.completion_tokens, Some(5));
        assert_eq!(aggregate.total_tokens, Some(25));
    }
}
