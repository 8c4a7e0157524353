use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use tracing::trace;

/// Incrementally extracts top-level JSON objects from a chunked byte stream.
///
/// One extractor belongs to one logical stream. Bytes of an object that is
/// still open are kept between calls to [`parse`](Self::parse), so objects
/// may be split at any byte, including in the middle of a multi-byte UTF-8
/// sequence. Everything outside a `{ ... }` span (array brackets, commas,
/// whitespace, garbage) is dropped without error.
///
/// Balance is tracked by counting raw `{` and `}` bytes. Braces inside string
/// literals are counted as structural, so `{"a":"}"}` completes at the first
/// `}`. Callers that cannot rule this out must validate the decoded result.
///
/// A partial object at end of stream is never emitted. An object that never
/// closes grows the buffer without limit; see
/// [`ParserConfig::max_buffer_size`](crate::ParserConfig::max_buffer_size).
///
/// ```
/// use json_parts_dataflow::JsonPartsExtractor;
///
/// let mut extractor = JsonPartsExtractor::new();
/// assert!(extractor.parse(Some(br#"[{"k":"val"#)).is_empty());
/// let parts = extractor.parse(Some(br#"ue"},{"n":1}]"#));
/// assert_eq!(parts.len(), 2);
/// assert_eq!(&parts[0][..], br#"{"k":"value"}"#);
/// assert_eq!(&parts[1][..], br#"{"n":1}"#);
/// ```
#[derive(Debug, Default)]
pub struct JsonPartsExtractor {
    accumulated: BytesMut,
    brace_depth: usize,
}

impl JsonPartsExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            accumulated: BytesMut::with_capacity(capacity),
            brace_depth: 0,
        }
    }

    /// Feeds one chunk and returns every object completed by it, in order.
    ///
    /// `None` and empty chunks are no-ops.
    pub fn parse(&mut self, chunk: Option<&[u8]>) -> VecDeque<Bytes> {
        let mut parts = VecDeque::new();
        let chunk = match chunk {
            Some(chunk) if !chunk.is_empty() => chunk,
            _ => return parts,
        };

        // Start of the not-yet-copied run inside the current object.
        let mut run_start = 0;
        for (i, &byte) in chunk.iter().enumerate() {
            match byte {
                b'{' => {
                    if self.brace_depth == 0 {
                        self.accumulated.clear();
                        run_start = i;
                    }
                    self.brace_depth += 1;
                }
                b'}' if self.brace_depth > 0 => {
                    self.brace_depth -= 1;
                    if self.brace_depth == 0 {
                        self.accumulated.extend_from_slice(&chunk[run_start..=i]);
                        let part = self.accumulated.split().freeze();
                        trace!(len = part.len(), "extracted json part");
                        parts.push_back(part);
                    }
                }
                _ => {}
            }
        }

        if self.brace_depth > 0 {
            self.accumulated.extend_from_slice(&chunk[run_start..]);
        }

        parts
    }

    /// Bytes held for the object currently open, zero if none.
    pub fn buffered_len(&self) -> usize {
        self.accumulated.len()
    }

    pub fn depth(&self) -> usize {
        self.brace_depth
    }

    pub fn is_idle(&self) -> bool {
        self.brace_depth == 0
    }

    /// Drops any partially accumulated object.
    pub fn reset(&mut self) {
        self.accumulated.clear();
        self.brace_depth = 0;
    }
}
