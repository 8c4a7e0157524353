use std::collections::VecDeque;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::{metrics, JsonParserError, JsonPartsExtractor, ParserConfig};

/// Turns the bytes of one extracted object into a record.
///
/// `Ok(None)` means the object was well formed but carries nothing worth
/// delivering. Any error is terminal for the stream it came from.
pub trait PartDecoder {
    type Output;

    fn decode(&self, part: &[u8]) -> Result<Option<Self::Output>, JsonParserError>;
}

/// Deserializes each object into `T` with simd-json.
pub struct SerdeDecoder<T> {
    _phantom: PhantomData<fn() -> T>,
}

impl<T> SerdeDecoder<T> {
    pub fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T> Default for SerdeDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> PartDecoder for SerdeDecoder<T> {
    type Output = T;

    fn decode(&self, part: &[u8]) -> Result<Option<T>, JsonParserError> {
        // simd-json parses in place
        let mut buffer = part.to_vec();
        Ok(Some(simd_json::from_slice(&mut buffer)?))
    }
}

/// Decoder backed by a closure.
pub struct FnDecoder<F, T> {
    f: F,
    _phantom: PhantomData<fn() -> T>,
}

pub fn decoder_fn<T, F>(f: F) -> FnDecoder<F, T>
where
    F: Fn(&[u8]) -> Result<Option<T>, JsonParserError>,
{
    FnDecoder {
        f,
        _phantom: PhantomData,
    }
}

impl<T, F> PartDecoder for FnDecoder<F, T>
where
    F: Fn(&[u8]) -> Result<Option<T>, JsonParserError>,
{
    type Output = T;

    fn decode(&self, part: &[u8]) -> Result<Option<T>, JsonParserError> {
        (self.f)(part)
    }
}

/// Extractor and decoder for one stream: chunk in, ordered records out.
pub struct ChunkDecoder<D> {
    extractor: JsonPartsExtractor,
    decoder: D,
    max_buffer_size: Option<usize>,
    // limit that tripped after records of the same chunk were decoded
    overflow: Option<usize>,
}

impl<D: PartDecoder> ChunkDecoder<D> {
    pub fn new(decoder: D, config: &ParserConfig) -> Self {
        Self {
            extractor: JsonPartsExtractor::with_capacity(config.buffer_size),
            decoder,
            max_buffer_size: config.max_buffer_size,
            overflow: None,
        }
    }

    /// Records completed in `chunk`, in stream order.
    ///
    /// When the unterminated tail outgrows `max_buffer_size`, records that
    /// completed earlier in the same chunk are still returned and the
    /// [`JsonParserError::BufferLimitExceeded`] is held back until the next
    /// call or [`take_overflow`](Self::take_overflow).
    #[instrument(skip_all, fields(chunk_len = chunk.map_or(0, <[u8]>::len)))]
    pub fn decode_chunk(
        &mut self,
        chunk: Option<&[u8]>,
    ) -> Result<VecDeque<D::Output>, JsonParserError> {
        if let Some(error) = self.take_overflow() {
            return Err(error);
        }

        let parts = self.extractor.parse(chunk);
        metrics::record_parts_extracted(parts.len());

        let mut results = VecDeque::with_capacity(parts.len());
        for part in parts {
            match self.decoder.decode(&part) {
                Ok(Some(record)) => results.push_back(record),
                Ok(None) => debug!(len = part.len(), "JSON part decoded to no record"),
                Err(e) => {
                    metrics::record_decode_failure();
                    warn!(
                        "failed to decode JSON part: {}. Input: {}...",
                        e,
                        String::from_utf8_lossy(&part[..part.len().min(100)])
                    );
                    return Err(e);
                }
            }
        }

        if let Some(limit) = self.max_buffer_size {
            if self.extractor.buffered_len() > limit {
                warn!(
                    buffered = self.extractor.buffered_len(),
                    limit, "unterminated JSON object exceeds buffer limit"
                );
                self.extractor.reset();
                if results.is_empty() {
                    return Err(JsonParserError::BufferLimitExceeded { limit });
                }
                self.overflow = Some(limit);
            }
        }
        Ok(results)
    }

    /// Buffer-limit failure held back by the last [`decode_chunk`](Self::decode_chunk).
    pub fn take_overflow(&mut self) -> Option<JsonParserError> {
        self.overflow
            .take()
            .map(|limit| JsonParserError::BufferLimitExceeded { limit })
    }
}
