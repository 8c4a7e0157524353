use bytes::Bytes;
use futures::Stream;
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tracing::debug;

use crate::{Action, ChunkDecoder, DemandForwarder, PartDecoder, SerdeDecoder};

#[derive(Debug, thiserror::Error)]
pub enum JsonParserError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] simd_json::Error),
    #[error("Timeout while waiting for data")]
    Timeout,
    #[error("Error from upstream provider: [{code}] {message}")]
    Upstream {
        code: u16,
        message: String,
        status: Option<String>,
    },
    #[error("Partial JSON object exceeds buffer limit of {limit} bytes")]
    BufferLimitExceeded { limit: usize },
    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<Infallible> for JsonParserError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Initial capacity of the object buffer, and read size for
    /// [`reader_chunks`](crate::reader_chunks).
    pub buffer_size: usize,
    pub timeout: Option<Duration>,
    /// Upper bound for a single unterminated object. `None` leaves the
    /// extractor unbounded, in which case the caller must bound the input.
    pub max_buffer_size: Option<usize>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1024,
            timeout: None,
            max_buffer_size: None,
        }
    }
}

/// A chunk as delivered by the transport. `None` and empty chunks carry no data.
pub trait Chunk {
    fn as_chunk(&self) -> Option<&[u8]>;
}

impl Chunk for Bytes {
    fn as_chunk(&self) -> Option<&[u8]> {
        Some(self)
    }
}

impl Chunk for Vec<u8> {
    fn as_chunk(&self) -> Option<&[u8]> {
        Some(self)
    }
}

impl Chunk for &[u8] {
    fn as_chunk(&self) -> Option<&[u8]> {
        Some(self)
    }
}

impl Chunk for &str {
    fn as_chunk(&self) -> Option<&[u8]> {
        Some(self.as_bytes())
    }
}

impl<C: Chunk> Chunk for Option<C> {
    fn as_chunk(&self) -> Option<&[u8]> {
        self.as_ref().and_then(Chunk::as_chunk)
    }
}

/// Pull-based adapter from a stream of byte chunks to a stream of decoded
/// records.
///
/// Each poll is one unit of demand. Buffered records are served first; the
/// upstream is polled only once the buffer is empty, and polled again for
/// every chunk that decodes to nothing. The first error, from the upstream
/// or from decoding, is yielded once and ends the stream.
pub struct PartsStream<S, D: PartDecoder> {
    upstream: S,
    decoder: ChunkDecoder<D>,
    forwarder: DemandForwarder<D::Output>,
    done: bool,
}

impl<S, D: PartDecoder> PartsStream<S, D> {
    pub fn new(upstream: S, decoder: D) -> Self {
        Self::with_config(upstream, decoder, &ParserConfig::default())
    }

    pub fn with_config(upstream: S, decoder: D, config: &ParserConfig) -> Self {
        Self {
            upstream,
            decoder: ChunkDecoder::new(decoder, config),
            forwarder: DemandForwarder::new(),
            done: false,
        }
    }

    /// Records decoded but not yet yielded.
    pub fn pending(&self) -> usize {
        self.forwarder.pending_len()
    }

    fn finish(&mut self) {
        self.done = true;
        let dropped = self.forwarder.terminate();
        if dropped > 0 {
            debug!(dropped, "discarding buffered records on termination");
        }
    }
}

impl<S, T: DeserializeOwned> PartsStream<S, SerdeDecoder<T>> {
    /// Deserializes every extracted object into `T`.
    pub fn deserialize(upstream: S, config: &ParserConfig) -> Self {
        Self::with_config(upstream, SerdeDecoder::new(), config)
    }
}

impl<S, C, E, D> Stream for PartsStream<S, D>
where
    S: Stream<Item = Result<C, E>> + Unpin,
    C: Chunk,
    E: Into<JsonParserError>,
    D: PartDecoder + Unpin,
    D::Output: Unpin,
{
    type Item = Result<D::Output, JsonParserError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        match this.forwarder.on_pull(1) {
            Action::Deliver(item) => return Poll::Ready(Some(Ok(item))),
            Action::Idle => return Poll::Ready(None),
            Action::Request(_) => {}
        }

        if let Some(e) = this.decoder.take_overflow() {
            this.finish();
            return Poll::Ready(Some(Err(e)));
        }

        loop {
            let chunk = match Pin::new(&mut this.upstream).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => chunk,
                Poll::Ready(Some(Err(e))) => {
                    this.finish();
                    return Poll::Ready(Some(Err(e.into())));
                }
                Poll::Ready(None) => {
                    this.finish();
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            };

            let results = match this.decoder.decode_chunk(chunk.as_chunk()) {
                Ok(results) => results,
                Err(e) => {
                    this.finish();
                    return Poll::Ready(Some(Err(e)));
                }
            };

            match this.forwarder.on_results(results) {
                Action::Deliver(item) => return Poll::Ready(Some(Ok(item))),
                Action::Request(_) => continue,
                Action::Idle => return Poll::Ready(None),
            }
        }
    }
}
