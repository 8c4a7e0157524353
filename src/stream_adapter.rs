use async_stream::try_stream;
use bytes::{Bytes, BytesMut};
use futures::Stream;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;
use tracing::debug;

use crate::{JsonParserError, ParserConfig};

/// Reads `reader` to the end as a stream of chunks of at most
/// `config.buffer_size` bytes.
///
/// Each read is bounded by `config.timeout` when set; an expired read ends the
/// stream with [`JsonParserError::Timeout`].
pub fn reader_chunks<R>(
    mut reader: R,
    config: &ParserConfig,
) -> impl Stream<Item = Result<Bytes, JsonParserError>>
where
    R: AsyncRead + Unpin,
{
    let buffer_size = config.buffer_size.max(1);
    let read_timeout = config.timeout;

    try_stream! {
        let mut buffer = BytesMut::with_capacity(buffer_size);
        loop {
            buffer.reserve(buffer_size);
            let mut limited = (&mut reader).take(buffer_size as u64);
            let read = limited.read_buf(&mut buffer);
            let bytes_read = match read_timeout {
                Some(t) => timeout(t, read)
                    .await
                    .map_err(|_| JsonParserError::Timeout)??,
                None => read.await?,
            };
            if bytes_read == 0 {
                debug!("reader reached end of stream");
                break;
            }
            yield buffer.split().freeze();
        }
    }
}
