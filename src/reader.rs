use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

use crate::JsonParserError;

/// Chunk source fed through a tokio channel.
///
/// A `None` message is the transport's explicit "no data" signal and is
/// passed through as such. The stream ends once every sender is dropped.
pub struct ChannelSource {
    rx: mpsc::Receiver<Option<Vec<u8>>>,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<Option<Vec<u8>>>) -> Self {
        Self { rx }
    }

    pub fn channel(capacity: usize) -> (mpsc::Sender<Option<Vec<u8>>>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }
}

impl Stream for ChannelSource {
    type Item = Result<Option<Vec<u8>>, JsonParserError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(chunk)) => Poll::Ready(Some(Ok(chunk))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}
