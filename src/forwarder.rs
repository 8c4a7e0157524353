use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::metrics;

/// What the owner of a [`DemandForwarder`] must do next.
#[derive(Debug, PartialEq, Eq)]
pub enum Action<T> {
    /// Hand this record to the downstream consumer.
    Deliver(T),
    /// Ask the upstream for this many more chunks.
    Request(u64),
    /// Nothing to do.
    Idle,
}

/// Reconciles chunk-granular upstream pushes with one-record-per-pull demand.
///
/// A chunk may decode into any number of records. The first is delivered
/// right away and the rest wait in a FIFO queue, served one per downstream
/// pull. The upstream is only asked for more once that queue is empty.
#[derive(Debug)]
pub struct DemandForwarder<T> {
    pending: VecDeque<T>,
    terminated: bool,
}

impl<T> Default for DemandForwarder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DemandForwarder<T> {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            terminated: false,
        }
    }

    /// Handles the records decoded from one upstream chunk.
    ///
    /// Answers exactly one unit of demand: delivers the oldest record, or
    /// requests one more chunk if there is nothing to deliver.
    pub fn on_results<I>(&mut self, results: I) -> Action<T>
    where
        I: IntoIterator<Item = T>,
    {
        if self.terminated {
            return Action::Idle;
        }

        let before = self.pending.len();
        self.pending.extend(results);
        let produced = self.pending.len() - before;
        if before > 0 && produced > 0 {
            debug!(before, produced, "records arrived while others were still pending");
        }

        match self.pending.pop_front() {
            Some(first) => {
                if !self.pending.is_empty() {
                    warn!(
                        "Received multiple records ({}) from a single chunk, buffering.",
                        self.pending.len() + 1
                    );
                }
                metrics::pending_changed(self.pending.len() as i64 - before as i64);
                metrics::record_delivered();
                Action::Deliver(first)
            }
            None => Action::Request(1),
        }
    }

    /// Handles a downstream request for `n` more records.
    ///
    /// At most one buffered record is served per pull, whatever `n` is. With
    /// an empty buffer the request is passed upstream unchanged.
    pub fn on_pull(&mut self, n: u64) -> Action<T> {
        if self.terminated || n == 0 {
            return Action::Idle;
        }
        match self.pending.pop_front() {
            Some(item) => {
                metrics::pending_changed(-1);
                metrics::record_delivered();
                Action::Deliver(item)
            }
            None => Action::Request(n),
        }
    }

    /// Stops forwarding and drops everything still buffered. Returns the
    /// number of records discarded.
    pub fn terminate(&mut self) -> usize {
        self.terminated = true;
        let dropped = self.pending.len();
        self.pending.clear();
        metrics::pending_changed(-(dropped as i64));
        dropped
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}
