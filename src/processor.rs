use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, instrument};

use crate::{Action, ChunkDecoder, DemandForwarder, JsonParserError, ParserConfig, PartDecoder};

/// Handle on the upstream chunk producer.
pub trait Subscription: Send + Sync {
    fn request(&self, n: u64);
    fn cancel(&self);
}

/// Downstream consumer of decoded records.
pub trait Subscriber<T>: Send + Sync {
    fn on_next(&self, item: T);
    fn on_error(&self, error: JsonParserError);
    fn on_complete(&self);
}

enum Emission<T> {
    Next(T),
    Error(JsonParserError),
    Complete,
}

struct State<D: PartDecoder> {
    decoder: ChunkDecoder<D>,
    forwarder: DemandForwarder<D::Output>,
    upstream: Option<Arc<dyn Subscription>>,
    // demand seen before the upstream subscribed
    deferred: u64,
    // signals waiting for the thread that is currently emitting
    outbox: VecDeque<Emission<D::Output>>,
    emitting: bool,
    done: bool,
}

/// Push/pull processor between a chunk publisher and a record subscriber.
///
/// Upstream-facing entry points are [`on_subscribe`](Self::on_subscribe),
/// [`on_next`](Self::on_next), [`on_error`](Self::on_error) and
/// [`on_complete`](Self::on_complete); downstream-facing ones are
/// [`request`](Self::request) and [`cancel`](Self::cancel). They may be
/// called from different threads.
///
/// All state sits behind one mutex that is never held while calling out.
/// Subscriber signals are serialized: whichever thread finds no emission in
/// progress delivers queued signals in order until none are left, and calls
/// made from inside a callback only enqueue.
pub struct StreamingProcessor<D: PartDecoder, S> {
    state: Mutex<State<D>>,
    downstream: S,
}

impl<D, S> StreamingProcessor<D, S>
where
    D: PartDecoder,
    S: Subscriber<D::Output>,
{
    pub fn new(decoder: D, downstream: S) -> Self {
        Self::with_config(decoder, downstream, &ParserConfig::default())
    }

    pub fn with_config(decoder: D, downstream: S, config: &ParserConfig) -> Self {
        Self {
            state: Mutex::new(State {
                decoder: ChunkDecoder::new(decoder, config),
                forwarder: DemandForwarder::new(),
                upstream: None,
                deferred: 0,
                outbox: VecDeque::new(),
                emitting: false,
                done: false,
            }),
            downstream,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<D>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn on_subscribe(&self, upstream: Arc<dyn Subscription>) {
        let mut state = self.lock();
        if state.done {
            drop(state);
            upstream.cancel();
            return;
        }
        state.upstream = Some(upstream.clone());
        let deferred = std::mem::take(&mut state.deferred);
        drop(state);
        if deferred > 0 {
            upstream.request(deferred);
        }
    }

    /// One chunk from the upstream. `None` and empty chunks are accepted.
    #[instrument(skip_all)]
    pub fn on_next(&self, chunk: Option<&[u8]>) {
        let mut state = self.lock();
        if state.done {
            return;
        }

        let decoded = state.decoder.decode_chunk(chunk);
        match decoded {
            Ok(results) => {
                let action = state.forwarder.on_results(results);
                self.dispatch(state, action);
            }
            Err(e) => self.fail(state, e),
        }
    }

    pub fn on_error(&self, error: JsonParserError) {
        self.terminate_with(Emission::Error(error));
    }

    pub fn on_complete(&self) {
        self.terminate_with(Emission::Complete);
    }

    /// Downstream demand. Served from the buffer when possible, otherwise
    /// forwarded upstream as is.
    pub fn request(&self, n: u64) {
        let mut state = self.lock();
        if state.done {
            return;
        }
        let action = state.forwarder.on_pull(n);
        if let Action::Request(n) = action {
            if let Some(error) = state.decoder.take_overflow() {
                self.fail(state, error);
                return;
            }
            if state.upstream.is_none() {
                state.deferred = state.deferred.saturating_add(n);
                return;
            }
        }
        self.dispatch(state, action);
    }

    /// Drops buffered records and cancels the upstream. No further signals
    /// reach the subscriber.
    pub fn cancel(&self) {
        let mut state = self.lock();
        if state.done {
            return;
        }
        let upstream = Self::shut_down(&mut state);
        state.outbox.clear();
        drop(state);
        if let Some(upstream) = upstream {
            upstream.cancel();
        }
    }

    pub fn pending(&self) -> usize {
        self.lock().forwarder.pending_len()
    }

    pub fn is_done(&self) -> bool {
        self.lock().done
    }

    fn terminate_with(&self, emission: Emission<D::Output>) {
        let mut state = self.lock();
        if state.done {
            return;
        }
        Self::shut_down(&mut state);
        let emission = match (emission, state.decoder.take_overflow()) {
            (Emission::Complete, Some(error)) => Emission::Error(error),
            (emission, _) => emission,
        };
        state.outbox.push_back(emission);
        self.drain(state);
    }

    // Terminal failure detected here rather than signalled by the upstream.
    fn fail<'a>(&'a self, mut state: MutexGuard<'a, State<D>>, error: JsonParserError) {
        let upstream = Self::shut_down(&mut state);
        state.outbox.push_back(Emission::Error(error));
        self.drain(state);
        if let Some(upstream) = upstream {
            upstream.cancel();
        }
    }

    fn shut_down(state: &mut State<D>) -> Option<Arc<dyn Subscription>> {
        state.done = true;
        let dropped = state.forwarder.terminate();
        if dropped > 0 {
            debug!(dropped, "discarding buffered records");
        }
        state.upstream.take()
    }

    fn dispatch<'a>(&'a self, mut state: MutexGuard<'a, State<D>>, action: Action<D::Output>) {
        match action {
            Action::Deliver(item) => {
                state.outbox.push_back(Emission::Next(item));
                self.drain(state);
            }
            Action::Request(n) => {
                let upstream = state.upstream.clone();
                drop(state);
                match upstream {
                    Some(upstream) => upstream.request(n),
                    None => debug!(n, "no upstream subscribed, dropping request"),
                }
            }
            Action::Idle => {}
        }
    }

    fn drain<'a>(&'a self, mut state: MutexGuard<'a, State<D>>) {
        if state.emitting {
            return;
        }
        state.emitting = true;
        loop {
            let Some(emission) = state.outbox.pop_front() else {
                break;
            };
            drop(state);
            match emission {
                Emission::Next(item) => self.downstream.on_next(item),
                Emission::Error(error) => self.downstream.on_error(error),
                Emission::Complete => self.downstream.on_complete(),
            }
            state = self.lock();
        }
        state.emitting = false;
    }
}
