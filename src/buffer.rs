//! The push/pull queue both halves of the protocol are built on.

use std::{
    collections::VecDeque,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard},
    task::{Context, Poll, Waker},
};

use futures::Stream;


/// When a [`BufferedChannel`] raises its fetch signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPolicy {
    /// Signal on every pull. Eager: sources keep producing as fast as the
    /// consumer drains, at the cost of staying one item ahead.
    #[default]
    PerPull,
    /// Signal only when a pull finds the buffer empty. Lazy: nothing is
    /// fetched while the consumer still has buffered items to work through.
    OnEmpty,
}

struct Shared<T> {
    buffer: VecDeque<T>,
    waker: Option<Waker>,
    closed: bool,
    policy: Option<FetchPolicy>,
    fetch_due: bool,
}

/// An unbounded queue bridging a producer and a single consumer.
///
/// Items come out in push order. [`close`](Self::close) is idempotent, and
/// buffered items are drained before the end is reported, including items
/// pushed after the close. At most one pull may be outstanding at a time; a
/// newer pull replaces the parked waker.
#[must_use]
pub struct BufferedChannel<T> {
    shared: Arc<Mutex<Shared<T>>>,
}

impl<T> BufferedChannel<T> {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A channel that raises a fetch signal according to `policy`, consumable
    /// through [`take_fetch_signal`](Self::take_fetch_signal).
    pub fn with_policy(policy: FetchPolicy) -> Self {
        Self::build(Some(policy))
    }

    fn build(policy: Option<FetchPolicy>) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                buffer: VecDeque::new(),
                waker: None,
                closed: false,
                policy,
                fetch_due: false,
            })),
        }
    }

    /// Appends `item` and wakes the parked pull, if any.
    pub fn push(&self, item: T) {
        let waker = {
            let mut shared = self.lock();
            shared.buffer.push_back(item);
            shared.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Marks that no further items will be pushed. Idempotent.
    pub fn close(&self) {
        let waker = {
            let mut shared = self.lock();
            shared.closed = true;
            shared.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().buffer.is_empty()
    }

    /// Consumes the pending fetch signal, if the configured policy raised one
    /// since the last call.
    pub fn take_fetch_signal(&self) -> bool {
        std::mem::take(&mut self.lock().fetch_due)
    }

    /// Oldest buffered item, the end of the sequence, or parks the task.
    pub fn poll_pull(&self, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let mut shared = self.lock();
        match shared.policy {
            Some(FetchPolicy::PerPull) => shared.fetch_due = true,
            Some(FetchPolicy::OnEmpty) if shared.buffer.is_empty() && !shared.closed => {
                shared.fetch_due = true;
            }
            _ => {}
        }
        if let Some(item) = shared.buffer.pop_front() {
            return Poll::Ready(Some(item));
        }
        if shared.closed {
            return Poll::Ready(None);
        }
        shared.waker = Some(cx.waker().clone());
        Poll::Pending
    }

    /// Suspends until an item or the end of the sequence is available.
    pub async fn pull(&self) -> Option<T> {
        futures::future::poll_fn(|cx| self.poll_pull(cx)).await
    }

    fn lock(&self) -> MutexGuard<'_, Shared<T>> {
        match self.shared.lock() {
            Ok(shared) => shared,
            // a panicking producer leaves the queue structurally intact
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<T> Clone for BufferedChannel<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Default for BufferedChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for BufferedChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.lock();
        f.debug_struct("BufferedChannel")
            .field("len", &shared.buffer.len())
            .field("closed", &shared.closed)
            .finish_non_exhaustive()
    }
}

impl<T> Stream for BufferedChannel<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.poll_pull(cx)
    }
}
