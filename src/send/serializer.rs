use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::{Future, Stream};
use serde_json::{Map, Value};

use crate::{
    buffer::{BufferedChannel, FetchPolicy},
    frame::{self, Frame, MarkerKind, UpdatePayload},
    registry::IdMap,
    reject::Rejection,
    value::{AsyncValue, ValueFuture, ValueStream},
};

enum Source {
    Future(ValueFuture),
    Sequence { stream: ValueStream, fetching: bool },
}

/// Streams a value graph as a root frame followed by update frames.
///
/// The root frame is available on the first pull; every future and stream in
/// the graph is replaced by an id marker and produces update frames as it
/// settles or yields. Sources make progress only while the serializer is
/// polled; nothing is spawned.
///
/// Sequences are fetched under the channel's [`FetchPolicy`]: each pull
/// trigger grants at most one fetch per open sequence, and a fetch for the
/// next item never starts before the previous item's frame has been pushed.
#[must_use = "streams do nothing unless polled"]
pub struct ObjectSerializer {
    queue: BufferedChannel<Frame>,
    sources: IdMap<Source>,
}

impl ObjectSerializer {
    /// Serializes `root` under [`FetchPolicy::PerPull`].
    pub fn new(root: AsyncValue) -> Self {
        Self::with_policy(root, FetchPolicy::default())
    }

    pub fn with_policy(root: AsyncValue, policy: FetchPolicy) -> Self {
        let mut serializer = Self {
            queue: BufferedChannel::with_policy(policy),
            sources: IdMap::new(),
        };
        let skeleton = serializer.walk(root);
        tracing::debug!(sources = serializer.sources.len(), "root frame ready");
        serializer.queue.push(Frame::Root(skeleton));
        if serializer.sources.is_empty() {
            serializer.queue.close();
        }
        serializer
    }

    /// Live sources still owed a terminal update.
    pub fn outstanding(&self) -> usize {
        self.sources.len()
    }

    /// Replaces async sources with markers, moving them into the id table in
    /// depth-first encounter order. Plain subtrees pass through untouched.
    fn walk(&mut self, value: AsyncValue) -> Value {
        match value {
            AsyncValue::Plain(value) => value,
            AsyncValue::Array(items) => {
                Value::Array(items.into_iter().map(|item| self.walk(item)).collect())
            }
            AsyncValue::Object(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (key, value) in entries {
                    map.insert(key, self.walk(value));
                }
                Value::Object(map)
            }
            AsyncValue::Future(future) => {
                let id = self.sources.allocate(Source::Future(future));
                tracing::trace!(id, "registered future");
                frame::marker(MarkerKind::Promise, id)
            }
            AsyncValue::Stream(stream) => {
                let id = self.sources.allocate(Source::Sequence {
                    stream,
                    fetching: false,
                });
                tracing::trace!(id, "registered sequence");
                frame::marker(MarkerKind::Sequence, id)
            }
        }
    }

    /// One pull trigger: every open sequence may fetch one more item.
    fn grant_fetches(&mut self) {
        for source in self.sources.values_mut() {
            if let Source::Sequence { fetching, .. } = source {
                *fetching = true;
            }
        }
    }

    /// Polls every future and every granted sequence in id order, pushing a
    /// frame per completion. Completions can register new sources, so passes
    /// repeat until nothing moves. Returns whether any frame was pushed.
    fn drive(&mut self, cx: &mut Context<'_>) -> bool {
        let mut pushed = false;
        loop {
            let mut progress = false;
            for id in self.sources.ids() {
                if let Some(payload) = self.advance(id, cx) {
                    self.queue.push(Frame::Update(id, payload));
                    if self.sources.is_empty() {
                        self.queue.close();
                    }
                    progress = true;
                    pushed = true;
                }
            }
            if !progress {
                return pushed;
            }
        }
    }

    /// Polls one source, returning the update payload to emit on completion.
    fn advance(&mut self, id: u64, cx: &mut Context<'_>) -> Option<UpdatePayload> {
        enum Step {
            Settled(Result<AsyncValue, Rejection>),
            Item(AsyncValue),
            Exhausted,
        }

        let step = match self.sources.get_mut(id)? {
            Source::Future(future) => match future.as_mut().poll(cx) {
                Poll::Ready(settled) => Step::Settled(settled),
                Poll::Pending => return None,
            },
            Source::Sequence { stream, fetching } => {
                if !*fetching {
                    return None;
                }
                match stream.as_mut().poll_next(cx) {
                    Poll::Ready(Some(item)) => {
                        // the next fetch waits for the next trigger
                        *fetching = false;
                        Step::Item(item)
                    }
                    Poll::Ready(None) => Step::Exhausted,
                    Poll::Pending => return None,
                }
            }
        };

        match step {
            Step::Settled(Ok(value)) => {
                self.sources.remove(id);
                // resolved values re-enter the walk: they may carry new
                // futures and sequences of their own
                let skeleton = self.walk(value);
                tracing::trace!(id, "future resolved");
                Some(UpdatePayload::Resolve(skeleton))
            }
            Step::Settled(Err(rejection)) => {
                self.sources.remove(id);
                tracing::trace!(id, "future rejected");
                Some(UpdatePayload::Reject(rejection.to_value()))
            }
            Step::Item(item) => {
                let skeleton = self.walk(item);
                tracing::trace!(id, "sequence yielded");
                Some(UpdatePayload::Item {
                    done: false,
                    value: Some(skeleton),
                })
            }
            Step::Exhausted => {
                self.sources.remove(id);
                tracing::trace!(id, "sequence finished");
                Some(UpdatePayload::Item {
                    done: true,
                    value: None,
                })
            }
        }
    }
}

impl std::fmt::Debug for ObjectSerializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectSerializer")
            .field("queue", &self.queue)
            .field("outstanding", &self.sources.len())
            .finish()
    }
}

impl Stream for ObjectSerializer {
    type Item = Frame;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            let next = this.queue.poll_pull(cx);
            if this.queue.take_fetch_signal() {
                this.grant_fetches();
            }
            match next {
                Poll::Ready(Some(frame)) => {
                    this.drive(cx);
                    return Poll::Ready(Some(frame));
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => {
                    if !this.drive(cx) {
                        return Poll::Pending;
                    }
                }
            }
        }
    }
}
