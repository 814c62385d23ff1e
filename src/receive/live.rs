use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use futures::channel::oneshot;
use serde_json::Value;

use crate::{buffer::BufferedChannel, reject::Rejection};

/// What a live future eventually produces.
pub(crate) type Settled = Result<LiveValue, Rejection>;

/// A reconstructed value graph in which markers have become live futures and
/// streams again.
///
/// Shape and key order mirror the root frame exactly; only marker leaves
/// differ, replaced by [`PendingValue`]s and [`LiveStream`]s that settle as
/// update frames arrive.
#[derive(Debug)]
pub enum LiveValue {
    Plain(Value),
    Array(Vec<LiveValue>),
    Object(Vec<(String, LiveValue)>),
    Future(PendingValue),
    Stream(LiveStream),
}

impl LiveValue {
    pub fn as_plain(&self) -> Option<&Value> {
        match self {
            Self::Plain(value) => Some(value),
            _ => None,
        }
    }

    /// Removes `key` from an object node.
    pub fn take(&mut self, key: &str) -> Option<LiveValue> {
        let Self::Object(entries) = self else {
            return None;
        };
        let at = entries.iter().position(|(name, _)| name == key)?;
        Some(entries.remove(at).1)
    }

    /// Removes the element at `index` from an array node, shifting the rest.
    pub fn take_at(&mut self, index: usize) -> Option<LiveValue> {
        let Self::Array(items) = self else {
            return None;
        };
        if index < items.len() {
            Some(items.remove(index))
        } else {
            None
        }
    }

    pub fn into_pending(self) -> Option<PendingValue> {
        match self {
            Self::Future(pending) => Some(pending),
            _ => None,
        }
    }

    pub fn into_stream(self) -> Option<LiveStream> {
        match self {
            Self::Stream(stream) => Some(stream),
            _ => None,
        }
    }

    /// The fully-plain image of this tree, if nothing in it is still live.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Plain(value) => Some(value),
            Self::Array(items) => items
                .into_iter()
                .map(Self::into_value)
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            Self::Object(entries) => {
                let mut map = serde_json::Map::with_capacity(entries.len());
                for (key, value) in entries {
                    map.insert(key, value.into_value()?);
                }
                Some(Value::Object(map))
            }
            Self::Future(_) | Self::Stream(_) => None,
        }
    }
}

/// The receive-side image of a future: settles when its update frame
/// arrives.
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct PendingValue {
    settled: oneshot::Receiver<Settled>,
}

impl PendingValue {
    pub(crate) fn new() -> (oneshot::Sender<Settled>, Self) {
        let (tx, settled) = oneshot::channel();
        (tx, Self { settled })
    }
}

impl Future for PendingValue {
    type Output = Settled;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.settled).poll(cx) {
            Poll::Ready(Ok(settled)) => Poll::Ready(settled),
            // the reassembler dropped without settling us
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(Rejection::disconnected(
                "reassembler dropped before settlement",
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// The receive-side image of a sequence: yields as item frames arrive.
#[derive(Debug)]
#[must_use = "streams do nothing unless polled"]
pub struct LiveStream {
    items: BufferedChannel<Settled>,
}

impl LiveStream {
    pub(crate) fn new() -> (BufferedChannel<Settled>, Self) {
        let items = BufferedChannel::new();
        (items.clone(), Self { items })
    }
}

impl futures::Stream for LiveStream {
    type Item = Settled;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.items.poll_pull(cx)
    }
}
