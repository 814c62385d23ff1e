//! The input model: an owned value graph in which some leaves are still
//! being computed.

use futures::{future::BoxFuture, stream::BoxStream, FutureExt, StreamExt};
use serde_json::Value;

use crate::reject::{ErrorObject, Rejection};


/// A future carried inside a value graph.
pub type ValueFuture = BoxFuture<'static, Result<AsyncValue, Rejection>>;
/// A sequence carried inside a value graph.
pub type ValueStream = BoxStream<'static, AsyncValue>;

/// A value graph headed for serialization.
///
/// Classification is the variant itself: `Plain` subtrees are finished data
/// and pass through serialization byte-for-byte (a pre-encoded timestamp or
/// any other domain object lands here and is never recursed into);
/// `Array`/`Object` are walked recursively; `Future`/`Stream` are the
/// asynchronous leaves that become id markers on the wire.
pub enum AsyncValue {
    Plain(Value),
    Array(Vec<AsyncValue>),
    Object(Vec<(String, AsyncValue)>),
    Future(ValueFuture),
    Stream(ValueStream),
}

/// What the serializer does with a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Primitive,
    Structural,
    Future,
    Sequence,
}

impl AsyncValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Plain(_) => ValueKind::Primitive,
            Self::Array(_) | Self::Object(_) => ValueKind::Structural,
            Self::Future(_) => ValueKind::Future,
            Self::Stream(_) => ValueKind::Sequence,
        }
    }

    pub fn null() -> Self {
        Self::Plain(Value::Null)
    }

    /// A leaf that settles later. The object serializer emits a `$promise`
    /// marker for it and an update frame once it completes.
    pub fn future<F>(future: F) -> Self
    where
        F: std::future::Future<Output = Result<AsyncValue, Rejection>> + Send + 'static,
    {
        Self::Future(future.boxed())
    }

    /// A leaf that yields repeatedly. The object serializer emits an
    /// `$asyncIterator` marker and one update frame per item.
    pub fn stream<S>(stream: S) -> Self
    where
        S: futures::Stream<Item = AsyncValue> + Send + 'static,
    {
        Self::Stream(stream.boxed())
    }

    pub fn array(items: impl IntoIterator<Item = AsyncValue>) -> Self {
        Self::Array(items.into_iter().collect())
    }

    /// An insertion-ordered mapping; the order of `entries` is the order on
    /// the wire.
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, AsyncValue)>) -> Self {
        Self::Object(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        )
    }

    /// Encodes any serializable value as a finished leaf.
    pub fn from_serialize<T: serde::Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Self::Plain)
    }
}

impl std::fmt::Debug for AsyncValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain(value) => f.debug_tuple("Plain").field(value).finish(),
            Self::Array(items) => f.debug_tuple("Array").field(items).finish(),
            Self::Object(entries) => f.debug_tuple("Object").field(entries).finish(),
            Self::Future(_) => f.write_str("Future(..)"),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Value> for AsyncValue {
    #[inline]
    fn from(value: Value) -> Self {
        Self::Plain(value)
    }
}

impl From<bool> for AsyncValue {
    #[inline]
    fn from(value: bool) -> Self {
        Self::Plain(Value::from(value))
    }
}

impl From<i32> for AsyncValue {
    #[inline]
    fn from(value: i32) -> Self {
        Self::Plain(Value::from(value))
    }
}

impl From<i64> for AsyncValue {
    #[inline]
    fn from(value: i64) -> Self {
        Self::Plain(Value::from(value))
    }
}

impl From<u64> for AsyncValue {
    #[inline]
    fn from(value: u64) -> Self {
        Self::Plain(Value::from(value))
    }
}

impl From<f64> for AsyncValue {
    #[inline]
    fn from(value: f64) -> Self {
        Self::Plain(Value::from(value))
    }
}

impl From<&str> for AsyncValue {
    #[inline]
    fn from(value: &str) -> Self {
        Self::Plain(Value::from(value))
    }
}

impl From<String> for AsyncValue {
    #[inline]
    fn from(value: String) -> Self {
        Self::Plain(Value::from(value))
    }
}

impl From<Vec<AsyncValue>> for AsyncValue {
    #[inline]
    fn from(items: Vec<AsyncValue>) -> Self {
        Self::Array(items)
    }
}

impl From<ErrorObject> for AsyncValue {
    /// Errors travel as their `$error` wire shape; the receive side recovers
    /// them with [`ErrorObject::from_value`].
    #[inline]
    fn from(error: ErrorObject) -> Self {
        Self::Plain(error.to_value())
    }
}
