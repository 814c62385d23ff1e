//! Streaming serialization for object graphs that contain in-flight futures
//! and async streams.
//!
//! A graph goes over the wire as one root frame in which every async source
//! is replaced by an id marker, followed by one update frame per settlement
//! or item as the sources produce. Receivers rebuild the graph with live
//! futures and streams in the marked places, so consumers await exactly what
//! the sender promised.
//!
//! ```
//! use futures::{executor::block_on, future, StreamExt};
//! use serde_json::json;
//! use trickle::{AsyncValue, ObjectSerializer};
//!
//! let root = AsyncValue::object([
//!     ("id", AsyncValue::from(7)),
//!     (
//!         "status",
//!         AsyncValue::future(future::ready(Ok(AsyncValue::from("loaded")))),
//!     ),
//! ]);
//! let frames: Vec<_> = block_on(ObjectSerializer::new(root).collect());
//! assert_eq!(frames[0].to_value(), json!({"id": 7, "status": {"$promise": 1}}));
//! assert_eq!(frames[1].to_value(), json!([1, {"$resolve": "loaded"}]));
//! ```

pub mod buffer;
pub mod frame;
pub mod receive;
pub mod reject;
pub mod send;
pub mod transport;
pub mod value;

mod registry;

pub use buffer::{BufferedChannel, FetchPolicy};
pub use frame::{Frame, UpdatePayload};
pub use receive::{
    reassemble, BoxError, LiveStream, LiveValue, PendingValue, ReassembleError, Reassembler,
};
pub use reject::{ErrorObject, Rejection};
pub use send::ObjectSerializer;
pub use value::{AsyncValue, ValueKind};
