//! The receive half: rebuilding a live value graph from frames.

mod live;
mod reassembler;

pub use live::{LiveStream, LiveValue, PendingValue};
pub use reassembler::{reassemble, BoxError, ReassembleError, Reassembler};
