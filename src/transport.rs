//! Byte-level carriers for the frame protocol.
//!
//! Transports stay thin: the send half is already a [`Stream`] of frames and
//! [`reassemble`] accepts any stream of decoded values, so a carrier only has
//! to move one JSON value per frame in each direction.
//!
//! [`Stream`]: futures::Stream
//! [`reassemble`]: crate::receive::reassemble

#[cfg(feature = "ndjson")]
pub mod ndjson;
