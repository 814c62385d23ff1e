use futures::{channel::oneshot, Stream, StreamExt};
use serde_json::Value;

use super::live::{LiveStream, LiveValue, PendingValue, Settled};
use crate::{
    buffer::BufferedChannel,
    frame::{self, FrameError, MarkerKind, Settlement},
    registry::IdMap,
    reject::{ErrorObject, Rejection},
};

/// Boxed error for transports feeding a [`Reassembler`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum ReassembleError {
    /// The frame source ended before a root frame arrived.
    #[error("frame source ended before the root frame")]
    MissingRoot,
    /// The frame source itself failed.
    #[error("frame transport failed")]
    Transport(#[source] BoxError),
    /// A frame that is neither a valid root nor a valid update.
    #[error(transparent)]
    Frame(#[from] FrameError),
    /// An update named an id this session never registered.
    #[error("update for unregistered id {0}")]
    UnknownId(u64),
    /// The peer handed out the same id twice.
    #[error("id {0} registered twice")]
    DuplicateId(u64),
    /// The frame source ended while sources were still unsettled.
    #[error("frame source ended with {outstanding} sources unsettled")]
    PrematureEnd { outstanding: usize },
}

/// Applies update frames to the graph decoded from the root frame.
///
/// [`reassemble`] hands the root back immediately; the driver must then be
/// [`run`](Self::run) (usually spawned) for pending futures and streams to
/// settle.
#[must_use = "the reassembler must be run for live values to settle"]
#[derive(Debug)]
pub struct Reassembler<S> {
    frames: S,
    futures: IdMap<oneshot::Sender<Settled>>,
    sequences: IdMap<BufferedChannel<Settled>>,
}

/// Decodes the first frame of `frames` into a live value graph.
///
/// Returns the root together with the driver that applies every following
/// update frame.
pub async fn reassemble<S, E>(mut frames: S) -> Result<(LiveValue, Reassembler<S>), ReassembleError>
where
    S: Stream<Item = Result<Value, E>> + Unpin,
    E: Into<BoxError>,
{
    let root_frame = match frames.next().await {
        Some(Ok(value)) => value,
        Some(Err(error)) => return Err(ReassembleError::Transport(error.into())),
        None => return Err(ReassembleError::MissingRoot),
    };
    let mut reassembler = Reassembler {
        frames,
        futures: IdMap::new(),
        sequences: IdMap::new(),
    };
    let root = reassembler.decode(root_frame)?;
    tracing::debug!(sources = reassembler.outstanding(), "root frame decoded");
    Ok((root, reassembler))
}

impl<S, E> Reassembler<S>
where
    S: Stream<Item = Result<Value, E>> + Unpin,
    E: Into<BoxError>,
{
    /// Consumes the rest of the frame stream, settling sources as their
    /// updates arrive.
    ///
    /// On a fatal error, and when the stream ends while sources are still
    /// unsettled, every outstanding future is rejected and every open stream
    /// failed before the error is returned; consumers are never left
    /// hanging.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn run(mut self) -> Result<(), ReassembleError> {
        while let Some(next) = self.frames.next().await {
            let update = match next {
                Ok(value) => value,
                Err(error) => {
                    let error = ReassembleError::Transport(error.into());
                    self.abort(&error);
                    return Err(error);
                }
            };
            if let Err(fatal) = self.apply(update) {
                self.abort(&fatal);
                return Err(fatal);
            }
        }
        if self.outstanding() == 0 {
            Ok(())
        } else {
            let error = ReassembleError::PrematureEnd {
                outstanding: self.outstanding(),
            };
            self.abort(&error);
            Err(error)
        }
    }

    /// Sources still waiting on a terminal update.
    pub fn outstanding(&self) -> usize {
        self.futures.len() + self.sequences.len()
    }

    fn apply(&mut self, update: Value) -> Result<(), ReassembleError> {
        let (id, payload) = frame::decode_update(update)?;
        if let Some(tx) = self.futures.remove(id) {
            return self.settle_future(id, tx, payload);
        }
        if let Some(channel) = self.sequences.get(id).cloned() {
            return self.advance_sequence(id, &channel, payload);
        }
        Err(ReassembleError::UnknownId(id))
    }

    fn settle_future(
        &mut self,
        id: u64,
        tx: oneshot::Sender<Settled>,
        payload: Value,
    ) -> Result<(), ReassembleError> {
        let settled = match frame::decode_settlement(payload) {
            // on a decode failure `tx` drops here, cancelling the consumer
            Settlement::Resolve(value) => Ok(self.decode(value)?),
            Settlement::Reject(value) => Err(Rejection::from_value(value)),
        };
        tracing::trace!(id, ok = settled.is_ok(), "future settled");
        // the consumer may have dropped its half already
        tx.send(settled).ok();
        Ok(())
    }

    fn advance_sequence(
        &mut self,
        id: u64,
        channel: &BufferedChannel<Settled>,
        payload: Value,
    ) -> Result<(), ReassembleError> {
        match frame::decode_item(payload) {
            Ok((false, value)) => {
                let item = self.decode(value.unwrap_or(Value::Null))?;
                tracing::trace!(id, "sequence item");
                channel.push(Ok(item));
            }
            Ok((true, _)) => {
                tracing::trace!(id, "sequence finished");
                self.sequences.remove(id);
                channel.close();
            }
            Err(error) => {
                // malformed item payloads poison only this sequence
                tracing::warn!(id, %error, "failing sequence on malformed payload");
                self.sequences.remove(id);
                channel.push(Err(Rejection::Error(ErrorObject::new(
                    "ProtocolError",
                    error.to_string(),
                ))));
                channel.close();
            }
        }
        Ok(())
    }

    /// Rebuilds a wire value, turning markers into live placeholders.
    fn decode(&mut self, value: Value) -> Result<LiveValue, ReassembleError> {
        if let Some((kind, id)) = frame::as_marker(&value) {
            return match kind {
                MarkerKind::Promise => {
                    let (tx, pending) = PendingValue::new();
                    self.register_future(id, tx)?;
                    Ok(LiveValue::Future(pending))
                }
                MarkerKind::Sequence => {
                    let (channel, stream) = LiveStream::new();
                    self.register_sequence(id, channel)?;
                    Ok(LiveValue::Stream(stream))
                }
            };
        }
        match value {
            Value::Array(items) => items
                .into_iter()
                .map(|item| self.decode(item))
                .collect::<Result<Vec<_>, _>>()
                .map(LiveValue::Array),
            Value::Object(map) => {
                let mut entries = Vec::with_capacity(map.len());
                for (key, value) in map {
                    entries.push((key, self.decode(value)?));
                }
                Ok(LiveValue::Object(entries))
            }
            plain => Ok(LiveValue::Plain(plain)),
        }
    }

    fn register_future(
        &mut self,
        id: u64,
        tx: oneshot::Sender<Settled>,
    ) -> Result<(), ReassembleError> {
        if self.sequences.contains(id) || self.futures.register(id, tx).is_err() {
            return Err(ReassembleError::DuplicateId(id));
        }
        tracing::trace!(id, "registered future");
        Ok(())
    }

    fn register_sequence(
        &mut self,
        id: u64,
        channel: BufferedChannel<Settled>,
    ) -> Result<(), ReassembleError> {
        if self.futures.contains(id) || self.sequences.register(id, channel).is_err() {
            return Err(ReassembleError::DuplicateId(id));
        }
        tracing::trace!(id, "registered sequence");
        Ok(())
    }

    /// Fails every outstanding source so no consumer is left hanging.
    fn abort(&mut self, cause: &ReassembleError) {
        if self.outstanding() == 0 {
            return;
        }
        tracing::warn!(%cause, outstanding = self.outstanding(), "aborting outstanding sources");
        let rejection = Rejection::disconnected(&cause.to_string());
        for (_, tx) in self.futures.drain() {
            tx.send(Err(rejection.clone())).ok();
        }
        for (_, channel) in self.sequences.drain() {
            channel.push(Err(rejection.clone()));
            channel.close();
        }
    }
}
