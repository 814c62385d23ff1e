//! Wire shapes: the root skeleton, update frames, and the markers that stand
//! in for async sources.

use serde::ser::{SerializeMap, SerializeTuple};
use serde_json::{Map, Value};

#[cfg(test)]
mod test;

/// Key marking a registered future.
pub const PROMISE_KEY: &str = "$promise";
/// Key marking a registered sequence.
pub const SEQUENCE_KEY: &str = "$asyncIterator";
/// Key wrapping a resolved value in an update payload.
pub const RESOLVE_KEY: &str = "$resolve";
/// Key wrapping a rejection value in an update payload.
pub const REJECT_KEY: &str = "$reject";

/// One element of the serialized stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// The first frame: the input graph with every async source replaced by a
    /// marker.
    Root(Value),
    /// `[id, payload]`: progress for one registered source.
    Update(u64, UpdatePayload),
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdatePayload {
    /// `{"$resolve": value}`: the future settled successfully.
    Resolve(Value),
    /// `{"$reject": value}`: the future failed.
    Reject(Value),
    /// `{"done": false, "value": item}`, or `{"done": true}` for the end of
    /// the sequence (a finished sequence carries no item, so the key is
    /// omitted the way JSON drops `undefined`).
    Item { done: bool, value: Option<Value> },
}

impl Frame {
    pub fn to_value(&self) -> Value {
        match self {
            Self::Root(value) => value.clone(),
            Self::Update(id, payload) => {
                Value::Array(vec![Value::from(*id), payload.to_value()])
            }
        }
    }
}

impl serde::Serialize for Frame {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Root(value) => value.serialize(serializer),
            Self::Update(id, payload) => {
                let mut tuple = serializer.serialize_tuple(2)?;
                tuple.serialize_element(id)?;
                tuple.serialize_element(payload)?;
                tuple.end()
            }
        }
    }
}

impl UpdatePayload {
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        match self {
            Self::Resolve(value) => {
                map.insert(RESOLVE_KEY.to_owned(), value.clone());
            }
            Self::Reject(value) => {
                map.insert(REJECT_KEY.to_owned(), value.clone());
            }
            Self::Item { done, value } => {
                map.insert("done".to_owned(), Value::Bool(*done));
                if let Some(value) = value {
                    map.insert("value".to_owned(), value.clone());
                }
            }
        }
        Value::Object(map)
    }
}

impl serde::Serialize for UpdatePayload {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Resolve(value) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(RESOLVE_KEY, value)?;
                map.end()
            }
            Self::Reject(value) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(REJECT_KEY, value)?;
                map.end()
            }
            Self::Item { done, value } => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("done", done)?;
                if let Some(value) = value {
                    map.serialize_entry("value", value)?;
                }
                map.end()
            }
        }
    }
}

/// Sources a marker can stand for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Promise,
    Sequence,
}

/// `{"$promise": id}` / `{"$asyncIterator": id}`.
pub fn marker(kind: MarkerKind, id: u64) -> Value {
    let key = match kind {
        MarkerKind::Promise => PROMISE_KEY,
        MarkerKind::Sequence => SEQUENCE_KEY,
    };
    let mut map = Map::with_capacity(1);
    map.insert(key.to_owned(), Value::from(id));
    Value::Object(map)
}

/// The single-key rule: an object is a marker iff its only key is a marker
/// key and the id is an unsigned integer. Anything else is user data.
pub fn as_marker(value: &Value) -> Option<(MarkerKind, u64)> {
    let map = value.as_object()?;
    if map.len() != 1 {
        return None;
    }
    let (key, id) = map.iter().next()?;
    let kind = match key.as_str() {
        PROMISE_KEY => MarkerKind::Promise,
        SEQUENCE_KEY => MarkerKind::Sequence,
        _ => return None,
    };
    Some((kind, id.as_u64()?))
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("update frame is not a two-element array: {0}")]
    NotAnUpdate(Value),
    #[error("update id is not an unsigned integer: {0}")]
    InvalidId(Value),
    #[error("payload does not fit the registered source: {0}")]
    PayloadMismatch(Value),
}

/// Splits `[id, payload]`. The payload is interpreted by the receiver, which
/// knows what kind of source the id names.
pub fn decode_update(value: Value) -> Result<(u64, Value), FrameError> {
    let parts: [Value; 2] = match value {
        Value::Array(parts) => match <[Value; 2]>::try_from(parts) {
            Ok(parts) => parts,
            Err(parts) => return Err(FrameError::NotAnUpdate(Value::Array(parts))),
        },
        other => return Err(FrameError::NotAnUpdate(other)),
    };
    let [id, payload] = parts;
    match id.as_u64() {
        Some(id) => Ok((id, payload)),
        None => Err(FrameError::InvalidId(id)),
    }
}

/// How a future update settles its target.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    Resolve(Value),
    Reject(Value),
}

/// Interprets a future payload. `$resolve`/`$reject` wrappers follow the
/// single-key rule; any other payload is the legacy variant carrying the
/// resolved value bare.
pub fn decode_settlement(payload: Value) -> Settlement {
    match payload {
        Value::Object(mut map) if map.len() == 1 => {
            if let Some(value) = map.remove(RESOLVE_KEY) {
                Settlement::Resolve(value)
            } else if let Some(value) = map.remove(REJECT_KEY) {
                Settlement::Reject(value)
            } else {
                Settlement::Resolve(Value::Object(map))
            }
        }
        payload => Settlement::Resolve(payload),
    }
}

/// Interprets a sequence payload as `(done, item)`.
pub fn decode_item(payload: Value) -> Result<(bool, Option<Value>), FrameError> {
    let mut map = match payload {
        Value::Object(map) => map,
        other => return Err(FrameError::PayloadMismatch(other)),
    };
    let Some(done) = map.get("done").and_then(Value::as_bool) else {
        return Err(FrameError::PayloadMismatch(Value::Object(map)));
    };
    Ok((done, map.remove("value")))
}
