//! What futures settle with on the failure path.

use serde_json::{Map, Value};


/// Key marking an encoded error object.
pub const ERROR_KEY: &str = "$error";

/// The wire form of an error: `{"$error": {"name", "message", "stack"?}}`.
///
/// Errors carried inside sequence items use the same shape; the core leaves
/// those as plain data and callers opt in through
/// [`from_value`](Self::from_value).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorObject {
    pub name: String,
    pub message: String,
    pub stack: Option<String>,
}

impl ErrorObject {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }

    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Captures any [`std::error::Error`]: the type name becomes `name`, the
    /// display form `message`, and the source chain a synthetic stack.
    pub fn from_error<E: std::error::Error + ?Sized>(error: &E) -> Self {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(format!("caused by: {cause}"));
            source = cause.source();
        }
        Self {
            name: short_type_name::<E>(),
            message: error.to_string(),
            stack: if causes.is_empty() {
                None
            } else {
                Some(causes.join("\n"))
            },
        }
    }

    /// Recognizes the single-key `{"$error": {...}}` shape.
    pub fn from_value(value: &Value) -> Option<Self> {
        let wrapper = value.as_object()?;
        if wrapper.len() != 1 {
            return None;
        }
        let fields = wrapper.get(ERROR_KEY)?.as_object()?;
        let name = fields.get("name")?.as_str()?;
        let message = fields.get("message")?.as_str()?;
        let stack = match fields.get("stack") {
            None | Some(Value::Null) => None,
            Some(stack) => Some(stack.as_str()?.to_owned()),
        };
        Some(Self {
            name: name.to_owned(),
            message: message.to_owned(),
            stack,
        })
    }

    pub fn to_value(&self) -> Value {
        let mut fields = Map::with_capacity(3);
        fields.insert("name".to_owned(), Value::String(self.name.clone()));
        fields.insert("message".to_owned(), Value::String(self.message.clone()));
        if let Some(stack) = &self.stack {
            fields.insert("stack".to_owned(), Value::String(stack.clone()));
        }
        let mut wrapper = Map::with_capacity(1);
        wrapper.insert(ERROR_KEY.to_owned(), Value::Object(fields));
        Value::Object(wrapper)
    }
}

impl std::fmt::Display for ErrorObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full).to_owned()
}

/// A future's failure value: a structured error, or anything else the peer
/// rejected with, verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    Error(ErrorObject),
    Value(Value),
}

impl Rejection {
    pub fn from_error<E: std::error::Error + ?Sized>(error: &E) -> Self {
        Self::Error(ErrorObject::from_error(error))
    }

    /// Decodes a `$reject` payload, recovering [`ErrorObject`]s from their
    /// wire shape.
    pub fn from_value(value: Value) -> Self {
        match ErrorObject::from_value(&value) {
            Some(error) => Self::Error(error),
            None => Self::Value(value),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Error(error) => error.to_value(),
            Self::Value(value) => value.clone(),
        }
    }

    pub(crate) fn disconnected(reason: &str) -> Self {
        Self::Error(ErrorObject::new("Disconnected", reason))
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error(error) => error.fmt(f),
            Self::Value(value) => value.fmt(f),
        }
    }
}

impl std::error::Error for Rejection {}

impl From<ErrorObject> for Rejection {
    #[inline]
    fn from(error: ErrorObject) -> Self {
        Self::Error(error)
    }
}

impl From<Value> for Rejection {
    #[inline]
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}
