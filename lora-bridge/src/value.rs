//! The host environment's object representation.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::callback::Callback;

/// A value as the scripting host hands it to, or receives it from, the module.
#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Immutable byte string.
    Bytes(Vec<u8>),
    /// Mutable byte buffer.
    ByteArray(Vec<u8>),
    List(Vec<Value>),
    Callable(Callback),
}

impl Value {
    /// Wraps a closure as a callable value.
    pub fn callable(f: impl Fn() + Send + Sync + 'static) -> Self {
        Value::Callable(Arc::new(f))
    }

    /// Host-facing type name, used in argument errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::ByteArray(_) => "bytearray",
            Value::List(_) => "list",
            Value::Callable(_) => "function",
        }
    }

    /// Byte content of a bytes-like value.
    ///
    /// `Bytes` and `ByteArray` are borrowed. A `List` of ints in `0..=255` is
    /// copied into a new buffer. Anything else yields a description of the
    /// problem.
    pub fn as_byte_buffer(&self) -> Result<Cow<'_, [u8]>, String> {
        match self {
            Value::Bytes(data) | Value::ByteArray(data) => Ok(Cow::Borrowed(data)),
            Value::List(items) => items
                .iter()
                .map(|item| match item {
                    Value::Int(n) => u8::try_from(*n)
                        .map_err(|_| format!("byte must be in range(0, 256), got {n}")),
                    other => Err(format!(
                        "'{}' object cannot be interpreted as an integer",
                        other.type_name()
                    )),
                })
                .collect::<Result<Vec<u8>, String>>()
                .map(Cow::Owned),
            other => Err(format!(
                "cannot convert '{}' object to bytearray",
                other.type_name()
            )),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Bytes(data) => write!(f, "Bytes({data:?})"),
            Value::ByteArray(data) => write!(f, "ByteArray({data:?})"),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Callable(cb) => write!(f, "Callable({:p})", Arc::as_ptr(cb)),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::ByteArray(a), Value::ByteArray(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Callable(a), Value::Callable(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::Float(x.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}
