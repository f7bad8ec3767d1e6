use std::fmt;

use super::Thunk;
use crate::{registry::Behavior, world::ObjectId};

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Object(ObjectId),
    List(Vec<Value>),
    /// Deferred computation created by `thunk ... endthunk`
    Thunk(Thunk),
    /// Keyword behavior fetched with `keyword(recv, "<kw>")`
    Behavior(Behavior),
    /// Control flow that escaped a thunk, see [`Signal`]
    Signal(Signal),
}

/// A `break`, `continue` or `return` that escaped a forced thunk.
///
/// Behaviors see these as ordinary return values of [`Thunk::force`]. A loop
/// driver interprets `Break`/`Continue` itself; any signal a behavior hands
/// back to the dispatch site is re-raised there as the original jump.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Break,
    Continue,
    Return(Box<Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Object(_) => "object",
            Value::List(_) => "list",
            Value::Thunk(_) => "thunk",
            Value::Behavior(_) => "behavior",
            Value::Signal(_) => "signal",
        }
    }

    /// Only `null` and `false` are falsy
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Boolean(false))
    }

    pub fn is_signal(&self) -> bool {
        matches!(self, Value::Signal(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                (*a as f64) == *b
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Thunk(a), Value::Thunk(b)) => a.ptr_eq(b),
            (Value::Behavior(a), Value::Behavior(b)) => a.ptr_eq(b),
            (Value::Signal(a), Value::Signal(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Object(id) => write!(f, "{id}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Thunk(_) => write!(f, "<thunk>"),
            Value::Behavior(_) => write!(f, "<behavior>"),
            Value::Signal(Signal::Break) => write!(f, "<break>"),
            Value::Signal(Signal::Continue) => write!(f, "<continue>"),
            Value::Signal(Signal::Return(v)) => write!(f, "<return {v}>"),
        }
    }
}
