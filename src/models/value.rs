//! Values exchanged with the store
//!
//! Only the two storage affinities the mapper declares (`INTEGER`, `TEXT`)
//! plus `NULL` are representable.

use crate::models::{ModelError, ModelResult};
use std::fmt;

/// A single cell value, either bound as a statement parameter or read back
/// from a result row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(i64),
    Text(String),
    Null,
}

impl Value {
    /// Name of the storage class, used in decode errors
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Integer(_) => "INTEGER",
            Self::Text(_) => "TEXT",
            Self::Null => "NULL",
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Null => write!(f, "NULL"),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

/// Snowflakes are stored with the same bit pattern in a signed column.
#[allow(clippy::cast_possible_wrap)]
impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Self::Integer(value as i64)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Conversion from a stored value back into a record field.
pub trait FromValue: Sized {
    /// # Errors
    /// Returns [`ModelError::Decode`] if the value has the wrong storage class.
    fn from_value(value: Value) -> ModelResult<Self>;
}

fn mismatch(expected: &'static str, found: &Value) -> ModelError {
    ModelError::Decode(format!("expected {expected}, found {}", found.kind()))
}

impl FromValue for Value {
    fn from_value(value: Value) -> ModelResult<Self> {
        Ok(value)
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> ModelResult<Self> {
        match value {
            Value::Integer(i) => Ok(i),
            other => Err(mismatch("INTEGER", &other)),
        }
    }
}

#[allow(clippy::cast_sign_loss)]
impl FromValue for u64 {
    fn from_value(value: Value) -> ModelResult<Self> {
        i64::from_value(value).map(|i| i as u64)
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> ModelResult<Self> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(mismatch("TEXT", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> ModelResult<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}
