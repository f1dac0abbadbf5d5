//! Value, Key and Record types for StudioDB
//!
//! This module defines how data values are represented in memory and in the
//! persisted store image.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::catalog::DataType;

/// A value in the database
///
/// Serialized untagged so that persisted records read as plain JSON objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// NULL value
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value (64-bit)
    Integer(i64),
    /// Floating point value (64-bit)
    Real(f64),
    /// String value
    Text(String),
}

// Reals compare bitwise so that Value can be used in assertions and maps
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Value {
    /// Check if this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to convert to f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(f) => Some(*f),
            _ => None,
        }
    }

    /// Try to borrow as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The column type a literal of this value declares
    pub fn inferred_type(&self) -> DataType {
        match self {
            Value::Integer(_) => DataType::Integer,
            Value::Real(_) => DataType::Real,
            _ => DataType::Text,
        }
    }

    /// SQL equality used by column filters: numbers compare numerically,
    /// NULL equals nothing
    pub fn sql_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Integer(i), Value::Real(r)) | (Value::Real(r), Value::Integer(i)) => {
                cmp_integer_real(*i, *r) == Some(Ordering::Equal)
            }
            (a, b) if a.as_f64().is_some() && b.as_f64().is_some() => {
                a.as_f64().partial_cmp(&b.as_f64()) == Some(Ordering::Equal)
            }
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

/// Compare an integer with a real without rounding the integer
///
/// `None` when the real is NaN.
pub(crate) fn cmp_integer_real(i: i64, r: f64) -> Option<Ordering> {
    // 2^63, the first real above the i64 range
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if r.is_nan() {
        return None;
    }
    if r >= LIMIT {
        return Some(Ordering::Less);
    }
    if r < -LIMIT {
        return Some(Ordering::Greater);
    }
    let floor = r.floor();
    let ord = match (i as i128).cmp(&(floor as i128)) {
        Ordering::Equal if r > floor => Ordering::Less,
        ord => ord,
    };
    Some(ord)
}

/// A record: column name to value, in insertion order
pub type Record = IndexMap<String, Value>;

/// A storage key
///
/// Numbers order before text. Reals with an integral value are normalized to
/// integers, so `1` and `1.0` address the same record.
#[derive(Debug, Clone)]
pub enum Key {
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Key {
    /// Convert a value into a key; NULL, booleans and NaN are not keys
    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::Integer(i) => Some(Key::Integer(*i)),
            Value::Real(f) if f.is_nan() => None,
            Value::Real(f) => {
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                    Some(Key::Integer(*f as i64))
                } else {
                    Some(Key::Real(*f))
                }
            }
            Value::Text(s) => Some(Key::Text(s.clone())),
            Value::Null | Value::Boolean(_) => None,
        }
    }

    /// The value stored in the key column for this key
    pub fn to_value(&self) -> Value {
        match self {
            Key::Integer(i) => Value::Integer(*i),
            Key::Real(f) => Value::Real(*f),
            Key::Text(s) => Value::Text(s.clone()),
        }
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Key::Integer(a), Key::Integer(b)) => a.cmp(b),
            (Key::Text(a), Key::Text(b)) => a.cmp(b),
            (Key::Text(_), _) => Ordering::Greater,
            (_, Key::Text(_)) => Ordering::Less,
            (Key::Real(a), Key::Real(b)) => a.total_cmp(b),
            (Key::Integer(i), Key::Real(r)) => {
                cmp_integer_real(*i, *r).unwrap_or(Ordering::Less)
            }
            (Key::Real(r), Key::Integer(i)) => {
                cmp_integer_real(*i, *r).map_or(Ordering::Greater, Ordering::reverse)
            }
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Integer(i) => write!(f, "{}", i),
            Key::Real(n) => write!(f, "{}", n),
            Key::Text(s) => write!(f, "'{}'", s),
        }
    }
}
