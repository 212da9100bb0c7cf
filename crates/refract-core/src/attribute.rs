//! Attribute values attached to types and members.
//!
//! Attributes are `(key, value)` pairs recorded at registration time. Values
//! form a closed set so they can be compared, hashed and written into an ABI
//! blob without knowing anything about user types.

use std::fmt;
use std::sync::Arc;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use ordered_float::OrderedFloat;

use crate::TypeHash;

/// Wire tag of an [`AttributeValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum AttributeKind {
    Bool = 0,
    Int = 1,
    Double = 2,
    String = 3,
    Type = 4,
}

/// Value of a registered attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    /// Floating point value (uses OrderedFloat for hashing)
    Double(OrderedFloat<f64>),
    /// Interned text.
    String(Arc<str>),
    /// Reference to another type by identity.
    Type(TypeHash),
}

impl AttributeValue {
    /// The wire tag of this value.
    pub fn kind(&self) -> AttributeKind {
        match self {
            AttributeValue::Bool(_) => AttributeKind::Bool,
            AttributeValue::Int(_) => AttributeKind::Int,
            AttributeValue::Double(_) => AttributeKind::Double,
            AttributeValue::String(_) => AttributeKind::String,
            AttributeValue::Type(_) => AttributeKind::Type,
        }
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_double(&self) -> Option<f64> {
        match self {
            AttributeValue::Double(v) => Some(v.0),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_type(&self) -> Option<TypeHash> {
        match self {
            AttributeValue::Type(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        AttributeValue::Int(v as i64)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Double(OrderedFloat(v))
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(Arc::from(v))
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(Arc::from(v))
    }
}

impl From<TypeHash> for AttributeValue {
    fn from(v: TypeHash) -> Self {
        AttributeValue::Type(v)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(v) => write!(f, "{v}"),
            AttributeValue::Int(v) => write!(f, "{v}"),
            AttributeValue::Double(v) => write!(f, "{}", v.0),
            AttributeValue::String(v) => write!(f, "{v:?}"),
            AttributeValue::Type(v) => write!(f, "type {v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_are_stable() {
        assert_eq!(u8::from(AttributeKind::Bool), 0);
        assert_eq!(u8::from(AttributeKind::Type), 4);
        assert_eq!(AttributeKind::try_from(3u8).ok(), Some(AttributeKind::String));
        assert!(AttributeKind::try_from(5u8).is_err());
    }

    #[test]
    fn accessors_match_variant() {
        let v = AttributeValue::from("meters");
        assert_eq!(v.kind(), AttributeKind::String);
        assert_eq!(v.as_str(), Some("meters"));
        assert_eq!(v.as_int(), None);

        assert_eq!(AttributeValue::from(2.5).as_double(), Some(2.5));
        assert_eq!(AttributeValue::from(3).as_int(), Some(3));
        assert_eq!(AttributeValue::from(true).as_bool(), Some(true));
    }

    #[test]
    fn doubles_compare_by_value() {
        assert_eq!(AttributeValue::from(0.1), AttributeValue::from(0.1));
        assert_ne!(AttributeValue::from(0.1), AttributeValue::from(0.2));
    }
}
