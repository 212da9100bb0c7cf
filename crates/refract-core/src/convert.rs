//! Numeric conversion between primitive [`Value`]s.
//!
//! This is the single conversion helper shared by overload resolution and
//! the converting invocation path. Conversions follow Rust `as` semantics:
//! integers wrap or truncate, floats saturate when converted to integers.
//!
//! Only the numeric primitives take part. `bool`, `char`, `String` and void
//! convert to nothing except themselves.

use crate::{PrimitiveKind, Typed, Value};

/// A primitive numeric payload widened to 64 bits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

/// Read a numeric payload, widening it to 64 bits.
pub fn read_numeric(value: &Value) -> Option<Numeric> {
    let kind = PrimitiveKind::from_hash(value.type_hash())?;
    macro_rules! read {
        ($ty:ty, $variant:ident, $wide:ty) => {
            value.get::<$ty>().map(|v| Numeric::$variant(*v as $wide))
        };
    }
    match kind {
        PrimitiveKind::I8 => read!(i8, Signed, i64),
        PrimitiveKind::I16 => read!(i16, Signed, i64),
        PrimitiveKind::I32 => read!(i32, Signed, i64),
        PrimitiveKind::I64 => read!(i64, Signed, i64),
        PrimitiveKind::Isize => read!(isize, Signed, i64),
        PrimitiveKind::U8 => read!(u8, Unsigned, u64),
        PrimitiveKind::U16 => read!(u16, Unsigned, u64),
        PrimitiveKind::U32 => read!(u32, Unsigned, u64),
        PrimitiveKind::U64 => read!(u64, Unsigned, u64),
        PrimitiveKind::Usize => read!(usize, Unsigned, u64),
        PrimitiveKind::F32 => read!(f32, Float, f64),
        PrimitiveKind::F64 => read!(f64, Float, f64),
        PrimitiveKind::Void | PrimitiveKind::Bool | PrimitiveKind::Char | PrimitiveKind::String => {
            None
        }
    }
}

/// Convert a numeric value to the numeric primitive `target`.
///
/// Returns `None` when either side is not numeric.
pub fn convert_numeric(value: &Value, target: PrimitiveKind) -> Option<Value> {
    let source = read_numeric(value)?;
    macro_rules! cast {
        ($ty:ty) => {
            Some(Value::new(match source {
                Numeric::Signed(v) => v as $ty,
                Numeric::Unsigned(v) => v as $ty,
                Numeric::Float(v) => v as $ty,
            }))
        };
    }
    match target {
        PrimitiveKind::I8 => cast!(i8),
        PrimitiveKind::I16 => cast!(i16),
        PrimitiveKind::I32 => cast!(i32),
        PrimitiveKind::I64 => cast!(i64),
        PrimitiveKind::Isize => cast!(isize),
        PrimitiveKind::U8 => cast!(u8),
        PrimitiveKind::U16 => cast!(u16),
        PrimitiveKind::U32 => cast!(u32),
        PrimitiveKind::U64 => cast!(u64),
        PrimitiveKind::Usize => cast!(usize),
        PrimitiveKind::F32 => cast!(f32),
        PrimitiveKind::F64 => cast!(f64),
        PrimitiveKind::Void | PrimitiveKind::Bool | PrimitiveKind::Char | PrimitiveKind::String => {
            None
        }
    }
}

/// Produce a `T` from `value`, by clone if it already is one, otherwise by
/// numeric conversion.
pub fn coerce<T: Typed + Clone + Send + Sync>(value: &Value) -> Option<T> {
    if let Some(exact) = value.get::<T>() {
        return Some(exact.clone());
    }
    let target = PrimitiveKind::from_hash(T::type_hash())?;
    convert_numeric(value, target)?.into_inner::<T>().ok()
}
