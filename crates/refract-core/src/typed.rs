//! Static type identity for reflectable types.
//!
//! Every type that can be stored in a [`Value`](crate::Value) or described to
//! the registry implements [`Typed`]. It supplies the canonical name the
//! registry indexes by and the [`TypeHash`] derived from it.
//!
//! # Example
//!
//! ```
//! use refract_core::{Typed, TypeHash};
//!
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! impl Typed for Point {
//!     fn type_name() -> &'static str {
//!         "Point"
//!     }
//! }
//!
//! assert_eq!(Point::type_hash(), TypeHash::from_name("Point"));
//! ```
//!
//! `#[derive(Reflect)]` (from the `refract` facade) implements this trait
//! together with the registry description.

use crate::{PrimitiveKind, TypeHash, canonical_type_name};

/// Compile-time identity of a reflectable type.
pub trait Typed: 'static {
    /// Canonical qualified name of the type.
    fn type_name() -> &'static str;

    /// Content-derived identity of the type.
    ///
    /// Defaults to the hash of the canonicalized [`type_name`](Self::type_name).
    /// Overriding it is only sound if the override is still a pure function
    /// of the name.
    fn type_hash() -> TypeHash {
        TypeHash::from_name(canonical_type_name(Self::type_name()))
    }
}

/// Compiler-derived name of `T`, with aggregate prefixes stripped.
///
/// Suitable as a default for [`Typed::type_name`] inside a single build.
/// The text is not guaranteed stable across compiler versions, so modules
/// built separately should use explicit names instead.
pub fn type_name_of<T: ?Sized>() -> &'static str {
    canonical_type_name(std::any::type_name::<T>())
}

macro_rules! impl_typed_primitive {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Typed for $ty {
                #[inline]
                fn type_name() -> &'static str {
                    PrimitiveKind::$kind.name()
                }

                #[inline]
                fn type_hash() -> TypeHash {
                    PrimitiveKind::$kind.type_hash()
                }
            }
        )*
    };
}

impl_typed_primitive! {
    () => Void,
    bool => Bool,
    char => Char,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    isize => Isize,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    usize => Usize,
    f32 => F32,
    f64 => F64,
    String => String,
}
