//! Primitive type kinds and their numeric classification.

use std::fmt;

use crate::TypeHash;
use crate::type_hash::primitives;

/// Built-in primitive types known to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Void,
    Bool,
    Char,
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
    F32,
    F64,
    String,
}

/// Broad numeric category used by overload ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericClass {
    Signed,
    Unsigned,
    Float,
}

impl NumericClass {
    /// True for signed and unsigned integers.
    pub const fn is_integer(self) -> bool {
        matches!(self, NumericClass::Signed | NumericClass::Unsigned)
    }
}

impl PrimitiveKind {
    /// All primitive kinds, in declaration order.
    pub const ALL: [PrimitiveKind; 16] = [
        PrimitiveKind::Void,
        PrimitiveKind::Bool,
        PrimitiveKind::Char,
        PrimitiveKind::I8,
        PrimitiveKind::I16,
        PrimitiveKind::I32,
        PrimitiveKind::I64,
        PrimitiveKind::Isize,
        PrimitiveKind::U8,
        PrimitiveKind::U16,
        PrimitiveKind::U32,
        PrimitiveKind::U64,
        PrimitiveKind::Usize,
        PrimitiveKind::F32,
        PrimitiveKind::F64,
        PrimitiveKind::String,
    ];

    /// Get the TypeHash for this primitive type.
    pub const fn type_hash(self) -> TypeHash {
        match self {
            PrimitiveKind::Void => primitives::VOID,
            PrimitiveKind::Bool => primitives::BOOL,
            PrimitiveKind::Char => primitives::CHAR,
            PrimitiveKind::I8 => primitives::I8,
            PrimitiveKind::I16 => primitives::I16,
            PrimitiveKind::I32 => primitives::I32,
            PrimitiveKind::I64 => primitives::I64,
            PrimitiveKind::Isize => primitives::ISIZE,
            PrimitiveKind::U8 => primitives::U8,
            PrimitiveKind::U16 => primitives::U16,
            PrimitiveKind::U32 => primitives::U32,
            PrimitiveKind::U64 => primitives::U64,
            PrimitiveKind::Usize => primitives::USIZE,
            PrimitiveKind::F32 => primitives::F32,
            PrimitiveKind::F64 => primitives::F64,
            PrimitiveKind::String => primitives::STRING,
        }
    }

    /// Get the canonical name of this primitive type.
    pub const fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Void => "void",
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Char => "char",
            PrimitiveKind::I8 => "i8",
            PrimitiveKind::I16 => "i16",
            PrimitiveKind::I32 => "i32",
            PrimitiveKind::I64 => "i64",
            PrimitiveKind::Isize => "isize",
            PrimitiveKind::U8 => "u8",
            PrimitiveKind::U16 => "u16",
            PrimitiveKind::U32 => "u32",
            PrimitiveKind::U64 => "u64",
            PrimitiveKind::Usize => "usize",
            PrimitiveKind::F32 => "f32",
            PrimitiveKind::F64 => "f64",
            PrimitiveKind::String => "String",
        }
    }

    /// Look up the primitive kind for a type hash.
    pub fn from_hash(hash: TypeHash) -> Option<PrimitiveKind> {
        PrimitiveKind::ALL
            .into_iter()
            .find(|kind| kind.type_hash() == hash)
    }

    /// Numeric category, or `None` for non-numeric primitives.
    ///
    /// `bool` and `char` are deliberately not numeric: they only match exactly.
    pub const fn numeric_class(self) -> Option<NumericClass> {
        match self {
            PrimitiveKind::I8
            | PrimitiveKind::I16
            | PrimitiveKind::I32
            | PrimitiveKind::I64
            | PrimitiveKind::Isize => Some(NumericClass::Signed),
            PrimitiveKind::U8
            | PrimitiveKind::U16
            | PrimitiveKind::U32
            | PrimitiveKind::U64
            | PrimitiveKind::Usize => Some(NumericClass::Unsigned),
            PrimitiveKind::F32 | PrimitiveKind::F64 => Some(NumericClass::Float),
            PrimitiveKind::Void
            | PrimitiveKind::Bool
            | PrimitiveKind::Char
            | PrimitiveKind::String => None,
        }
    }

    /// Conversion rank: the byte width of the type, 0 for non-numeric kinds.
    ///
    /// `isize`/`usize` take the width of the target platform, so on 64-bit
    /// targets they share a rank with `i64`/`u64`.
    pub const fn rank(self) -> u8 {
        match self {
            PrimitiveKind::I8 | PrimitiveKind::U8 => 1,
            PrimitiveKind::I16 | PrimitiveKind::U16 => 2,
            PrimitiveKind::I32 | PrimitiveKind::U32 | PrimitiveKind::F32 => 4,
            PrimitiveKind::I64 | PrimitiveKind::U64 | PrimitiveKind::F64 => 8,
            PrimitiveKind::Isize | PrimitiveKind::Usize => size_of::<usize>() as u8,
            PrimitiveKind::Void
            | PrimitiveKind::Bool
            | PrimitiveKind::Char
            | PrimitiveKind::String => 0,
        }
    }

    /// Whether this kind takes part in numeric conversions.
    pub const fn is_numeric(self) -> bool {
        self.numeric_class().is_some()
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
