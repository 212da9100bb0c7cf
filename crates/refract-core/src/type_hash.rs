//! Deterministic hash-based type identity.
//!
//! This module provides [`TypeHash`], a 64-bit content-derived identifier for
//! registered types, methods, constructors and functions. Hashes are computed
//! from canonical names rather than handed out sequentially, so:
//!
//! - the same canonical name always yields the same hash, in every module
//! - a hash can be computed before the type it names is registered
//! - lookup by identity is a single map probe
//!
//! # Hash Computation
//!
//! Uses XXHash64 with domain-specific mixing constants so that a type, a
//! method and a function sharing a name never share a hash.
//!
//! # Portability
//!
//! "Same type ⇒ same hash" holds only as far as the canonical name does.
//! Names coming from [`std::any::type_name`] are not guaranteed stable across
//! compiler versions; prefer explicit names for anything exchanged between
//! independently built modules.
//!
//! # Examples
//!
//! ```
//! use refract_core::TypeHash;
//!
//! let a = TypeHash::from_name("Point");
//! let b = TypeHash::from_name("Point");
//! assert_eq!(a, b);
//!
//! let m1 = TypeHash::from_method(a, "scale", &[TypeHash::from_name("i32")]);
//! let m2 = TypeHash::from_method(a, "scale", &[TypeHash::from_name("f64")]);
//! assert_ne!(m1, m2);
//! ```

use std::fmt;

use xxhash_rust::const_xxh64::xxh64 as const_xxh64;
use xxhash_rust::xxh64::xxh64;

/// Domain-specific mixing constants for hash computation.
pub mod hash_constants {
    /// Separator constant used when folding parameter lists.
    pub const SEP: u64 = 0x4bc94d6bd06053ad;

    /// Domain marker for type hashes
    pub const TYPE: u64 = 0x2fac10b63a6cc57c;

    /// Domain marker for global function hashes
    pub const FUNCTION: u64 = 0x5ea77ffbcdf5f302;

    /// Domain marker for method hashes
    pub const METHOD: u64 = 0x7d3c8b4a92e15f6d;

    /// Domain marker for constructor hashes
    pub const CONSTRUCTOR: u64 = 0x9a7f3d5e2b8c4601;

    /// Domain marker for module identifiers
    pub const MODULE: u64 = 0x1a095090689d4647;

    /// Parameter position mixing constants.
    /// Each position gets its own constant so parameter order matters.
    pub const PARAM_MARKERS: [u64; 16] = [
        0x9e3779b97f4a7c15,
        0xbf58476d1ce4e5b9,
        0x94d049bb133111eb,
        0xd6e8feb86659fd93,
        0xe7037ed1a0b428db,
        0xc6a4a7935bd1e995,
        0x8648dbbc94d49b8d,
        0xa2b48b2c69e0d657,
        0x7c3e9f2a5b8d1403,
        0x5d8c7b4a3e9f2106,
        0x3f1e9d8c7b5a4203,
        0x1a2b3c4d5e6f7089,
        0x9f8e7d6c5b4a3210,
        0x2468ace013579bdf,
        0xfdb97531eca86420,
        0x0f1e2d3c4b5a6978,
    ];
}

/// A deterministic 64-bit identifier for a type, method, constructor or function.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Empty/invalid hash. Returned by stale handles.
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Create a type hash from a canonical type name.
    ///
    /// This is a `const fn` so well-known hashes can be constants.
    #[inline]
    pub const fn from_name(name: &str) -> Self {
        TypeHash(hash_constants::TYPE ^ const_xxh64(name.as_bytes(), 0))
    }

    /// Create a global function hash from name and parameter types.
    #[inline]
    pub fn from_function(name: &str, param_hashes: &[TypeHash]) -> Self {
        let seed = hash_constants::FUNCTION ^ xxh64(name.as_bytes(), 0);
        TypeHash(fold_params(seed, param_hashes))
    }

    /// Create a method hash from owner type, method name and parameter types.
    ///
    /// Two methods with the same name but different parameter lists hash
    /// differently; this is how duplicate registrations are detected.
    #[inline]
    pub fn from_method(owner: TypeHash, name: &str, param_hashes: &[TypeHash]) -> Self {
        let seed = hash_constants::METHOD ^ owner.0 ^ xxh64(name.as_bytes(), 0);
        TypeHash(fold_params(seed, param_hashes))
    }

    /// Create a constructor hash from owner type and parameter types.
    #[inline]
    pub fn from_constructor(owner: TypeHash, param_hashes: &[TypeHash]) -> Self {
        TypeHash(fold_params(hash_constants::CONSTRUCTOR ^ owner.0, param_hashes))
    }

    /// Check if this is the empty hash.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Get the underlying u64 value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

fn fold_params(mut hash: u64, param_hashes: &[TypeHash]) -> u64 {
    for (i, param) in param_hashes.iter().enumerate() {
        let marker = hash_constants::PARAM_MARKERS
            .get(i)
            .copied()
            .unwrap_or_else(|| hash_constants::PARAM_MARKERS[0].wrapping_add(i as u64));
        // wrapping_mul keeps the fold order-sensitive
        hash = hash
            .wrapping_mul(hash_constants::SEP)
            .wrapping_add(marker ^ param.0);
    }
    hash
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash({:#018x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Strip the aggregate-kind prefix some toolchains put in front of type names.
///
/// `"struct Point"`, `"class Point"`, `"enum Color"` and `"union Bits"` all
/// canonicalize to the bare name; anything else is returned unchanged.
pub fn canonical_type_name(raw: &str) -> &str {
    const PREFIXES: [&str; 4] = ["class ", "struct ", "enum ", "union "];

    let trimmed = raw.trim();
    for prefix in PREFIXES {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            return rest.trim_start();
        }
    }
    trimmed
}

/// Well-known hashes for the built-in primitive types.
pub mod primitives {
    use super::TypeHash;

    pub const VOID: TypeHash = TypeHash::from_name("void");
    pub const BOOL: TypeHash = TypeHash::from_name("bool");
    pub const CHAR: TypeHash = TypeHash::from_name("char");
    pub const I8: TypeHash = TypeHash::from_name("i8");
    pub const I16: TypeHash = TypeHash::from_name("i16");
    pub const I32: TypeHash = TypeHash::from_name("i32");
    pub const I64: TypeHash = TypeHash::from_name("i64");
    pub const ISIZE: TypeHash = TypeHash::from_name("isize");
    pub const U8: TypeHash = TypeHash::from_name("u8");
    pub const U16: TypeHash = TypeHash::from_name("u16");
    pub const U32: TypeHash = TypeHash::from_name("u32");
    pub const U64: TypeHash = TypeHash::from_name("u64");
    pub const USIZE: TypeHash = TypeHash::from_name("usize");
    pub const F32: TypeHash = TypeHash::from_name("f32");
    pub const F64: TypeHash = TypeHash::from_name("f64");
    pub const STRING: TypeHash = TypeHash::from_name("String");
}
