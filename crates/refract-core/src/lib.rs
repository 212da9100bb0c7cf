//! Core types for the refract reflection registry.
//!
//! This crate holds everything that does not depend on the registry itself:
//!
//! - [`TypeHash`]: content-derived identity of types and signatures
//! - [`Typed`]: static identity of a reflectable type
//! - [`Value`]: the type-erased value container
//! - [`Interner`]: the deduplicating name table
//! - [`AttributeValue`]: the closed set of attribute payloads
//! - the error types shared by every crate in the workspace

mod attribute;
mod convert;
mod diagnostics;
mod error;
mod ids;
mod interner;
mod primitive_kind;
mod type_hash;
mod typed;
mod value;

pub use attribute::{AttributeKind, AttributeValue};
pub use convert::{Numeric, coerce, convert_numeric, read_numeric};
pub use diagnostics::{CandidateDiagnostic, DiagnosticCode, OverloadDiagnostics};
pub use error::{
    ErrorKind, MergeError, RefractError, ReflectError, ReflectResult, RegistrationError,
    VerifyError,
};
pub use ids::{ModuleId, NameId};
pub use interner::{Interner, Name};
pub use primitive_kind::{NumericClass, PrimitiveKind};
pub use type_hash::{TypeHash, canonical_type_name, hash_constants, primitives};
pub use typed::{Typed, type_name_of};
pub use value::{INLINE_ALIGN, INLINE_CAPACITY, Value};
