//! Unified error types for the reflection registry.
//!
//! ## Error Hierarchy
//!
//! ```text
//! RefractError (top-level wrapper)
//! ├── ReflectError      - Query and invocation errors
//! ├── RegistrationError - Type/function/module registration errors
//! ├── MergeError        - ABI blob rejections
//! └── VerifyError       - Index consistency violations
//! ```
//!
//! Query and invocation failures additionally map onto a two-way
//! [`ErrorKind`] (`NotFound` / `InvalidArgument`) for callers that only care
//! about the category.

use thiserror::Error;

use crate::{OverloadDiagnostics, TypeHash};

// ============================================================================
// Reflection Errors
// ============================================================================

/// Coarse category of a [`ReflectError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The named type, member or function does not exist.
    NotFound,
    /// The request exists but cannot be satisfied with these arguments.
    InvalidArgument,
}

/// Errors raised by queries and invocations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReflectError {
    /// No entity with this name exists.
    #[error("{entity} not found: {name}")]
    NotFound {
        /// What was looked up (e.g., "type", "method").
        entity: &'static str,
        name: String,
    },

    /// The handle refers to a row that was replaced or removed.
    #[error("stale handle")]
    StaleHandle,

    /// Wrong number of arguments.
    #[error("arity mismatch: expected {expected} argument(s), got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    /// A value has the wrong type for this position.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: TypeHash, actual: TypeHash },

    /// An argument could not be converted to its parameter type.
    #[error("argument {index} cannot be converted")]
    ArgumentConversion { index: usize },

    /// No overload accepts the arguments.
    #[error("no viable overload for '{name}': {diagnostics}")]
    NoViableOverload {
        name: String,
        diagnostics: OverloadDiagnostics,
    },

    /// The property has no setter.
    #[error("property '{0}' is read-only")]
    ReadOnlyProperty(String),

    /// An instance member was invoked without a receiver of the right type.
    #[error("'{0}' requires a receiver")]
    MissingReceiver(String),

    /// The type has no constructor that can be called this way.
    #[error("type is not constructible")]
    NotConstructible,
}

impl ReflectError {
    /// Shorthand for [`ReflectError::NotFound`].
    pub fn not_found(entity: &'static str, name: impl Into<String>) -> Self {
        ReflectError::NotFound {
            entity,
            name: name.into(),
        }
    }

    /// The coarse category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReflectError::NotFound { .. } => ErrorKind::NotFound,
            ReflectError::StaleHandle
            | ReflectError::ArityMismatch { .. }
            | ReflectError::TypeMismatch { .. }
            | ReflectError::ArgumentConversion { .. }
            | ReflectError::NoViableOverload { .. }
            | ReflectError::ReadOnlyProperty(_)
            | ReflectError::MissingReceiver(_)
            | ReflectError::NotConstructible => ErrorKind::InvalidArgument,
        }
    }

    /// Check if this error means a handle went stale.
    pub fn is_stale(&self) -> bool {
        matches!(self, ReflectError::StaleHandle)
    }

    /// Overload diagnostics, when resolution failed.
    pub fn diagnostics(&self) -> Option<&OverloadDiagnostics> {
        match self {
            ReflectError::NoViableOverload { diagnostics, .. } => Some(diagnostics),
            _ => None,
        }
    }
}

/// Result alias for queries and invocations.
pub type ReflectResult<T> = Result<T, ReflectError>;

// ============================================================================
// Registration Errors
// ============================================================================

/// Errors that occur while registering types, functions or modules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// A registration with this signature already exists elsewhere.
    #[error("duplicate registration: {name} already registered as {kind}")]
    DuplicateRegistration {
        /// The name that was duplicated.
        name: String,
        /// What kind of thing was already registered (e.g., "function").
        kind: String,
    },

    /// The declaration is invalid.
    #[error("invalid declaration: {0}")]
    InvalidDeclaration(String),

    /// A module initializer reported failure.
    #[error("module '{module}' failed to initialize: {message}")]
    ModuleInit { module: String, message: String },
}

// ============================================================================
// Merge Errors
// ============================================================================

/// Reasons an ABI blob is rejected by a merge.
///
/// The [`as_str`](Self::as_str) phrase of each variant is stable and is the
/// prefix of its `Display` output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("unsupported version {found}")]
    UnsupportedVersion { found: u32 },

    #[error("corrupt offsets")]
    CorruptOffsets,

    #[error("corrupt type record {index}")]
    CorruptTypeRecord { index: usize },

    #[error("corrupt field record {index}")]
    CorruptFieldRecord { index: usize },

    #[error("corrupt method record {index}")]
    CorruptMethodRecord { index: usize },

    #[error("corrupt ctor record {index}")]
    CorruptCtorRecord { index: usize },

    #[error("corrupt attribute record {index}")]
    CorruptAttributeRecord { index: usize },

    /// A type in the blob is already registered and the policy rejects it.
    #[error("duplicate typeId {type_hash} ({conflicted} conflicting type(s))")]
    DuplicateTypeId {
        /// First conflicting type.
        type_hash: TypeHash,
        /// Number of blob types that collided.
        conflicted: usize,
    },
}

impl MergeError {
    /// The fixed phrase identifying this rejection.
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeError::UnsupportedVersion { .. } => "unsupported version",
            MergeError::CorruptOffsets => "corrupt offsets",
            MergeError::CorruptTypeRecord { .. } => "corrupt type record",
            MergeError::CorruptFieldRecord { .. } => "corrupt field record",
            MergeError::CorruptMethodRecord { .. } => "corrupt method record",
            MergeError::CorruptCtorRecord { .. } => "corrupt ctor record",
            MergeError::CorruptAttributeRecord { .. } => "corrupt attribute record",
            MergeError::DuplicateTypeId { .. } => "duplicate typeId",
        }
    }
}

// ============================================================================
// Verify Errors
// ============================================================================

/// An index entry that points outside its collection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("field index overflow in '{type_name}': {index} >= {len}")]
    FieldIndexOverflow {
        type_name: String,
        index: usize,
        len: usize,
    },

    #[error("method overload index overflow in '{type_name}': {index} >= {len}")]
    MethodOverloadIndexOverflow {
        type_name: String,
        index: usize,
        len: usize,
    },

    #[error("property index overflow in '{type_name}': {index} >= {len}")]
    PropertyIndexOverflow {
        type_name: String,
        index: usize,
        len: usize,
    },
}

impl VerifyError {
    /// The fixed phrase identifying this violation.
    pub fn as_str(&self) -> &'static str {
        match self {
            VerifyError::FieldIndexOverflow { .. } => "field index overflow",
            VerifyError::MethodOverloadIndexOverflow { .. } => "method overload index overflow",
            VerifyError::PropertyIndexOverflow { .. } => "property index overflow",
        }
    }
}

// ============================================================================
// Top-level Error
// ============================================================================

/// Any error produced by the registry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RefractError {
    #[error(transparent)]
    Reflect(#[from] ReflectError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Verify(#[from] VerifyError),
}

impl RefractError {
    /// Check if this is a query or invocation error.
    pub fn is_reflect(&self) -> bool {
        matches!(self, RefractError::Reflect(_))
    }

    /// Check if this is a registration error.
    pub fn is_registration(&self) -> bool {
        matches!(self, RefractError::Registration(_))
    }

    /// Check if this is a merge rejection.
    pub fn is_merge(&self) -> bool {
        matches!(self, RefractError::Merge(_))
    }

    /// Check if this is a verification failure.
    pub fn is_verify(&self) -> bool {
        matches!(self, RefractError::Verify(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(ReflectError::not_found("type", "Nope").kind(), ErrorKind::NotFound);
        assert_eq!(ReflectError::StaleHandle.kind(), ErrorKind::InvalidArgument);
        assert_eq!(
            ReflectError::ArityMismatch {
                expected: 2,
                actual: 1
            }
            .kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn merge_display_starts_with_phrase() {
        let errors = [
            MergeError::UnsupportedVersion { found: 9 },
            MergeError::CorruptOffsets,
            MergeError::CorruptTypeRecord { index: 1 },
            MergeError::CorruptFieldRecord { index: 2 },
            MergeError::CorruptMethodRecord { index: 3 },
            MergeError::CorruptCtorRecord { index: 4 },
            MergeError::CorruptAttributeRecord { index: 5 },
            MergeError::DuplicateTypeId {
                type_hash: TypeHash(1),
                conflicted: 2,
            },
        ];
        for error in errors {
            assert!(error.to_string().starts_with(error.as_str()), "{error}");
        }
    }

    #[test]
    fn verify_display_starts_with_phrase() {
        let error = VerifyError::MethodOverloadIndexOverflow {
            type_name: "Calc".into(),
            index: 4,
            len: 2,
        };
        assert!(error.to_string().starts_with(error.as_str()));
    }

    #[test]
    fn wrapper_conversion() {
        let err: RefractError = MergeError::CorruptOffsets.into();
        assert!(err.is_merge());
        assert!(!err.is_reflect());
        assert_eq!(err.to_string(), "corrupt offsets");
    }
}
