//! Opaque identifiers for interned names and owning modules.

use std::fmt;

use xxhash_rust::const_xxh64::xxh64 as const_xxh64;

use crate::type_hash::hash_constants;

/// Identifier of an interned name.
///
/// Produced by the [`Interner`](crate::Interner). Two names intern to the same
/// id iff their bytes are equal. Ids are never reused within a process.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NameId(pub(crate) u32);

impl NameId {
    /// Raw index into the interner table.
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for NameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NameId({})", self.0)
    }
}

/// Identifier of a module that owns registry rows, functions and names.
///
/// Derived from the module name so that the same module gets the same id no
/// matter which code path declares it first.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ModuleId(pub u64);

impl ModuleId {
    /// The hosting executable. Rows registered outside any module land here.
    pub const HOST: ModuleId = ModuleId(0);

    /// Derive a module id from its name.
    pub const fn from_name(name: &str) -> Self {
        let id = hash_constants::MODULE ^ const_xxh64(name.as_bytes(), 0);
        // 0 is reserved for the host
        if id == 0 { ModuleId(1) } else { ModuleId(id) }
    }

    /// True for the host module.
    #[inline]
    pub const fn is_host(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_host() {
            write!(f, "ModuleId(host)")
        } else {
            write!(f, "ModuleId({:#018x})", self.0)
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_id_is_deterministic() {
        assert_eq!(ModuleId::from_name("physics"), ModuleId::from_name("physics"));
        assert_ne!(ModuleId::from_name("physics"), ModuleId::from_name("audio"));
    }

    #[test]
    fn named_modules_are_never_host() {
        assert!(ModuleId::HOST.is_host());
        assert!(!ModuleId::from_name("").is_host());
        assert!(!ModuleId::from_name("physics").is_host());
    }
}
