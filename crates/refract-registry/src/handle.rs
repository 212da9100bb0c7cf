//! Generation-checked handles into the registry.
//!
//! Handles are plain values: they never keep a row alive and never borrow
//! the registry. Every use re-validates the handle against the slot it
//! points at, so a handle to a row that was replaced by a merge or removed
//! by a module unregistration reports itself as stale instead of resolving
//! to whatever occupies the slot now.

use std::fmt;

/// Handle to a registered type.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl TypeHandle {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        TypeHandle { index, generation }
    }

    /// Slot index in the registry.
    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Slot generation this handle was issued for.
    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Handle to the `sub`-th entry of one of this type's member collections.
    #[inline]
    pub const fn member(self, sub: u32) -> MemberHandle {
        MemberHandle { ty: self, sub }
    }
}

impl fmt::Debug for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHandle({}v{})", self.index, self.generation)
    }
}

/// Handle to a member (field, property, method, constructor, enum value or
/// base link) of a registered type.
///
/// Which collection `sub` indexes into is carried by the wrapper that holds
/// the handle, not by the handle itself.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberHandle {
    pub(crate) ty: TypeHandle,
    pub(crate) sub: u32,
}

impl MemberHandle {
    /// The owning type.
    #[inline]
    pub const fn owner(self) -> TypeHandle {
        self.ty
    }

    /// Position within the member collection.
    #[inline]
    pub const fn sub(self) -> u32 {
        self.sub
    }
}

impl fmt::Debug for MemberHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemberHandle({:?}#{})", self.ty, self.sub)
    }
}

/// Handle to a registered global function overload.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl FunctionHandle {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        FunctionHandle { index, generation }
    }

    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for FunctionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionHandle({}v{})", self.index, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_compare_by_index_and_generation() {
        let a = TypeHandle::new(3, 0);
        let b = TypeHandle::new(3, 1);
        assert_ne!(a, b);
        assert_eq!(a, TypeHandle::new(3, 0));
        assert_eq!(a.member(2).owner(), a);
        assert_eq!(a.member(2).sub(), 2);
    }

    #[test]
    fn debug_format() {
        assert_eq!(format!("{:?}", TypeHandle::new(1, 2)), "TypeHandle(1v2)");
        assert_eq!(
            format!("{:?}", TypeHandle::new(1, 2).member(4)),
            "MemberHandle(TypeHandle(1v2)#4)"
        );
    }
}
