//! Cross-module ABI: export, merge and verify.
//!
//! A registry can be serialized into an [`AbiBlob`], a flat little-endian
//! image of its published types with their fields, methods, constructors and
//! attributes (see [`format`] for the layout). Another registry in the same
//! process merges the blob back into rows that invoke the same callables.
//!
//! # Function Slots
//!
//! Callables cannot be written into bytes. Instead, every trampoline and
//! field accessor that is exported gets a stable slot in a process-wide
//! export table and the blob stores the slot number. Merging resolves the
//! slot back to the shared callable, so a merged method calls exactly the
//! code the exporting registry registered.
//!
//! # Not Exported
//!
//! Global functions, properties, bases and enum values are process-local
//! closures or depend on them, and stay behind. When a merge replaces an
//! existing row, the replaced row's properties, bases and enum values are
//! carried over.

pub mod format;

mod export;
mod merge;
mod verify;

use std::sync::{Arc, LazyLock};

use parking_lot::{Mutex, MutexGuard};
use rustc_hash::FxHashMap;

use crate::descriptor::FieldAccessor;
use crate::trampoline::Trampoline;
use format::Header;

pub use merge::{ConflictDiagnostic, ConflictResolution, MergeReport};

/// An exported registry image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiBlob {
    bytes: Vec<u8>,
}

impl AbiBlob {
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The decoded header.
    pub fn header(&self) -> Option<Header> {
        Header::decode(&self.bytes)
    }
}

impl AsRef<[u8]> for AbiBlob {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl From<AbiBlob> for Vec<u8> {
    fn from(blob: AbiBlob) -> Self {
        blob.bytes
    }
}

// ============================================================================
// Export table
// ============================================================================

pub(crate) enum Exported {
    Invoke(Arc<Trampoline>),
    Field(Arc<FieldAccessor>),
}

/// Process-wide slot table shared by every registry.
///
/// Slots are never freed; the same callable always maps to the same slot.
#[derive(Default)]
pub(crate) struct ExportTable {
    entries: Vec<Exported>,
    by_address: FxHashMap<usize, u64>,
}

static EXPORTS: LazyLock<Mutex<ExportTable>> = LazyLock::new(Mutex::default);

/// Lock the export table.
pub(crate) fn exports() -> MutexGuard<'static, ExportTable> {
    EXPORTS.lock()
}

impl ExportTable {
    pub(crate) fn invoke_slot(&mut self, trampoline: &Arc<Trampoline>) -> u64 {
        let address = Arc::as_ptr(trampoline) as *const () as usize;
        self.slot(address, || Exported::Invoke(Arc::clone(trampoline)))
    }

    pub(crate) fn field_slot(&mut self, accessor: &Arc<FieldAccessor>) -> u64 {
        let address = Arc::as_ptr(accessor) as *const () as usize;
        self.slot(address, || Exported::Field(Arc::clone(accessor)))
    }

    fn slot(&mut self, address: usize, entry: impl FnOnce() -> Exported) -> u64 {
        if let Some(&slot) = self.by_address.get(&address) {
            return slot;
        }
        let slot = self.entries.len() as u64;
        self.entries.push(entry());
        self.by_address.insert(address, slot);
        slot
    }

    pub(crate) fn invoke(&self, slot: u64) -> Option<&Arc<Trampoline>> {
        match self.entries.get(usize::try_from(slot).ok()?)? {
            Exported::Invoke(trampoline) => Some(trampoline),
            Exported::Field(_) => None,
        }
    }

    pub(crate) fn field(&self, slot: u64) -> Option<&Arc<FieldAccessor>> {
        match self.entries.get(usize::try_from(slot).ok()?)? {
            Exported::Field(accessor) => Some(accessor),
            Exported::Invoke(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refract_core::Value;

    #[test]
    fn slots_are_stable_per_callable() {
        let a = Arc::new(Trampoline::new(0, |_, _, _| Ok(Value::new(1i32))));
        let b = Arc::new(Trampoline::new(0, |_, _, _| Ok(Value::new(2i32))));

        let mut table = exports();
        let slot_a = table.invoke_slot(&a);
        let slot_b = table.invoke_slot(&b);
        assert_ne!(slot_a, slot_b);
        assert_eq!(table.invoke_slot(&Arc::clone(&a)), slot_a);

        assert!(Arc::ptr_eq(table.invoke(slot_a).unwrap(), &a));
        assert!(table.field(slot_a).is_none());
        assert!(table.invoke(u64::MAX).is_none());
    }
}
