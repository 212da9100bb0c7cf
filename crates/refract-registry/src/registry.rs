//! Registry - the process-wide catalog of reflected types and functions.
//!
//! This module provides [`Registry`], the storage for every [`TypeDescriptor`]
//! and [`FunctionDescriptor`] along with the indexes that make lookups O(1).
//!
//! # Storage Model
//!
//! - **Types**: rows live in a slot vector with a free list. A slot carries a
//!   generation counter that is bumped whenever its row is replaced or
//!   removed, which is what lets [`TypeHandle`]s detect staleness.
//! - **Indexes**: `TypeHash -> slot` and `NameId -> slot`. Both are updated
//!   inside the same write-lock critical section as the mutation.
//! - **Functions**: global function overloads in their own slot vector,
//!   indexed by name (overload sets) and by signature hash.
//! - **Modules**: per-module bookkeeping of live types and functions.
//!
//! # Thread Safety
//!
//! All state sits behind one `parking_lot::RwLock`. Queries take the read
//! lock; commits, interning, merges and unregistration take the write lock.
//! Registration passes are additionally serialized by a reentrant mutex so
//! that a `describe` running on one thread can register the types it refers
//! to (including its own) without deadlocking, while other threads wait for
//! the finished row.
//!
//! No lock is held while user code (`describe`, trampolines) runs. A
//! [`RegistryRead`] guard must not be held across calls back into the
//! registry.
//!
//! # Example
//!
//! ```
//! use refract_registry::Registry;
//!
//! let registry = Registry::new();
//! let int = registry.ensure_registered::<i32>();
//!
//! assert_eq!(registry.ensure_registered::<i32>(), int);
//! assert_eq!(registry.type_by_name("i32"), Some(int));
//! assert!(registry.read().get(int).unwrap().is_primitive());
//! ```

use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::{ReentrantMutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use refract_core::{
    AttributeValue, Interner, ModuleId, Name, NameId, PrimitiveKind, RegistrationError, TypeHash,
    Typed, canonical_type_name,
};

use crate::builder::{TypeBuilder, TypeDraft};
use crate::descriptor::{
    AttributeDescriptor, FunctionDescriptor, RowState, TypeDescriptor, TypeFlags,
};
use crate::{FunctionHandle, IntoFunction, Reflect, RegistryConfig, TypeHandle};

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// Build an attribute, interning its key and any string payload in `names`.
pub(crate) fn intern_attribute(
    names: &mut Interner,
    key: &str,
    value: AttributeValue,
    module: ModuleId,
) -> AttributeDescriptor {
    let key = names.intern_in(key, module);
    let value = match value {
        AttributeValue::String(text) => AttributeValue::String(names.intern_in(&text, module).text()),
        other => other,
    };
    AttributeDescriptor { key, value }
}

// ============================================================================
// State
// ============================================================================

pub(crate) struct TypeSlot {
    pub(crate) generation: u32,
    pub(crate) row: Option<TypeDescriptor>,
}

struct FunctionSlot {
    generation: u32,
    row: Option<FunctionDescriptor>,
}

/// Bookkeeping for one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Name given when the module was declared, if it was.
    pub name: Option<Arc<str>>,
    /// Live published types owned by the module.
    pub types: usize,
    /// Live global functions owned by the module.
    pub functions: usize,
    /// Set once the module's initializer has succeeded in this registry.
    pub initialized: bool,
}

#[derive(Default)]
pub(crate) struct RegistryState {
    // === Names ===
    pub(crate) names: Interner,

    // === Types ===
    pub(crate) slots: Vec<TypeSlot>,
    free: Vec<u32>,
    by_hash: FxHashMap<TypeHash, u32>,
    by_name: FxHashMap<NameId, u32>,

    // === Functions ===
    functions: Vec<FunctionSlot>,
    free_functions: Vec<u32>,
    functions_by_name: FxHashMap<NameId, Vec<u32>>,
    functions_by_signature: FxHashMap<TypeHash, u32>,

    // === Modules ===
    pub(crate) modules: FxHashMap<ModuleId, ModuleInfo>,
}

impl RegistryState {
    // === Type rows ===

    /// Published row behind a live handle.
    pub(crate) fn get(&self, handle: TypeHandle) -> Option<&TypeDescriptor> {
        self.row_any(handle).filter(|row| row.is_published())
    }

    pub(crate) fn get_mut(&mut self, handle: TypeHandle) -> Option<&mut TypeDescriptor> {
        self.row_any_mut(handle).filter(|row| row.is_published())
    }

    /// Row behind a handle, pending or published.
    fn row_any(&self, handle: TypeHandle) -> Option<&TypeDescriptor> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.row.as_ref()
    }

    fn row_any_mut(&mut self, handle: TypeHandle) -> Option<&mut TypeDescriptor> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.row.as_mut()
    }

    /// Current handle of an occupied slot.
    pub(crate) fn handle_at(&self, index: u32) -> Option<TypeHandle> {
        let slot = self.slots.get(index as usize)?;
        slot.row
            .as_ref()
            .map(|_| TypeHandle::new(index, slot.generation))
    }

    /// Slot index of the row with `hash`, pending or published.
    pub(crate) fn index_of(&self, hash: TypeHash) -> Option<u32> {
        self.by_hash.get(&hash).copied()
    }

    fn any_by_hash(&self, hash: TypeHash) -> Option<(TypeHandle, &TypeDescriptor)> {
        let index = self.index_of(hash)?;
        let slot = self.slots.get(index as usize)?;
        let row = slot.row.as_ref()?;
        Some((TypeHandle::new(index, slot.generation), row))
    }

    pub(crate) fn by_hash(&self, hash: TypeHash) -> Option<(TypeHandle, &TypeDescriptor)> {
        self.any_by_hash(hash).filter(|(_, row)| row.is_published())
    }

    pub(crate) fn by_name(&self, name: &str) -> Option<(TypeHandle, &TypeDescriptor)> {
        let id = self.names.find(name)?;
        let index = *self.by_name.get(&id)?;
        let handle = self.handle_at(index)?;
        self.get(handle).map(|row| (handle, row))
    }

    pub(crate) fn types(&self) -> impl Iterator<Item = (TypeHandle, &TypeDescriptor)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.row
                .as_ref()
                .filter(|row| row.is_published())
                .map(|row| (TypeHandle::new(index as u32, slot.generation), row))
        })
    }

    /// Insert a row into a free or new slot and index it.
    pub(crate) fn insert_row(&mut self, row: TypeDescriptor) -> TypeHandle {
        let (hash, name, module, published) =
            (row.type_hash, row.name.clone(), row.module, row.is_published());

        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize].row = Some(row);
                index
            }
            None => {
                self.slots.push(TypeSlot {
                    generation: 0,
                    row: Some(row),
                });
                (self.slots.len() - 1) as u32
            }
        };

        self.by_hash.insert(hash, index);
        self.index_name(&name, index);
        if published {
            self.module_mut(module).types += 1;
        }
        TypeHandle::new(index, self.slots[index as usize].generation)
    }

    /// Swap the row in an occupied slot for `row`, bumping the generation.
    ///
    /// The old name alias is removed before the new one is indexed.
    pub(crate) fn replace_row(
        &mut self,
        index: u32,
        row: TypeDescriptor,
    ) -> Option<(TypeHandle, TypeDescriptor)> {
        let slot = self.slots.get_mut(index as usize)?;
        let old = slot.row.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        let generation = slot.generation;
        let (name, module) = (row.name.clone(), row.module);
        slot.row = Some(row);

        if old.name.id() != name.id() {
            self.unindex_name(old.name.id(), index);
            self.index_name(&name, index);
        }
        if old.module != module {
            if let Some(info) = self.modules.get_mut(&old.module) {
                info.types = info.types.saturating_sub(1);
            }
            self.module_mut(module).types += 1;
        }
        Some((TypeHandle::new(index, generation), old))
    }

    /// Empty a slot, bump its generation and drop its index entries.
    pub(crate) fn remove_row(&mut self, index: u32) -> Option<TypeDescriptor> {
        let slot = self.slots.get_mut(index as usize)?;
        let row = slot.row.take()?;
        slot.generation = slot.generation.wrapping_add(1);

        if self.by_hash.get(&row.type_hash) == Some(&index) {
            self.by_hash.remove(&row.type_hash);
        }
        self.unindex_name(row.name.id(), index);
        self.free.push(index);
        if row.is_published()
            && let Some(info) = self.modules.get_mut(&row.module)
        {
            info.types = info.types.saturating_sub(1);
        }
        Some(row)
    }

    /// Point `name` at `index` unless another row already holds the name.
    fn index_name(&mut self, name: &Name, index: u32) {
        let existing = self.by_name.get(&name.id()).copied();
        match existing {
            Some(other) if other != index => {
                warn!(name = %name, "type name already registered, keeping the first row");
            }
            Some(_) => {}
            None => {
                self.by_name.insert(name.id(), index);
            }
        }
    }

    /// Drop the alias of `index`. If another live row carries the same
    /// name, the alias moves to the lowest such slot.
    fn unindex_name(&mut self, id: NameId, index: u32) {
        if self.by_name.get(&id) != Some(&index) {
            return;
        }
        let survivor = self.slots.iter().enumerate().find_map(|(other, slot)| {
            let row = slot.row.as_ref()?;
            (other as u32 != index && row.name.id() == id).then_some(other as u32)
        });
        match survivor {
            Some(other) => {
                self.by_name.insert(id, other);
            }
            None => {
                self.by_name.remove(&id);
            }
        }
    }

    pub(crate) fn module_mut(&mut self, module: ModuleId) -> &mut ModuleInfo {
        self.modules.entry(module).or_default()
    }

    // === Functions ===

    pub(crate) fn function(&self, handle: FunctionHandle) -> Option<&FunctionDescriptor> {
        let slot = self.functions.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.row.as_ref()
    }

    fn function_handle(&self, index: u32) -> Option<FunctionHandle> {
        let slot = self.functions.get(index as usize)?;
        slot.row
            .as_ref()
            .map(|_| FunctionHandle::new(index, slot.generation))
    }

    pub(crate) fn functions(&self) -> impl Iterator<Item = (FunctionHandle, &FunctionDescriptor)> {
        self.functions.iter().enumerate().filter_map(|(index, slot)| {
            slot.row
                .as_ref()
                .map(|row| (FunctionHandle::new(index as u32, slot.generation), row))
        })
    }

    pub(crate) fn functions_named(&self, name: &str) -> Vec<FunctionHandle> {
        self.names
            .find(name)
            .and_then(|id| self.functions_by_name.get(&id))
            .map(|indexes| {
                indexes
                    .iter()
                    .filter_map(|&index| self.function_handle(index))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn function_by_signature(
        &self,
        signature: TypeHash,
    ) -> Option<(FunctionHandle, &FunctionDescriptor)> {
        let index = *self.functions_by_signature.get(&signature)?;
        let handle = self.function_handle(index)?;
        self.function(handle).map(|row| (handle, row))
    }

    fn insert_function(&mut self, row: FunctionDescriptor) -> FunctionHandle {
        let (name, signature, module) = (row.name.id(), row.signature, row.module);

        let index = match self.free_functions.pop() {
            Some(index) => {
                self.functions[index as usize].row = Some(row);
                index
            }
            None => {
                self.functions.push(FunctionSlot {
                    generation: 0,
                    row: Some(row),
                });
                (self.functions.len() - 1) as u32
            }
        };

        self.functions_by_name.entry(name).or_default().push(index);
        self.functions_by_signature.insert(signature, index);
        self.module_mut(module).functions += 1;
        FunctionHandle::new(index, self.functions[index as usize].generation)
    }

    pub(crate) fn remove_function(&mut self, index: u32) -> Option<FunctionDescriptor> {
        let slot = self.functions.get_mut(index as usize)?;
        let row = slot.row.take()?;
        slot.generation = slot.generation.wrapping_add(1);

        if let Some(indexes) = self.functions_by_name.get_mut(&row.name.id()) {
            indexes.retain(|&i| i != index);
            if indexes.is_empty() {
                self.functions_by_name.remove(&row.name.id());
            }
        }
        if self.functions_by_signature.get(&row.signature) == Some(&index) {
            self.functions_by_signature.remove(&row.signature);
        }
        self.free_functions.push(index);
        if let Some(info) = self.modules.get_mut(&row.module) {
            info.functions = info.functions.saturating_sub(1);
        }
        Some(row)
    }

    /// Slot indexes of every function owned by `module`.
    pub(crate) fn functions_of(&self, module: ModuleId) -> Vec<u32> {
        self.functions()
            .filter(|(_, row)| row.module == module)
            .map(|(handle, _)| handle.index)
            .collect()
    }

    /// Slot indexes of every row owned by `module`.
    pub(crate) fn rows_of(&self, module: ModuleId) -> Vec<u32> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.row.as_ref().is_some_and(|row| row.module == module))
            .map(|(index, _)| index as u32)
            .collect()
    }
}

// ============================================================================
// Registry
// ============================================================================

/// The reflection registry.
pub struct Registry {
    state: RwLock<RegistryState>,
    registration: ReentrantMutex<()>,
    config: RegistryConfig,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("types", &self.type_count())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// Create an empty registry with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            registration: ReentrantMutex::new(()),
            config,
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static Registry {
        GLOBAL.get_or_init(Registry::new)
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Take the read lock.
    ///
    /// Do not call back into the registry while the guard is alive.
    pub fn read(&self) -> RegistryRead<'_> {
        RegistryRead {
            state: self.state.read(),
        }
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write()
    }

    /// Serialize against registration passes.
    pub(crate) fn registration_lock(&self) -> parking_lot::ReentrantMutexGuard<'_, ()> {
        self.registration.lock()
    }

    // ==========================================================================
    // Registration
    // ==========================================================================

    /// Register `T` in the host module, or return its existing handle.
    pub fn ensure_registered<T: Reflect>(&self) -> TypeHandle {
        self.ensure_registered_in::<T>(ModuleId::HOST)
    }

    /// Register `T` as owned by `module`, or return its existing handle.
    ///
    /// Primitives always belong to the host. If `T` is already registered,
    /// its row keeps whichever module registered it first.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn ensure_registered_in<T: Reflect>(&self, module: ModuleId) -> TypeHandle {
        let type_hash = T::type_hash();
        if let Some((handle, _)) = self.state.read().by_hash(type_hash) {
            return handle;
        }

        let _serial = self.registration.lock();

        // Either published by another thread while we waited, or still
        // pending further up this thread's stack.
        if let Some((handle, _)) = self.state.read().any_by_hash(type_hash) {
            return handle;
        }

        let module = if PrimitiveKind::from_hash(type_hash).is_some() {
            ModuleId::HOST
        } else {
            module
        };
        let handle = self.insert_skeleton::<T>(module);
        let pending = PendingRegistration {
            registry: self,
            handle,
            armed: true,
        };

        let mut builder = TypeBuilder::<T>::new(self, handle, module);
        if self.config.default_constructors
            && let Some(ctor) = T::default_constructor()
        {
            builder.constructor(ctor);
        }
        T::describe(&mut builder);

        self.commit(handle, builder.finish());
        pending.disarm();
        handle
    }

    /// Run another builder pass over `T`, registering it first if needed.
    ///
    /// Members are added; ones that duplicate existing members are ignored.
    pub fn extend<T: Reflect>(&self, f: impl FnOnce(&mut TypeBuilder<'_, T>)) -> TypeHandle {
        let handle = self.ensure_registered::<T>();
        let _serial = self.registration.lock();

        let module = self
            .read()
            .get(handle)
            .map_or(ModuleId::HOST, |row| row.module);
        let mut builder = TypeBuilder::<T>::new(self, handle, module);
        f(&mut builder);
        self.commit(handle, builder.finish());
        handle
    }

    /// Register a parameter, return, field or base type and report its hash.
    pub(crate) fn register_param<T: Reflect>(&self, module: ModuleId) -> TypeHash {
        self.ensure_registered_in::<T>(module);
        T::type_hash()
    }

    fn insert_skeleton<T: Reflect>(&self, module: ModuleId) -> TypeHandle {
        let type_hash = T::type_hash();
        let flags = if PrimitiveKind::from_hash(type_hash).is_some() {
            TypeFlags::PRIMITIVE
        } else {
            TypeFlags::empty()
        };

        let mut state = self.state.write();
        let name = state
            .names
            .intern_in(canonical_type_name(T::type_name()), module);
        let row = TypeDescriptor::skeleton(
            name,
            type_hash,
            module,
            size_of::<T>(),
            align_of::<T>(),
            flags,
        );
        let handle = state.insert_row(row);
        trace!(type_name = T::type_name(), ?handle, "inserted skeleton row");
        handle
    }

    /// Fold a finished draft into its row and publish it.
    fn commit(&self, handle: TypeHandle, draft: TypeDraft) {
        let mut guard = self.state.write();
        let state = &mut *guard;

        let Some(row) = state.row_any_mut(handle) else {
            warn!(?handle, "row disappeared before its registration pass finished");
            return;
        };

        for field in draft.fields {
            let member = field.name.clone();
            if row.add_field(field).is_none() {
                warn!(type_name = %row.name, member = %member, "duplicate field ignored");
            }
        }
        for property in draft.properties {
            let member = property.name.clone();
            if row.add_property(property).is_none() {
                warn!(type_name = %row.name, member = %member, "duplicate property ignored");
            }
        }
        for method in draft.methods {
            let member = method.name.clone();
            if row.add_method(method).is_none() {
                warn!(type_name = %row.name, member = %member, "duplicate method overload ignored");
            }
        }
        for ctor in draft.constructors {
            let arity = ctor.params.len();
            if row.add_constructor(ctor).is_none() {
                warn!(type_name = %row.name, arity, "duplicate constructor ignored");
            }
        }
        for base in draft.bases {
            let base_hash = base.base;
            if row.add_base(base).is_none() {
                warn!(type_name = %row.name, base = %base_hash, "duplicate base ignored");
            }
        }
        for value in draft.enum_values {
            let member = value.name.clone();
            if row.add_enum_value(value).is_none() {
                warn!(type_name = %row.name, member = %member, "duplicate enum value ignored");
            }
        }
        row.attributes.extend(draft.attributes);

        let rename = match draft.name {
            Some(name) if name.id() != row.name.id() => {
                Some((std::mem::replace(&mut row.name, name.clone()), name))
            }
            _ => None,
        };
        let first_commit = row.state == RowState::Pending;
        row.state = RowState::Published;
        let (module, type_name) = (row.module, row.name.clone());

        if let Some((old, new)) = rename {
            state.unindex_name(old.id(), handle.index);
            state.index_name(&new, handle.index);
        }
        if first_commit {
            state.module_mut(module).types += 1;
            debug!(type_name = %type_name, ?module, ?handle, "registered type");
        } else {
            debug!(type_name = %type_name, ?handle, "extended type");
        }
    }

    fn discard_pending(&self, handle: TypeHandle) {
        let mut state = self.state.write();
        if state.row_any(handle).is_some_and(|row| !row.is_published()) {
            state.remove_row(handle.index);
            warn!(?handle, "registration pass did not finish, skeleton row removed");
        }
    }

    /// Register a global function overload owned by `module`.
    ///
    /// Registering the same signature again from the same module returns the
    /// existing handle. The same signature from another module is an error.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn register_function<F, M>(
        &self,
        module: ModuleId,
        name: &str,
        f: F,
    ) -> Result<FunctionHandle, RegistrationError>
    where
        F: IntoFunction<M>,
    {
        let signature = F::signature(self, module);
        let hash = TypeHash::from_function(name, &signature.params);

        let mut state = self.state.write();
        if let Some((handle, existing)) = state.function_by_signature(hash) {
            if existing.module == module {
                return Ok(handle);
            }
            return Err(RegistrationError::DuplicateRegistration {
                name: name.to_string(),
                kind: "function".to_string(),
            });
        }

        let interned = state.names.intern_in(name, module);
        let handle = state.insert_function(FunctionDescriptor {
            name: interned,
            module,
            params: signature.params,
            return_type: signature.return_type,
            signature: hash,
            trampoline: Arc::new(f.into_trampoline()),
        });
        debug!(function = name, ?module, ?handle, "registered function");
        Ok(handle)
    }

    /// Record a module's name in its bookkeeping entry.
    pub fn declare_module(&self, module: ModuleId, name: &str) {
        let mut state = self.state.write();
        let text = state.names.intern_in(name, module).text();
        state.module_mut(module).name = Some(text);
    }

    pub(crate) fn mark_module_initialized(&self, module: ModuleId) {
        self.state.write().module_mut(module).initialized = true;
    }

    // ==========================================================================
    // Names
    // ==========================================================================

    /// Intern `text` as a host name.
    pub fn intern(&self, text: &str) -> Name {
        self.state.write().names.intern(text)
    }

    /// Intern `text` on behalf of `module`.
    pub fn intern_in(&self, text: &str, module: ModuleId) -> Name {
        self.state.write().names.intern_in(text, module)
    }

    /// Id of `text` if it has been interned.
    pub fn find_name(&self, text: &str) -> Option<NameId> {
        self.state.read().names.find(text)
    }

    /// Build an attribute, interning its key and any string payload.
    pub(crate) fn attribute(
        &self,
        key: &str,
        value: AttributeValue,
        module: ModuleId,
    ) -> AttributeDescriptor {
        intern_attribute(&mut self.state.write().names, key, value, module)
    }

    // ==========================================================================
    // Queries
    // ==========================================================================

    /// Handle of the type with `hash`.
    pub fn type_by_hash(&self, hash: TypeHash) -> Option<TypeHandle> {
        self.state.read().by_hash(hash).map(|(handle, _)| handle)
    }

    /// Handle of the type registered under `name`.
    pub fn type_by_name(&self, name: &str) -> Option<TypeHandle> {
        self.state.read().by_name(name).map(|(handle, _)| handle)
    }

    /// Handle of `T` if it is registered. Never registers.
    pub fn handle_of<T: Typed>(&self) -> Option<TypeHandle> {
        self.type_by_hash(T::type_hash())
    }

    /// True while `handle` refers to a published row.
    pub fn is_alive(&self, handle: TypeHandle) -> bool {
        self.state.read().get(handle).is_some()
    }

    /// True while `handle` refers to a registered function.
    pub fn is_function_alive(&self, handle: FunctionHandle) -> bool {
        self.state.read().function(handle).is_some()
    }

    /// Handles of every published type, in slot order.
    pub fn types(&self) -> Vec<TypeHandle> {
        self.state.read().types().map(|(handle, _)| handle).collect()
    }

    pub fn type_count(&self) -> usize {
        self.state.read().types().count()
    }

    /// Every overload of the global function `name`.
    pub fn functions_named(&self, name: &str) -> Vec<FunctionHandle> {
        self.state.read().functions_named(name)
    }

    /// Bookkeeping for `module`, if it owns anything or was declared.
    pub fn module_info(&self, module: ModuleId) -> Option<ModuleInfo> {
        self.state.read().modules.get(&module).cloned()
    }
}

/// Removes a skeleton row if its registration pass unwinds.
struct PendingRegistration<'r> {
    registry: &'r Registry,
    handle: TypeHandle,
    armed: bool,
}

impl PendingRegistration<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingRegistration<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.registry.discard_pending(self.handle);
        }
    }
}

// ============================================================================
// Read view
// ============================================================================

/// Shared access to the registry contents.
///
/// Holds the read lock for as long as it lives.
pub struct RegistryRead<'a> {
    state: RwLockReadGuard<'a, RegistryState>,
}

impl RegistryRead<'_> {
    pub(crate) fn state(&self) -> &RegistryState {
        &self.state
    }

    /// Row behind a live handle.
    pub fn get(&self, handle: TypeHandle) -> Option<&TypeDescriptor> {
        self.state.get(handle)
    }

    pub fn by_hash(&self, hash: TypeHash) -> Option<(TypeHandle, &TypeDescriptor)> {
        self.state.by_hash(hash)
    }

    pub fn by_name(&self, name: &str) -> Option<(TypeHandle, &TypeDescriptor)> {
        self.state.by_name(name)
    }

    /// Every published row, in slot order.
    pub fn types(&self) -> impl Iterator<Item = (TypeHandle, &TypeDescriptor)> {
        self.state.types()
    }

    pub fn function(&self, handle: FunctionHandle) -> Option<&FunctionDescriptor> {
        self.state.function(handle)
    }

    pub fn functions(&self) -> impl Iterator<Item = (FunctionHandle, &FunctionDescriptor)> {
        self.state.functions()
    }

    pub fn functions_named(&self, name: &str) -> Vec<FunctionHandle> {
        self.state.functions_named(name)
    }

    pub fn find_name(&self, text: &str) -> Option<NameId> {
        self.state.names.find(text)
    }

    pub fn name(&self, id: NameId) -> Option<Name> {
        self.state.names.name_of(id)
    }

    pub fn module_info(&self, module: ModuleId) -> Option<&ModuleInfo> {
        self.state.modules.get(&module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TypeBuilder;
    use refract_core::primitives;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    #[derive(Clone, Debug, Default)]
    struct Node {
        value: i32,
        next: Option<Box<Node>>,
    }

    impl Typed for Node {
        fn type_name() -> &'static str {
            "Node"
        }
    }

    impl Reflect for Node {
        fn describe(t: &mut TypeBuilder<'_, Self>) {
            t.field("value", |n| &n.value, |n| &mut n.value);
            // refers back to Node while Node is still pending
            t.method("with_value", |n: &Node, v: i32| Node {
                value: v,
                next: n.next.clone(),
            });
        }

        fn default_constructor() -> Option<fn() -> Self> {
            Some(Node::default)
        }
    }

    #[derive(Clone, Debug)]
    struct Exploding;

    impl Typed for Exploding {
        fn type_name() -> &'static str {
            "Exploding"
        }
    }

    impl Reflect for Exploding {
        fn describe(t: &mut TypeBuilder<'_, Self>) {
            t.field("ok", |_| &0i32, |_| unreachable!());
            panic!("describe failed");
        }
    }

    macro_rules! renamed_twin {
        ($ty:ident, $name:literal) => {
            #[derive(Clone, Debug)]
            struct $ty;

            impl Typed for $ty {
                fn type_name() -> &'static str {
                    $name
                }
            }

            impl Reflect for $ty {
                fn describe(t: &mut TypeBuilder<'_, Self>) {
                    t.set_name("Twin");
                }
            }
        };
    }

    renamed_twin!(LeftTwin, "twin::Left");
    renamed_twin!(RightTwin, "twin::Right");

    #[test]
    fn registration_is_idempotent() {
        let registry = Registry::new();
        let first = registry.ensure_registered::<Node>();
        let second = registry.ensure_registered::<Node>();

        assert_eq!(first, second);
        assert_eq!(registry.type_by_hash(Node::type_hash()), Some(first));
        assert_eq!(registry.type_by_name("Node"), Some(first));
        // Node plus i32
        assert_eq!(registry.type_count(), 2);
    }

    #[test]
    fn self_referencing_describe_completes() {
        let registry = Registry::new();
        let handle = registry.ensure_registered::<Node>();

        let read = registry.read();
        let row = read.get(handle).unwrap();
        assert_eq!(row.methods[0].return_type, Node::type_hash());
        assert!(row.flags.contains(TypeFlags::DEFAULT_CONSTRUCTIBLE));
        assert_eq!(row.fields[0].type_hash, primitives::I32);
    }

    #[test]
    fn panicking_describe_removes_skeleton() {
        let registry = Registry::new();
        let result = catch_unwind(AssertUnwindSafe(|| {
            registry.ensure_registered::<Exploding>();
        }));

        assert!(result.is_err());
        assert_eq!(registry.type_by_hash(Exploding::type_hash()), None);
        assert_eq!(registry.type_by_name("Exploding"), None);
        // the field type registered before the panic stays
        assert!(registry.type_by_hash(primitives::I32).is_some());
    }

    #[test]
    fn concurrent_registration_yields_one_row() {
        let registry = Registry::new();
        let handles: Vec<TypeHandle> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| registry.ensure_registered::<Node>()))
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert!(handles.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(registry.type_count(), 2);
    }

    #[test]
    fn primitives_belong_to_host() {
        let registry = Registry::new();
        let module = ModuleId::from_name("physics");
        registry.ensure_registered_in::<Node>(module);

        let read = registry.read();
        let (_, int) = read.by_hash(primitives::I32).unwrap();
        assert_eq!(int.module, ModuleId::HOST);
        let (_, node) = read.by_name("Node").unwrap();
        assert_eq!(node.module, module);
        assert_eq!(read.module_info(module).map(|m| m.types), Some(1));
    }

    #[test]
    fn shared_name_moves_to_the_surviving_row() {
        let registry = Registry::new();
        let module = ModuleId::from_name("twins");
        let left = registry.ensure_registered_in::<LeftTwin>(module);
        let right = registry.ensure_registered::<RightTwin>();
        assert_eq!(registry.type_by_name("Twin"), Some(left));

        assert_eq!(registry.unregister_module(module), 1);
        assert!(!registry.is_alive(left));
        assert_eq!(registry.type_by_name("Twin"), Some(right));
    }

    #[test]
    fn function_duplicates() {
        let registry = Registry::new();
        let a = ModuleId::from_name("a");
        let b = ModuleId::from_name("b");

        let first = registry
            .register_function(a, "add", |x: i32, y: i32| x + y)
            .unwrap();
        let again = registry
            .register_function(a, "add", |x: i32, y: i32| x + y)
            .unwrap();
        assert_eq!(first, again);

        let err = registry
            .register_function(b, "add", |x: i32, y: i32| x - y)
            .unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateRegistration { .. }));

        registry
            .register_function(b, "add", |x: f64, y: f64| x + y)
            .unwrap();
        assert_eq!(registry.functions_named("add").len(), 2);
        assert_eq!(registry.module_info(a).map(|m| m.functions), Some(1));
    }

    #[test]
    fn extend_adds_members() {
        let registry = Registry::new();
        let handle = registry.ensure_registered::<Node>();
        registry.extend::<Node>(|t| {
            t.method("doubled", |n: &Node| n.value * 2);
            // duplicate, ignored
            t.field("value", |n| &n.value, |n| &mut n.value);
        });

        let read = registry.read();
        let row = read.get(handle).unwrap();
        assert_eq!(row.methods.len(), 2);
        assert_eq!(row.fields.len(), 1);
    }
}
