//! The [`Type`] wrapper.

use std::sync::Arc;

use refract_core::{AttributeValue, ModuleId, ReflectError, ReflectResult, TypeHash, Value};
use refract_registry::{
    AttributeDescriptor, Receiver, Reflect, Registry, ResolvedCall, TypeDescriptor, TypeHandle,
};

use crate::member::{Base, Constructor, EnumValue, Field, Method, Property};

/// A registered type.
///
/// `Type` pairs a [`TypeHandle`] with the registry it came from. Every
/// accessor re-validates the handle, so a `Type` that outlives its row (the
/// owning module was unregistered, or a merge replaced it) keeps answering
/// with empty defaults: `""`, [`TypeHash::EMPTY`], `0`, empty vectors and
/// `None`. Fallible operations return [`ReflectError::StaleHandle`].
#[derive(Debug, Clone, Copy)]
pub struct Type<'r> {
    registry: &'r Registry,
    handle: TypeHandle,
}

impl PartialEq for Type<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.registry, other.registry) && self.handle == other.handle
    }
}

impl Eq for Type<'_> {}

impl Type<'static> {
    /// `T` in the global registry, registering it on first use.
    pub fn of<T: Reflect>() -> Self {
        Self::in_registry::<T>(Registry::global())
    }
}

impl<'r> Type<'r> {
    /// `T` in `registry`, registering it on first use.
    pub fn in_registry<T: Reflect>(registry: &'r Registry) -> Self {
        Type {
            registry,
            handle: registry.ensure_registered::<T>(),
        }
    }

    pub fn find(registry: &'r Registry, name: &str) -> Option<Self> {
        registry
            .type_by_name(name)
            .map(|handle| Type { registry, handle })
    }

    pub fn find_by_hash(registry: &'r Registry, hash: TypeHash) -> Option<Self> {
        registry
            .type_by_hash(hash)
            .map(|handle| Type { registry, handle })
    }

    pub fn from_handle(registry: &'r Registry, handle: TypeHandle) -> Self {
        Type { registry, handle }
    }

    #[inline]
    pub fn handle(&self) -> TypeHandle {
        self.handle
    }

    #[inline]
    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Run `f` on the live row, if there is one.
    fn with_row<R>(&self, f: impl FnOnce(&TypeDescriptor) -> R) -> Option<R> {
        let read = self.registry.read();
        read.get(self.handle).map(f)
    }

    pub fn is_valid(&self) -> bool {
        self.registry.is_alive(self.handle)
    }

    // ==========================================================================
    // Identity
    // ==========================================================================

    pub fn name(&self) -> Arc<str> {
        self.with_row(|row| row.name.text())
            .unwrap_or_else(|| Arc::from(""))
    }

    pub fn type_hash(&self) -> TypeHash {
        self.with_row(|row| row.type_hash)
            .unwrap_or(TypeHash::EMPTY)
    }

    pub fn module(&self) -> ModuleId {
        self.with_row(|row| row.module).unwrap_or_default()
    }

    pub fn generation(&self) -> u32 {
        if self.is_valid() {
            self.handle.generation()
        } else {
            0
        }
    }

    pub fn size(&self) -> usize {
        self.with_row(|row| row.size).unwrap_or(0)
    }

    pub fn align(&self) -> usize {
        self.with_row(|row| row.align).unwrap_or(0)
    }

    pub fn is_enum(&self) -> bool {
        self.with_row(TypeDescriptor::is_enum).unwrap_or(false)
    }

    pub fn is_primitive(&self) -> bool {
        self.with_row(TypeDescriptor::is_primitive)
            .unwrap_or(false)
    }

    // ==========================================================================
    // Members
    // ==========================================================================

    pub fn fields(&self) -> Vec<Field<'r>> {
        let count = self.with_row(|row| row.fields.len()).unwrap_or(0);
        (0..count as u32)
            .map(|sub| Field::new(self.registry, self.handle.member(sub)))
            .collect()
    }

    pub fn field(&self, name: &str) -> Option<Field<'r>> {
        let id = self.registry.find_name(name)?;
        let sub = self.with_row(|row| row.field_position(id)).flatten()?;
        Some(Field::new(self.registry, self.handle.member(sub)))
    }

    pub fn properties(&self) -> Vec<Property<'r>> {
        let count = self.with_row(|row| row.properties.len()).unwrap_or(0);
        (0..count as u32)
            .map(|sub| Property::new(self.registry, self.handle.member(sub)))
            .collect()
    }

    pub fn property(&self, name: &str) -> Option<Property<'r>> {
        let id = self.registry.find_name(name)?;
        let sub = self
            .with_row(|row| row.property_position(id))
            .flatten()?;
        Some(Property::new(self.registry, self.handle.member(sub)))
    }

    /// Every method overload, in declaration order.
    pub fn methods(&self) -> Vec<Method<'r>> {
        let count = self.with_row(|row| row.methods.len()).unwrap_or(0);
        (0..count as u32)
            .map(|sub| Method::new(self.registry, self.handle.member(sub)))
            .collect()
    }

    /// The overload set declared under `name` by this type itself.
    pub fn methods_named(&self, name: &str) -> Vec<Method<'r>> {
        let Some(id) = self.registry.find_name(name) else {
            return Vec::new();
        };
        self.with_row(|row| row.overloads(id).to_vec())
            .unwrap_or_default()
            .into_iter()
            .map(|sub| Method::new(self.registry, self.handle.member(sub)))
            .collect()
    }

    pub fn constructors(&self) -> Vec<Constructor<'r>> {
        let count = self
            .with_row(|row| row.constructors.len())
            .unwrap_or(0);
        (0..count as u32)
            .map(|sub| Constructor::new(self.registry, self.handle.member(sub)))
            .collect()
    }

    pub fn bases(&self) -> Vec<Base<'r>> {
        let count = self.with_row(|row| row.bases.len()).unwrap_or(0);
        (0..count as u32)
            .map(|sub| Base::new(self.registry, self.handle.member(sub)))
            .collect()
    }

    /// True if `other` is this type or is reachable through base links.
    pub fn derives_from(&self, other: TypeHash) -> bool {
        let mut pending = vec![*self];
        let mut seen = Vec::new();
        while let Some(ty) = pending.pop() {
            let hash = ty.type_hash();
            if hash == other {
                return true;
            }
            if hash.is_empty() || seen.contains(&hash) {
                continue;
            }
            seen.push(hash);
            pending.extend(ty.bases().iter().filter_map(Base::base_type));
        }
        false
    }

    pub fn enum_values(&self) -> Vec<EnumValue<'r>> {
        let count = self
            .with_row(|row| row.enum_values.len())
            .unwrap_or(0);
        (0..count as u32)
            .map(|sub| EnumValue::new(self.registry, self.handle.member(sub)))
            .collect()
    }

    pub fn enum_value(&self, name: &str) -> Option<i64> {
        self.with_row(|row| row.enum_value(name)).flatten()
    }

    pub fn enum_name(&self, value: i64) -> Option<Arc<str>> {
        self.with_row(|row| row.enum_name(value).map(|n| n.text()))
            .flatten()
    }

    pub fn attributes(&self) -> Vec<AttributeDescriptor> {
        self.with_row(|row| row.attributes.clone())
            .unwrap_or_default()
    }

    pub fn attribute(&self, key: &str) -> Option<AttributeValue> {
        self.with_row(|row| row.attribute(key).cloned()).flatten()
    }

    // ==========================================================================
    // Construction and calls
    // ==========================================================================

    /// Build a value through the constructor that best fits `args`.
    pub fn construct(&self, args: &[Value]) -> ReflectResult<Value> {
        self.registry.construct(self.handle, args)
    }

    /// Build a value through the zero-argument constructor.
    pub fn construct_default(&self) -> ReflectResult<Value> {
        self.construct(&[])
    }

    pub fn resolve_constructor(&self, args: &[TypeHash]) -> ReflectResult<ResolvedCall<'r>> {
        self.registry.resolve_constructor(self.handle, args)
    }

    pub fn resolve_method(&self, name: &str, args: &[TypeHash]) -> ReflectResult<ResolvedCall<'r>> {
        self.registry.resolve_method(self.handle, name, args)
    }

    /// Resolve and call method `name` on `receiver`.
    pub fn invoke(&self, receiver: Receiver<'_>, name: &str, args: &[Value]) -> ReflectResult<Value> {
        self.registry
            .invoke_method(self.handle, receiver, name, args)
    }

    /// Resolve and call a static method.
    pub fn invoke_static(&self, name: &str, args: &[Value]) -> ReflectResult<Value> {
        self.invoke(Receiver::None, name, args)
    }

    /// Clone field `name` out of `object`.
    pub fn get_field(&self, object: &dyn std::any::Any, name: &str) -> ReflectResult<Value> {
        self.field(name)
            .ok_or_else(|| ReflectError::not_found("field", name))?
            .get(object)
    }
}
