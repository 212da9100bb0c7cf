//! Registry rows and their member descriptors.
//!
//! A [`TypeDescriptor`] is the row the registry keeps for one registered
//! type. It owns every member collection together with the name indexes
//! used for O(1) member lookup. Member descriptors hold their type-erased
//! entry points ([`FieldAccessor`], [`Trampoline`], base casts) behind `Arc`s
//! so they can be handed out of the registry lock and called without it.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use rustc_hash::FxHashMap;

use refract_core::{
    AttributeValue, ModuleId, Name, NameId, ReflectError, ReflectResult, TypeHash, Value, coerce,
};

use crate::{Reflect, Trampoline};

bitflags! {
    /// Classification of a registered type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeFlags: u32 {
        /// The type declares enum values.
        const ENUM = 1 << 0;
        /// One of the built-in primitive types.
        const PRIMITIVE = 1 << 1;
        /// A zero-argument constructor is registered.
        const DEFAULT_CONSTRUCTIBLE = 1 << 2;
    }
}

bitflags! {
    /// Properties of a registered method.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MethodFlags: u32 {
        /// No receiver.
        const STATIC = 1 << 0;
        /// Takes `&mut self`.
        const MUTATING = 1 << 1;
    }
}

/// Publication state of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RowState {
    /// Inserted as a skeleton, `describe` still running. Invisible to readers.
    Pending,
    Published,
}

// ============================================================================
// Attributes
// ============================================================================

/// A `(key, value)` attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeDescriptor {
    pub key: Name,
    pub value: AttributeValue,
}

pub(crate) fn find_attribute<'a>(
    attributes: &'a [AttributeDescriptor],
    key: &str,
) -> Option<&'a AttributeValue> {
    attributes
        .iter()
        .find(|a| a.key.as_str() == key)
        .map(|a| &a.value)
}

// ============================================================================
// Fields
// ============================================================================

type FieldGet = dyn Fn(&dyn Any) -> Option<Value> + Send + Sync;
type FieldView = dyn Fn(&dyn Any) -> Option<&dyn Any> + Send + Sync;
type FieldSet = dyn Fn(&mut dyn Any, &Value) -> ReflectResult<()> + Send + Sync;

/// Type-erased read/write access to one field.
pub struct FieldAccessor {
    get: Box<FieldGet>,
    view: Box<FieldView>,
    set: Box<FieldSet>,
}

fn boxed_view<V>(view: V) -> Box<FieldView>
where
    V: Fn(&dyn Any) -> Option<&dyn Any> + Send + Sync + 'static,
{
    Box::new(view)
}

impl FieldAccessor {
    /// Build an accessor for a field of type `F` inside a `T`.
    pub fn new<T, F, G, M>(get: G, get_mut: M) -> Self
    where
        T: Reflect,
        F: Reflect,
        G: Fn(&T) -> &F + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut F + Send + Sync + 'static,
    {
        let get = Arc::new(get);
        let view_get = Arc::clone(&get);

        FieldAccessor {
            get: Box::new(move |object: &dyn Any| {
                object
                    .downcast_ref::<T>()
                    .map(|t| Value::new(get(t).clone()))
            }),
            view: boxed_view(move |object| {
                object
                    .downcast_ref::<T>()
                    .map(|t| view_get(t) as &dyn Any)
            }),
            set: Box::new(move |object: &mut dyn Any, value: &Value| -> ReflectResult<()> {
                let target = object
                    .downcast_mut::<T>()
                    .ok_or_else(|| ReflectError::MissingReceiver(T::type_name().to_string()))?;
                let converted = coerce::<F>(value).ok_or(ReflectError::TypeMismatch {
                    expected: F::type_hash(),
                    actual: value.type_hash(),
                })?;
                *get_mut(target) = converted;
                Ok(())
            }),
        }
    }

    /// Copy the field out of `object`. `None` if `object` has the wrong type.
    pub fn get(&self, object: &dyn Any) -> Option<Value> {
        (self.get)(object)
    }

    /// Borrow the field inside `object`.
    pub fn view<'a>(&self, object: &'a dyn Any) -> Option<&'a dyn Any> {
        (self.view)(object)
    }

    /// Overwrite the field, converting numeric values if needed.
    pub fn set(&self, object: &mut dyn Any, value: &Value) -> ReflectResult<()> {
        (self.set)(object, value)
    }
}

impl fmt::Debug for FieldAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldAccessor").finish_non_exhaustive()
    }
}

/// A directly stored data member.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: Name,
    pub type_hash: TypeHash,
    /// Byte offset inside the owning type, when known.
    pub offset: Option<usize>,
    pub accessor: Arc<FieldAccessor>,
    pub attributes: Vec<AttributeDescriptor>,
}

// ============================================================================
// Properties
// ============================================================================

/// Reads a property value out of an object.
pub type PropertyGetter = dyn Fn(&dyn Any) -> ReflectResult<Value> + Send + Sync;

/// Writes a property value into an object.
pub type PropertySetter = dyn Fn(&mut dyn Any, &Value) -> ReflectResult<()> + Send + Sync;

/// A computed member backed by getter and optional setter callables.
#[derive(Clone)]
pub struct PropertyDescriptor {
    pub name: Name,
    pub type_hash: TypeHash,
    pub getter: Arc<PropertyGetter>,
    pub setter: Option<Arc<PropertySetter>>,
    pub attributes: Vec<AttributeDescriptor>,
}

impl PropertyDescriptor {
    pub fn is_read_only(&self) -> bool {
        self.setter.is_none()
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("type_hash", &self.type_hash)
            .field("read_only", &self.is_read_only())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Methods and constructors
// ============================================================================

/// One overload of a method.
#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    pub name: Name,
    pub params: Vec<TypeHash>,
    pub return_type: TypeHash,
    pub flags: MethodFlags,
    /// Hash of owner, name and parameter types.
    pub signature: TypeHash,
    pub trampoline: Arc<Trampoline>,
    pub attributes: Vec<AttributeDescriptor>,
}

impl MethodDescriptor {
    #[inline]
    pub fn is_static(&self) -> bool {
        self.flags.contains(MethodFlags::STATIC)
    }

    #[inline]
    pub fn is_mutating(&self) -> bool {
        self.flags.contains(MethodFlags::MUTATING)
    }
}

/// One constructor overload.
#[derive(Debug, Clone)]
pub struct ConstructorDescriptor {
    pub params: Vec<TypeHash>,
    pub signature: TypeHash,
    pub trampoline: Arc<Trampoline>,
    pub attributes: Vec<AttributeDescriptor>,
}

/// One global function overload.
#[derive(Debug, Clone)]
pub struct FunctionDescriptor {
    pub name: Name,
    pub module: ModuleId,
    pub params: Vec<TypeHash>,
    pub return_type: TypeHash,
    pub signature: TypeHash,
    pub trampoline: Arc<Trampoline>,
}

// ============================================================================
// Bases
// ============================================================================

type Upcast = dyn Fn(&dyn Any) -> Option<&dyn Any> + Send + Sync;
type UpcastMut = dyn Fn(&mut dyn Any) -> Option<&mut dyn Any> + Send + Sync;
type Project = dyn Fn(&dyn Any) -> Option<Value> + Send + Sync;

struct BaseCasts {
    upcast: Box<Upcast>,
    upcast_mut: Box<UpcastMut>,
    project: Box<Project>,
}

fn boxed_upcast<U>(upcast: U) -> Box<Upcast>
where
    U: Fn(&dyn Any) -> Option<&dyn Any> + Send + Sync + 'static,
{
    Box::new(upcast)
}

fn boxed_upcast_mut<U>(upcast: U) -> Box<UpcastMut>
where
    U: Fn(&mut dyn Any) -> Option<&mut dyn Any> + Send + Sync + 'static,
{
    Box::new(upcast)
}

/// A link from a derived type to an embedded base subobject.
#[derive(Clone)]
pub struct BaseDescriptor {
    pub base: TypeHash,
    casts: Arc<BaseCasts>,
}

impl BaseDescriptor {
    /// Link `T` to its base `B` through accessor closures.
    pub fn new<T, B, U, M>(upcast: U, upcast_mut: M) -> Self
    where
        T: Reflect,
        B: Reflect,
        U: Fn(&T) -> &B + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut B + Send + Sync + 'static,
    {
        let upcast = Arc::new(upcast);
        let project_upcast = Arc::clone(&upcast);

        let casts = BaseCasts {
            upcast: boxed_upcast(move |object| {
                object.downcast_ref::<T>().map(|t| upcast(t) as &dyn Any)
            }),
            upcast_mut: boxed_upcast_mut(move |object| {
                object
                    .downcast_mut::<T>()
                    .map(|t| upcast_mut(t) as &mut dyn Any)
            }),
            project: Box::new(move |object: &dyn Any| {
                object
                    .downcast_ref::<T>()
                    .map(|t| Value::new(project_upcast(t).clone()))
            }),
        };

        BaseDescriptor {
            base: B::type_hash(),
            casts: Arc::new(casts),
        }
    }

    /// Borrow the base subobject of a derived object.
    pub fn upcast<'a>(&self, object: &'a dyn Any) -> Option<&'a dyn Any> {
        (self.casts.upcast)(object)
    }

    /// Mutably borrow the base subobject of a derived object.
    pub fn upcast_mut<'a>(&self, object: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        (self.casts.upcast_mut)(object)
    }

    /// Copy the base subobject out as a standalone value.
    pub fn project(&self, object: &dyn Any) -> Option<Value> {
        (self.casts.project)(object)
    }
}

impl fmt::Debug for BaseDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseDescriptor")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

/// A named enumerator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumValueDescriptor {
    pub name: Name,
    pub value: i64,
}

// ============================================================================
// Type rows
// ============================================================================

/// Everything the registry knows about one type.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    pub name: Name,
    pub type_hash: TypeHash,
    /// Module that registered (and owns) the row.
    pub module: ModuleId,
    pub size: usize,
    pub align: usize,
    pub flags: TypeFlags,

    // === Members ===
    pub fields: Vec<FieldDescriptor>,
    pub properties: Vec<PropertyDescriptor>,
    /// All method overloads, in declaration order.
    pub methods: Vec<MethodDescriptor>,
    pub constructors: Vec<ConstructorDescriptor>,
    pub bases: Vec<BaseDescriptor>,
    pub enum_values: Vec<EnumValueDescriptor>,
    pub attributes: Vec<AttributeDescriptor>,

    // === Indexes ===
    pub(crate) field_index: FxHashMap<NameId, u32>,
    pub(crate) property_index: FxHashMap<NameId, u32>,
    /// Overload sets: method name to positions in `methods`.
    pub(crate) method_index: FxHashMap<NameId, Vec<u32>>,

    pub(crate) state: RowState,
}

impl TypeDescriptor {
    pub(crate) fn skeleton(
        name: Name,
        type_hash: TypeHash,
        module: ModuleId,
        size: usize,
        align: usize,
        flags: TypeFlags,
    ) -> Self {
        Self {
            name,
            type_hash,
            module,
            size,
            align,
            flags,
            fields: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            bases: Vec::new(),
            enum_values: Vec::new(),
            attributes: Vec::new(),
            field_index: FxHashMap::default(),
            property_index: FxHashMap::default(),
            method_index: FxHashMap::default(),
            state: RowState::Pending,
        }
    }

    #[inline]
    pub fn is_enum(&self) -> bool {
        self.flags.contains(TypeFlags::ENUM)
    }

    #[inline]
    pub fn is_primitive(&self) -> bool {
        self.flags.contains(TypeFlags::PRIMITIVE)
    }

    #[inline]
    pub(crate) fn is_published(&self) -> bool {
        self.state == RowState::Published
    }

    // === Lookup ===

    /// Position of the field named `name`.
    pub fn field_position(&self, name: NameId) -> Option<u32> {
        self.field_index.get(&name).copied()
    }

    /// Position of the property named `name`.
    pub fn property_position(&self, name: NameId) -> Option<u32> {
        self.property_index.get(&name).copied()
    }

    /// Positions in `methods` of every overload named `name`.
    pub fn overloads(&self, name: NameId) -> &[u32] {
        self.method_index
            .get(&name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The zero-argument constructor, if one exists.
    pub fn default_constructor(&self) -> Option<u32> {
        self.constructors
            .iter()
            .position(|c| c.params.is_empty())
            .map(|i| i as u32)
    }

    pub fn enum_value(&self, name: &str) -> Option<i64> {
        self.enum_values
            .iter()
            .find(|e| e.name.as_str() == name)
            .map(|e| e.value)
    }

    /// Name of the first enumerator with `value`.
    pub fn enum_name(&self, value: i64) -> Option<&Name> {
        self.enum_values
            .iter()
            .find(|e| e.value == value)
            .map(|e| &e.name)
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        find_attribute(&self.attributes, key)
    }

    // === Mutation ===
    //
    // Every `add_*` returns `None` when the member duplicates one already
    // present and leaves the row unchanged in that case.

    pub(crate) fn add_field(&mut self, field: FieldDescriptor) -> Option<u32> {
        let id = field.name.id();
        if self.field_index.contains_key(&id) {
            return None;
        }
        let position = self.fields.len() as u32;
        self.fields.push(field);
        self.field_index.insert(id, position);
        Some(position)
    }

    pub(crate) fn add_property(&mut self, property: PropertyDescriptor) -> Option<u32> {
        let id = property.name.id();
        if self.property_index.contains_key(&id) {
            return None;
        }
        let position = self.properties.len() as u32;
        self.properties.push(property);
        self.property_index.insert(id, position);
        Some(position)
    }

    pub(crate) fn add_method(&mut self, method: MethodDescriptor) -> Option<u32> {
        if self.methods.iter().any(|m| m.signature == method.signature) {
            return None;
        }
        let position = self.methods.len() as u32;
        self.method_index
            .entry(method.name.id())
            .or_default()
            .push(position);
        self.methods.push(method);
        Some(position)
    }

    pub(crate) fn add_constructor(&mut self, ctor: ConstructorDescriptor) -> Option<u32> {
        if self.constructors.iter().any(|c| c.signature == ctor.signature) {
            return None;
        }
        if ctor.params.is_empty() {
            self.flags |= TypeFlags::DEFAULT_CONSTRUCTIBLE;
        }
        self.constructors.push(ctor);
        Some(self.constructors.len() as u32 - 1)
    }

    pub(crate) fn add_base(&mut self, base: BaseDescriptor) -> Option<u32> {
        if self.bases.iter().any(|b| b.base == base.base) {
            return None;
        }
        self.bases.push(base);
        Some(self.bases.len() as u32 - 1)
    }

    pub(crate) fn add_enum_value(&mut self, value: EnumValueDescriptor) -> Option<u32> {
        if self.enum_values.iter().any(|e| e.name == value.name) {
            return None;
        }
        self.flags |= TypeFlags::ENUM;
        self.enum_values.push(value);
        Some(self.enum_values.len() as u32 - 1)
    }

    /// Rebuild every name index from the member collections.
    pub(crate) fn rebuild_indexes(&mut self) {
        self.field_index = self
            .fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.id(), i as u32))
            .collect();
        self.property_index = self
            .properties
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.id(), i as u32))
            .collect();
        self.method_index.clear();
        for (i, method) in self.methods.iter().enumerate() {
            self.method_index
                .entry(method.name.id())
                .or_default()
                .push(i as u32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refract_core::{Interner, Typed};

    #[derive(Clone, Debug, PartialEq)]
    struct Inner {
        a: i32,
    }

    impl Typed for Inner {
        fn type_name() -> &'static str {
            "Inner"
        }
    }

    impl Reflect for Inner {}

    #[derive(Clone, Debug, PartialEq)]
    struct Outer {
        inner: Inner,
        scale: f64,
    }

    impl Typed for Outer {
        fn type_name() -> &'static str {
            "Outer"
        }
    }

    impl Reflect for Outer {}

    fn row(interner: &mut Interner) -> TypeDescriptor {
        TypeDescriptor::skeleton(
            interner.intern("Outer"),
            Outer::type_hash(),
            ModuleId::HOST,
            size_of::<Outer>(),
            align_of::<Outer>(),
            TypeFlags::empty(),
        )
    }

    fn scale_field(interner: &mut Interner) -> FieldDescriptor {
        FieldDescriptor {
            name: interner.intern("scale"),
            type_hash: f64::type_hash(),
            offset: None,
            accessor: Arc::new(FieldAccessor::new::<Outer, f64, _, _>(
                |o| &o.scale,
                |o| &mut o.scale,
            )),
            attributes: Vec::new(),
        }
    }

    #[test]
    fn field_accessor_reads_and_converts_on_write() {
        let accessor = FieldAccessor::new::<Outer, f64, _, _>(|o| &o.scale, |o| &mut o.scale);
        let mut outer = Outer {
            inner: Inner { a: 1 },
            scale: 2.0,
        };

        assert_eq!(accessor.get(&outer).unwrap().get::<f64>(), Some(&2.0));
        assert_eq!(
            accessor.view(&outer).unwrap().downcast_ref::<f64>(),
            Some(&2.0)
        );

        accessor.set(&mut outer, &Value::new(3i32)).unwrap();
        assert_eq!(outer.scale, 3.0);

        let err = accessor
            .set(&mut outer, &Value::new(String::from("x")))
            .unwrap_err();
        assert!(matches!(err, ReflectError::TypeMismatch { .. }));

        assert!(accessor.get(&5i32).is_none());
    }

    #[test]
    fn base_casts() {
        let base = BaseDescriptor::new::<Outer, Inner, _, _>(|o| &o.inner, |o| &mut o.inner);
        let mut outer = Outer {
            inner: Inner { a: 7 },
            scale: 1.0,
        };

        assert_eq!(base.base, Inner::type_hash());
        assert_eq!(
            base.upcast(&outer).unwrap().downcast_ref::<Inner>(),
            Some(&Inner { a: 7 })
        );

        base.upcast_mut(&mut outer)
            .unwrap()
            .downcast_mut::<Inner>()
            .unwrap()
            .a = 9;
        assert_eq!(outer.inner.a, 9);

        let projected = base.project(&outer).unwrap();
        assert_eq!(projected.get::<Inner>(), Some(&Inner { a: 9 }));
    }

    #[test]
    fn duplicate_members_are_rejected() {
        let mut interner = Interner::new();
        let mut row = row(&mut interner);

        assert_eq!(row.add_field(scale_field(&mut interner)), Some(0));
        assert_eq!(row.add_field(scale_field(&mut interner)), None);
        assert_eq!(row.fields.len(), 1);

        let id = interner.intern("scale").id();
        assert_eq!(row.field_position(id), Some(0));
    }

    #[test]
    fn enum_values_set_flag() {
        let mut interner = Interner::new();
        let mut row = row(&mut interner);

        row.add_enum_value(EnumValueDescriptor {
            name: interner.intern("Red"),
            value: 0,
        });
        row.add_enum_value(EnumValueDescriptor {
            name: interner.intern("Green"),
            value: 1,
        });

        assert!(row.is_enum());
        assert_eq!(row.enum_value("Green"), Some(1));
        assert_eq!(row.enum_name(0).map(Name::as_str), Some("Red"));
        assert_eq!(row.enum_value("Blue"), None);
    }

    #[test]
    fn rebuild_indexes_matches_collections() {
        let mut interner = Interner::new();
        let mut row = row(&mut interner);
        row.add_field(scale_field(&mut interner));

        row.field_index.clear();
        row.rebuild_indexes();

        let id = interner.intern("scale").id();
        assert_eq!(row.field_position(id), Some(0));
    }
}
