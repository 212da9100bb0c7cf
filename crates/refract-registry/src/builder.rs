//! TypeBuilder for describing a type's members to the registry.
//!
//! A [`TypeBuilder`] is handed to [`Reflect::describe`] (and to
//! [`Registry::extend`]). Every declaration is collected into a draft that is
//! committed to the registry row in one step once the pass ends, so readers
//! never observe a half-described type.
//!
//! Parameter, return, field and property types are registered on the spot,
//! which is what makes a single `ensure_registered` call pull in the whole
//! graph of types reachable from a signature.
//!
//! # Example
//!
//! ```ignore
//! impl Reflect for Calc {
//!     fn describe(t: &mut TypeBuilder<'_, Self>) {
//!         t.constructor(|| Calc);
//!         t.method("mul", |_: &Calc, a: i32, b: i32| a * b);
//!         t.method("mul", |_: &Calc, a: f64, b: f64| a * b)
//!             .attribute("pure", true);
//!         t.property("name", |_: &Calc| String::from("calc"));
//!     }
//! }
//! ```

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use refract_core::{
    AttributeValue, ModuleId, Name, ReflectError, ReflectResult, TypeHash, Typed, Value, coerce,
};

use crate::descriptor::{
    AttributeDescriptor, BaseDescriptor, ConstructorDescriptor, EnumValueDescriptor,
    FieldAccessor, FieldDescriptor, MethodDescriptor, MethodFlags, PropertyDescriptor,
};
use crate::{IntoFunction, IntoMethod, IntoMethodMut, Reflect, Registry, TypeHandle};

/// Members collected by one builder pass.
#[derive(Default)]
pub(crate) struct TypeDraft {
    pub(crate) name: Option<Name>,
    pub(crate) fields: Vec<FieldDescriptor>,
    pub(crate) properties: Vec<PropertyDescriptor>,
    pub(crate) methods: Vec<MethodDescriptor>,
    pub(crate) constructors: Vec<ConstructorDescriptor>,
    pub(crate) bases: Vec<BaseDescriptor>,
    pub(crate) enum_values: Vec<EnumValueDescriptor>,
    pub(crate) attributes: Vec<AttributeDescriptor>,
}

/// Builder for declaring the members of `T`.
pub struct TypeBuilder<'r, T: Reflect> {
    registry: &'r Registry,
    handle: TypeHandle,
    module: ModuleId,
    draft: TypeDraft,
    _marker: PhantomData<fn() -> T>,
}

impl<'r, T: Reflect> TypeBuilder<'r, T> {
    pub(crate) fn new(registry: &'r Registry, handle: TypeHandle, module: ModuleId) -> Self {
        Self {
            registry,
            handle,
            module,
            draft: TypeDraft::default(),
            _marker: PhantomData,
        }
    }

    pub(crate) fn finish(self) -> TypeDraft {
        self.draft
    }

    /// The registry being populated.
    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Handle of the row being described.
    pub fn handle(&self) -> TypeHandle {
        self.handle
    }

    /// Module that owns the row.
    pub fn module(&self) -> ModuleId {
        self.module
    }

    fn intern(&self, text: &str) -> Name {
        self.registry.intern_in(text, self.module)
    }

    /// Override the registered name. The type hash is not affected.
    pub fn set_name(&mut self, name: &str) -> &mut Self {
        self.draft.name = Some(self.intern(name));
        self
    }

    /// Attach a type-level attribute.
    pub fn attribute(&mut self, key: &str, value: impl Into<AttributeValue>) -> &mut Self {
        let attribute = self.registry.attribute(key, value.into(), self.module);
        self.draft.attributes.push(attribute);
        self
    }

    // ==========================================================================
    // Data members
    // ==========================================================================

    /// Declare a field through a pair of projections.
    pub fn field<F, G, M>(&mut self, name: &str, get: G, get_mut: M) -> MemberBuilder<'_>
    where
        F: Reflect,
        G: Fn(&T) -> &F + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut F + Send + Sync + 'static,
    {
        let type_hash = self.registry.register_param::<F>(self.module);
        let field = FieldDescriptor {
            name: self.intern(name),
            type_hash,
            offset: None,
            accessor: Arc::new(FieldAccessor::new::<T, F, G, M>(get, get_mut)),
            attributes: Vec::new(),
        };

        let (registry, module) = (self.registry, self.module);
        let index = self.draft.fields.len();
        self.draft.fields.push(field);
        let field = &mut self.draft.fields[index];
        MemberBuilder {
            registry,
            module,
            attributes: &mut field.attributes,
            offset: Some(&mut field.offset),
        }
    }

    /// Declare a read-only computed property.
    pub fn property<P, G>(&mut self, name: &str, getter: G) -> MemberBuilder<'_>
    where
        P: Reflect,
        G: Fn(&T) -> P + Send + Sync + 'static,
    {
        let property = PropertyDescriptor {
            name: self.intern(name),
            type_hash: self.registry.register_param::<P>(self.module),
            getter: Arc::new(move |object: &dyn Any| -> ReflectResult<Value> {
                let target = object
                    .downcast_ref::<T>()
                    .ok_or_else(|| ReflectError::MissingReceiver(T::type_name().to_string()))?;
                Ok(Value::new(getter(target)))
            }),
            setter: None,
            attributes: Vec::new(),
        };
        self.push_property(property)
    }

    /// Declare a read-write computed property.
    pub fn property_rw<P, G, S>(&mut self, name: &str, getter: G, setter: S) -> MemberBuilder<'_>
    where
        P: Reflect,
        G: Fn(&T) -> P + Send + Sync + 'static,
        S: Fn(&mut T, P) + Send + Sync + 'static,
    {
        let index = self.draft.properties.len();
        let _ = self.property(name, getter);
        let property = &mut self.draft.properties[index];
        property.setter = Some(Arc::new(
            move |object: &mut dyn Any, value: &Value| -> ReflectResult<()> {
                let target = object
                    .downcast_mut::<T>()
                    .ok_or_else(|| ReflectError::MissingReceiver(T::type_name().to_string()))?;
                let converted = coerce::<P>(value).ok_or(ReflectError::TypeMismatch {
                    expected: P::type_hash(),
                    actual: value.type_hash(),
                })?;
                setter(target, converted);
                Ok(())
            },
        ));

        MemberBuilder {
            registry: self.registry,
            module: self.module,
            attributes: &mut property.attributes,
            offset: None,
        }
    }

    fn push_property(&mut self, property: PropertyDescriptor) -> MemberBuilder<'_> {
        let (registry, module) = (self.registry, self.module);
        let index = self.draft.properties.len();
        self.draft.properties.push(property);
        MemberBuilder {
            registry,
            module,
            attributes: &mut self.draft.properties[index].attributes,
            offset: None,
        }
    }

    // ==========================================================================
    // Callables
    // ==========================================================================

    /// Declare a `&self` method overload.
    pub fn method<F, M>(&mut self, name: &str, f: F) -> MemberBuilder<'_>
    where
        F: IntoMethod<T, M>,
    {
        let signature = F::signature(self.registry, self.module);
        let method = MethodDescriptor {
            name: self.intern(name),
            signature: TypeHash::from_method(T::type_hash(), name, &signature.params),
            params: signature.params,
            return_type: signature.return_type,
            flags: MethodFlags::empty(),
            trampoline: Arc::new(f.into_trampoline()),
            attributes: Vec::new(),
        };
        self.push_method(method)
    }

    /// Declare a `&mut self` method overload.
    pub fn method_mut<F, M>(&mut self, name: &str, f: F) -> MemberBuilder<'_>
    where
        F: IntoMethodMut<T, M>,
    {
        let signature = F::signature(self.registry, self.module);
        let method = MethodDescriptor {
            name: self.intern(name),
            signature: TypeHash::from_method(T::type_hash(), name, &signature.params),
            params: signature.params,
            return_type: signature.return_type,
            flags: MethodFlags::MUTATING,
            trampoline: Arc::new(f.into_trampoline()),
            attributes: Vec::new(),
        };
        self.push_method(method)
    }

    /// Declare a static method overload (no receiver).
    pub fn static_method<F, M>(&mut self, name: &str, f: F) -> MemberBuilder<'_>
    where
        F: IntoFunction<M>,
    {
        let signature = F::signature(self.registry, self.module);
        let method = MethodDescriptor {
            name: self.intern(name),
            signature: TypeHash::from_method(T::type_hash(), name, &signature.params),
            params: signature.params,
            return_type: signature.return_type,
            flags: MethodFlags::STATIC,
            trampoline: Arc::new(f.into_trampoline()),
            attributes: Vec::new(),
        };
        self.push_method(method)
    }

    fn push_method(&mut self, method: MethodDescriptor) -> MemberBuilder<'_> {
        let (registry, module) = (self.registry, self.module);
        let index = self.draft.methods.len();
        self.draft.methods.push(method);
        MemberBuilder {
            registry,
            module,
            attributes: &mut self.draft.methods[index].attributes,
            offset: None,
        }
    }

    /// Declare a constructor overload.
    pub fn constructor<F, M>(&mut self, f: F) -> MemberBuilder<'_>
    where
        F: IntoFunction<M, Output = T>,
    {
        let signature = F::signature(self.registry, self.module);
        let ctor = ConstructorDescriptor {
            signature: TypeHash::from_constructor(T::type_hash(), &signature.params),
            params: signature.params,
            trampoline: Arc::new(f.into_trampoline()),
            attributes: Vec::new(),
        };

        let (registry, module) = (self.registry, self.module);
        let index = self.draft.constructors.len();
        self.draft.constructors.push(ctor);
        MemberBuilder {
            registry,
            module,
            attributes: &mut self.draft.constructors[index].attributes,
            offset: None,
        }
    }

    /// Declare the zero-argument constructor from `Default`.
    pub fn default_constructor(&mut self) -> MemberBuilder<'_>
    where
        T: Default,
    {
        self.constructor(T::default)
    }

    // ==========================================================================
    // Structure
    // ==========================================================================

    /// Declare an embedded base subobject.
    pub fn base<B, U, M>(&mut self, upcast: U, upcast_mut: M) -> &mut Self
    where
        B: Reflect,
        U: Fn(&T) -> &B + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut B + Send + Sync + 'static,
    {
        self.registry.register_param::<B>(self.module);
        self.draft
            .bases
            .push(BaseDescriptor::new::<T, B, U, M>(upcast, upcast_mut));
        self
    }

    /// Declare an enumerator.
    pub fn enum_value(&mut self, name: &str, value: i64) -> &mut Self {
        let name = self.intern(name);
        self.draft
            .enum_values
            .push(EnumValueDescriptor { name, value });
        self
    }
}

/// Attaches details to the member that was just declared.
pub struct MemberBuilder<'b> {
    registry: &'b Registry,
    module: ModuleId,
    attributes: &'b mut Vec<AttributeDescriptor>,
    offset: Option<&'b mut Option<usize>>,
}

impl MemberBuilder<'_> {
    /// Attach an attribute to the member.
    pub fn attribute(self, key: &str, value: impl Into<AttributeValue>) -> Self {
        let attribute = self.registry.attribute(key, value.into(), self.module);
        self.attributes.push(attribute);
        self
    }

    /// Record the byte offset of a field. Ignored for other members.
    pub fn offset(mut self, bytes: usize) -> Self {
        if let Some(offset) = self.offset.as_deref_mut() {
            *offset = Some(bytes);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refract_core::primitives;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Gauge {
        level: i32,
    }

    impl Typed for Gauge {
        fn type_name() -> &'static str {
            "Gauge"
        }
    }

    impl Reflect for Gauge {
        fn describe(t: &mut TypeBuilder<'_, Self>) {
            t.field("level", |g| &g.level, |g| &mut g.level)
                .attribute("unit", "percent")
                .offset(0);
            t.property_rw("doubled", |g: &Gauge| g.level * 2, |g: &mut Gauge, v: i32| {
                g.level = v / 2
            });
            t.method("get", |g: &Gauge| g.level);
            t.method_mut("bump", |g: &mut Gauge, by: i32| g.level += by);
            t.static_method("max", || 100i32);
            t.default_constructor();
            t.attribute("category", "instruments");
        }
    }

    #[test]
    fn describe_populates_row() {
        let registry = Registry::new();
        let handle = registry.ensure_registered::<Gauge>();
        let read = registry.read();
        let row = read.get(handle).unwrap();

        assert_eq!(row.fields.len(), 1);
        assert_eq!(row.fields[0].type_hash, primitives::I32);
        assert_eq!(row.fields[0].offset, Some(0));
        assert_eq!(
            row.fields[0].attributes[0].value,
            AttributeValue::from("percent")
        );
        assert_eq!(row.properties.len(), 1);
        assert!(!row.properties[0].is_read_only());
        assert_eq!(row.methods.len(), 3);
        assert!(row.methods[1].is_mutating());
        assert!(row.methods[2].is_static());
        assert_eq!(row.constructors.len(), 1);
        assert_eq!(row.attribute("category").and_then(|v| v.as_str()), Some("instruments"));
    }

    #[test]
    fn property_setter_converts() {
        let registry = Registry::new();
        let handle = registry.ensure_registered::<Gauge>();
        let setter = registry.read().get(handle).unwrap().properties[0]
            .setter
            .clone()
            .unwrap();

        let mut gauge = Gauge::default();
        setter(&mut gauge, &Value::new(10.0f64)).unwrap();
        assert_eq!(gauge.level, 5);
    }

    #[test]
    fn set_name_overrides_registered_name() {
        let registry = Registry::new();
        let handle = registry.extend::<Gauge>(|t| {
            t.set_name("instruments::Gauge");
        });

        assert_eq!(registry.type_by_name("instruments::Gauge"), Some(handle));
        assert_eq!(registry.type_by_name("Gauge"), None);
        assert_eq!(registry.type_by_hash(Gauge::type_hash()), Some(handle));
    }
}
