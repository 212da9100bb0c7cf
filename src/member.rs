//! Member wrappers: fields, properties, methods, constructors, enumerators
//! and base links.
//!
//! Each wrapper is a [`MemberHandle`] plus the registry it belongs to.
//! Accessors on a stale wrapper return empty defaults and fallible
//! operations return [`ReflectError::StaleHandle`].

use std::any::Any;
use std::sync::Arc;

use refract_core::{AttributeValue, ReflectError, ReflectResult, TypeHash, Value};
use refract_registry::{
    AttributeDescriptor, BaseDescriptor, ConstructorDescriptor, EnumValueDescriptor,
    FieldDescriptor, MemberHandle, MethodDescriptor, PropertyDescriptor, Receiver, Registry,
    ResolvedCall,
};

use crate::Type;

fn find_attribute(attributes: &[AttributeDescriptor], key: &str) -> Option<AttributeValue> {
    attributes
        .iter()
        .find(|a| a.key.as_str() == key)
        .map(|a| a.value.clone())
}

macro_rules! member_wrapper {
    ($(#[$meta:meta])* $name:ident => $descriptor:ty, $collection:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name<'r> {
            registry: &'r Registry,
            handle: MemberHandle,
        }

        impl<'r> $name<'r> {
            pub(crate) fn new(registry: &'r Registry, handle: MemberHandle) -> Self {
                Self { registry, handle }
            }

            #[inline]
            pub fn handle(&self) -> MemberHandle {
                self.handle
            }

            /// The type that declares this member.
            pub fn owner(&self) -> Type<'r> {
                Type::from_handle(self.registry, self.handle.owner())
            }

            /// Run `f` on the live descriptor, if there is one.
            fn with<R>(&self, f: impl FnOnce(&$descriptor) -> R) -> Option<R> {
                let read = self.registry.read();
                read.get(self.handle.owner())
                    .and_then(|row| row.$collection.get(self.handle.sub() as usize))
                    .map(f)
            }

            pub fn is_valid(&self) -> bool {
                self.with(|_| ()).is_some()
            }
        }

        impl PartialEq for $name<'_> {
            fn eq(&self, other: &Self) -> bool {
                std::ptr::eq(self.registry, other.registry) && self.handle == other.handle
            }
        }

        impl Eq for $name<'_> {}
    };
}

member_wrapper! {
    /// A data member stored directly in its owner.
    Field => FieldDescriptor, fields
}
member_wrapper! {
    /// A data member computed by accessor functions.
    Property => PropertyDescriptor, properties
}
member_wrapper! {
    /// One method overload.
    Method => MethodDescriptor, methods
}
member_wrapper! {
    /// One constructor overload.
    Constructor => ConstructorDescriptor, constructors
}
member_wrapper! {
    /// One enumerator of an enum type.
    EnumValue => EnumValueDescriptor, enum_values
}
member_wrapper! {
    /// A link from a type to an embedded base subobject.
    Base => BaseDescriptor, bases
}

// ============================================================================
// Field
// ============================================================================

impl<'r> Field<'r> {
    pub fn name(&self) -> Arc<str> {
        self.with(|f| f.name.text()).unwrap_or_else(|| Arc::from(""))
    }

    pub fn type_hash(&self) -> TypeHash {
        self.with(|f| f.type_hash).unwrap_or(TypeHash::EMPTY)
    }

    /// Byte offset within the owner, when it was declared.
    pub fn offset(&self) -> Option<usize> {
        self.with(|f| f.offset).flatten()
    }

    pub fn attributes(&self) -> Vec<AttributeDescriptor> {
        self.with(|f| f.attributes.clone()).unwrap_or_default()
    }

    pub fn attribute(&self, key: &str) -> Option<AttributeValue> {
        self.with(|f| find_attribute(&f.attributes, key)).flatten()
    }

    fn missing_receiver(&self) -> ReflectError {
        ReflectError::MissingReceiver(format!("{}::{}", self.owner().name(), self.name()))
    }

    /// Clone the field out of `object`.
    pub fn get(&self, object: &dyn Any) -> ReflectResult<Value> {
        let accessor = self
            .with(|f| Arc::clone(&f.accessor))
            .ok_or(ReflectError::StaleHandle)?;
        accessor
            .get(object)
            .ok_or_else(|| self.missing_receiver())
    }

    /// Borrow the field inside `object`.
    pub fn view<'a>(&self, object: &'a dyn Any) -> ReflectResult<&'a dyn Any> {
        let accessor = self
            .with(|f| Arc::clone(&f.accessor))
            .ok_or(ReflectError::StaleHandle)?;
        accessor
            .view(object)
            .ok_or_else(|| self.missing_receiver())
    }

    /// Overwrite the field in `object`, converting numeric values.
    pub fn set(&self, object: &mut dyn Any, value: &Value) -> ReflectResult<()> {
        let accessor = self
            .with(|f| Arc::clone(&f.accessor))
            .ok_or(ReflectError::StaleHandle)?;
        accessor.set(object, value)
    }
}

// ============================================================================
// Property
// ============================================================================

impl<'r> Property<'r> {
    pub fn name(&self) -> Arc<str> {
        self.with(|p| p.name.text()).unwrap_or_else(|| Arc::from(""))
    }

    pub fn type_hash(&self) -> TypeHash {
        self.with(|p| p.type_hash).unwrap_or(TypeHash::EMPTY)
    }

    pub fn is_read_only(&self) -> bool {
        self.with(PropertyDescriptor::is_read_only).unwrap_or(true)
    }

    pub fn attributes(&self) -> Vec<AttributeDescriptor> {
        self.with(|p| p.attributes.clone()).unwrap_or_default()
    }

    pub fn attribute(&self, key: &str) -> Option<AttributeValue> {
        self.with(|p| find_attribute(&p.attributes, key)).flatten()
    }

    /// Run the getter on `object`.
    pub fn get(&self, object: &dyn Any) -> ReflectResult<Value> {
        let getter = self
            .with(|p| Arc::clone(&p.getter))
            .ok_or(ReflectError::StaleHandle)?;
        getter(object)
    }

    /// Run the setter on `object`.
    pub fn set(&self, object: &mut dyn Any, value: &Value) -> ReflectResult<()> {
        let (name, setter) = self
            .with(|p| (p.name.to_string(), p.setter.clone()))
            .ok_or(ReflectError::StaleHandle)?;
        let setter = setter.ok_or(ReflectError::ReadOnlyProperty(name))?;
        setter(object, value)
    }
}

// ============================================================================
// Method
// ============================================================================

impl<'r> Method<'r> {
    pub fn name(&self) -> Arc<str> {
        self.with(|m| m.name.text()).unwrap_or_else(|| Arc::from(""))
    }

    pub fn params(&self) -> Vec<TypeHash> {
        self.with(|m| m.params.clone()).unwrap_or_default()
    }

    pub fn return_type(&self) -> TypeHash {
        self.with(|m| m.return_type).unwrap_or(TypeHash::EMPTY)
    }

    /// Identity of the owner, name and parameter list together.
    pub fn signature(&self) -> TypeHash {
        self.with(|m| m.signature).unwrap_or(TypeHash::EMPTY)
    }

    pub fn is_static(&self) -> bool {
        self.with(MethodDescriptor::is_static).unwrap_or(false)
    }

    pub fn is_mutating(&self) -> bool {
        self.with(MethodDescriptor::is_mutating).unwrap_or(false)
    }

    pub fn attributes(&self) -> Vec<AttributeDescriptor> {
        self.with(|m| m.attributes.clone()).unwrap_or_default()
    }

    pub fn attribute(&self, key: &str) -> Option<AttributeValue> {
        self.with(|m| find_attribute(&m.attributes, key)).flatten()
    }

    /// A call to exactly this overload.
    pub fn call(&self) -> ReflectResult<ResolvedCall<'r>> {
        self.registry.method_call(self.handle)
    }

    /// Call this overload. The receiver must be of the declaring type.
    pub fn invoke(&self, receiver: Receiver<'_>, args: &[Value]) -> ReflectResult<Value> {
        self.call()?.invoke(receiver, args)
    }
}

// ============================================================================
// Constructor
// ============================================================================

impl<'r> Constructor<'r> {
    pub fn params(&self) -> Vec<TypeHash> {
        self.with(|c| c.params.clone()).unwrap_or_default()
    }

    pub fn signature(&self) -> TypeHash {
        self.with(|c| c.signature).unwrap_or(TypeHash::EMPTY)
    }

    pub fn attributes(&self) -> Vec<AttributeDescriptor> {
        self.with(|c| c.attributes.clone()).unwrap_or_default()
    }

    pub fn attribute(&self, key: &str) -> Option<AttributeValue> {
        self.with(|c| find_attribute(&c.attributes, key)).flatten()
    }

    pub fn call(&self) -> ReflectResult<ResolvedCall<'r>> {
        self.registry.constructor_call(self.handle)
    }

    /// Build a value with this constructor.
    pub fn invoke(&self, args: &[Value]) -> ReflectResult<Value> {
        self.call()?.invoke(Receiver::None, args)
    }
}

// ============================================================================
// EnumValue
// ============================================================================

impl EnumValue<'_> {
    pub fn name(&self) -> Arc<str> {
        self.with(|v| v.name.text()).unwrap_or_else(|| Arc::from(""))
    }

    pub fn value(&self) -> i64 {
        self.with(|v| v.value).unwrap_or(0)
    }
}

// ============================================================================
// Base
// ============================================================================

impl<'r> Base<'r> {
    /// Hash of the base type.
    pub fn type_hash(&self) -> TypeHash {
        self.with(|b| b.base).unwrap_or(TypeHash::EMPTY)
    }

    /// The base type, if it is registered.
    pub fn base_type(&self) -> Option<Type<'r>> {
        let hash = self.with(|b| b.base)?;
        Type::find_by_hash(self.registry, hash)
    }

    fn descriptor(&self) -> ReflectResult<BaseDescriptor> {
        self.with(BaseDescriptor::clone)
            .ok_or(ReflectError::StaleHandle)
    }

    fn missing_receiver(&self) -> ReflectError {
        ReflectError::MissingReceiver(self.owner().name().to_string())
    }

    /// Borrow the base subobject of `object`.
    pub fn upcast<'a>(&self, object: &'a dyn Any) -> ReflectResult<&'a dyn Any> {
        self.descriptor()?
            .upcast(object)
            .ok_or_else(|| self.missing_receiver())
    }

    pub fn upcast_mut<'a>(&self, object: &'a mut dyn Any) -> ReflectResult<&'a mut dyn Any> {
        let base = self.descriptor()?;
        base.upcast_mut(object)
            .ok_or_else(|| self.missing_receiver())
    }

    /// Copy the base subobject of `object` into a new value.
    pub fn project(&self, object: &dyn Any) -> ReflectResult<Value> {
        self.descriptor()?
            .project(object)
            .ok_or_else(|| self.missing_receiver())
    }
}
