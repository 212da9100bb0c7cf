//! refract: a runtime type-reflection registry.
//!
//! Types describe themselves once, through a hand-written
//! [`Reflect`](trait@Reflect) implementation or `#[derive(Reflect)]`, and
//! the registry builds a catalog of their fields, properties, methods,
//! constructors, enumerators and base links. The catalog is queried by name
//! or [`TypeHash`] and members are invoked through the type-erased
//! [`Value`], with overload resolution and numeric argument conversion.
//!
//! # Crates
//!
//! - `refract-core`: identities, values, names, attributes and errors
//! - `refract-registry`: the [`Registry`], overload engine, invocation,
//!   modules and the ABI export/merge protocol
//! - `refract-macros`: `#[derive(Reflect)]`
//!
//! This crate re-exports all three and adds the [`Type`], [`Function`] and
//! member wrappers plus global convenience functions that operate on
//! [`Registry::global`].
//!
//! # Example
//!
//! ```
//! use refract::prelude::*;
//!
//! #[derive(Clone, Debug, Default, Reflect)]
//! #[reflect(default, describe = "Point::describe_methods")]
//! struct Point {
//!     x: f64,
//!     y: f64,
//! }
//!
//! impl Point {
//!     fn describe_methods(t: &mut TypeBuilder<'_, Self>) {
//!         t.constructor(|x: f64, y: f64| Point { x, y });
//!         t.method("length", |p: &Point| (p.x * p.x + p.y * p.y).sqrt());
//!     }
//! }
//!
//! let registry = Registry::new();
//! let point = Type::in_registry::<Point>(&registry);
//!
//! // (3, 4) are integers; the constructor converts them to f64
//! let p = point.construct(&[Value::new(3i32), Value::new(4i32)]).unwrap();
//! let length = point
//!     .invoke(Receiver::shared(p.get::<Point>().unwrap()), "length", &[])
//!     .unwrap();
//! assert_eq!(length.get::<f64>(), Some(&5.0));
//! ```

extern crate self as refract;

mod function;
mod member;
mod type_info;

pub use function::Function;
pub use member::{Base, Constructor, EnumValue, Field, Method, Property};
pub use type_info::Type;

pub use refract_core::{
    AttributeKind, AttributeValue, CandidateDiagnostic, DiagnosticCode, ErrorKind, INLINE_ALIGN,
    INLINE_CAPACITY, Interner, MergeError, ModuleId, Name, NameId, Numeric, NumericClass,
    OverloadDiagnostics, PrimitiveKind, RefractError, ReflectError, ReflectResult,
    RegistrationError, TypeHash, Typed, Value, VerifyError, canonical_type_name, coerce,
    convert_numeric, hash_constants, primitives, read_numeric, type_name_of,
};
pub use refract_macros::Reflect;
pub use refract_registry::{
    AbiBlob, ArgBinding, ArgMode, AttributeDescriptor, BaseDescriptor, CallTarget, Candidate,
    ConflictDiagnostic, ConflictPolicy, ConflictResolution, ConstructorDescriptor,
    EnumValueDescriptor, FieldAccessor, FieldDescriptor, FunctionDescriptor, FunctionHandle,
    IntoFunction, IntoMethod, IntoMethodMut, MemberBuilder, MemberHandle, MergeOptions,
    MergeReport, MethodDescriptor, MethodFlags, ModuleInfo, ModuleRegistrar, ModuleScope,
    ParamRank, PropertyDescriptor, PropertyGetter, PropertySetter, Receiver, Reflect, Registry,
    RegistryConfig, RegistryRead, Resolution, ResolvedCall, Score, Signature, Trampoline,
    TypeBuilder, TypeDescriptor, TypeFlags, TypeHandle, abi, overload,
};

/// Commonly used items.
pub mod prelude {
    pub use crate::{
        Function, ModuleRegistrar, Receiver, Reflect, ReflectError, ReflectResult, Registry,
        Type, TypeBuilder, TypeHash, Typed, Value,
    };
}

// ============================================================================
// Global registry shortcuts
// ============================================================================

/// `T` in the global registry, registering it on first use.
pub fn type_of<T: Reflect>() -> Type<'static> {
    Type::of::<T>()
}

/// Look a type up by its registered name in the global registry.
pub fn find_type(name: &str) -> Option<Type<'static>> {
    Type::find(Registry::global(), name)
}

/// Look a type up by hash in the global registry.
pub fn find_type_by_hash(hash: TypeHash) -> Option<Type<'static>> {
    Type::find_by_hash(Registry::global(), hash)
}

/// Every global function overload named `name` in the global registry.
pub fn find_functions(name: &str) -> Vec<Function<'static>> {
    Function::find_all(Registry::global(), name)
}

/// Register a host-owned global function in the global registry.
pub fn register_function<F, M>(name: &str, f: F) -> Result<Function<'static>, RegistrationError>
where
    F: IntoFunction<M>,
{
    let registry = Registry::global();
    let handle = registry.register_function(ModuleId::HOST, name, f)?;
    Ok(Function::from_handle(registry, handle))
}

/// Resolve and call a global function in the global registry.
pub fn invoke_function(name: &str, args: &[Value]) -> ReflectResult<Value> {
    Registry::global().invoke_function(name, args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, Default, PartialEq, Reflect)]
    #[reflect(name = "facade::Sample", default)]
    struct Sample {
        level: u8,
    }

    #[test]
    fn global_shortcuts_share_the_global_registry() {
        let ty = type_of::<Sample>();
        assert_eq!(find_type("facade::Sample"), Some(ty));
        assert_eq!(find_type_by_hash(ty.type_hash()), Some(ty));
        assert_eq!(&*ty.name(), "facade::Sample");

        let value = ty.construct_default().unwrap();
        assert_eq!(value.get::<Sample>(), Some(&Sample::default()));
    }

    #[test]
    fn global_functions() {
        register_function("facade_tests::triple", |x: i64| x * 3).unwrap();
        assert_eq!(find_functions("facade_tests::triple").len(), 1);

        let result = invoke_function("facade_tests::triple", &[Value::new(4i8)]).unwrap();
        assert_eq!(result.get::<i64>(), Some(&12));
    }
}
