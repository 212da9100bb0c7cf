//! Type-erased call entry points.
//!
//! A [`Trampoline`] wraps one registered callable (method, static method,
//! constructor or global function) behind a uniform signature:
//!
//! ```text
//! (Receiver, &[Value], ArgMode) -> ReflectResult<Value>
//! ```
//!
//! Trampolines are generated once per member at registration time from
//! ordinary Rust closures and function items through the [`IntoMethod`],
//! [`IntoMethodMut`] and [`IntoFunction`] traits, which are implemented for
//! callables of up to six arguments.
//!
//! # Argument modes
//!
//! - [`ArgMode::Exact`]: every argument already holds its parameter type and
//!   is cloned out directly.
//! - [`ArgMode::Convert`]: arguments that do not match are converted through
//!   [`refract_core::coerce`]; a failed conversion reports its index.

use std::any::Any;
use std::fmt;

use refract_core::{
    ModuleId, ReflectError, ReflectResult, TypeHash, Typed, Value, coerce,
};

use crate::{BaseDescriptor, Reflect, Registry};

// ============================================================================
// Receiver
// ============================================================================

/// The object an instance member is invoked on.
pub enum Receiver<'a> {
    /// No object; static members and free functions.
    None,
    /// Shared access. Enough for `&self` methods and field reads.
    Shared(&'a dyn Any),
    /// Exclusive access. Required for `&mut self` methods and field writes.
    Exclusive(&'a mut dyn Any),
}

impl<'a> Receiver<'a> {
    /// Borrow `value` as a shared receiver.
    pub fn shared<T: Any>(value: &'a T) -> Self {
        Receiver::Shared(value)
    }

    /// Borrow `value` as an exclusive receiver.
    pub fn exclusive<T: Any>(value: &'a mut T) -> Self {
        Receiver::Exclusive(value)
    }

    /// True when there is no object.
    pub fn is_none(&self) -> bool {
        matches!(self, Receiver::None)
    }

    /// Downcast to `&T`.
    pub fn into_ref<T: Any>(self) -> Option<&'a T> {
        match self {
            Receiver::None => None,
            Receiver::Shared(object) => object.downcast_ref::<T>(),
            Receiver::Exclusive(object) => object.downcast_ref::<T>(),
        }
    }

    /// Downcast to `&mut T`. Shared receivers never yield one.
    pub fn into_mut<T: Any>(self) -> Option<&'a mut T> {
        match self {
            Receiver::Exclusive(object) => object.downcast_mut::<T>(),
            Receiver::None | Receiver::Shared(_) => None,
        }
    }

    /// Follow a base link from the derived object to its base subobject.
    pub(crate) fn upcast(self, base: &BaseDescriptor) -> Option<Receiver<'a>> {
        match self {
            Receiver::None => None,
            Receiver::Shared(object) => base.upcast(object).map(Receiver::Shared),
            Receiver::Exclusive(object) => base.upcast_mut(object).map(Receiver::Exclusive),
        }
    }
}

impl<'a> From<&'a mut Value> for Receiver<'a> {
    fn from(value: &'a mut Value) -> Self {
        match value.as_any_mut() {
            Some(object) => Receiver::Exclusive(object),
            None => Receiver::None,
        }
    }
}

impl<'a> From<&'a Value> for Receiver<'a> {
    fn from(value: &'a Value) -> Self {
        match value.as_any() {
            Some(object) => Receiver::Shared(object),
            None => Receiver::None,
        }
    }
}

impl fmt::Debug for Receiver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Receiver::None => write!(f, "Receiver::None"),
            Receiver::Shared(_) => write!(f, "Receiver::Shared(..)"),
            Receiver::Exclusive(_) => write!(f, "Receiver::Exclusive(..)"),
        }
    }
}

// ============================================================================
// Trampoline
// ============================================================================

/// How arguments are extracted from their `Value`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgMode {
    Exact,
    Convert,
}

type Entry = dyn Fn(Receiver<'_>, &[Value], ArgMode) -> ReflectResult<Value> + Send + Sync;

/// A type-erased callable with a fixed arity.
pub struct Trampoline {
    arity: usize,
    entry: Box<Entry>,
}

impl Trampoline {
    /// Wrap an entry point taking exactly `arity` arguments.
    pub fn new<E>(arity: usize, entry: E) -> Self
    where
        E: Fn(Receiver<'_>, &[Value], ArgMode) -> ReflectResult<Value> + Send + Sync + 'static,
    {
        Trampoline {
            arity,
            entry: Box::new(entry),
        }
    }

    /// Number of arguments the callable takes, excluding the receiver.
    #[inline]
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Call with arguments that already match the parameter types.
    pub fn invoke_exact(&self, receiver: Receiver<'_>, args: &[Value]) -> ReflectResult<Value> {
        (self.entry)(receiver, args, ArgMode::Exact)
    }

    /// Call, converting arguments to the parameter types where needed.
    pub fn invoke_converting(
        &self,
        receiver: Receiver<'_>,
        args: &[Value],
    ) -> ReflectResult<Value> {
        (self.entry)(receiver, args, ArgMode::Convert)
    }
}

impl fmt::Debug for Trampoline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trampoline")
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

/// Parameter and return types of a callable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<TypeHash>,
    pub return_type: TypeHash,
}

fn check_arity(args: &[Value], expected: usize) -> ReflectResult<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(ReflectError::ArityMismatch {
            expected,
            actual: args.len(),
        })
    }
}

/// Extract argument `index` as an `A`.
fn arg<A: Reflect>(args: &[Value], index: usize, mode: ArgMode) -> ReflectResult<A> {
    let value = args.get(index).ok_or(ReflectError::ArityMismatch {
        expected: index + 1,
        actual: args.len(),
    })?;

    if let Some(exact) = value.get::<A>() {
        return Ok(exact.clone());
    }
    match mode {
        ArgMode::Exact => Err(ReflectError::TypeMismatch {
            expected: A::type_hash(),
            actual: value.type_hash(),
        }),
        ArgMode::Convert => coerce::<A>(value).ok_or(ReflectError::ArgumentConversion { index }),
    }
}

fn missing_receiver<T: Typed>() -> ReflectError {
    ReflectError::MissingReceiver(T::type_name().to_string())
}

// ============================================================================
// Callable traits
// ============================================================================

/// A callable usable as a `&self` method of `T`.
///
/// `Marker` is `(R, A0, A1, ..)` and only exists to keep the arity impls
/// apart; it is always inferred.
pub trait IntoMethod<T, Marker>: Send + Sync + 'static {
    /// Register the parameter and return types and report the signature.
    fn signature(registry: &Registry, module: ModuleId) -> Signature;

    fn into_trampoline(self) -> Trampoline;
}

/// A callable usable as a `&mut self` method of `T`.
pub trait IntoMethodMut<T, Marker>: Send + Sync + 'static {
    fn signature(registry: &Registry, module: ModuleId) -> Signature;

    fn into_trampoline(self) -> Trampoline;
}

/// A callable usable as a free function, static method or constructor.
pub trait IntoFunction<Marker>: Send + Sync + 'static {
    /// The return type.
    type Output: Reflect;

    fn signature(registry: &Registry, module: ModuleId) -> Signature;

    fn into_trampoline(self) -> Trampoline;
}

macro_rules! impl_callables {
    ($arity:literal; $($arg:ident $val:ident $idx:tt),*) => {
        impl<T, F, R, $($arg,)*> IntoMethod<T, (R, $($arg,)*)> for F
        where
            T: Reflect,
            F: Fn(&T, $($arg),*) -> R + Send + Sync + 'static,
            R: Reflect,
            $($arg: Reflect,)*
        {
            fn signature(registry: &Registry, module: ModuleId) -> Signature {
                Signature {
                    params: vec![$(registry.register_param::<$arg>(module)),*],
                    return_type: registry.register_param::<R>(module),
                }
            }

            fn into_trampoline(self) -> Trampoline {
                Trampoline::new($arity, move |receiver: Receiver<'_>, args: &[Value], _mode: ArgMode| {
                    check_arity(args, $arity)?;
                    let this = receiver.into_ref::<T>().ok_or_else(missing_receiver::<T>)?;
                    $(let $val = arg::<$arg>(args, $idx, _mode)?;)*
                    Ok(Value::new((self)(this, $($val),*)))
                })
            }
        }

        impl<T, F, R, $($arg,)*> IntoMethodMut<T, (R, $($arg,)*)> for F
        where
            T: Reflect,
            F: Fn(&mut T, $($arg),*) -> R + Send + Sync + 'static,
            R: Reflect,
            $($arg: Reflect,)*
        {
            fn signature(registry: &Registry, module: ModuleId) -> Signature {
                Signature {
                    params: vec![$(registry.register_param::<$arg>(module)),*],
                    return_type: registry.register_param::<R>(module),
                }
            }

            fn into_trampoline(self) -> Trampoline {
                Trampoline::new($arity, move |receiver: Receiver<'_>, args: &[Value], _mode: ArgMode| {
                    check_arity(args, $arity)?;
                    let this = receiver.into_mut::<T>().ok_or_else(missing_receiver::<T>)?;
                    $(let $val = arg::<$arg>(args, $idx, _mode)?;)*
                    Ok(Value::new((self)(this, $($val),*)))
                })
            }
        }

        impl<F, R, $($arg,)*> IntoFunction<(R, $($arg,)*)> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: Reflect,
            $($arg: Reflect,)*
        {
            type Output = R;

            fn signature(registry: &Registry, module: ModuleId) -> Signature {
                Signature {
                    params: vec![$(registry.register_param::<$arg>(module)),*],
                    return_type: registry.register_param::<R>(module),
                }
            }

            fn into_trampoline(self) -> Trampoline {
                Trampoline::new($arity, move |_receiver: Receiver<'_>, args: &[Value], _mode: ArgMode| {
                    check_arity(args, $arity)?;
                    $(let $val = arg::<$arg>(args, $idx, _mode)?;)*
                    Ok(Value::new((self)($($val),*)))
                })
            }
        }
    };
}

impl_callables!(0;);
impl_callables!(1; A0 a0 0);
impl_callables!(2; A0 a0 0, A1 a1 1);
impl_callables!(3; A0 a0 0, A1 a1 1, A2 a2 2);
impl_callables!(4; A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3);
impl_callables!(5; A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3, A4 a4 4);
impl_callables!(6; A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3, A4 a4 4, A5 a5 5);
