//! The refract reflection registry.
//!
//! This crate holds the process-wide catalog of reflected types and the
//! machinery built on top of it:
//!
//! - [`Registry`]: descriptor storage with generation-checked handles
//! - [`Reflect`] and [`TypeBuilder`]: how a type describes its members
//! - [`overload`]: argument ranking and best-candidate selection
//! - [`ResolvedCall`]: resolved, type-erased invocation
//! - [`ModuleRegistrar`]: grouped registration with unload support
//! - [`abi`]: export, merge and verify of registry images
//!
//! # Example
//!
//! ```
//! use refract_core::{Typed, Value};
//! use refract_registry::{Receiver, Reflect, Registry, TypeBuilder};
//!
//! #[derive(Clone, Debug)]
//! struct Counter {
//!     count: i64,
//! }
//!
//! impl Typed for Counter {
//!     fn type_name() -> &'static str {
//!         "Counter"
//!     }
//! }
//!
//! impl Reflect for Counter {
//!     fn describe(t: &mut TypeBuilder<'_, Self>) {
//!         t.field("count", |c| &c.count, |c| &mut c.count);
//!         t.method_mut("add", |c: &mut Counter, n: i64| c.count += n);
//!     }
//! }
//!
//! let registry = Registry::new();
//! let counter = registry.ensure_registered::<Counter>();
//!
//! let mut c = Counter { count: 1 };
//! registry
//!     .invoke_method(counter, Receiver::exclusive(&mut c), "add", &[Value::new(2i32)])
//!     .unwrap();
//! assert_eq!(c.count, 3);
//! ```

pub mod abi;
mod builder;
mod config;
mod descriptor;
mod handle;
mod invoke;
mod module;
pub mod overload;
mod reflect;
mod registry;
mod trampoline;

pub use abi::{AbiBlob, ConflictDiagnostic, ConflictResolution, MergeReport};
pub use builder::{MemberBuilder, TypeBuilder};
pub use config::{ConflictPolicy, MergeOptions, RegistryConfig};
pub use descriptor::{
    AttributeDescriptor, BaseDescriptor, ConstructorDescriptor, EnumValueDescriptor,
    FieldAccessor, FieldDescriptor, FunctionDescriptor, MethodDescriptor, MethodFlags,
    PropertyDescriptor, PropertyGetter, PropertySetter, TypeDescriptor, TypeFlags,
};
pub use handle::{FunctionHandle, MemberHandle, TypeHandle};
pub use invoke::{CallTarget, ResolvedCall};
pub use module::{ModuleRegistrar, ModuleScope};
pub use overload::{ArgBinding, Candidate, ParamRank, Resolution, Score};
pub use reflect::Reflect;
pub use registry::{ModuleInfo, Registry, RegistryRead};
pub use trampoline::{
    ArgMode, IntoFunction, IntoMethod, IntoMethodMut, Receiver, Signature, Trampoline,
};

pub use refract_core;
