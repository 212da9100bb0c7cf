//! The [`Function`] wrapper for global function overloads.

use std::sync::Arc;

use refract_core::{ModuleId, ReflectResult, TypeHash, Value};
use refract_registry::{FunctionDescriptor, FunctionHandle, Receiver, Registry, ResolvedCall};

/// One registered global function overload.
#[derive(Debug, Clone, Copy)]
pub struct Function<'r> {
    registry: &'r Registry,
    handle: FunctionHandle,
}

impl PartialEq for Function<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.registry, other.registry) && self.handle == other.handle
    }
}

impl Eq for Function<'_> {}

impl<'r> Function<'r> {
    pub fn from_handle(registry: &'r Registry, handle: FunctionHandle) -> Self {
        Function { registry, handle }
    }

    /// Every overload registered under `name`.
    pub fn find_all(registry: &'r Registry, name: &str) -> Vec<Self> {
        registry
            .functions_named(name)
            .into_iter()
            .map(|handle| Function { registry, handle })
            .collect()
    }

    #[inline]
    pub fn handle(&self) -> FunctionHandle {
        self.handle
    }

    fn with<R>(&self, f: impl FnOnce(&FunctionDescriptor) -> R) -> Option<R> {
        let read = self.registry.read();
        read.function(self.handle).map(f)
    }

    pub fn is_valid(&self) -> bool {
        self.registry.is_function_alive(self.handle)
    }

    pub fn name(&self) -> Arc<str> {
        self.with(|f| f.name.text()).unwrap_or_else(|| Arc::from(""))
    }

    pub fn module(&self) -> ModuleId {
        self.with(|f| f.module).unwrap_or_default()
    }

    pub fn params(&self) -> Vec<TypeHash> {
        self.with(|f| f.params.clone()).unwrap_or_default()
    }

    pub fn return_type(&self) -> TypeHash {
        self.with(|f| f.return_type).unwrap_or(TypeHash::EMPTY)
    }

    pub fn signature(&self) -> TypeHash {
        self.with(|f| f.signature).unwrap_or(TypeHash::EMPTY)
    }

    pub fn call(&self) -> ReflectResult<ResolvedCall<'r>> {
        self.registry.function_call(self.handle)
    }

    /// Call exactly this overload, converting numeric arguments.
    pub fn invoke(&self, args: &[Value]) -> ReflectResult<Value> {
        self.call()?.invoke(Receiver::None, args)
    }
}
