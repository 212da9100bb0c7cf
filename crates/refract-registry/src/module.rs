//! Module lifecycle.
//!
//! A module is a named group of registrations (types, functions and the names
//! they intern) that can be removed from the registry as a unit. Each module
//! declares one [`ModuleRegistrar`], usually as a `static`:
//!
//! ```
//! use refract_registry::{ModuleRegistrar, Registry};
//!
//! static PHYSICS: ModuleRegistrar = ModuleRegistrar::new("physics");
//!
//! let registry = Registry::new();
//! let ran = PHYSICS
//!     .ensure_initialized(&registry, |scope| {
//!         scope.function("gravity", || 9.81f64)?;
//!         Ok(())
//!     })
//!     .unwrap();
//! assert!(ran);
//! assert_eq!(registry.functions_named("gravity").len(), 1);
//!
//! assert_eq!(PHYSICS.unregister(&registry), 1);
//! assert!(registry.functions_named("gravity").is_empty());
//! ```

use parking_lot::Mutex;
use tracing::{debug, warn};

use refract_core::{ModuleId, RegistrationError};

use crate::{FunctionHandle, IntoFunction, Reflect, Registry, TypeHandle};

/// One-time initializer for a module's registrations.
///
/// Initialization state lives in each [`Registry`], so one registrar can
/// install its module into several registries independently.
pub struct ModuleRegistrar {
    name: &'static str,
    lock: Mutex<()>,
}

impl ModuleRegistrar {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            lock: parking_lot::const_mutex(()),
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Id derived from the module name.
    pub const fn id(&self) -> ModuleId {
        ModuleId::from_name(self.name)
    }

    /// Whether the module's initializer has succeeded in `registry`.
    pub fn is_initialized(&self, registry: &Registry) -> bool {
        registry
            .module_info(self.id())
            .is_some_and(|info| info.initialized)
    }

    /// Run `init` unless the module is already initialized in `registry`.
    ///
    /// Returns `Ok(true)` when `init` ran and succeeded, `Ok(false)` when
    /// there was nothing to do. If `init` fails, whatever it registered is
    /// removed again and the module stays uninitialized, so a later call
    /// retries.
    pub fn ensure_initialized<F>(&self, registry: &Registry, init: F) -> Result<bool, RegistrationError>
    where
        F: FnOnce(&mut ModuleScope<'_>) -> Result<(), RegistrationError>,
    {
        let _guard = self.lock.lock();
        if self.is_initialized(registry) {
            return Ok(false);
        }

        let module = self.id();
        registry.declare_module(module, self.name);
        let mut scope = ModuleScope {
            registry,
            module,
            name: self.name,
        };

        match init(&mut scope) {
            Ok(()) => {
                registry.mark_module_initialized(module);
                debug!(module = self.name, "module initialized");
                Ok(true)
            }
            Err(err) => {
                let removed = registry.unregister_module(module);
                warn!(module = self.name, error = %err, removed, "module initialization failed");
                Err(err)
            }
        }
    }

    /// Remove everything the module registered in `registry` and mark it
    /// uninitialized there. Other registries are not affected.
    ///
    /// Returns the number of removed types and functions.
    pub fn unregister(&self, registry: &Registry) -> usize {
        let _guard = self.lock.lock();
        registry.unregister_module(self.id())
    }
}

/// Registration surface handed to a module initializer.
///
/// Everything registered through the scope is owned by the module.
pub struct ModuleScope<'r> {
    registry: &'r Registry,
    module: ModuleId,
    name: &'static str,
}

impl<'r> ModuleScope<'r> {
    pub fn module(&self) -> ModuleId {
        self.module
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Register `T` (and the types it refers to) as owned by the module.
    pub fn register<T: Reflect>(&mut self) -> TypeHandle {
        self.registry.ensure_registered_in::<T>(self.module)
    }

    /// Register a global function owned by the module.
    pub fn function<F, M>(&mut self, name: &str, f: F) -> Result<FunctionHandle, RegistrationError>
    where
        F: IntoFunction<M>,
    {
        self.registry.register_function(self.module, name, f)
    }

    /// Build the error an initializer returns to report its own failure.
    pub fn error(&self, message: impl Into<String>) -> RegistrationError {
        RegistrationError::ModuleInit {
            module: self.name.to_string(),
            message: message.into(),
        }
    }
}

impl Registry {
    /// Remove every type and function owned by `module`.
    ///
    /// Removed slots get a new generation, so outstanding handles go stale.
    /// Names interned only by the module are evicted. Returns the number of
    /// removed types and functions.
    pub fn unregister_module(&self, module: ModuleId) -> usize {
        let _serial = self.registration_lock();
        let mut state = self.write();

        let rows = state.rows_of(module);
        let types = rows
            .into_iter()
            .filter_map(|index| state.remove_row(index))
            .count();
        let functions = state
            .functions_of(module)
            .into_iter()
            .filter_map(|index| state.remove_function(index))
            .count();
        let names = state.names.evict_module(module);
        state.modules.remove(&module);

        debug!(?module, types, functions, names, "unregistered module");
        types + functions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refract_core::Typed;

    #[derive(Clone, Debug, Default)]
    struct Body {
        mass: f64,
    }

    impl Typed for Body {
        fn type_name() -> &'static str {
            "Body"
        }
    }

    impl Reflect for Body {
        fn describe(t: &mut crate::TypeBuilder<'_, Self>) {
            t.field("mass", |b| &b.mass, |b| &mut b.mass);
            t.method("mass_unit", |_: &Body| String::from("kilogram"));
        }
    }

    #[test]
    fn initializes_once() {
        static MODULE: ModuleRegistrar = ModuleRegistrar::new("test.initializes_once");
        let registry = Registry::new();
        let mut runs = 0;

        for _ in 0..3 {
            MODULE
                .ensure_initialized(&registry, |scope| {
                    runs += 1;
                    scope.register::<Body>();
                    Ok(())
                })
                .unwrap();
        }

        assert_eq!(runs, 1);
        assert!(MODULE.is_initialized(&registry));
        let info = registry.module_info(MODULE.id()).unwrap();
        assert_eq!(info.name.as_deref(), Some("test.initializes_once"));
        assert_eq!(info.types, 1);
    }

    #[test]
    fn failed_init_rolls_back_and_retries() {
        static MODULE: ModuleRegistrar = ModuleRegistrar::new("test.failed_init");
        let registry = Registry::new();

        let err = MODULE
            .ensure_initialized(&registry, |scope| {
                scope.register::<Body>();
                Err(scope.error("missing dependency"))
            })
            .unwrap_err();
        assert!(matches!(err, RegistrationError::ModuleInit { .. }));
        assert!(!MODULE.is_initialized(&registry));
        assert_eq!(registry.type_by_name("Body"), None);

        let ran = MODULE
            .ensure_initialized(&registry, |scope| {
                scope.register::<Body>();
                Ok(())
            })
            .unwrap();
        assert!(ran);
        assert!(registry.type_by_name("Body").is_some());
    }

    #[test]
    fn registries_are_initialized_independently() {
        static MODULE: ModuleRegistrar = ModuleRegistrar::new("test.independent");
        let first = Registry::new();
        let second = Registry::new();
        fn install(scope: &mut ModuleScope<'_>) -> Result<(), RegistrationError> {
            scope.register::<Body>();
            Ok(())
        }

        assert!(MODULE.ensure_initialized(&first, install).unwrap());
        assert!(!MODULE.is_initialized(&second));
        assert!(MODULE.ensure_initialized(&second, install).unwrap());
        assert!(second.type_by_name("Body").is_some());

        assert_eq!(MODULE.unregister(&second), 1);
        assert!(!MODULE.is_initialized(&second));
        assert!(MODULE.is_initialized(&first));
        assert!(!MODULE.ensure_initialized(&first, install).unwrap());
        assert!(first.type_by_name("Body").is_some());
    }

    #[test]
    fn unregister_invalidates_handles_and_evicts_names() {
        static MODULE: ModuleRegistrar = ModuleRegistrar::new("test.unregister");
        let registry = Registry::new();

        let mut body = None;
        MODULE
            .ensure_initialized(&registry, |scope| {
                body = Some(scope.register::<Body>());
                scope.function("body_count", || 1i32)?;
                Ok(())
            })
            .unwrap();
        let body = body.unwrap();
        assert!(registry.find_name("mass_unit").is_some());

        assert_eq!(MODULE.unregister(&registry), 2);
        assert!(!MODULE.is_initialized(&registry));
        assert!(!registry.is_alive(body));
        assert_eq!(registry.type_by_name("Body"), None);
        assert!(registry.functions_named("body_count").is_empty());
        assert!(registry.find_name("mass_unit").is_none());
        // primitives are host-owned and survive
        assert!(registry.type_by_name("f64").is_some());
        assert!(registry.module_info(MODULE.id()).is_none());
    }
}
