//! Invocation pipeline.
//!
//! Resolution produces a [`ResolvedCall`]: the selected target together with
//! everything needed to call it (parameter types, argument bindings, the
//! trampoline and the chain of base upcasts from the receiver to the type
//! that declares the method). A resolved call can be invoked any number of
//! times; each invocation re-checks that its target is still alive.
//!
//! The registry read lock is taken only to validate the target and is
//! released before the trampoline runs.
//!
//! # Example
//!
//! ```ignore
//! let call = registry.resolve_method(point, "scale", &[primitives::F64])?;
//! let mut p = Value::new(Point { x: 1, y: 2 });
//! call.invoke(Receiver::from(&mut p), &[Value::new(2.0f64)])?;
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use rustc_hash::FxHashSet;

use refract_core::{ReflectError, ReflectResult, TypeHash, Value};

use crate::overload::{self, ArgBinding};
use crate::registry::RegistryState;
use crate::{
    BaseDescriptor, FunctionHandle, MemberHandle, Receiver, Registry, Trampoline, TypeHandle,
};

/// What a [`ResolvedCall`] invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallTarget {
    /// A method; the handle's owner is the type that declares it.
    Method(MemberHandle),
    Constructor(MemberHandle),
    Function(FunctionHandle),
}

/// Trampoline entry point chosen once when a call is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Dispatch {
    /// Every binding was exact; arguments are cloned out directly while
    /// their tags still match the parameters.
    Exact,
    /// At least one argument needs converting.
    Converting,
}

impl Dispatch {
    fn for_bindings(bindings: &[ArgBinding]) -> Self {
        if bindings.iter().all(|b| *b == ArgBinding::Exact) {
            Dispatch::Exact
        } else {
            Dispatch::Converting
        }
    }
}

/// A call target selected for a particular argument list.
#[derive(Debug, Clone)]
pub struct ResolvedCall<'r> {
    registry: &'r Registry,
    target: CallTarget,
    name: Arc<str>,
    params: Vec<TypeHash>,
    return_type: TypeHash,
    bindings: Vec<ArgBinding>,
    dispatch: Dispatch,
    trampoline: Arc<Trampoline>,
    /// Base links from the receiver's type to the declaring type.
    upcasts: Vec<BaseDescriptor>,
    /// Types walked to reach the target, all of which must stay alive.
    path: Vec<TypeHandle>,
}

impl<'r> ResolvedCall<'r> {
    pub fn target(&self) -> CallTarget {
        self.target
    }

    /// Name of the callee, qualified with its type for members.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[TypeHash] {
        &self.params
    }

    pub fn return_type(&self) -> TypeHash {
        self.return_type
    }

    /// Per-argument bindings decided at resolution.
    ///
    /// Empty when the call was built directly from a handle.
    pub fn bindings(&self) -> &[ArgBinding] {
        &self.bindings
    }

    /// True when resolution found no argument that needs converting.
    pub fn is_exact(&self) -> bool {
        self.dispatch == Dispatch::Exact
    }

    /// Number of base links walked to reach the declaring type.
    pub fn upcast_depth(&self) -> usize {
        self.upcasts.len()
    }

    /// True while the target and every type on the way to it are alive.
    pub fn is_alive(&self) -> bool {
        let read = self.registry.read();
        let state = read.state();

        let target_alive = match self.target {
            CallTarget::Method(member) => state
                .get(member.owner())
                .is_some_and(|row| (member.sub() as usize) < row.methods.len()),
            CallTarget::Constructor(member) => state
                .get(member.owner())
                .is_some_and(|row| (member.sub() as usize) < row.constructors.len()),
            CallTarget::Function(handle) => state.function(handle).is_some(),
        };
        target_alive && self.path.iter().all(|&handle| state.get(handle).is_some())
    }

    /// Call the target.
    ///
    /// Calls resolved with conversions go straight to the converting entry
    /// point, where a failed conversion reports its index. Exactly resolved
    /// calls take the exact path, falling back to converting when reused
    /// with arguments of other types.
    pub fn invoke(&self, receiver: Receiver<'_>, args: &[Value]) -> ReflectResult<Value> {
        if !self.is_alive() {
            return Err(ReflectError::StaleHandle);
        }
        if args.len() != self.params.len() {
            return Err(ReflectError::ArityMismatch {
                expected: self.params.len(),
                actual: args.len(),
            });
        }

        let mut receiver = receiver;
        for base in &self.upcasts {
            receiver = receiver
                .upcast(base)
                .ok_or_else(|| ReflectError::MissingReceiver(self.name.to_string()))?;
        }

        match self.dispatch {
            Dispatch::Exact
                if args
                    .iter()
                    .zip(&self.params)
                    .all(|(arg, &param)| arg.type_hash() == param) =>
            {
                self.trampoline.invoke_exact(receiver, args)
            }
            _ => self.trampoline.invoke_converting(receiver, args),
        }
    }
}

fn arg_types(args: &[Value]) -> Vec<TypeHash> {
    args.iter().map(Value::type_hash).collect()
}

impl Registry {
    // ==========================================================================
    // Resolution
    // ==========================================================================

    /// Resolve the overload of method `name` on `ty` that best fits `args`.
    ///
    /// If `ty` declares no method of that name, its bases are searched
    /// breadth-first; the first type that declares one decides the overload
    /// set, hiding any further up.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn resolve_method(
        &self,
        ty: TypeHandle,
        name: &str,
        args: &[TypeHash],
    ) -> ReflectResult<ResolvedCall<'_>> {
        let read = self.read();
        let state = read.state();
        let row = state.get(ty).ok_or(ReflectError::StaleHandle)?;
        let qualified = format!("{}::{}", row.name, name);
        let id = state
            .names
            .find(name)
            .ok_or_else(|| ReflectError::not_found("method", qualified.as_str()))?;

        let mut queue = VecDeque::from([(ty, Vec::<BaseDescriptor>::new(), vec![ty])]);
        let mut visited = FxHashSet::default();
        visited.insert(row.type_hash);

        while let Some((handle, upcasts, path)) = queue.pop_front() {
            let Some(row) = state.get(handle) else {
                continue;
            };

            let overloads = row.overloads(id);
            if !overloads.is_empty() {
                let candidates = overloads.iter().map(|&p| &row.methods[p as usize]);
                let resolution = overload::resolve(candidates, args).map_err(|diagnostics| {
                    ReflectError::NoViableOverload {
                        name: qualified.clone(),
                        diagnostics,
                    }
                })?;

                let position = overloads[resolution.index];
                let method = &row.methods[position as usize];
                let upcasts = if method.is_static() {
                    Vec::new()
                } else {
                    upcasts
                };
                return Ok(ResolvedCall {
                    registry: self,
                    target: CallTarget::Method(handle.member(position)),
                    name: Arc::from(qualified),
                    params: method.params.clone(),
                    return_type: method.return_type,
                    dispatch: Dispatch::for_bindings(&resolution.bindings),
                    bindings: resolution.bindings,
                    trampoline: Arc::clone(&method.trampoline),
                    upcasts,
                    path,
                });
            }

            for base in &row.bases {
                if !visited.insert(base.base) {
                    continue;
                }
                if let Some((base_handle, _)) = state.by_hash(base.base) {
                    let mut upcasts = upcasts.clone();
                    upcasts.push(base.clone());
                    let mut path = path.clone();
                    path.push(base_handle);
                    queue.push_back((base_handle, upcasts, path));
                }
            }
        }

        Err(ReflectError::not_found("method", qualified))
    }

    /// Resolve the constructor of `ty` that best fits `args`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn resolve_constructor(
        &self,
        ty: TypeHandle,
        args: &[TypeHash],
    ) -> ReflectResult<ResolvedCall<'_>> {
        let read = self.read();
        let state = read.state();
        let row = state.get(ty).ok_or(ReflectError::StaleHandle)?;
        if row.constructors.is_empty() {
            return Err(ReflectError::NotConstructible);
        }

        // no arguments and a default constructor: nothing to score
        if args.is_empty()
            && let Some(position) = row.default_constructor()
        {
            return constructor_call(self, state, ty, position, Vec::new())
                .ok_or(ReflectError::StaleHandle);
        }

        let resolution = overload::resolve(&row.constructors, args).map_err(|diagnostics| {
            ReflectError::NoViableOverload {
                name: row.name.to_string(),
                diagnostics,
            }
        })?;
        constructor_call(self, state, ty, resolution.index as u32, resolution.bindings)
            .ok_or(ReflectError::StaleHandle)
    }

    /// Resolve the global function overload of `name` that best fits `args`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn resolve_function(&self, name: &str, args: &[TypeHash]) -> ReflectResult<ResolvedCall<'_>> {
        let read = self.read();
        let state = read.state();
        let rows: Vec<_> = state
            .functions_named(name)
            .into_iter()
            .filter_map(|handle| state.function(handle).map(|row| (handle, row)))
            .collect();
        if rows.is_empty() {
            return Err(ReflectError::not_found("function", name));
        }

        let resolution = overload::resolve(rows.iter().map(|(_, row)| *row), args).map_err(
            |diagnostics| ReflectError::NoViableOverload {
                name: name.to_string(),
                diagnostics,
            },
        )?;

        let (handle, row) = rows[resolution.index];
        Ok(ResolvedCall {
            registry: self,
            target: CallTarget::Function(handle),
            name: row.name.text(),
            params: row.params.clone(),
            return_type: row.return_type,
            dispatch: Dispatch::for_bindings(&resolution.bindings),
            bindings: resolution.bindings,
            trampoline: Arc::clone(&row.trampoline),
            upcasts: Vec::new(),
            path: Vec::new(),
        })
    }

    // ==========================================================================
    // Direct calls
    // ==========================================================================

    /// Build a call to a specific method overload, skipping resolution.
    pub fn method_call(&self, method: MemberHandle) -> ReflectResult<ResolvedCall<'_>> {
        let read = self.read();
        let row = read.get(method.owner()).ok_or(ReflectError::StaleHandle)?;
        let target = row
            .methods
            .get(method.sub() as usize)
            .ok_or(ReflectError::StaleHandle)?;

        Ok(ResolvedCall {
            registry: self,
            target: CallTarget::Method(method),
            name: Arc::from(format!("{}::{}", row.name, target.name)),
            params: target.params.clone(),
            return_type: target.return_type,
            bindings: Vec::new(),
            dispatch: Dispatch::Exact,
            trampoline: Arc::clone(&target.trampoline),
            upcasts: Vec::new(),
            path: vec![method.owner()],
        })
    }

    /// Build a call to a specific constructor, skipping resolution.
    pub fn constructor_call(&self, ctor: MemberHandle) -> ReflectResult<ResolvedCall<'_>> {
        let read = self.read();
        constructor_call(self, read.state(), ctor.owner(), ctor.sub(), Vec::new())
            .ok_or(ReflectError::StaleHandle)
    }

    /// Build a call to a specific global function overload.
    pub fn function_call(&self, function: FunctionHandle) -> ReflectResult<ResolvedCall<'_>> {
        let read = self.read();
        let row = read.function(function).ok_or(ReflectError::StaleHandle)?;

        Ok(ResolvedCall {
            registry: self,
            target: CallTarget::Function(function),
            name: row.name.text(),
            params: row.params.clone(),
            return_type: row.return_type,
            bindings: Vec::new(),
            dispatch: Dispatch::Exact,
            trampoline: Arc::clone(&row.trampoline),
            upcasts: Vec::new(),
            path: Vec::new(),
        })
    }

    // ==========================================================================
    // Convenience
    // ==========================================================================

    /// Resolve and call method `name` of `ty` on `receiver`.
    pub fn invoke_method(
        &self,
        ty: TypeHandle,
        receiver: Receiver<'_>,
        name: &str,
        args: &[Value],
    ) -> ReflectResult<Value> {
        self.resolve_method(ty, name, &arg_types(args))?
            .invoke(receiver, args)
    }

    /// Resolve a constructor of `ty` for `args` and build a new value.
    pub fn construct(&self, ty: TypeHandle, args: &[Value]) -> ReflectResult<Value> {
        self.resolve_constructor(ty, &arg_types(args))?
            .invoke(Receiver::None, args)
    }

    /// Resolve and call the global function `name`.
    pub fn invoke_function(&self, name: &str, args: &[Value]) -> ReflectResult<Value> {
        self.resolve_function(name, &arg_types(args))?
            .invoke(Receiver::None, args)
    }
}

fn constructor_call<'r>(
    registry: &'r Registry,
    state: &RegistryState,
    ty: TypeHandle,
    position: u32,
    bindings: Vec<ArgBinding>,
) -> Option<ResolvedCall<'r>> {
    let row = state.get(ty)?;
    let ctor = row.constructors.get(position as usize)?;

    Some(ResolvedCall {
        registry,
        target: CallTarget::Constructor(ty.member(position)),
        name: row.name.text(),
        params: ctor.params.clone(),
        return_type: row.type_hash,
        dispatch: Dispatch::for_bindings(&bindings),
        bindings,
        trampoline: Arc::clone(&ctor.trampoline),
        upcasts: Vec::new(),
        path: Vec::new(),
    })
}
