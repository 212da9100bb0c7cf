//! The `Reflect` trait: a type's description of itself.
//!
//! [`Reflect::describe`] receives a [`TypeBuilder`] and declares the type's
//! fields, methods, constructors and so on. The registry calls it exactly
//! once per registration pass, outside of any registry lock, so it may
//! register other types freely, including ones that refer back to `Self`.
//!
//! # Example
//!
//! ```
//! use refract_core::Typed;
//! use refract_registry::{Reflect, Registry, TypeBuilder};
//!
//! #[derive(Clone, Default)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! impl Typed for Point {
//!     fn type_name() -> &'static str {
//!         "Point"
//!     }
//! }
//!
//! impl Reflect for Point {
//!     fn describe(t: &mut TypeBuilder<'_, Self>) {
//!         t.field("x", |p| &p.x, |p| &mut p.x);
//!         t.field("y", |p| &p.y, |p| &mut p.y);
//!         t.constructor(|x: i32, y: i32| Point { x, y });
//!         t.method("length_sq", |p: &Point| p.x * p.x + p.y * p.y);
//!     }
//!
//!     fn default_constructor() -> Option<fn() -> Self> {
//!         Some(Point::default)
//!     }
//! }
//!
//! let registry = Registry::new();
//! let handle = registry.ensure_registered::<Point>();
//! assert_eq!(registry.type_by_name("Point"), Some(handle));
//! ```

use refract_core::Typed;

use crate::TypeBuilder;

/// A type that can describe itself to the registry.
pub trait Reflect: Typed + Clone + Send + Sync {
    /// Declare members through the builder. The default declares nothing.
    fn describe(_builder: &mut TypeBuilder<'_, Self>) {}

    /// Zero-argument constructor registered automatically when the
    /// registry is configured to do so.
    fn default_constructor() -> Option<fn() -> Self> {
        None
    }
}

macro_rules! impl_reflect_primitive {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Reflect for $ty {
                fn default_constructor() -> Option<fn() -> Self> {
                    Some(<$ty as Default>::default)
                }
            }
        )*
    };
}

impl_reflect_primitive!(
    bool, char, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, String
);

impl Reflect for () {}
