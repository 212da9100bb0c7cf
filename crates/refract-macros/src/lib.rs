//! Refract Proc Macros
//!
//! This crate provides `#[derive(Reflect)]`, which implements both `Typed`
//! and `Reflect` for a struct or a fieldless enum. Use it through the
//! `refract` facade; the generated code refers to `::refract` paths.
//!
//! # Example
//!
//! ```ignore
//! use refract::Reflect;
//!
//! #[derive(Clone, Default, Reflect)]
//! #[reflect(name = "game::Player", default, attr(category = "actor"))]
//! pub struct Player {
//!     #[reflect(attr(min = 0, max = 100))]
//!     pub health: i32,
//!
//!     #[reflect(name = "displayName")]
//!     pub display_name: String,
//!
//!     #[reflect(skip)]
//!     pub cache: Vec<u8>,
//! }
//! ```

use proc_macro::TokenStream;

mod attrs;
mod derive_reflect;

/// Derive `Typed` and `Reflect` for a type.
///
/// Structs register every field (with its byte offset) as a field member.
/// Fieldless enums register every variant as an enumerator with its
/// discriminant. Generic types and unions are rejected.
///
/// # Type Attributes
///
/// - `#[reflect(name = "...")]` - Registered type name (default: identifier)
/// - `#[reflect(default)]` - Register a default constructor through `Default`
/// - `#[reflect(describe = "path::to::fn")]` - Run `fn(&mut TypeBuilder<Self>)`
///   after the generated members, for methods and constructors
/// - `#[reflect(attr(key = literal, ...))]` - Type attributes
///
/// # Field Attributes
///
/// - `#[reflect(skip)]` - Leave the field out
/// - `#[reflect(name = "...")]` - Registered member name
/// - `#[reflect(base)]` - Register the field as an embedded base subobject
/// - `#[reflect(attr(key = literal, ...))]` - Field attributes
///
/// Enum variants accept `name` and `skip`.
#[proc_macro_derive(Reflect, attributes(reflect))]
pub fn derive_reflect(input: TokenStream) -> TokenStream {
    derive_reflect::derive_reflect_impl(input)
}
