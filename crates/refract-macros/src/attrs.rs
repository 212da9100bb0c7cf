//! Attribute parsing for `#[reflect(...)]`.

use syn::meta::ParseNestedMeta;
use syn::{Attribute, Lit, LitStr, Path};

/// One `key = literal` pair from `attr(...)`.
#[derive(Debug)]
pub struct AttrPair {
    pub key: String,
    pub value: Lit,
}

/// Parsed `#[reflect(...)]` attributes on a type.
#[derive(Debug, Default)]
pub struct TypeAttrs {
    /// Registered name (default: the Rust identifier)
    pub name: Option<String>,
    /// Register a default constructor through `Default`
    pub default: bool,
    /// Extra describe function run after the generated members
    pub describe: Option<Path>,
    pub attributes: Vec<AttrPair>,
}

/// Parsed `#[reflect(...)]` attributes on a field.
#[derive(Debug, Default)]
pub struct FieldAttrs {
    /// Leave the field out of the description
    pub skip: bool,
    /// Register the field as an embedded base instead of a field
    pub base: bool,
    /// Registered member name (default: the field identifier)
    pub name: Option<String>,
    pub attributes: Vec<AttrPair>,
}

/// Parse the body of `attr(key = lit, ...)`.
fn parse_pairs(meta: &ParseNestedMeta<'_>, out: &mut Vec<AttrPair>) -> syn::Result<()> {
    meta.parse_nested_meta(|inner| {
        let key = inner
            .path
            .get_ident()
            .map(|i| i.to_string())
            .ok_or_else(|| inner.error("attribute key must be an identifier"))?;
        let value: Lit = inner.value()?.parse()?;
        match value {
            Lit::Str(_) | Lit::Int(_) | Lit::Float(_) | Lit::Bool(_) => {}
            _ => return Err(inner.error("attribute value must be a string, integer, float or bool")),
        }
        out.push(AttrPair { key, value });
        Ok(())
    })
}

fn unknown(meta: &ParseNestedMeta<'_>, what: &str) -> syn::Error {
    meta.error(format!(
        "unknown reflect {what}attribute: {}",
        meta.path
            .get_ident()
            .map(|i| i.to_string())
            .unwrap_or_default()
    ))
}

impl TypeAttrs {
    /// Parse attributes from a list of `#[reflect(...)]` attributes.
    pub fn from_attrs(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut result = Self::default();

        for attr in attrs {
            if !attr.path().is_ident("reflect") {
                continue;
            }

            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let value: LitStr = meta.value()?.parse()?;
                    result.name = Some(value.value());
                } else if meta.path.is_ident("default") {
                    result.default = true;
                } else if meta.path.is_ident("describe") {
                    let value: LitStr = meta.value()?.parse()?;
                    result.describe = Some(value.parse()?);
                } else if meta.path.is_ident("attr") {
                    parse_pairs(&meta, &mut result.attributes)?;
                } else {
                    return Err(unknown(&meta, ""));
                }
                Ok(())
            })?;
        }

        Ok(result)
    }
}

impl FieldAttrs {
    /// Parse attributes from a list of `#[reflect(...)]` attributes.
    pub fn from_attrs(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut result = Self::default();

        for attr in attrs {
            if !attr.path().is_ident("reflect") {
                continue;
            }

            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    result.skip = true;
                } else if meta.path.is_ident("base") {
                    result.base = true;
                } else if meta.path.is_ident("name") {
                    let value: LitStr = meta.value()?.parse()?;
                    result.name = Some(value.value());
                } else if meta.path.is_ident("attr") {
                    parse_pairs(&meta, &mut result.attributes)?;
                } else {
                    return Err(unknown(&meta, "field "));
                }
                Ok(())
            })?;
        }

        Ok(result)
    }
}
