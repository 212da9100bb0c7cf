//! Implementation of the `#[derive(Reflect)]` macro.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::ext::IdentExt;
use syn::{Data, DataEnum, DeriveInput, Fields, Ident, Index, Member, parse_macro_input};

use crate::attrs::{AttrPair, FieldAttrs, TypeAttrs};

pub fn derive_reflect_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive_reflect_inner(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn derive_reflect_inner(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let ident = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "#[derive(Reflect)] does not support generic types",
        ));
    }

    let attrs = TypeAttrs::from_attrs(&input.attrs)?;
    let type_name = attrs
        .name
        .clone()
        .unwrap_or_else(|| ident.unraw().to_string());

    let members = match &input.data {
        Data::Struct(data) => struct_members(ident, &data.fields)?,
        Data::Enum(data) => enum_members(ident, data)?,
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                ident,
                "#[derive(Reflect)] does not support unions",
            ));
        }
    };

    let type_attributes = attrs.attributes.iter().map(|AttrPair { key, value }| {
        quote! { builder.attribute(#key, #value); }
    });
    let describe_hook = attrs.describe.as_ref().map(|path| quote! { #path(builder); });
    let default_ctor = attrs.default.then(|| {
        quote! {
            fn default_constructor() -> ::core::option::Option<fn() -> Self> {
                ::core::option::Option::Some(<Self as ::core::default::Default>::default)
            }
        }
    });

    Ok(quote! {
        impl ::refract::Typed for #ident {
            fn type_name() -> &'static str {
                #type_name
            }
        }

        impl ::refract::Reflect for #ident {
            fn describe(builder: &mut ::refract::TypeBuilder<'_, Self>) {
                #(#type_attributes)*
                #(#members)*
                #describe_hook
            }

            #default_ctor
        }
    })
}

/// Generate `field`/`base` declarations for every non-skipped field.
fn struct_members(ident: &Ident, fields: &Fields) -> syn::Result<Vec<TokenStream2>> {
    let mut members = Vec::new();

    for (index, field) in fields.iter().enumerate() {
        let field_attrs = FieldAttrs::from_attrs(&field.attrs)?;
        if field_attrs.skip {
            continue;
        }

        let (member, default_name) = match &field.ident {
            Some(id) => (Member::Named(id.clone()), id.unraw().to_string()),
            None => (Member::Unnamed(Index::from(index)), index.to_string()),
        };
        let ty = &field.ty;

        if field_attrs.base {
            if field_attrs.name.is_some() || !field_attrs.attributes.is_empty() {
                return Err(syn::Error::new_spanned(
                    field,
                    "a base field takes no name or attr",
                ));
            }
            members.push(quote! {
                builder.base::<#ty, _, _>(|this| &this.#member, |this| &mut this.#member);
            });
            continue;
        }

        let name = field_attrs.name.unwrap_or(default_name);
        let pairs = field_attrs
            .attributes
            .iter()
            .map(|AttrPair { key, value }| quote! { .attribute(#key, #value) });

        members.push(quote! {
            builder
                .field::<#ty, _, _>(#name, |this| &this.#member, |this| &mut this.#member)
                .offset(::core::mem::offset_of!(#ident, #member))
                #(#pairs)*;
        });
    }

    Ok(members)
}

/// Generate `enum_value` declarations for a fieldless enum.
fn enum_members(ident: &Ident, data: &DataEnum) -> syn::Result<Vec<TokenStream2>> {
    let mut members = Vec::new();

    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "#[derive(Reflect)] only supports enums whose variants carry no data",
            ));
        }

        let variant_attrs = FieldAttrs::from_attrs(&variant.attrs)?;
        if variant_attrs.skip {
            continue;
        }
        if variant_attrs.base || !variant_attrs.attributes.is_empty() {
            return Err(syn::Error::new_spanned(
                variant,
                "enum variants only accept `name` and `skip`",
            ));
        }

        let variant_ident = &variant.ident;
        let name = variant_attrs
            .name
            .unwrap_or_else(|| variant_ident.unraw().to_string());
        members.push(quote! {
            builder.enum_value(#name, #ident::#variant_ident as i64);
        });
    }

    Ok(members)
}
