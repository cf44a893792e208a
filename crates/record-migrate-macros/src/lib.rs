//! Proc macros for `record-migrate`.
//!
//! Provides one macro:
//!
//! - **`#[migration_ids]`**: Attribute macro that turns a fieldless enum of
//!   named steps into a `MigrationIds` implementation, so migration authors
//!   can write `GeoVersions::AddScale` instead of `com.shape.geo/9`.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, punctuated::Punctuated, token::Comma, Fields, ItemEnum, Meta};

/// Attribute macro that maps enum variants to step ids of one sequence.
///
/// # Attributes
///
/// - `sequence = "name"`: **Required.** The sequence namespace. Must be
///   non-empty and must not contain `/`.
///
/// # Requirements
///
/// - Every variant is a unit variant with an explicit integer discriminant.
/// - Discriminants are `>= 1` and strictly increasing in declaration order.
/// - The enum derives `Clone` and `Copy`.
///
/// # Generated Implementations
///
/// - `record_migrate::MigrationIds` with `SEQUENCE`, `ALL`, `ordinal()` and
///   `name()`.
///
/// # Example
///
/// ```ignore
/// use record_migrate::migration_ids;
///
/// #[migration_ids(sequence = "com.shape.geo")]
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// enum GeoVersions {
///     AddUrlProp = 1,
///     AddLabelColor = 2,
/// }
/// ```
#[proc_macro_attribute]
pub fn migration_ids(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemEnum);
    let args = parse_macro_input!(attr with Punctuated::<Meta, Comma>::parse_terminated);

    let sequence = match parse_sequence(&args) {
        Ok(s) => s,
        Err(e) => return e.to_compile_error().into(),
    };

    let mut variants = Vec::with_capacity(input.variants.len());
    let mut previous: u32 = 0;

    for variant in &input.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return syn::Error::new_spanned(variant, "migration ids must be unit variants")
                .to_compile_error()
                .into();
        }

        let ordinal = match &variant.discriminant {
            Some((
                _,
                syn::Expr::Lit(syn::ExprLit {
                    lit: syn::Lit::Int(lit),
                    ..
                }),
            )) => match lit.base10_parse::<u32>() {
                Ok(v) => v,
                Err(e) => return e.to_compile_error().into(),
            },
            _ => {
                return syn::Error::new_spanned(
                    variant,
                    "migration ids need an explicit integer discriminant, e.g. `AddUrlProp = 1`",
                )
                .to_compile_error()
                .into();
            }
        };

        if ordinal <= previous {
            return syn::Error::new_spanned(
                variant,
                format!("ordinal {ordinal} must be greater than {previous}"),
            )
            .to_compile_error()
            .into();
        }
        previous = ordinal;

        let ident = &variant.ident;
        let label = ident.to_string();
        variants.push((ident.clone(), label, ordinal));
    }

    if variants.is_empty() {
        return syn::Error::new_spanned(&input.ident, "migration ids need at least one variant")
            .to_compile_error()
            .into();
    }

    let enum_name = &input.ident;
    let idents: Vec<_> = variants.iter().map(|(i, _, _)| i).collect();
    let labels: Vec<_> = variants.iter().map(|(_, l, _)| l).collect();
    let ordinals: Vec<_> = variants.iter().map(|(_, _, o)| o).collect();

    let expanded = quote! {
        #input

        impl ::record_migrate::MigrationIds for #enum_name {
            const SEQUENCE: &'static str = #sequence;

            const ALL: &'static [Self] = &[#(Self::#idents),*];

            fn ordinal(self) -> u32 {
                match self {
                    #(Self::#idents => #ordinals,)*
                }
            }

            fn name(self) -> &'static str {
                match self {
                    #(Self::#idents => #labels,)*
                }
            }
        }
    };

    expanded.into()
}

/// Read `sequence = "name"` out of the attribute arguments.
fn parse_sequence(args: &Punctuated<Meta, Comma>) -> syn::Result<syn::LitStr> {
    let mut sequence: Option<syn::LitStr> = None;

    for meta in args {
        let nv = match meta {
            Meta::NameValue(nv) => nv,
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "expected `sequence = \"...\"`",
                ))
            }
        };
        if !nv.path.is_ident("sequence") {
            let key = nv
                .path
                .get_ident()
                .map(|i| i.to_string())
                .unwrap_or_default();
            return Err(syn::Error::new_spanned(
                &nv.path,
                format!("unknown attribute `{key}`"),
            ));
        }
        match &nv.value {
            syn::Expr::Lit(syn::ExprLit {
                lit: syn::Lit::Str(lit),
                ..
            }) => sequence = Some(lit.clone()),
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "`sequence` must be a string literal",
                ))
            }
        }
    }

    let sequence = sequence.ok_or_else(|| {
        syn::Error::new(
            proc_macro2::Span::call_site(),
            "missing required attribute `sequence`",
        )
    })?;

    let name = sequence.value();
    if name.is_empty() || name.contains('/') {
        return Err(syn::Error::new_spanned(
            &sequence,
            "`sequence` must be non-empty and must not contain '/'",
        ));
    }
    Ok(sequence)
}
