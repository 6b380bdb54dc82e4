use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, LitStr, Type, parse_macro_input};

/// Derive macro for the field table of an event record.
///
/// Generates `impl axevent::record::EventRecord`, one `FieldSpec` per field
/// in declaration order. The table is built on first use and kept for the
/// life of the process.
///
/// # Example
///
/// ```ignore
/// #[derive(EventRecord, Default)]
/// pub struct Person {
///     #[event(key = "age")]
///     pub years: i32,
///     pub name: String,
///     #[event(skip)]
///     pub cache: Vec<u8>,
/// }
/// ```
///
/// Supported field types: `i32`, `f64`, `String`, `bool`. Fields of any other
/// type are listed as unsupported and ignored when marshalling.
#[proc_macro_derive(EventRecord, attributes(event))]
pub fn derive_event_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match derive_impl(&input) {
        Ok(tokens) => tokens,
        Err(e) => e.to_compile_error().into(),
    }
}

fn derive_impl(input: &DeriveInput) -> Result<TokenStream, syn::Error> {
    let name = &input.ident;

    // The cached table is a static, which cannot name type parameters.
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "EventRecord does not support generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "EventRecord only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "EventRecord only supports structs",
            ));
        }
    };

    let mut field_tokens = Vec::new();

    for field in fields {
        let field_name = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected named field"))?;
        let field_name_str = field_name.to_string();
        let field_ty = &field.ty;

        // Parse #[event(...)] attribute.
        let mut key: Option<LitStr> = None;
        let mut skip = false;

        for attr in &field.attrs {
            if !attr.path().is_ident("event") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("key") {
                    let value: LitStr = meta.value()?.parse()?;
                    if value.value().is_empty() {
                        return Err(syn::Error::new_spanned(&value, "event key must not be empty"));
                    }
                    key = Some(value);
                } else if meta.path.is_ident("skip") {
                    skip = true;
                } else {
                    return Err(meta.error("expected `key = \"...\"` or `skip`"));
                }
                Ok(())
            })?;
        }

        let ty_name = if skip { None } else { type_ident_name(field_ty) };

        let field_spec = match ty_name.as_deref() {
            Some("i32") => quote! {
                ::axevent::record::FieldSpec::<#name>::integer(
                    #field_name_str,
                    |r| r.#field_name,
                    |r, v| r.#field_name = v,
                )
            },
            Some("f64") => quote! {
                ::axevent::record::FieldSpec::<#name>::double(
                    #field_name_str,
                    |r| r.#field_name,
                    |r, v| r.#field_name = v,
                )
            },
            Some("String") => quote! {
                ::axevent::record::FieldSpec::<#name>::string(
                    #field_name_str,
                    |r| r.#field_name.as_str(),
                    |r, v| r.#field_name = v,
                )
            },
            Some("bool") => quote! {
                ::axevent::record::FieldSpec::<#name>::boolean(
                    #field_name_str,
                    |r| r.#field_name,
                    |r, v| r.#field_name = v,
                )
            },
            _ => quote! { ::axevent::record::FieldSpec::<#name>::unsupported(#field_name_str) },
        };

        field_tokens.push(match key {
            Some(key) => quote! { #field_spec.with_key(#key) },
            None => field_spec,
        });
    }

    let expanded = quote! {
        impl ::axevent::record::EventRecord for #name {
            fn event_fields() -> &'static [::axevent::record::FieldSpec<Self>] {
                static FIELDS: ::std::sync::OnceLock<
                    ::std::vec::Vec<::axevent::record::FieldSpec<#name>>,
                > = ::std::sync::OnceLock::new();
                FIELDS.get_or_init(|| {
                    ::std::vec![
                        #(#field_tokens),*
                    ]
                })
            }
        }
    };

    Ok(TokenStream::from(expanded))
}

/// Extract the last path segment ident name from a type (e.g. `i32`, `String`).
fn type_ident_name(ty: &Type) -> Option<String> {
    if let Type::Path(type_path) = ty {
        type_path
            .path
            .segments
            .last()
            .map(|seg| seg.ident.to_string())
    } else {
        None
    }
}
