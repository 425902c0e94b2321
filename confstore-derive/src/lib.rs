//! Derive macros for the confstore configuration library
//!
//! This crate provides `#[derive(ConfigType)]`, which generates the static
//! field table that binds a struct's fields to configuration entries.
//!
//! # Usage
//!
//! ```text
//! use confstore::DeriveConfigType;
//!
//! #[derive(Default, DeriveConfigType)]
//! #[config(name = "CheckoutConfig")]
//! struct Checkout {
//!     login_required: bool,          // key: checkoutconfig.loginrequired
//!
//!     #[config(rename = "Limit")]
//!     max_items: u32,                // key: checkoutconfig.limit
//!
//!     #[config(skip)]
//!     session: Option<String>,       // not stored
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use std::collections::HashMap;
use syn::ext::IdentExt;
use syn::{
    Attribute, Data, DeriveInput, Fields, GenericArgument, LitStr, PathArguments, Type,
    parse_macro_input,
};

/// Derive macro for generating `ConfigType` implementations.
///
/// # Attributes
///
/// ## Container attributes (`#[config(...)]`)
/// - `name = "TypeName"` - Type name used as the first key segment
///   (default: the struct's identifier)
///
/// ## Field attributes (`#[config(...)]`)
/// - `rename = "FieldName"` - Field name used as the second key segment
///   (default: the field identifier in PascalCase)
/// - `skip` - Do not bind this field
///
/// Bound fields must implement `Serialize` and `DeserializeOwned`.
#[proc_macro_derive(ConfigType, attributes(config))]
pub fn derive_config_type(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "ConfigType cannot be derived for generic types.\n\nImplement `confstore::ConfigType` by hand with `config_fields!` instead.",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "ConfigType can only be derived for structs with named fields.\n\nExample:\n  #[derive(DeriveConfigType)]\n  struct MyConfig {\n      field: Type,\n  }",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "ConfigType can only be derived for structs.\n\nTry: #[derive(DeriveConfigType)] on a struct, not an enum or union.",
            ));
        }
    };

    let container = parse_container_attrs(&input.attrs)?;
    let type_name = container.name.unwrap_or_else(|| name.unraw().to_string());

    let mut descriptors = Vec::new();
    let mut seen: HashMap<String, String> = HashMap::new();

    for field in fields {
        let attrs = parse_field_attrs(&field.attrs)?;
        if attrs.skip {
            continue;
        }

        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let field_name = attrs
            .rename
            .unwrap_or_else(|| pascal_case(&ident.unraw().to_string()));

        let normalized: String = field_name
            .trim()
            .chars()
            .flat_map(char::to_lowercase)
            .collect();
        if let Some(previous) = seen.insert(normalized, ident.to_string()) {
            return Err(syn::Error::new_spanned(
                ident,
                format!(
                    "field `{ident}` maps to config field \"{field_name}\", which is already used by `{previous}` (names are compared case-insensitively)"
                ),
            ));
        }

        let kind = value_kind(&field.ty);
        descriptors.push(quote! {
            ::confstore::FieldDescriptor {
                name: #field_name,
                kind: #kind,
                get: |config: &#name| {
                    #[allow(unused_imports)]
                    use ::confstore::__private::{AnyField as _, FloatField as _};
                    (&&::confstore::__private::Field(&config.#ident)).ensure_finite()?;
                    ::confstore::__private::serde_json::to_value(&config.#ident)
                },
                set: |config: &mut #name, value: ::confstore::__private::serde_json::Value| {
                    config.#ident = ::confstore::__private::serde_json::from_value(value)?;
                    ::core::result::Result::Ok(())
                },
            }
        });
    }

    Ok(quote! {
        impl ::confstore::ConfigType for #name {
            const TYPE_NAME: &'static str = #type_name;

            fn fields() -> &'static [::confstore::FieldDescriptor<Self>] {
                const FIELDS: &[::confstore::FieldDescriptor<#name>] = &[#(#descriptors),*];
                FIELDS
            }
        }
    })
}

/// Container-level attributes from #[config(...)]
#[derive(Default)]
struct ContainerAttrs {
    name: Option<String>,
}

/// Field-level attributes from #[config(...)]
#[derive(Default)]
struct FieldAttrs {
    rename: Option<String>,
    skip: bool,
}

fn parse_container_attrs(attrs: &[Attribute]) -> syn::Result<ContainerAttrs> {
    let mut result = ContainerAttrs::default();

    for attr in attrs.iter().filter(|a| a.path().is_ident("config")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                result.name = Some(non_blank(meta.value()?.parse()?, "name")?);
                Ok(())
            } else {
                Err(meta.error(
                    "unsupported container attribute.\n\nExample: #[config(name = \"CheckoutConfig\")]",
                ))
            }
        })?;
    }

    Ok(result)
}

fn parse_field_attrs(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut result = FieldAttrs::default();

    for attr in attrs.iter().filter(|a| a.path().is_ident("config")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                result.skip = true;
                Ok(())
            } else if meta.path.is_ident("rename") {
                result.rename = Some(non_blank(meta.value()?.parse()?, "rename")?);
                Ok(())
            } else {
                Err(meta.error(
                    "unsupported field attribute.\n\nExample: #[config(rename = \"LoginRequired\")] or #[config(skip)]",
                ))
            }
        })?;
    }

    Ok(result)
}

fn non_blank(lit: LitStr, attribute: &str) -> syn::Result<String> {
    let value = lit.value();
    if value.trim().is_empty() {
        return Err(syn::Error::new_spanned(
            lit,
            format!("#[config({attribute})] must not be empty"),
        ));
    }
    Ok(value)
}

/// `login_required` -> `LoginRequired`
fn pascal_case(ident: &str) -> String {
    ident
        .split('_')
        .map(|s| {
            let mut c = s.chars();
            match c.next() {
                None => String::new(),
                Some(f) => f.to_uppercase().collect::<String>() + c.as_str(),
            }
        })
        .collect()
}

/// Map a Rust type to its `ValueKind` tokens
fn value_kind(ty: &Type) -> TokenStream2 {
    let kind = quote! { ::confstore::ValueKind };

    match ty {
        Type::Array(_) | Type::Slice(_) => return quote! { #kind::List },
        Type::Tuple(tuple) if !tuple.elems.is_empty() => return quote! { #kind::List },
        Type::Group(group) => return value_kind(&group.elem),
        Type::Paren(paren) => return value_kind(&paren.elem),
        _ => {}
    }

    let Type::Path(path) = ty else {
        return quote! { #kind::Object };
    };
    let Some(segment) = path.path.segments.last() else {
        return quote! { #kind::Object };
    };

    match segment.ident.to_string().as_str() {
        "bool" => quote! { #kind::Bool },
        "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
        | "u128" | "usize" | "NonZeroU8" | "NonZeroU16" | "NonZeroU32" | "NonZeroU64"
        | "NonZeroUsize" | "NonZeroI32" | "NonZeroI64" => quote! { #kind::Integer },
        "f32" | "f64" => quote! { #kind::Float },
        "String" | "str" | "char" | "PathBuf" | "Cow" => quote! { #kind::Text },
        "Vec" | "VecDeque" | "LinkedList" | "HashSet" | "BTreeSet" | "IndexSet" => {
            quote! { #kind::List }
        }
        "DateTime" | "NaiveDateTime" | "NaiveDate" | "NaiveTime" | "OffsetDateTime"
        | "PrimitiveDateTime" | "Date" | "Time" | "SystemTime" => quote! { #kind::DateTime },
        "Option" => match first_type_argument(&segment.arguments) {
            Some(inner) => {
                let inner = value_kind(inner);
                quote! { #kind::Optional(&#inner) }
            }
            None => quote! { #kind::Object },
        },
        "Box" | "Arc" | "Rc" => match first_type_argument(&segment.arguments) {
            Some(inner) => value_kind(inner),
            None => quote! { #kind::Object },
        },
        _ => quote! { #kind::Object },
    }
}

fn first_type_argument(arguments: &PathArguments) -> Option<&Type> {
    let PathArguments::AngleBracketed(args) = arguments else {
        return None;
    };
    args.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(ty) => Some(ty),
        _ => None,
    })
}
