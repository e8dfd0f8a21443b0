use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::ext::IdentExt;
use syn::{parse_macro_input, parse_quote, Attribute, Data, DeriveInput, LitStr, Visibility};

/// Derive macro for `mapiface::Reflect` on structs.
///
/// Generates a static field-descriptor table (declared name, visibility,
/// tags) and a `shape()` that exposes the struct as a record.
///
/// - A field is exported when declared `pub`. Restricted visibility
///   (`pub(crate)`, ...) counts as private.
/// - Tags are declared per field with `#[tag(key = "value", ...)]`.
/// - Tuple fields are named `"0"`, `"1"`, ...
///
/// # Example
///
/// ```ignore
/// #[derive(Reflect)]
/// pub struct User {
///     #[tag(json = "user_id", yaml = "uid")]
///     pub id: i64,
///
///     #[tag(json = "avatar,omitempty")]
///     pub avatar: Option<String>,
///
///     password_hash: String,
/// }
/// ```
#[proc_macro_derive(Reflect, attributes(tag))]
pub fn derive_reflect(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match derive_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn derive_impl(input: &DeriveInput) -> Result<TokenStream2, syn::Error> {
    let name = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Reflect can only be derived for structs",
            ))
        }
    };

    let mut descriptor_tokens = Vec::new();
    let mut value_tokens = Vec::new();

    for (index, field) in fields.iter().enumerate() {
        let (field_name, member) = match &field.ident {
            Some(ident) => (ident.unraw().to_string(), quote! { #ident }),
            None => {
                let index = syn::Index::from(index);
                (index.index.to_string(), quote! { #index })
            }
        };
        let exported = matches!(field.vis, Visibility::Public(_));

        let tag_tokens = parse_tags(&field.attrs)?
            .into_iter()
            .map(|(key, value)| quote! { (#key, #value) });

        descriptor_tokens.push(quote! {
            ::mapiface::Field::new(#field_name, #exported, &[#(#tag_tokens),*])
        });
        value_tokens.push(quote! {
            &self.#member as &dyn ::mapiface::Reflect
        });
    }

    let mut generics = input.generics.clone();
    for param in generics.type_params_mut() {
        param.bounds.push(parse_quote!(::mapiface::Reflect));
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let expanded = quote! {
        impl #impl_generics ::mapiface::Reflect for #name #ty_generics #where_clause {
            fn shape(&self) -> ::mapiface::Shape<'_> {
                const FIELDS: &[::mapiface::Field] = &[
                    #(#descriptor_tokens),*
                ];
                ::mapiface::Shape::Record(::mapiface::RecordRef::new(
                    ::core::any::type_name::<Self>(),
                    FIELDS,
                    ::std::vec![#(#value_tokens),*],
                ))
            }
        }
    };

    Ok(expanded)
}

/// Collect `(key, value)` pairs from every `#[tag(...)]` on a field, in
/// declaration order.
fn parse_tags(attrs: &[Attribute]) -> Result<Vec<(String, String)>, syn::Error> {
    let mut tags = Vec::new();

    for attr in attrs {
        if !attr.path().is_ident("tag") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            let key = meta
                .path
                .get_ident()
                .ok_or_else(|| meta.error("expected a tag key such as `json`"))?
                .unraw()
                .to_string();
            let value: LitStr = meta.value()?.parse()?;
            tags.push((key, value.value()));
            Ok(())
        })?;
    }

    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tags_in_order() {
        let attrs: Vec<Attribute> = vec![
            parse_quote!(#[tag(json = "name,omitempty", yaml = "n")]),
            parse_quote!(#[doc = "ignored"]),
            parse_quote!(#[tag(r#toml = "t")]),
        ];
        let tags = parse_tags(&attrs).unwrap();
        assert_eq!(
            tags,
            [
                ("json".to_string(), "name,omitempty".to_string()),
                ("yaml".to_string(), "n".to_string()),
                ("toml".to_string(), "t".to_string()),
            ]
        );
    }

    #[test]
    fn parse_tags_requires_string_value() {
        let attrs: Vec<Attribute> = vec![parse_quote!(#[tag(json = 1)])];
        assert!(parse_tags(&attrs).is_err());
    }

    #[test]
    fn struct_expands_to_field_table() {
        let input: DeriveInput = parse_quote! {
            struct User<T> {
                #[tag(json = "id,omitempty")]
                pub r#id: T,
                secret: String,
            }
        };
        let tokens = derive_impl(&input).unwrap().to_string().replace(' ', "");
        assert!(tokens.contains("impl<T:::mapiface::Reflect>"));
        assert!(tokens.contains(r#"::mapiface::Field::new("id",true,&[("json","id,omitempty")])"#));
        assert!(tokens.contains(r#"::mapiface::Field::new("secret",false,&[])"#));
        assert!(tokens.contains("&self.r#idas&dyn::mapiface::Reflect"));
    }

    #[test]
    fn enums_are_rejected() {
        let input: DeriveInput = parse_quote! {
            enum Kind { A, B }
        };
        let err = derive_impl(&input).err().map(|e| e.to_string());
        assert_eq!(err.as_deref(), Some("Reflect can only be derived for structs"));
    }
}
