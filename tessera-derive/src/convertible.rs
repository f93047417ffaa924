use proc_macro::TokenStream;
use proc_macro2::Ident;
use quote::quote;
use syn::{DataStruct, DeriveInput, Field, Fields, LitStr, Result, Type};

/// Splits a comma separated attribute value into trimmed names.
pub(crate) fn split_names(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

pub(crate) fn generate_convertible_for_struct(
    ast: &DeriveInput,
    data: &DataStruct,
) -> Result<TokenStream> {
    let mut ignored_fields: Vec<String> = vec![];

    for attr in &ast.attrs {
        if attr.path().is_ident("converter") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("ignored") {
                    let s: LitStr = meta.value()?.parse()?;
                    ignored_fields.extend(split_names(&s.value()));
                    Ok(())
                } else {
                    Err(meta.error("Unknown converter attribute"))
                }
            })?;
        }
    }

    let fields: Vec<&Field> = match &data.fields {
        Fields::Named(fields) => fields.named.iter().collect(),
        _ => {
            return Err(syn::Error::new_spanned(
                ast,
                "Only structs with named fields are supported",
            ))
        }
    };

    for ignored in &ignored_fields {
        let known = fields
            .iter()
            .any(|f| f.ident.as_ref().is_some_and(|ident| ident == ignored));
        if !known {
            return Err(syn::Error::new_spanned(
                ast,
                format!("Ignored field {} not found in struct", ignored),
            ));
        }
    }

    let written: Vec<&Ident> = fields
        .iter()
        .filter_map(|f| f.ident.as_ref())
        .filter(|ident| !ignored_fields.contains(&ident.to_string()))
        .collect();
    let written_names: Vec<String> = written.iter().map(|i| i.to_string()).collect();

    let initializers: Vec<proc_macro2::TokenStream> = fields
        .iter()
        .filter_map(|f| f.ident.as_ref().map(|ident| (ident, &f.ty)))
        .map(|(ident, ty): (&Ident, &Type)| {
            let name = ident.to_string();
            if ignored_fields.contains(&name) {
                quote! { #ident: Default::default() }
            } else {
                quote! { #ident: tessera::common::field_value::<#ty>(doc, #name)? }
            }
        })
        .collect();

    let name = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

    let gen = quote! {
        impl #impl_generics tessera::common::Convertible for #name #ty_generics #where_clause {
            fn to_value(&self) -> tessera::errors::TesseraResult<tessera::common::Value> {
                let mut doc = tessera::common::Document::new();
                #(doc.put(#written_names, tessera::common::Convertible::to_value(&self.#written)?)?;)*
                Ok(tessera::common::Value::Document(doc))
            }

            fn from_value(value: &tessera::common::Value) -> tessera::errors::TesseraResult<Self> {
                match value {
                    tessera::common::Value::Document(doc) => Ok(#name {
                        #(#initializers,)*
                    }),
                    _ => Err(tessera::errors::TesseraError::new(
                        "Value is not a document",
                        tessera::errors::ErrorKind::ObjectMappingError,
                    )),
                }
            }
        }
    };

    Ok(TokenStream::from(gen))
}
