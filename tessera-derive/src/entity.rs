use proc_macro::TokenStream;
use quote::quote;
use syn::meta::ParseNestedMeta;
use syn::{DataStruct, DeriveInput, Expr, ExprLit, ExprUnary, Lit, LitStr, Result, UnOp};

use crate::convertible::split_names;

const CASCADE_TYPES: [(&str, &str); 6] = [
    ("ALL", "All"),
    ("PERSIST", "Persist"),
    ("MERGE", "Merge"),
    ("REMOVE", "Remove"),
    ("REFRESH", "Refresh"),
    ("DETACH", "Detach"),
];

struct Relation {
    name: String,
    target: String,
    cascade: Vec<String>,
}

struct Index {
    fields: Vec<String>,
    order: i32,
}

fn parse_str(meta: &ParseNestedMeta) -> Result<String> {
    let s: LitStr = meta.value()?.parse()?;
    Ok(s.value())
}

/// Reads an integer literal, allowing a leading minus.
fn parse_order(meta: &ParseNestedMeta) -> Result<i32> {
    let expr: Expr = meta.value()?.parse()?;
    match expr {
        Expr::Lit(ExprLit { lit: Lit::Int(i), .. }) => i.base10_parse(),
        Expr::Unary(ExprUnary { op: UnOp::Neg(_), expr, .. }) => match *expr {
            Expr::Lit(ExprLit { lit: Lit::Int(i), .. }) => i.base10_parse::<i32>().map(|v| -v),
            _ => Err(meta.error("Index order must be 1 or -1")),
        },
        _ => Err(meta.error("Index order must be 1 or -1")),
    }
}

pub(crate) fn generate_entity_for_struct(
    ast: &DeriveInput,
    data: &DataStruct,
) -> Result<TokenStream> {
    let name = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

    let mut entity_name = name.to_string();
    let mut table: Option<String> = None;
    let mut id_field: Option<String> = None;
    let mut embedded_fields: Vec<String> = Vec::new();
    let mut secondary_tables: Vec<(String, Vec<String>)> = Vec::new();
    let mut relations: Vec<Relation> = Vec::new();
    let mut discriminator: Option<(String, String)> = None;
    let mut sub_types: Vec<String> = Vec::new();
    let mut lob: Option<String> = None;
    let mut indexes: Vec<Index> = Vec::new();

    for attr in &ast.attrs {
        if !attr.path().is_ident("entity") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                entity_name = parse_str(&meta)?;
                Ok(())
            } else if meta.path.is_ident("table") {
                table = Some(parse_str(&meta)?);
                Ok(())
            } else if meta.path.is_ident("id") {
                if id_field.is_some() {
                    return Err(meta.error("Multiple id attributes are not allowed"));
                }
                meta.parse_nested_meta(|meta| {
                    if meta.path.is_ident("field") {
                        id_field = Some(parse_str(&meta)?);
                        Ok(())
                    } else if meta.path.is_ident("embedded_fields") {
                        embedded_fields = split_names(&parse_str(&meta)?);
                        Ok(())
                    } else {
                        Err(meta.error("Unknown id attribute"))
                    }
                })
            } else if meta.path.is_ident("secondary_table") {
                let mut table_name = None;
                let mut fields = Vec::new();
                meta.parse_nested_meta(|meta| {
                    if meta.path.is_ident("name") {
                        table_name = Some(parse_str(&meta)?);
                        Ok(())
                    } else if meta.path.is_ident("fields") {
                        fields = split_names(&parse_str(&meta)?);
                        Ok(())
                    } else {
                        Err(meta.error("Unknown secondary_table attribute"))
                    }
                })?;
                match table_name {
                    Some(table_name) if !fields.is_empty() => {
                        secondary_tables.push((table_name, fields));
                        Ok(())
                    }
                    _ => Err(meta.error("Secondary table name and fields are required")),
                }
            } else if meta.path.is_ident("relation") {
                let mut relation_name = None;
                let mut target = None;
                let mut cascade = Vec::new();
                meta.parse_nested_meta(|meta| {
                    if meta.path.is_ident("name") {
                        relation_name = Some(parse_str(&meta)?);
                    } else if meta.path.is_ident("target") {
                        target = Some(parse_str(&meta)?);
                    } else if meta.path.is_ident("cascade") {
                        for policy in split_names(&parse_str(&meta)?) {
                            let variant = CASCADE_TYPES
                                .iter()
                                .find(|(key, _)| key.eq_ignore_ascii_case(&policy))
                                .map(|(_, variant)| variant.to_string())
                                .ok_or_else(|| {
                                    meta.error(format!("Unknown cascade type {}", policy))
                                })?;
                            cascade.push(variant);
                        }
                    } else {
                        return Err(meta.error("Unknown relation attribute"));
                    }
                    Ok(())
                })?;
                match (relation_name, target) {
                    (Some(name), Some(target)) => {
                        relations.push(Relation { name, target, cascade });
                        Ok(())
                    }
                    _ => Err(meta.error("Relation name and target are required")),
                }
            } else if meta.path.is_ident("discriminator") {
                let mut column = None;
                let mut value = None;
                meta.parse_nested_meta(|meta| {
                    if meta.path.is_ident("column") {
                        column = Some(parse_str(&meta)?);
                        Ok(())
                    } else if meta.path.is_ident("value") {
                        value = Some(parse_str(&meta)?);
                        Ok(())
                    } else {
                        Err(meta.error("Unknown discriminator attribute"))
                    }
                })?;
                match (column, value) {
                    (Some(column), Some(value)) => {
                        discriminator = Some((column, value));
                        Ok(())
                    }
                    _ => Err(meta.error("Discriminator column and value are required")),
                }
            } else if meta.path.is_ident("subtypes") {
                sub_types = split_names(&parse_str(&meta)?);
                Ok(())
            } else if meta.path.is_ident("lob") {
                lob = Some(parse_str(&meta)?);
                Ok(())
            } else if meta.path.is_ident("index") {
                let mut fields = Vec::new();
                let mut order = 1;
                meta.parse_nested_meta(|meta| {
                    if meta.path.is_ident("fields") {
                        fields = split_names(&parse_str(&meta)?);
                        Ok(())
                    } else if meta.path.is_ident("order") {
                        order = parse_order(&meta)?;
                        if order != 1 && order != -1 {
                            return Err(meta.error("Index order must be 1 or -1"));
                        }
                        Ok(())
                    } else {
                        Err(meta.error("Unknown index attribute"))
                    }
                })?;
                if fields.is_empty() {
                    return Err(meta.error("Index fields are required"));
                }
                indexes.push(Index { fields, order });
                Ok(())
            } else {
                Err(meta.error("Unknown entity attribute"))
            }
        })?;
    }

    let id_field = id_field.ok_or_else(|| {
        syn::Error::new_spanned(ast, "An id(field = \"..\") attribute is required")
    })?;

    let has_field = |wanted: &str| {
        data.fields
            .iter()
            .any(|field| field.ident.as_ref().is_some_and(|ident| ident == wanted))
    };
    if !has_field(&id_field) {
        return Err(syn::Error::new_spanned(
            ast,
            format!("Field {} not found in struct", id_field),
        ));
    }
    if let Some(lob) = &lob {
        if !has_field(lob) {
            return Err(syn::Error::new_spanned(
                ast,
                format!("Large object field {} not found in struct", lob),
            ));
        }
    }

    let table = table.unwrap_or_else(|| entity_name.clone());
    let id_ident = syn::Ident::new(&id_field, proc_macro2::Span::call_site());

    let embedded_code = if embedded_fields.is_empty() {
        quote! { None }
    } else {
        quote! { Some(vec![#(#embedded_fields),*]) }
    };

    let secondary_code = secondary_tables.iter().map(|(table_name, fields)| {
        quote! {
            .with_secondary_table(tessera::metadata::SecondaryTable::new(#table_name, vec![#(#fields),*]))
        }
    });

    let relation_code = relations.iter().map(|relation| {
        let relation_name = &relation.name;
        let target = &relation.target;
        let cascade = relation
            .cascade
            .iter()
            .map(|variant| syn::Ident::new(variant, proc_macro2::Span::call_site()));
        quote! {
            .with_relation(tessera::metadata::RelationMetadata::new(
                #relation_name,
                #target,
                vec![#(tessera::metadata::CascadeType::#cascade),*],
            ))
        }
    });

    let discriminator_code = discriminator.iter().map(|(column, value)| {
        quote! {
            .with_discriminator(tessera::metadata::Discriminator::new(#column, #value))
        }
    });

    let sub_types_code = if sub_types.is_empty() {
        quote! {}
    } else {
        quote! { .with_sub_types(vec![#(#sub_types),*]) }
    };

    let lob_code = lob.iter().map(|lob| quote! { .with_lob_field(#lob) });

    let index_code = indexes.iter().map(|index| {
        let fields = &index.fields;
        let order = index.order;
        quote! {
            .with_index(tessera::metadata::EntityIndex::new(vec![#(#fields),*], #order))
        }
    });

    let gen = quote! {
        impl #impl_generics tessera::metadata::Entity for #name #ty_generics #where_clause {
            fn entity_metadata() -> tessera::metadata::EntityMetadata {
                tessera::metadata::EntityMetadata::new(
                    #entity_name,
                    #table,
                    tessera::metadata::EntityId::new(#id_field, #embedded_code),
                )
                #(#secondary_code)*
                #(#relation_code)*
                #(#discriminator_code)*
                #sub_types_code
                #(#lob_code)*
                #(#index_code)*
            }

            fn entity_id(&self) -> tessera::errors::TesseraResult<tessera::common::Value> {
                tessera::common::Convertible::to_value(&self.#id_ident)
            }
        }
    };

    Ok(TokenStream::from(gen))
}
