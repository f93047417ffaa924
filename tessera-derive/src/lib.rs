#![recursion_limit = "128"]
//! Derive macros for tessera entities.
//!
//! `#[derive(Convertible)]` maps every named field of a struct to a
//! document field of the same name. Fields listed in
//! `#[converter(ignored = "a, b")]` are skipped when writing and filled
//! with `Default::default()` when reading.
//!
//! `#[derive(Entity)]` describes where the struct lives in the store:
//!
//! ```rust,ignore
//! #[derive(Entity, Convertible, Default)]
//! #[entity(
//!     name = "Vehicle",
//!     table = "vehicles",
//!     id(field = "id"),
//!     secondary_table(name = "vehicle_specs", fields = "engine, seats"),
//!     relation(name = "owner_id", target = "User", cascade = "PERSIST, REMOVE"),
//!     subtypes = "Car, Bike",
//!     index(fields = "engine", order = -1),
//! )]
//! pub struct Vehicle {
//!     id: i64,
//!     engine: String,
//!     seats: i32,
//!     owner_id: Option<i64>,
//! }
//! ```
//!
//! Subtypes sharing a table declare `discriminator(column = "..", value =
//! "..")`. A type stored as a large object names its binary field with
//! `lob = "field"`.

extern crate proc_macro;
mod convertible;
mod entity;

use crate::convertible::generate_convertible_for_struct;
use crate::entity::generate_entity_for_struct;
use proc_macro::TokenStream;
use syn::{Data, DeriveInput};

#[proc_macro_derive(Convertible, attributes(converter))]
pub fn derive_convertible(input: TokenStream) -> TokenStream {
    let ast = syn::parse_macro_input!(input as DeriveInput);

    match ast.data {
        Data::Struct(ref data) => match generate_convertible_for_struct(&ast, data) {
            Ok(token_stream) => token_stream,
            Err(e) => syn::Error::new_spanned(
                &ast,
                format!(
                    "Failed to derive Convertible for struct '{}': {}.\n\
                     Make sure all fields implement Convertible.",
                    ast.ident, e
                ),
            )
            .to_compile_error()
            .into(),
        },
        _ => syn::Error::new_spanned(
            &ast,
            "Convertible can only be derived for structs with named fields",
        )
        .to_compile_error()
        .into(),
    }
}

#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let ast = syn::parse_macro_input!(input as DeriveInput);

    match ast.data {
        Data::Struct(ref data) => match generate_entity_for_struct(&ast, data) {
            Ok(token_stream) => token_stream,
            Err(e) => syn::Error::new_spanned(
                &ast,
                format!(
                    "Failed to derive Entity for struct '{}': {}.\n\
                     Example: #[entity(table = \"users\", id(field = \"id\"))]",
                    ast.ident, e
                ),
            )
            .to_compile_error()
            .into(),
        },
        _ => syn::Error::new_spanned(&ast, "Entity can only be derived for structs")
            .to_compile_error()
            .into(),
    }
}
