#![allow(clippy::module_inception)]
//! # Tessera
//!
//! An object-document mapper. Tessera maps annotated structs to documents
//! in a pluggable document store, tracks every entity through a
//! persistence lifecycle and coalesces writes into batched store calls.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tessera::Tessera;
//! use tessera_derive::{Convertible, Entity};
//!
//! #[derive(Entity, Convertible, Default)]
//! #[entity(table = "users", id(field = "id"))]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! let db = Tessera::builder()
//!     .batch_size(50)
//!     .register::<User>()
//!     .build()?;
//!
//! let session = db.session()?;
//! session.persist(&User { id: 1, name: "Alice".into() })?;
//! session.commit()?;
//!
//! let user: Option<User> = db.client().find(1)?;
//! ```
//!
//! ## Module Organization
//!
//! - [`common`] - values, documents, the `doc!` macro and conversion
//! - [`filter`] - document predicates
//! - [`lifecycle`] - entity states, verbs and the transition table
//! - [`metadata`] - entity layout descriptions and the registry
//! - [`graph`] - tracked entities, staged nodes and entity events
//! - [`store`] - the document store contract and the in-memory store
//! - [`batch`] - write batching
//! - [`client`] - entity operations over a document store
//! - [`session`] - the persistence context
//!
//! Every handle type (`Tessera`, `Session`, `DocumentClient`,
//! `DocumentStore`, `MetadataContext`) wraps an `Arc`, so clones share
//! state.

pub mod batch;
pub mod client;
pub mod common;
pub mod config;
pub mod errors;
pub mod filter;
pub mod graph;
pub mod lifecycle;
pub mod metadata;
pub mod session;
pub mod store;
pub mod tessera;

#[cfg(test)]
mod fixtures;

pub use crate::config::TesseraConfig;
pub use crate::session::Session;
pub use crate::tessera::{Tessera, TesseraBuilder};
