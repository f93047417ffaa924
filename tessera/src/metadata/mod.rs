//! Entity metadata: where an entity type lives in the store and how it is
//! shaped.
//!
//! Metadata is produced by `#[derive(Entity)]` and collected into an
//! immutable [MetadataContext], which is passed explicitly to every
//! component that needs to resolve an entity type.
//!
//! ```rust,ignore
//! #[derive(Entity, Convertible, Default)]
//! #[entity(
//!     table = "vehicles",
//!     id(field = "id"),
//!     secondary_table(name = "vehicle_specs", fields = "engine, seats"),
//!     relation(name = "owner_id", target = "User", cascade = "PERSIST, REMOVE"),
//!     subtypes = "Car, Bike",
//! )]
//! pub struct Vehicle { id: i64, engine: String, seats: i32, owner_id: Option<i64> }
//! ```

mod context;
mod entity;
mod entity_metadata;

pub use context::*;
pub use entity::*;
pub use entity_metadata::*;
