//! The document client: translates entity metadata, filters and staged
//! nodes into document store calls.
//!
//! An entity lives in its primary table, its secondary tables, or a large
//! object bucket. Reads fan out over those locations and merge the hits.
//! Writes split an entity's fields back into one document per location.

mod client;
mod join_table;
mod mapper;
mod query;
mod resolved;

pub use client::*;
pub use join_table::*;
pub use mapper::*;
pub use query::*;
pub use resolved::*;
