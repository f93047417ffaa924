//! Document predicates.
//!
//! Filters are built with the fluent API and evaluated against store
//! documents by the in-memory store:
//!
//! ```rust,ignore
//! use tessera::filter::{field, all};
//!
//! let by_name = field("name").eq("Alice");
//! let by_owner = field("owner_id").in_array(vec![1.into(), 2.into()]);
//! let both = by_name.and(by_owner);
//! ```

mod basic_filters;
mod filter;
mod fluent;
mod logical_filters;

pub use basic_filters::*;
pub use filter::*;
pub use fluent::*;
pub use logical_filters::*;
