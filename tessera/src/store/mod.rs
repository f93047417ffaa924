//! The document store collaborator.
//!
//! [DocumentStoreProvider] is the contract a backing store implements:
//! document CRUD, index management, a raw script escape hatch and a
//! large-object bucket API. [DocumentStore] is the cloneable handle the
//! rest of the crate holds. The [memory] module provides an in-memory
//! implementation.

mod event;
pub mod memory;
mod options;
mod store;

pub use event::*;
pub use options::*;
pub use store::*;
