//! Tracked entities and the nodes staged for batched writes.

mod event;
mod node;
mod tracked;

pub use event::*;
pub use node::*;
pub use tracked::*;
