//! Shared building blocks: document values, the `doc!` macro, entity
//! conversion and the event bus.

mod constants;
mod convertible;
mod document;
mod event_bus;
mod type_utils;
mod value;

pub use constants::*;
pub use convertible::*;
pub use document::*;
pub use event_bus::*;
pub use type_utils::*;
pub use value::*;
