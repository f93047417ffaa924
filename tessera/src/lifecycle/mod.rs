//! Entity lifecycle: the state machine and the per-entity state manager.
//!
//! Every tracked entity is in exactly one [EntityState]. A lifecycle verb
//! moves it according to a fixed table:
//!
//! | Verb | Transient | Managed | Detached | Removed |
//! |---|---|---|---|---|
//! | persist | Managed | - (cascade) | error | error |
//! | remove | error | Removed (cascade) | error | - |
//! | merge | - | - (cascade) | Managed | error |
//! | refresh | error | - (reload) | error | error |
//! | close, commit | - | Detached | - | - |
//! | rollback | - | Transient or Detached | - | - |
//! | flush | - | - (synchronize or defer) | - | - |
//!
//! The remaining verbs (find, clear, lock, detach, get_reference,
//! contains) never change state.

mod manager;
mod state;

pub use manager::*;
pub use state::*;
