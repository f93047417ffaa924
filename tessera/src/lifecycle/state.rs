use std::fmt::{Display, Formatter};

use crate::errors::{TesseraError, TesseraResult};
use crate::lifecycle::{FlushMode, PersistenceContextType};

/// Lifecycle stage of a tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EntityState {
    /// Not yet associated with a persistence context
    #[default]
    Transient,
    /// Tracked; changes are written on flush or commit
    Managed,
    /// Previously managed, no longer tracked
    Detached,
    /// Scheduled for deletion
    Removed,
}

impl EntityState {
    pub fn name(&self) -> &'static str {
        match self {
            EntityState::Transient => "transient",
            EntityState::Managed => "managed",
            EntityState::Detached => "detached",
            EntityState::Removed => "removed",
        }
    }
}

impl Display for EntityState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Persistence verb applied to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleVerb {
    Persist,
    Remove,
    Refresh,
    Merge,
    Find,
    Close,
    Clear,
    Flush,
    Lock,
    Detach,
    Commit,
    Rollback,
    GetReference,
    Contains,
}

impl LifecycleVerb {
    pub const ALL: [LifecycleVerb; 14] = [
        LifecycleVerb::Persist,
        LifecycleVerb::Remove,
        LifecycleVerb::Refresh,
        LifecycleVerb::Merge,
        LifecycleVerb::Find,
        LifecycleVerb::Close,
        LifecycleVerb::Clear,
        LifecycleVerb::Flush,
        LifecycleVerb::Lock,
        LifecycleVerb::Detach,
        LifecycleVerb::Commit,
        LifecycleVerb::Rollback,
        LifecycleVerb::GetReference,
        LifecycleVerb::Contains,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LifecycleVerb::Persist => "persist",
            LifecycleVerb::Remove => "remove",
            LifecycleVerb::Refresh => "refresh",
            LifecycleVerb::Merge => "merge",
            LifecycleVerb::Find => "find",
            LifecycleVerb::Close => "close",
            LifecycleVerb::Clear => "clear",
            LifecycleVerb::Flush => "flush",
            LifecycleVerb::Lock => "lock",
            LifecycleVerb::Detach => "detach",
            LifecycleVerb::Commit => "commit",
            LifecycleVerb::Rollback => "rollback",
            LifecycleVerb::GetReference => "get_reference",
            LifecycleVerb::Contains => "contains",
        }
    }
}

impl Display for LifecycleVerb {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Side effect the caller must carry out after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionEffect {
    None,
    /// Apply the same verb to related entities whose cascade policy
    /// covers it
    Cascade,
    /// Reload the entity's fields from the store
    Reload,
    /// Write pending changes to the store now
    Synchronize,
    /// Leave pending changes for commit time
    Deferred,
}

/// Outcome of applying a verb to a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: EntityState,
    pub effect: TransitionEffect,
}

impl Transition {
    fn stay(state: EntityState) -> Self {
        Transition {
            next: state,
            effect: TransitionEffect::None,
        }
    }

    fn to(next: EntityState) -> Self {
        Transition {
            next,
            effect: TransitionEffect::None,
        }
    }

    fn with(next: EntityState, effect: TransitionEffect) -> Self {
        Transition { next, effect }
    }

    pub fn changes_state(&self, from: EntityState) -> bool {
        self.next != from
    }
}

/// Applies `verb` to an entity in `state`.
///
/// Total over every (state, verb) pair. A forbidden pair fails with
/// `ErrorKind::IllegalEntityState` carrying both.
pub fn transition(
    state: EntityState,
    verb: LifecycleVerb,
    flush_mode: FlushMode,
    context: PersistenceContextType,
) -> TesseraResult<Transition> {
    use EntityState::*;
    use LifecycleVerb::*;

    let outcome = match (state, verb) {
        (Transient, Persist) => Transition::to(Managed),
        (Managed, Persist) => Transition::with(Managed, TransitionEffect::Cascade),
        (Detached, Persist) | (Removed, Persist) => return illegal(state, verb),

        (Managed, Remove) => Transition::with(Removed, TransitionEffect::Cascade),
        (Removed, Remove) => Transition::stay(Removed),
        (Transient, Remove) | (Detached, Remove) => return illegal(state, verb),

        (Transient, Merge) => Transition::stay(Transient),
        (Managed, Merge) => Transition::with(Managed, TransitionEffect::Cascade),
        (Detached, Merge) => Transition::to(Managed),
        (Removed, Merge) => return illegal(state, verb),

        (Managed, Refresh) => Transition::with(Managed, TransitionEffect::Reload),
        (Transient, Refresh) | (Detached, Refresh) | (Removed, Refresh) => {
            return illegal(state, verb)
        }

        (Managed, Close) | (Managed, Commit) => Transition::to(Detached),
        (Managed, Rollback) => match context {
            PersistenceContextType::Extended => Transition::to(Transient),
            PersistenceContextType::Transactional => Transition::to(Detached),
        },
        (_, Close) | (_, Commit) | (_, Rollback) => Transition::stay(state),

        (Managed, Flush) => match flush_mode {
            FlushMode::Auto => Transition::with(Managed, TransitionEffect::Synchronize),
            FlushMode::Commit => Transition::with(Managed, TransitionEffect::Deferred),
        },
        (_, Flush) => Transition::stay(state),

        (_, Find) | (_, Clear) | (_, Lock) | (_, Detach) | (_, GetReference) | (_, Contains) => {
            Transition::stay(state)
        }
    };
    Ok(outcome)
}

fn illegal(state: EntityState, verb: LifecycleVerb) -> TesseraResult<Transition> {
    log::error!("Cannot {} an entity in {} state", verb, state);
    Err(TesseraError::illegal_state(state, verb))
}
