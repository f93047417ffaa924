use std::fmt::Display;
use std::str::FromStr;

use crate::errors::{ErrorKind, TesseraError, TesseraResult};
use crate::lifecycle::{transition, EntityState, LifecycleVerb, Transition, TransitionEffect};

/// When pending changes of managed entities reach the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FlushMode {
    /// `flush` writes pending changes immediately
    #[default]
    Auto,
    /// `flush` is deferred; changes are written at commit
    Commit,
}

impl FromStr for FlushMode {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AUTO" => Ok(FlushMode::Auto),
            "COMMIT" => Ok(FlushMode::Commit),
            other => {
                log::error!("Unknown flush mode {}", other);
                Err(TesseraError::new(
                    &format!("Unknown flush mode {}", other),
                    ErrorKind::ConfigurationError,
                ))
            }
        }
    }
}

impl Display for FlushMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlushMode::Auto => write!(f, "AUTO"),
            FlushMode::Commit => write!(f, "COMMIT"),
        }
    }
}

/// Scope of a persistence context, which decides where rollback sends a
/// managed entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PersistenceContextType {
    /// Context outlives transactions; rollback returns entities to transient
    #[default]
    Extended,
    /// Context ends with the transaction; rollback detaches entities
    Transactional,
}

impl FromStr for PersistenceContextType {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EXTENDED" => Ok(PersistenceContextType::Extended),
            "TRANSACTIONAL" => Ok(PersistenceContextType::Transactional),
            other => {
                log::error!("Unknown persistence context type {}", other);
                Err(TesseraError::new(
                    &format!("Unknown persistence context type {}", other),
                    ErrorKind::ConfigurationError,
                ))
            }
        }
    }
}

impl Display for PersistenceContextType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistenceContextType::Extended => write!(f, "EXTENDED"),
            PersistenceContextType::Transactional => write!(f, "TRANSACTIONAL"),
        }
    }
}

/// Holds the lifecycle state of one tracked entity.
///
/// Each verb method applies the transition table to the current state,
/// replaces the state on success and returns the effect the caller has
/// to carry out. On error the state is left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityStateManager {
    state: EntityState,
    flush_mode: FlushMode,
    context_type: PersistenceContextType,
}

impl EntityStateManager {
    pub fn new(flush_mode: FlushMode, context_type: PersistenceContextType) -> Self {
        EntityStateManager {
            state: EntityState::Transient,
            flush_mode,
            context_type,
        }
    }

    /// Starts tracking in `state` rather than transient, e.g. for an
    /// entity loaded from the store.
    pub fn with_state(
        state: EntityState,
        flush_mode: FlushMode,
        context_type: PersistenceContextType,
    ) -> Self {
        EntityStateManager {
            state,
            flush_mode,
            context_type,
        }
    }

    pub fn state(&self) -> EntityState {
        self.state
    }

    pub fn flush_mode(&self) -> FlushMode {
        self.flush_mode
    }

    pub fn context_type(&self) -> PersistenceContextType {
        self.context_type
    }

    pub fn is_in_state(&self, state: EntityState) -> bool {
        self.state == state
    }

    /// Applies `verb` and returns the resulting effect.
    pub fn apply(&mut self, verb: LifecycleVerb) -> TesseraResult<TransitionEffect> {
        let Transition { next, effect } =
            transition(self.state, verb, self.flush_mode, self.context_type)?;
        if next != self.state {
            log::debug!("Entity moved from {} to {} on {}", self.state, next, verb);
        }
        self.state = next;
        Ok(effect)
    }

    pub fn persist(&mut self) -> TesseraResult<TransitionEffect> {
        self.apply(LifecycleVerb::Persist)
    }

    pub fn remove(&mut self) -> TesseraResult<TransitionEffect> {
        self.apply(LifecycleVerb::Remove)
    }

    pub fn refresh(&mut self) -> TesseraResult<TransitionEffect> {
        self.apply(LifecycleVerb::Refresh)
    }

    pub fn merge(&mut self) -> TesseraResult<TransitionEffect> {
        self.apply(LifecycleVerb::Merge)
    }

    pub fn find(&mut self) -> TesseraResult<TransitionEffect> {
        self.apply(LifecycleVerb::Find)
    }

    pub fn close(&mut self) -> TesseraResult<TransitionEffect> {
        self.apply(LifecycleVerb::Close)
    }

    pub fn clear(&mut self) -> TesseraResult<TransitionEffect> {
        self.apply(LifecycleVerb::Clear)
    }

    pub fn flush(&mut self) -> TesseraResult<TransitionEffect> {
        self.apply(LifecycleVerb::Flush)
    }

    pub fn lock(&mut self) -> TesseraResult<TransitionEffect> {
        self.apply(LifecycleVerb::Lock)
    }

    pub fn detach(&mut self) -> TesseraResult<TransitionEffect> {
        self.apply(LifecycleVerb::Detach)
    }

    pub fn commit(&mut self) -> TesseraResult<TransitionEffect> {
        self.apply(LifecycleVerb::Commit)
    }

    pub fn rollback(&mut self) -> TesseraResult<TransitionEffect> {
        self.apply(LifecycleVerb::Rollback)
    }

    pub fn get_reference(&mut self) -> TesseraResult<TransitionEffect> {
        self.apply(LifecycleVerb::GetReference)
    }

    /// Whether the entity belongs to the persistence context.
    pub fn contains(&self) -> bool {
        self.state == EntityState::Managed
    }
}

impl Default for EntityStateManager {
    fn default() -> Self {
        EntityStateManager::new(FlushMode::default(), PersistenceContextType::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_manager_is_transient() {
        let manager = EntityStateManager::default();
        assert_eq!(manager.state(), EntityState::Transient);
        assert!(!manager.contains());
    }

    #[test]
    fn test_persist_then_commit() {
        let mut manager = EntityStateManager::default();
        assert_eq!(manager.persist().unwrap(), TransitionEffect::None);
        assert!(manager.contains());
        manager.commit().unwrap();
        assert_eq!(manager.state(), EntityState::Detached);
    }

    #[test]
    fn test_failed_verb_keeps_state() {
        let mut manager = EntityStateManager::with_state(
            EntityState::Detached,
            FlushMode::Auto,
            PersistenceContextType::Extended,
        );
        let err = manager.remove().unwrap_err();
        assert_eq!(
            err.illegal_transition(),
            Some((EntityState::Detached, LifecycleVerb::Remove))
        );
        assert_eq!(manager.state(), EntityState::Detached);

        manager.merge().unwrap();
        assert_eq!(manager.state(), EntityState::Managed);
    }

    #[test]
    fn test_remove_then_persist_fails() {
        let mut manager = EntityStateManager::default();
        manager.persist().unwrap();
        assert_eq!(manager.remove().unwrap(), TransitionEffect::Cascade);
        assert!(manager.is_in_state(EntityState::Removed));
        assert!(manager.persist().is_err());
        assert!(manager.remove().is_ok());
    }

    #[test]
    fn test_rollback_in_transactional_context() {
        let mut manager =
            EntityStateManager::new(FlushMode::Commit, PersistenceContextType::Transactional);
        manager.persist().unwrap();
        assert_eq!(manager.flush().unwrap(), TransitionEffect::Deferred);
        manager.rollback().unwrap();
        assert_eq!(manager.state(), EntityState::Detached);
    }

    #[test]
    fn test_detach_is_noop() {
        let mut manager = EntityStateManager::default();
        manager.persist().unwrap();
        manager.detach().unwrap();
        manager.lock().unwrap();
        manager.get_reference().unwrap();
        manager.find().unwrap();
        manager.clear().unwrap();
        assert_eq!(manager.state(), EntityState::Managed);
    }

    #[test]
    fn test_parse_modes() {
        assert_eq!("commit".parse::<FlushMode>().unwrap(), FlushMode::Commit);
        assert_eq!(" AUTO ".parse::<FlushMode>().unwrap(), FlushMode::Auto);
        assert!("never".parse::<FlushMode>().is_err());
        assert_eq!(
            "Transactional".parse::<PersistenceContextType>().unwrap(),
            PersistenceContextType::Transactional
        );
        let err = "global".parse::<PersistenceContextType>().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ConfigurationError);
    }
}
