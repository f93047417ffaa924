use crate::common::{Document, Value};
use crate::errors::TesseraResult;
use crate::graph::{EntityEventBus, EntityEventInfo, EntityEvents, RelationHolder, TrackedEntity};
use crate::lifecycle::{EntityState, EntityStateManager};

/// A tracked entity together with its pending write intent.
///
/// A node is dirty exactly when it needs a write. `is_update` selects
/// between an insert and a find-then-merge update.
#[derive(Debug, Clone)]
pub struct Node {
    tracked: TrackedEntity,
    state: EntityStateManager,
    dirty: bool,
    is_update: bool,
}

impl Node {
    pub fn new(tracked: TrackedEntity, state: EntityStateManager) -> Self {
        Node {
            tracked,
            state,
            dirty: false,
            is_update: false,
        }
    }

    /// A node that needs an insert.
    pub fn for_insert(tracked: TrackedEntity, state: EntityStateManager) -> Self {
        let mut node = Node::new(tracked, state);
        node.mark_dirty(false);
        node
    }

    /// A node that needs an update of an existing record.
    pub fn for_update(tracked: TrackedEntity, state: EntityStateManager) -> Self {
        let mut node = Node::new(tracked, state);
        node.mark_dirty(true);
        node
    }

    pub fn tracked(&self) -> &TrackedEntity {
        &self.tracked
    }

    pub fn tracked_mut(&mut self) -> &mut TrackedEntity {
        &mut self.tracked
    }

    pub fn entity_name(&self) -> &str {
        self.tracked.entity_name()
    }

    pub fn entity_id(&self) -> &Value {
        self.tracked.id()
    }

    pub fn data(&self) -> &Document {
        self.tracked.data()
    }

    pub fn relations(&self) -> &Vec<RelationHolder> {
        self.tracked.relations()
    }

    pub fn key(&self) -> String {
        self.tracked.key()
    }

    pub fn state(&self) -> EntityState {
        self.state.state()
    }

    pub fn state_manager(&self) -> &EntityStateManager {
        &self.state
    }

    pub fn state_manager_mut(&mut self) -> &mut EntityStateManager {
        &mut self.state
    }

    pub fn is_in_state(&self, state: EntityState) -> bool {
        self.state.is_in_state(state)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_update(&self) -> bool {
        self.is_update
    }

    /// Flags the node for a write. An update intent is sticky: once the
    /// record is known to exist, later marks keep it an update.
    pub fn mark_dirty(&mut self, is_update: bool) {
        self.dirty = true;
        self.is_update = self.is_update || is_update;
    }

    /// Clears the write flag; clearing a clean node does nothing.
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Once written, any further write of this node is an update.
    pub(crate) fn mark_written(&mut self) {
        self.clear_dirty();
        self.is_update = true;
    }

    /// Turns the pending write back into an insert.
    pub(crate) fn reset_update(&mut self) {
        self.is_update = false;
    }

    fn events(&self) -> (EntityEvents, EntityEvents) {
        if self.is_in_state(EntityState::Removed) {
            (EntityEvents::PreRemove, EntityEvents::PostRemove)
        } else if self.is_update {
            (EntityEvents::PreUpdate, EntityEvents::PostUpdate)
        } else {
            (EntityEvents::PrePersist, EntityEvents::PostPersist)
        }
    }

    fn publish(&self, bus: &EntityEventBus, event: EntityEvents) -> TesseraResult<()> {
        if !bus.has_listeners() {
            return Ok(());
        }
        bus.publish(EntityEventInfo::new(
            event,
            self.entity_name(),
            self.entity_id().clone(),
            self.data().clone(),
        ))
    }

    pub fn handle_pre_event(&self, bus: &EntityEventBus) -> TesseraResult<()> {
        self.publish(bus, self.events().0)
    }

    pub fn handle_post_event(&self, bus: &EntityEventBus) -> TesseraResult<()> {
        self.publish(bus, self.events().1)
    }
}
