use anyhow::Error;
use basu::error::BasuError;
use basu::event::Event;
use basu::Handle;
use std::fmt::Debug;
use std::sync::Arc;

use crate::common::{Document, TesseraEventBus, Value};
use crate::errors::TesseraResult;

/// Lifecycle callbacks fired around the write of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityEvents {
    PrePersist,
    PostPersist,
    PreUpdate,
    PostUpdate,
    PreRemove,
    PostRemove,
}

/// Payload delivered to entity event listeners.
#[derive(Clone)]
pub struct EntityEventInfo {
    event: EntityEvents,
    entity_name: String,
    id: Value,
    data: Document,
}

impl EntityEventInfo {
    pub fn new(event: EntityEvents, entity_name: &str, id: Value, data: Document) -> Self {
        EntityEventInfo {
            event,
            entity_name: entity_name.to_string(),
            id,
            data,
        }
    }

    pub fn event(&self) -> EntityEvents {
        self.event
    }

    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    pub fn id(&self) -> &Value {
        &self.id
    }

    pub fn data(&self) -> &Document {
        &self.data
    }
}

impl Debug for EntityEventInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityEventInfo")
            .field("event", &self.event)
            .field("entity_name", &self.entity_name)
            .field("id", &self.id)
            .finish()
    }
}

pub trait EntityEventCallback: Send + Sync + Fn(EntityEventInfo) -> TesseraResult<()> {}

impl<F> EntityEventCallback for F where F: Send + Sync + Fn(EntityEventInfo) -> TesseraResult<()> {}

/// Receives entity lifecycle callbacks.
///
/// ```ignore
/// let listener = EntityEventListener::new(|info| {
///     if info.event() == EntityEvents::PrePersist {
///         log::info!("saving {}", info.id());
///     }
///     Ok(())
/// });
/// ```
#[derive(Clone)]
pub struct EntityEventListener {
    on_event: Arc<dyn EntityEventCallback>,
}

impl EntityEventListener {
    pub fn new(on_event: impl EntityEventCallback + 'static) -> Self {
        EntityEventListener {
            on_event: Arc::new(on_event),
        }
    }
}

impl Handle<EntityEventInfo> for EntityEventListener {
    fn handle(&self, event: &Event<EntityEventInfo>) -> Result<(), BasuError> {
        match (self.on_event)(event.data.clone()) {
            Ok(_) => Ok(()),
            Err(e) => Err(BasuError::HandlerError(Error::from(e))),
        }
    }
}

impl Debug for EntityEventListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityEventListener").finish()
    }
}

pub type EntityEventBus = TesseraEventBus<EntityEventInfo, EntityEventListener>;
