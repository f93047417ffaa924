use anyhow::Error;
use basu::error::BasuError;
use basu::event::Event;
use basu::Handle;
use std::fmt::Debug;
use std::sync::Arc;

use crate::common::TesseraEventBus;
use crate::errors::TesseraResult;

/// Write notifications published by a document store.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StoreEvents {
    Inserted,
    Updated,
    Removed,
    LargeObjectSaved,
    LargeObjectRemoved,
    ScriptEvaluated,
    Closed,
}

/// Context delivered with each store event: the collection (or bucket)
/// written and the number of documents affected.
#[derive(Clone, Debug, PartialEq)]
pub struct StoreEventInfo {
    event: StoreEvents,
    collection: String,
    affected: u64,
}

impl StoreEventInfo {
    pub fn new(event: StoreEvents, collection: &str, affected: u64) -> Self {
        StoreEventInfo {
            event,
            collection: collection.to_string(),
            affected,
        }
    }

    pub fn event(&self) -> StoreEvents {
        self.event
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn affected(&self) -> u64 {
        self.affected
    }
}

pub trait StoreEventCallback: Send + Sync + Fn(StoreEventInfo) -> TesseraResult<()> {}

impl<F> StoreEventCallback for F where F: Send + Sync + Fn(StoreEventInfo) -> TesseraResult<()> {}

/// Listener for [StoreEvents].
///
/// ```ignore
/// let listener = StoreEventListener::new(|info| {
///     log::debug!("{:?} {} rows in {}", info.event(), info.affected(), info.collection());
///     Ok(())
/// });
/// store.subscribe(listener)?;
/// ```
#[derive(Clone)]
pub struct StoreEventListener {
    on_event: Arc<dyn StoreEventCallback>,
}

impl StoreEventListener {
    pub fn new(on_event: impl StoreEventCallback + 'static) -> Self {
        StoreEventListener {
            on_event: Arc::new(on_event),
        }
    }
}

impl Handle<StoreEventInfo> for StoreEventListener {
    fn handle(&self, event: &Event<StoreEventInfo>) -> Result<(), BasuError> {
        match (self.on_event)(event.data.clone()) {
            Ok(_) => Ok(()),
            Err(e) => Err(BasuError::HandlerError(Error::from(e))),
        }
    }
}

impl Debug for StoreEventListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreEventListener").finish()
    }
}

pub type StoreEventBus = TesseraEventBus<StoreEventInfo, StoreEventListener>;
