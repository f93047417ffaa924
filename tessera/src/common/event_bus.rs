use crate::common::TESSERA_EVENT;
use crate::errors::{ErrorKind, TesseraError, TesseraResult};
use basu::error::BasuError;
use basu::event::Event;
use basu::{EventBus, Handle, HandlerId};
use std::marker::PhantomData;
use std::sync::Arc;

/// Publishes events to registered listeners.
///
/// Used for entity lifecycle callbacks and for store write notifications.
/// Publishing with no listeners registered is a cheap early return.
///
/// ```ignore
/// let bus: TesseraEventBus<EntityEvent, EntityEventListener> = TesseraEventBus::new();
/// let subscriber = bus.register(listener)?;
/// bus.publish(event)?;
/// bus.deregister(subscriber)?;
/// ```
#[derive(Clone)]
pub struct TesseraEventBus<E, L> {
    inner: Arc<TesseraEventBusInner<E, L>>,
}

impl<E, L> Default for TesseraEventBus<E, L>
where
    L: Handle<E> + 'static,
    E: Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E, L> TesseraEventBus<E, L>
where
    L: Handle<E> + 'static,
    E: Send + Sync,
{
    pub fn new() -> Self {
        TesseraEventBus {
            inner: Arc::new(TesseraEventBusInner::new()),
        }
    }

    pub fn register(&self, listener: L) -> TesseraResult<SubscriberRef> {
        self.inner.register(listener)
    }

    pub fn deregister(&self, subscriber: SubscriberRef) -> TesseraResult<()> {
        self.inner.deregister(subscriber)
    }

    pub fn publish(&self, event: E) -> TesseraResult<()> {
        self.inner.publish(event)
    }

    pub fn close(&self) -> TesseraResult<()> {
        self.inner.close()
    }

    pub fn has_listeners(&self) -> bool {
        self.inner.has_listeners()
    }
}

/// Handle returned on registration, used to deregister the listener.
pub struct SubscriberRef {
    pub(crate) inner: HandlerId,
}

impl SubscriberRef {
    pub fn new(inner: HandlerId) -> Self {
        SubscriberRef { inner }
    }
}

struct TesseraEventBusInner<E, L> {
    event_bus: EventBus<E>,
    phantom_data: PhantomData<L>,
}

impl<E, L> TesseraEventBusInner<E, L>
where
    L: Handle<E> + 'static,
    E: Send + Sync,
{
    fn new() -> Self {
        TesseraEventBusInner {
            event_bus: EventBus::new(),
            phantom_data: PhantomData,
        }
    }

    fn register(&self, listener: L) -> TesseraResult<SubscriberRef> {
        self.event_bus
            .subscribe(TESSERA_EVENT, Box::new(listener))
            .map(SubscriberRef::new)
            .map_err(Self::tessera_error)
    }

    fn deregister(&self, subscriber: SubscriberRef) -> TesseraResult<()> {
        self.event_bus
            .unsubscribe(TESSERA_EVENT, &subscriber.inner)
            .map_err(Self::tessera_error)
    }

    fn publish(&self, event: E) -> TesseraResult<()> {
        let handler_count = match self.event_bus.get_handler_count(TESSERA_EVENT) {
            Ok(count) => count,
            Err(BasuError::EventTypeNotFOUND) => return Ok(()),
            Err(e) => return Err(Self::tessera_error(e)),
        };

        if handler_count == 0 {
            return Ok(());
        }

        let basu_event = Event::new(event);
        self.event_bus
            .publish(TESSERA_EVENT, &basu_event)
            .map_err(Self::tessera_error)
    }

    fn close(&self) -> TesseraResult<()> {
        self.event_bus.clear().map_err(Self::tessera_error)
    }

    fn has_listeners(&self) -> bool {
        match self.event_bus.get_handler_count(TESSERA_EVENT) {
            Ok(count) => count > 0,
            Err(BasuError::EventTypeNotFOUND) => false,
            Err(e) => {
                log::warn!("Failed to check listeners: {}, defaulting to false", e);
                false
            }
        }
    }

    fn tessera_error(e: BasuError) -> TesseraError {
        match e {
            BasuError::EventTypeNotFOUND => TesseraError::new(
                "Event bus error: the event type is not registered",
                ErrorKind::EventError,
            ),
            BasuError::MutexPoisoned => TesseraError::new(
                "Event bus error: internal mutex poisoned",
                ErrorKind::EventError,
            ),
            BasuError::HandlerError(e) => {
                let message = e
                    .source()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| e.to_string());
                TesseraError::new(
                    &format!("Event handler error: {}", message),
                    ErrorKind::EventError,
                )
            }
        }
    }
}
