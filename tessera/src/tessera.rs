use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::batch::BatchSize;
use crate::client::DocumentClient;
use crate::config::TesseraConfig;
use crate::errors::{ErrorKind, TesseraError, TesseraResult};
use crate::graph::{EntityEventBus, EntityEventListener};
use crate::lifecycle::{FlushMode, PersistenceContextType};
use crate::metadata::{Entity, EntityMetadata, MetadataContext, MetadataContextBuilder};
use crate::session::Session;
use crate::store::memory::InMemoryStore;
use crate::store::DocumentStore;

/// Builds a [Tessera] instance.
///
/// Setters record the first error they meet; [TesseraBuilder::build]
/// returns it.
///
/// ```ignore
/// let db = Tessera::builder()
///     .batch_size(100)
///     .flush_mode(FlushMode::Commit)
///     .register::<User>()
///     .build()?;
/// ```
pub struct TesseraBuilder {
    error: Option<TesseraError>,
    config: TesseraConfig,
    store: Option<DocumentStore>,
    metadata: MetadataContextBuilder,
    listeners: Vec<EntityEventListener>,
}

impl Default for TesseraBuilder {
    fn default() -> Self {
        TesseraBuilder::new()
    }
}

impl TesseraBuilder {
    pub fn new() -> Self {
        TesseraBuilder {
            error: None,
            config: TesseraConfig::new(),
            store: None,
            metadata: MetadataContext::builder(),
            listeners: Vec::new(),
        }
    }

    /// Number of staged nodes that triggers a batch write. `0` is
    /// rejected.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        if self.error.is_none() {
            match BatchSize::new(batch_size) {
                Ok(size) => self.config.set_batch_size(size),
                Err(e) => self.error = Some(e),
            }
        }
        self
    }

    pub fn flush_mode(mut self, flush_mode: FlushMode) -> Self {
        self.config.set_flush_mode(flush_mode);
        self
    }

    pub fn persistence_context(mut self, context_type: PersistenceContextType) -> Self {
        self.config.set_persistence_context(context_type);
        self
    }

    /// Logs every store statement at info level.
    pub fn show_query(mut self, show_query: bool) -> Self {
        self.config.set_show_query(show_query);
        self
    }

    /// Applies `tessera.*` properties on top of the settings made so far.
    pub fn properties(mut self, properties: &HashMap<String, String>) -> Self {
        if self.error.is_none() {
            for (key, value) in properties {
                if let Err(e) = self.config.set_property(key, value) {
                    self.error = Some(e);
                    break;
                }
            }
        }
        self
    }

    /// Document store to write to. Defaults to an [InMemoryStore].
    pub fn store(mut self, store: DocumentStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn register<E: Entity>(mut self) -> Self {
        self.metadata = self.metadata.register::<E>();
        self
    }

    pub fn register_metadata(mut self, metadata: EntityMetadata) -> Self {
        self.metadata = self.metadata.register_metadata(metadata);
        self
    }

    pub fn add_entity_listener(mut self, listener: EntityEventListener) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn build(self) -> TesseraResult<Tessera> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let metadata = self.metadata.build()?;
        let event_bus = EntityEventBus::new();
        for listener in self.listeners {
            event_bus.register(listener)?;
        }

        let store = self
            .store
            .unwrap_or_else(|| DocumentStore::new(InMemoryStore::default()));
        log::debug!("Opening tessera with {:?}", self.config);
        Ok(Tessera::new(store, metadata, event_bus, self.config))
    }
}

/// Entry point: holds the store, the entity registry and the
/// configuration, and opens [Session]s.
#[derive(Clone)]
pub struct Tessera {
    inner: Arc<TesseraInner>,
}

impl Tessera {
    pub fn builder() -> TesseraBuilder {
        TesseraBuilder::new()
    }

    fn new(
        store: DocumentStore,
        metadata: MetadataContext,
        event_bus: EntityEventBus,
        config: TesseraConfig,
    ) -> Self {
        let client = DocumentClient::new(store.clone(), metadata.clone(), event_bus.clone(), &config);
        Tessera {
            inner: Arc::new(TesseraInner {
                closed: AtomicBool::new(false),
                store,
                metadata,
                event_bus,
                config,
                client,
            }),
        }
    }

    /// Opens a session with its own write batch.
    pub fn session(&self) -> TesseraResult<Session> {
        self.check_opened()?;
        let inner = &self.inner;
        let client = DocumentClient::new(
            inner.store.clone(),
            inner.metadata.clone(),
            inner.event_bus.clone(),
            &inner.config,
        );
        Ok(Session::new(
            client,
            inner.metadata.clone(),
            inner.config.flush_mode(),
            inner.config.persistence_context(),
        ))
    }

    /// Client for direct store access outside a session.
    pub fn client(&self) -> &DocumentClient {
        &self.inner.client
    }

    pub fn store(&self) -> &DocumentStore {
        &self.inner.store
    }

    pub fn metadata(&self) -> &MetadataContext {
        &self.inner.metadata
    }

    pub fn config(&self) -> &TesseraConfig {
        &self.inner.config
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Closes the store. Sessions opened earlier fail on their next write.
    pub fn close(&self) -> TesseraResult<()> {
        if self
            .inner
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(());
        }

        self.inner.client.close()?;
        self.inner.event_bus.close()?;
        self.inner.store.close()
    }

    fn check_opened(&self) -> TesseraResult<()> {
        if self.is_closed() {
            log::error!("Tessera instance is closed");
            return Err(TesseraError::new(
                "Tessera instance is closed",
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }
}

impl Debug for Tessera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tessera")
            .field("config", &self.inner.config)
            .field("entities", &self.inner.metadata.entity_names())
            .field("closed", &self.is_closed())
            .finish()
    }
}

struct TesseraInner {
    closed: AtomicBool,
    store: DocumentStore,
    metadata: MetadataContext,
    event_bus: EntityEventBus,
    config: TesseraConfig,
    client: DocumentClient,
}
