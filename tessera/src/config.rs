use std::collections::HashMap;
use std::fmt::{Debug, Formatter};

use crate::batch::BatchSize;
use crate::common::{PROP_BATCH_SIZE, PROP_FLUSH_MODE, PROP_PERSISTENCE_CONTEXT, PROP_SHOW_QUERY};
use crate::errors::{ErrorKind, TesseraError, TesseraResult};
use crate::lifecycle::{FlushMode, PersistenceContextType};

/// Runtime settings of a [Tessera](crate::Tessera) instance.
///
/// Values are set through [TesseraBuilder](crate::TesseraBuilder) or read
/// from a property map with [TesseraConfig::from_properties].
///
/// | Property | Values |
/// |---|---|
/// | `tessera.batch.size` | positive integer |
/// | `tessera.flush.mode` | `AUTO`, `COMMIT` |
/// | `tessera.persistence.context` | `EXTENDED`, `TRANSACTIONAL` |
/// | `tessera.show.query` | `true`, `false` |
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TesseraConfig {
    batch_size: BatchSize,
    flush_mode: FlushMode,
    persistence_context: PersistenceContextType,
    show_query: bool,
}

impl TesseraConfig {
    pub fn new() -> Self {
        TesseraConfig::default()
    }

    /// Reads settings from `properties`. Missing keys keep their defaults
    /// and unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Any malformed value, including a batch size of `0`, is a
    /// `ConfigurationError`.
    pub fn from_properties(properties: &HashMap<String, String>) -> TesseraResult<Self> {
        let mut config = TesseraConfig::default();
        for (key, value) in properties {
            config.set_property(key, value)?;
        }
        Ok(config)
    }

    /// Applies a single property.
    pub fn set_property(&mut self, key: &str, value: &str) -> TesseraResult<()> {
        match key {
            PROP_BATCH_SIZE => self.batch_size = value.parse()?,
            PROP_FLUSH_MODE => self.flush_mode = value.parse()?,
            PROP_PERSISTENCE_CONTEXT => self.persistence_context = value.parse()?,
            PROP_SHOW_QUERY => self.show_query = parse_flag(key, value)?,
            other => log::debug!("Ignoring unknown property {}", other),
        }
        Ok(())
    }

    pub fn batch_size(&self) -> BatchSize {
        self.batch_size
    }

    pub fn flush_mode(&self) -> FlushMode {
        self.flush_mode
    }

    pub fn persistence_context(&self) -> PersistenceContextType {
        self.persistence_context
    }

    pub fn show_query(&self) -> bool {
        self.show_query
    }

    pub(crate) fn set_batch_size(&mut self, batch_size: BatchSize) {
        self.batch_size = batch_size;
    }

    pub(crate) fn set_flush_mode(&mut self, flush_mode: FlushMode) {
        self.flush_mode = flush_mode;
    }

    pub(crate) fn set_persistence_context(&mut self, context: PersistenceContextType) {
        self.persistence_context = context;
    }

    pub(crate) fn set_show_query(&mut self, show_query: bool) {
        self.show_query = show_query;
    }
}

fn parse_flag(key: &str, value: &str) -> TesseraResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => {
            log::error!("Property {} expects true or false, found {}", key, other);
            Err(TesseraError::new(
                &format!("Property {} expects true or false, found {}", key, other),
                ErrorKind::ConfigurationError,
            ))
        }
    }
}

impl Debug for TesseraConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TesseraConfig")
            .field("batch_size", &self.batch_size.to_string())
            .field("flush_mode", &self.flush_mode.to_string())
            .field("persistence_context", &self.persistence_context.to_string())
            .field("show_query", &self.show_query)
            .finish()
    }
}
