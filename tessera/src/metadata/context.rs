use indexmap::IndexMap;
use std::sync::Arc;

use crate::common::Document;
use crate::errors::{ErrorKind, TesseraError, TesseraResult};
use crate::metadata::{Entity, EntityMetadata};

/// Immutable registry of entity metadata.
///
/// Built once with [MetadataContext::builder] and then shared by cloning;
/// all clones point to the same registry.
///
/// ```rust,ignore
/// let metadata = MetadataContext::builder()
///     .register::<User>()
///     .register::<Vehicle>()
///     .register::<Car>()
///     .build()?;
/// let vehicle = metadata.metadata("Vehicle")?;
/// ```
#[derive(Clone, Debug)]
pub struct MetadataContext {
    inner: Arc<MetadataContextInner>,
}

#[derive(Debug)]
struct MetadataContextInner {
    entities: IndexMap<String, EntityMetadata>,
}

impl MetadataContext {
    pub fn builder() -> MetadataContextBuilder {
        MetadataContextBuilder {
            entities: IndexMap::new(),
        }
    }

    /// Looks up metadata by entity name.
    pub fn metadata(&self, entity_name: &str) -> TesseraResult<&EntityMetadata> {
        self.inner.entities.get(entity_name).ok_or_else(|| {
            log::error!("No metadata registered for entity {}", entity_name);
            TesseraError::new(
                &format!("No metadata registered for entity {}", entity_name),
                ErrorKind::MetadataNotFound,
            )
        })
    }

    pub fn metadata_of<E: Entity>(&self) -> TesseraResult<&EntityMetadata> {
        let name = E::entity_metadata().entity_name().to_string();
        self.metadata(&name)
    }

    pub fn contains(&self, entity_name: &str) -> bool {
        self.inner.entities.contains_key(entity_name)
    }

    pub fn entity_names(&self) -> Vec<&str> {
        self.inner.entities.keys().map(|k| k.as_str()).collect()
    }

    /// Picks the concrete type of a stored document.
    ///
    /// A type without subtypes resolves to itself, provided the document
    /// carries its own discriminator when it declares one. Otherwise the
    /// first subtype, in declaration order, whose discriminator matches
    /// the document is returned, or `None` if none does.
    pub fn resolve_concrete<'a>(
        &'a self,
        metadata: &'a EntityMetadata,
        document: &Document,
    ) -> TesseraResult<Option<&'a EntityMetadata>> {
        if !metadata.has_sub_types() {
            return Ok(match metadata.discriminator() {
                Some(discriminator)
                    if !discriminator.matches(document.get(discriminator.column())) =>
                {
                    None
                }
                _ => Some(metadata),
            });
        }

        for sub_type in metadata.sub_types() {
            let sub_metadata = self.metadata(sub_type)?;
            if let Some(discriminator) = sub_metadata.discriminator() {
                if discriminator.matches(document.get(discriminator.column())) {
                    return Ok(Some(sub_metadata));
                }
            }
        }
        Ok(None)
    }
}

pub struct MetadataContextBuilder {
    entities: IndexMap<String, EntityMetadata>,
}

impl MetadataContextBuilder {
    pub fn register<E: Entity>(self) -> Self {
        self.register_metadata(E::entity_metadata())
    }

    /// Registers metadata directly; a later registration under the same
    /// entity name replaces the earlier one.
    pub fn register_metadata(mut self, metadata: EntityMetadata) -> Self {
        self.entities
            .insert(metadata.entity_name().to_string(), metadata);
        self
    }

    /// Validates every registration and freezes the registry.
    ///
    /// # Errors
    ///
    /// Fails with `ConfigurationError` if an entity is malformed, or if a
    /// declared subtype is unregistered or has no discriminator.
    pub fn build(self) -> TesseraResult<MetadataContext> {
        for metadata in self.entities.values() {
            metadata.validate()?;
            for sub_type in metadata.sub_types() {
                match self.entities.get(sub_type) {
                    None => {
                        log::error!(
                            "Subtype {} of {} is not registered",
                            sub_type,
                            metadata.entity_name()
                        );
                        return Err(TesseraError::new(
                            &format!(
                                "Subtype {} of {} is not registered",
                                sub_type,
                                metadata.entity_name()
                            ),
                            ErrorKind::ConfigurationError,
                        ));
                    }
                    Some(sub) if sub.discriminator().is_none() => {
                        log::error!("Subtype {} has no discriminator", sub_type);
                        return Err(TesseraError::new(
                            &format!("Subtype {} has no discriminator", sub_type),
                            ErrorKind::ConfigurationError,
                        ));
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(MetadataContext {
            inner: Arc::new(MetadataContextInner {
                entities: self.entities,
            }),
        })
    }
}
