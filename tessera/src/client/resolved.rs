use indexmap::IndexMap;

use crate::common::{Convertible, Document, Value};
use crate::errors::TesseraResult;
use crate::metadata::{Entity, EntityMetadata};

/// An entity read back from the store.
///
/// `metadata` is the concrete type picked by discriminator resolution,
/// `document` the entity's fields in document form and `relations` the
/// value of every relation column the type declares.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEntity {
    metadata: EntityMetadata,
    document: Document,
    relations: IndexMap<String, Value>,
}

impl ResolvedEntity {
    pub(crate) fn new(metadata: &EntityMetadata, document: Document) -> Self {
        let relations = metadata
            .relations()
            .iter()
            .map(|relation| {
                let value = document.get(relation.name()).cloned().unwrap_or(Value::Null);
                (relation.name().to_string(), value)
            })
            .collect();

        ResolvedEntity {
            metadata: metadata.clone(),
            document,
            relations,
        }
    }

    pub fn metadata(&self) -> &EntityMetadata {
        &self.metadata
    }

    pub fn entity_name(&self) -> &str {
        self.metadata.entity_name()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn relations(&self) -> &IndexMap<String, Value> {
        &self.relations
    }

    pub fn to_entity<E: Entity>(&self) -> TesseraResult<E> {
        E::from_value(&Value::Document(self.document.clone()))
    }
}
