use indexmap::IndexMap;

use crate::common::{Document, Value, DOC_ID, LOB_ENTITY_ID};
use crate::errors::{ErrorKind, TesseraError, TesseraResult};
use crate::graph::RelationHolder;
use crate::metadata::EntityMetadata;
use crate::store::LargeObject;

/// Translates between an entity's document form and the documents it is
/// stored as.
///
/// An entity is split into one document per collection. Each carries the
/// entity id under `_id`. Fields declared by a secondary table go to that
/// table. Every other field, relation columns and the discriminator
/// column go to the primary table. The identifier field itself is only
/// written as `_id`.
pub struct DocumentMapper<'a> {
    metadata: &'a EntityMetadata,
}

impl<'a> DocumentMapper<'a> {
    pub fn new(metadata: &'a EntityMetadata) -> Self {
        DocumentMapper { metadata }
    }

    /// Splits `data` into per-collection documents, primary table first.
    pub fn to_documents(
        &self,
        data: &Document,
        id: &Value,
        relations: &[RelationHolder],
    ) -> TesseraResult<IndexMap<String, Document>> {
        let mut documents = IndexMap::new();
        for collection in self.metadata.collections() {
            let mut document = Document::new();
            document.put(DOC_ID, id.clone())?;
            documents.insert(collection.to_string(), document);
        }

        let id_field = self.metadata.id().field_name();
        let lob_field = self.metadata.lob_field();
        for (field, value) in data.iter() {
            if field.as_str() == id_field
                || Some(field.as_str()) == lob_field
                || self.metadata.relation(field).is_some()
            {
                continue;
            }

            let collection = self.metadata.collection_for_field(field);
            if let Some(document) = documents.get_mut(collection) {
                document.put(field, value.clone())?;
            }
        }

        if let Some(primary) = documents.get_mut(self.metadata.table_name()) {
            for holder in relations {
                primary.put(holder.relation_name(), holder.related_id().clone())?;
            }
            if let Some(discriminator) = self.metadata.discriminator() {
                primary.put(discriminator.column(), discriminator.value())?;
            }
        }

        Ok(documents)
    }

    /// Turns a stored (merged) document back into the entity's document
    /// form by moving `_id` to the identifier field.
    pub fn from_document(&self, mut stored: Document) -> TesseraResult<Document> {
        if let Some(id) = stored.remove(DOC_ID) {
            stored.put(self.metadata.id().field_name(), id)?;
        }
        Ok(stored)
    }

    /// Builds the large object of an entity: the large-object field is the
    /// content, the remaining fields plus `id` are the metadata.
    pub fn to_large_object(&self, data: &Document, id: &Value) -> TesseraResult<LargeObject> {
        let lob_field = self.lob_field()?;
        let content = match data.get(lob_field) {
            Some(Value::Bytes(bytes)) => bytes.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                log::error!("Large object field {} holds {}", lob_field, other);
                return Err(TesseraError::new(
                    &format!("Large object field {} must hold binary data", lob_field),
                    ErrorKind::ObjectMappingError,
                ));
            }
        };

        let id_field = self.metadata.id().field_name();
        let mut metadata = Document::new();
        for (field, value) in data.iter() {
            if field.as_str() != lob_field && field.as_str() != id_field {
                metadata.put(field, value.clone())?;
            }
        }
        metadata.put(LOB_ENTITY_ID, id.clone())?;

        let filename = format!("{}_{}", self.metadata.table_name(), id.to_plain_string());
        Ok(LargeObject::new(&filename, content, metadata))
    }

    pub fn from_large_object(&self, object: &LargeObject) -> TesseraResult<Document> {
        let lob_field = self.lob_field()?;
        let mut document = object.metadata().clone();
        if let Some(id) = document.remove(LOB_ENTITY_ID) {
            document.put(self.metadata.id().field_name(), id)?;
        }
        document.put(lob_field, Value::Bytes(object.content().to_vec()))?;
        Ok(document)
    }

    fn lob_field(&self) -> TesseraResult<&'a str> {
        self.metadata.lob_field().ok_or_else(|| {
            log::error!("Entity {} has no large object field", self.metadata.entity_name());
            TesseraError::new(
                &format!("Entity {} has no large object field", self.metadata.entity_name()),
                ErrorKind::InvalidOperation,
            )
        })
    }
}
