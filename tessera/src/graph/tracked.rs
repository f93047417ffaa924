use crate::common::{Convertible, Document, Value};
use crate::errors::{ErrorKind, TesseraError, TesseraResult};
use crate::lifecycle::LifecycleVerb;
use crate::metadata::{CascadeType, Entity, EntityMetadata};

/// A resolved reference from a tracked entity to a related entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationHolder {
    relation_name: String,
    target_entity: String,
    related_id: Value,
    cascade: Vec<CascadeType>,
}

impl RelationHolder {
    pub fn new(
        relation_name: &str,
        target_entity: &str,
        related_id: Value,
        cascade: Vec<CascadeType>,
    ) -> Self {
        RelationHolder {
            relation_name: relation_name.to_string(),
            target_entity: target_entity.to_string(),
            related_id,
            cascade,
        }
    }

    /// Field the related identifier is written to.
    pub fn relation_name(&self) -> &str {
        &self.relation_name
    }

    pub fn target_entity(&self) -> &str {
        &self.target_entity
    }

    pub fn related_id(&self) -> &Value {
        &self.related_id
    }

    pub fn cascades(&self, verb: LifecycleVerb) -> bool {
        self.cascade.iter().any(|c| c.covers(verb))
    }
}

/// An entity instance in document form, with its identity and relations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedEntity {
    entity_name: String,
    id: Value,
    data: Document,
    relations: Vec<RelationHolder>,
}

impl TrackedEntity {
    /// Builds the tracked form of `data`, collecting a relation holder for
    /// every declared relation whose field is set.
    pub fn new(metadata: &EntityMetadata, id: Value, data: Document) -> TesseraResult<Self> {
        if id.is_null() {
            log::error!("Entity {} has a null identifier", metadata.entity_name());
            return Err(TesseraError::new(
                &format!("Entity {} has a null identifier", metadata.entity_name()),
                ErrorKind::InvalidId,
            ));
        }

        let relations = metadata
            .relations()
            .iter()
            .filter_map(|relation| match data.get(relation.name()) {
                Some(value) if !value.is_null() => Some(RelationHolder::new(
                    relation.name(),
                    relation.target(),
                    value.clone(),
                    relation.cascade().clone(),
                )),
                _ => None,
            })
            .collect();

        Ok(TrackedEntity {
            entity_name: metadata.entity_name().to_string(),
            id,
            data,
            relations,
        })
    }

    pub fn from_entity<E: Entity>(entity: &E) -> TesseraResult<Self> {
        let metadata = E::entity_metadata();
        let data = match entity.to_value()? {
            Value::Document(doc) => doc,
            other => {
                log::error!("Entity {} converted to {}", metadata.entity_name(), other);
                return Err(TesseraError::new(
                    &format!("Entity {} must convert to a document", metadata.entity_name()),
                    ErrorKind::ObjectMappingError,
                ));
            }
        };
        TrackedEntity::new(&metadata, entity.entity_id()?, data)
    }

    /// Rebuilds the typed entity from the tracked document.
    pub fn to_entity<E: Entity>(&self) -> TesseraResult<E> {
        E::from_value(&Value::Document(self.data.clone()))
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

    pub fn relations(&self) -> &Vec<RelationHolder> {
        &self.relations
    }

    /// Replaces the document, keeping identity. Relations are recomputed.
    pub fn replace_data(&mut self, metadata: &EntityMetadata, data: Document) -> TesseraResult<()> {
        let rebuilt = TrackedEntity::new(metadata, self.id.clone(), data)?;
        self.data = rebuilt.data;
        self.relations = rebuilt.relations;
        Ok(())
    }

    /// Key identifying the entity within a persistence context.
    pub fn key(&self) -> String {
        format!("{}#{}", self.entity_name, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::metadata::{EntityId, RelationMetadata};

    fn order_metadata() -> EntityMetadata {
        EntityMetadata::new("Order", "orders", EntityId::new("id", None))
            .with_relation(RelationMetadata::new("customer_id", "Customer", vec![CascadeType::All]))
            .with_relation(RelationMetadata::new("coupon_id", "Coupon", vec![]))
    }

    #[test]
    fn test_relations_collected_for_set_fields() {
        let data = doc! { id: 1, customer_id: 10, coupon_id: (Value::Null) };
        let tracked = TrackedEntity::new(&order_metadata(), Value::I32(1), data).unwrap();
        assert_eq!(tracked.relations().len(), 1);

        let holder = &tracked.relations()[0];
        assert_eq!(holder.relation_name(), "customer_id");
        assert_eq!(holder.target_entity(), "Customer");
        assert_eq!(holder.related_id(), &Value::I32(10));
        assert!(holder.cascades(LifecycleVerb::Remove));
    }

    #[test]
    fn test_null_id_rejected() {
        let err = TrackedEntity::new(&order_metadata(), Value::Null, Document::new()).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidId);
    }

    #[test]
    fn test_key_combines_name_and_id() {
        let tracked =
            TrackedEntity::new(&order_metadata(), Value::from("A-1"), Document::new()).unwrap();
        assert_eq!(tracked.key(), "Order#\"A-1\"");
    }

    #[test]
    fn test_replace_data_recomputes_relations() {
        let metadata = order_metadata();
        let mut tracked =
            TrackedEntity::new(&metadata, Value::I32(1), doc! { id: 1 }).unwrap();
        assert!(tracked.relations().is_empty());

        tracked
            .replace_data(&metadata, doc! { id: 1, coupon_id: 3 })
            .unwrap();
        assert_eq!(tracked.relations().len(), 1);
        assert_eq!(tracked.id(), &Value::I32(1));
    }
}
