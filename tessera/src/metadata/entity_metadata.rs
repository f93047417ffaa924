use std::fmt::Display;
use std::str::FromStr;

use crate::common::Value;
use crate::errors::{ErrorKind, TesseraError, TesseraResult};
use crate::lifecycle::LifecycleVerb;
use crate::metadata::{EntityId, EntityIndex};

/// Lifecycle verbs propagated from an entity to a related entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CascadeType {
    All,
    Persist,
    Merge,
    Remove,
    Refresh,
    Detach,
}

impl CascadeType {
    /// Whether this policy propagates `verb`.
    pub fn covers(&self, verb: LifecycleVerb) -> bool {
        match self {
            CascadeType::All => true,
            CascadeType::Persist => verb == LifecycleVerb::Persist,
            CascadeType::Merge => verb == LifecycleVerb::Merge,
            CascadeType::Remove => verb == LifecycleVerb::Remove,
            CascadeType::Refresh => verb == LifecycleVerb::Refresh,
            CascadeType::Detach => verb == LifecycleVerb::Detach,
        }
    }
}

impl FromStr for CascadeType {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALL" => Ok(CascadeType::All),
            "PERSIST" => Ok(CascadeType::Persist),
            "MERGE" => Ok(CascadeType::Merge),
            "REMOVE" => Ok(CascadeType::Remove),
            "REFRESH" => Ok(CascadeType::Refresh),
            "DETACH" => Ok(CascadeType::Detach),
            other => {
                log::error!("Unknown cascade type {}", other);
                Err(TesseraError::new(
                    &format!("Unknown cascade type {}", other),
                    ErrorKind::ConfigurationError,
                ))
            }
        }
    }
}

impl Display for CascadeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CascadeType::All => "ALL",
            CascadeType::Persist => "PERSIST",
            CascadeType::Merge => "MERGE",
            CascadeType::Remove => "REMOVE",
            CascadeType::Refresh => "REFRESH",
            CascadeType::Detach => "DETACH",
        };
        write!(f, "{}", name)
    }
}

/// An additional collection holding some of an entity's fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecondaryTable {
    name: String,
    fields: Vec<String>,
}

impl SecondaryTable {
    pub fn new(name: &str, fields: Vec<&str>) -> Self {
        SecondaryTable {
            name: name.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &Vec<String> {
        &self.fields
    }

    pub fn holds(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }
}

/// A reference from an entity to another entity, stored as a
/// foreign-key-like field of the primary document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationMetadata {
    name: String,
    target: String,
    cascade: Vec<CascadeType>,
}

impl RelationMetadata {
    pub fn new(name: &str, target: &str, cascade: Vec<CascadeType>) -> Self {
        RelationMetadata {
            name: name.to_string(),
            target: target.to_string(),
            cascade,
        }
    }

    /// Field holding the related entity's identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entity name of the related type.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn cascade(&self) -> &Vec<CascadeType> {
        &self.cascade
    }

    pub fn cascades(&self, verb: LifecycleVerb) -> bool {
        self.cascade.iter().any(|c| c.covers(verb))
    }
}

/// Column and value identifying a concrete subtype in a shared table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Discriminator {
    column: String,
    value: String,
}

impl Discriminator {
    pub fn new(column: &str, value: &str) -> Self {
        Discriminator {
            column: column.to_string(),
            value: value.to_string(),
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether a stored column value selects this subtype. The stored
    /// value is compared in its plain string form.
    pub fn matches(&self, stored: Option<&Value>) -> bool {
        match stored {
            Some(Value::Null) | None => false,
            Some(value) => value.to_plain_string() == self.value,
        }
    }
}

/// Store layout of one entity type.
///
/// Built by `#[derive(Entity)]` through the `with_*` methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMetadata {
    entity_name: String,
    table_name: String,
    id: EntityId,
    secondary_tables: Vec<SecondaryTable>,
    relations: Vec<RelationMetadata>,
    discriminator: Option<Discriminator>,
    sub_types: Vec<String>,
    lob_field: Option<String>,
    indexes: Vec<EntityIndex>,
}

impl EntityMetadata {
    pub fn new(entity_name: &str, table_name: &str, id: EntityId) -> Self {
        EntityMetadata {
            entity_name: entity_name.to_string(),
            table_name: table_name.to_string(),
            id,
            secondary_tables: Vec::new(),
            relations: Vec::new(),
            discriminator: None,
            sub_types: Vec::new(),
            lob_field: None,
            indexes: Vec::new(),
        }
    }

    pub fn with_secondary_table(mut self, table: SecondaryTable) -> Self {
        self.secondary_tables.push(table);
        self
    }

    pub fn with_relation(mut self, relation: RelationMetadata) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn with_discriminator(mut self, discriminator: Discriminator) -> Self {
        self.discriminator = Some(discriminator);
        self
    }

    pub fn with_sub_types(mut self, sub_types: Vec<&str>) -> Self {
        self.sub_types = sub_types.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_lob_field(mut self, field: &str) -> Self {
        self.lob_field = Some(field.to_string());
        self
    }

    pub fn with_index(mut self, index: EntityIndex) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    /// Primary collection; also the bucket name for large-object types.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn secondary_tables(&self) -> &Vec<SecondaryTable> {
        &self.secondary_tables
    }

    pub fn relations(&self) -> &Vec<RelationMetadata> {
        &self.relations
    }

    pub fn relation(&self, name: &str) -> Option<&RelationMetadata> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn relation_names(&self) -> Vec<String> {
        self.relations.iter().map(|r| r.name.clone()).collect()
    }

    pub fn discriminator(&self) -> Option<&Discriminator> {
        self.discriminator.as_ref()
    }

    /// Entity names of the concrete subtypes, in declaration order.
    pub fn sub_types(&self) -> &Vec<String> {
        &self.sub_types
    }

    pub fn has_sub_types(&self) -> bool {
        !self.sub_types.is_empty()
    }

    pub fn lob_field(&self) -> Option<&str> {
        self.lob_field.as_deref()
    }

    pub fn is_lob(&self) -> bool {
        self.lob_field.is_some()
    }

    pub fn indexes(&self) -> &Vec<EntityIndex> {
        &self.indexes
    }

    /// Every collection the entity is stored in: the primary table first,
    /// then the secondary tables in declaration order.
    pub fn collections(&self) -> Vec<&str> {
        let mut names = Vec::with_capacity(1 + self.secondary_tables.len());
        names.push(self.table_name.as_str());
        for table in &self.secondary_tables {
            if !names.contains(&table.name()) {
                names.push(table.name());
            }
        }
        names
    }

    /// Collection a field is written to.
    pub fn collection_for_field(&self, field: &str) -> &str {
        self.secondary_tables
            .iter()
            .find(|table| table.holds(field))
            .map(|table| table.name())
            .unwrap_or(&self.table_name)
    }

    pub(crate) fn validate(&self) -> TesseraResult<()> {
        if self.entity_name.is_empty() || self.table_name.is_empty() {
            log::error!("Entity metadata has an empty name or table");
            return Err(TesseraError::new(
                "Entity name and table name must not be empty",
                ErrorKind::ConfigurationError,
            ));
        }
        if self.id.field_name().is_empty() {
            log::error!("Entity {} has no identifier field", self.entity_name);
            return Err(TesseraError::new(
                &format!("Entity {} has no identifier field", self.entity_name),
                ErrorKind::ConfigurationError,
            ));
        }
        if let Some(lob) = &self.lob_field {
            if !self.secondary_tables.is_empty() {
                log::error!("Large object entity {} declares secondary tables", self.entity_name);
                return Err(TesseraError::new(
                    &format!(
                        "Large object field {} cannot be combined with secondary tables",
                        lob
                    ),
                    ErrorKind::ConfigurationError,
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vehicle() -> EntityMetadata {
        EntityMetadata::new("Vehicle", "vehicles", EntityId::new("id", None))
            .with_secondary_table(SecondaryTable::new("vehicle_specs", vec!["engine", "seats"]))
            .with_secondary_table(SecondaryTable::new("vehicle_docs", vec!["manual"]))
            .with_relation(RelationMetadata::new(
                "owner_id",
                "User",
                vec![CascadeType::Persist, CascadeType::Remove],
            ))
            .with_sub_types(vec!["Car", "Bike"])
    }

    #[test]
    fn test_collections_primary_first() {
        let metadata = vehicle();
        assert_eq!(
            metadata.collections(),
            vec!["vehicles", "vehicle_specs", "vehicle_docs"]
        );
    }

    #[test]
    fn test_collection_for_field() {
        let metadata = vehicle();
        assert_eq!(metadata.collection_for_field("seats"), "vehicle_specs");
        assert_eq!(metadata.collection_for_field("manual"), "vehicle_docs");
        assert_eq!(metadata.collection_for_field("name"), "vehicles");
    }

    #[test]
    fn test_relation_cascade() {
        let metadata = vehicle();
        let relation = metadata.relation("owner_id").unwrap();
        assert_eq!(relation.target(), "User");
        assert!(relation.cascades(LifecycleVerb::Persist));
        assert!(!relation.cascades(LifecycleVerb::Merge));
        assert_eq!(metadata.relation_names(), vec!["owner_id".to_string()]);
    }

    #[test]
    fn test_cascade_all_covers_everything() {
        for verb in LifecycleVerb::ALL {
            assert!(CascadeType::All.covers(verb));
        }
        assert_eq!("remove".parse::<CascadeType>().unwrap(), CascadeType::Remove);
        assert!("EVERYTHING".parse::<CascadeType>().is_err());
    }

    #[test]
    fn test_discriminator_matches_plain_string() {
        let discriminator = Discriminator::new("kind", "7");
        assert!(discriminator.matches(Some(&Value::I32(7))));
        assert!(discriminator.matches(Some(&Value::from("7"))));
        assert!(!discriminator.matches(Some(&Value::from("8"))));
        assert!(!discriminator.matches(None));
        assert!(!discriminator.matches(Some(&Value::Null)));
    }

    #[test]
    fn test_lob_with_secondary_table_is_invalid() {
        let metadata = EntityMetadata::new("File", "files", EntityId::new("id", None))
            .with_lob_field("data")
            .with_secondary_table(SecondaryTable::new("extra", vec!["x"]));
        let err = metadata.validate().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ConfigurationError);
    }
}
