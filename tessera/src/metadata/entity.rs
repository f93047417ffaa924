use crate::common::{Convertible, Value, DOC_ID, FIELD_SEPARATOR};
use crate::errors::{ErrorKind, TesseraError, TesseraResult};
use crate::filter::{and, field, Filter};
use crate::metadata::EntityMetadata;

/// A persistent domain type.
///
/// Implemented by `#[derive(Entity)]`. The type's fields are mapped to and
/// from documents through its [Convertible] implementation.
pub trait Entity: Convertible + Send + Sync + 'static {
    /// Static description of the type's store layout.
    fn entity_metadata() -> EntityMetadata;

    /// Value of the identifier field. Compound identifiers are returned as
    /// a document of the embedded fields.
    fn entity_id(&self) -> TesseraResult<Value>;
}

/// An index to create on an entity's primary collection.
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct EntityIndex {
    fields: Vec<String>,
    order: i32,
}

impl EntityIndex {
    /// `order` is `1` for ascending and `-1` for descending.
    pub fn new(fields: Vec<&str>, order: i32) -> Self {
        EntityIndex {
            fields: fields.iter().map(|field| field.to_string()).collect(),
            order,
        }
    }

    pub fn field_names(&self) -> &Vec<String> {
        &self.fields
    }

    pub fn order(&self) -> i32 {
        self.order
    }
}

/// Identifier configuration of an entity.
///
/// The identifier value is stored in the `_id` field of every document
/// the entity is mapped to. A compound identifier is an embedded document
/// whose fields are listed in `embedded_fields`; lookups then match each
/// field separately as `_id.<field>`.
///
/// ```ignore
/// #[derive(Entity, Convertible, Default)]
/// #[entity(id(field = "key", embedded_fields = "region, code"))]
/// pub struct Depot {
///     key: DepotKey,
///     name: String,
/// }
/// ```
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct EntityId {
    field_name: String,
    embedded_fields: Vec<String>,
}

impl EntityId {
    pub fn new(field_name: &str, embedded_fields: Option<Vec<&str>>) -> Self {
        EntityId {
            field_name: field_name.to_string(),
            embedded_fields: embedded_fields
                .unwrap_or_default()
                .iter()
                .map(|field| field.to_string())
                .collect(),
        }
    }

    /// Name of the struct field holding the identifier.
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn embedded_fields(&self) -> &Vec<String> {
        &self.embedded_fields
    }

    pub fn is_embedded(&self) -> bool {
        !self.embedded_fields.is_empty()
    }

    /// Store field names of the embedded identifier parts, e.g.
    /// `["_id.region", "_id.code"]`.
    pub fn encoded_field_names(&self) -> Vec<String> {
        self.embedded_fields
            .iter()
            .map(|field| format!("{}{}{}", DOC_ID, FIELD_SEPARATOR, field))
            .collect()
    }

    /// Creates the predicate matching the document with identifier `id`.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidId` if `id` is null, or if a compound identifier
    /// is not a document holding every embedded field.
    pub fn create_id_filter(&self, id: &Value) -> TesseraResult<Filter> {
        if id.is_null() {
            log::error!("Entity identifier of {} is null", self.field_name);
            return Err(TesseraError::new(
                &format!("Identifier {} must not be null", self.field_name),
                ErrorKind::InvalidId,
            ));
        }

        if !self.is_embedded() {
            return Ok(field(DOC_ID).eq(id.clone()));
        }

        if self.embedded_fields.len() == 1 && !id.is_document() {
            let name = format!("{}{}{}", DOC_ID, FIELD_SEPARATOR, self.embedded_fields[0]);
            return Ok(field(&name).eq(id.clone()));
        }

        let document = id.as_document().ok_or_else(|| {
            log::error!("Compound identifier {} is not a document", id);
            TesseraError::new(
                "Compound identifier value must be a document",
                ErrorKind::InvalidId,
            )
        })?;

        let mut filters = Vec::with_capacity(self.embedded_fields.len());
        for (embedded, encoded) in self.embedded_fields.iter().zip(self.encoded_field_names()) {
            let value = document.get(embedded).ok_or_else(|| {
                log::error!("Compound identifier is missing field {}", embedded);
                TesseraError::new(
                    &format!("Compound identifier is missing field {}", embedded),
                    ErrorKind::InvalidId,
                )
            })?;
            filters.push(field(&encoded).eq(value.clone()));
        }
        Ok(and(filters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_simple_id_filter() {
        let id = EntityId::new("id", None);
        let filter = id.create_id_filter(&Value::I64(5)).unwrap();
        assert_eq!(filter.to_string(), "(_id == 5)");
        assert!(filter.apply(&doc! { _id: 5 }).unwrap());
    }

    #[test]
    fn test_null_id_is_rejected() {
        let id = EntityId::new("id", None);
        let err = id.create_id_filter(&Value::Null).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidId);
    }

    #[test]
    fn test_embedded_id_filter() {
        let id = EntityId::new("key", Some(vec!["region", "code"]));
        assert!(id.is_embedded());
        assert_eq!(id.encoded_field_names(), vec!["_id.region", "_id.code"]);

        let value = Value::Document(doc! { region: "EU", code: 4 });
        let filter = id.create_id_filter(&value).unwrap();
        assert!(filter.apply(&doc! { _id: { region: "EU", code: 4 } }).unwrap());
        assert!(!filter.apply(&doc! { _id: { region: "US", code: 4 } }).unwrap());
    }

    #[test]
    fn test_single_embedded_field_accepts_scalar() {
        let id = EntityId::new("key", Some(vec!["code"]));
        let filter = id.create_id_filter(&Value::I32(9)).unwrap();
        assert!(filter.apply(&doc! { _id: { code: 9 } }).unwrap());
    }

    #[test]
    fn test_embedded_id_missing_field() {
        let id = EntityId::new("key", Some(vec!["region", "code"]));
        let value = Value::Document(doc! { region: "EU" });
        let err = id.create_id_filter(&value).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidId);

        assert!(id.create_id_filter(&Value::I32(1)).is_err());
    }

    #[test]
    fn test_entity_index() {
        let index = EntityIndex::new(vec!["name", "age"], -1);
        assert_eq!(index.field_names(), &vec!["name".to_string(), "age".to_string()]);
        assert_eq!(index.order(), -1);
    }
}
