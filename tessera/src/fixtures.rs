//! Entity types shared by unit tests.

use crate::common::{field_value, Blob, Convertible, Document, Value};
use crate::doc;
use crate::errors::TesseraResult;
use crate::metadata::{
    CascadeType, Discriminator, Entity, EntityId, EntityIndex, EntityMetadata, RelationMetadata,
    SecondaryTable,
};

#[ctor::ctor]
fn init_logging() {
    colog::init();
}

#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct User {
    pub id: i64,
    pub name: String,
    pub bio: Option<String>,
}

impl User {
    pub fn new(id: i64, name: &str, bio: Option<&str>) -> Self {
        User {
            id,
            name: name.to_string(),
            bio: bio.map(str::to_string),
        }
    }
}

impl Convertible for User {
    fn to_value(&self) -> TesseraResult<Value> {
        Ok(Value::Document(doc! {
            id: (self.id),
            name: (self.name.clone()),
            bio: (self.bio.clone()),
        }))
    }

    fn from_value(value: &Value) -> TesseraResult<Self> {
        let doc = Document::from_value(value)?;
        Ok(User {
            id: field_value(&doc, "id")?,
            name: field_value(&doc, "name")?,
            bio: field_value(&doc, "bio")?,
        })
    }
}

impl Entity for User {
    fn entity_metadata() -> EntityMetadata {
        EntityMetadata::new("User", "users", EntityId::new("id", None))
            .with_secondary_table(SecondaryTable::new("user_profiles", vec!["bio"]))
            .with_index(EntityIndex::new(vec!["name"], 1))
    }

    fn entity_id(&self) -> TesseraResult<Value> {
        Ok(Value::I64(self.id))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct Order {
    pub id: i64,
    pub total: i64,
    pub customer_id: Option<i64>,
}

impl Convertible for Order {
    fn to_value(&self) -> TesseraResult<Value> {
        Ok(Value::Document(doc! {
            id: (self.id),
            total: (self.total),
            customer_id: (self.customer_id),
        }))
    }

    fn from_value(value: &Value) -> TesseraResult<Self> {
        let doc = Document::from_value(value)?;
        Ok(Order {
            id: field_value(&doc, "id")?,
            total: field_value(&doc, "total")?,
            customer_id: field_value(&doc, "customer_id")?,
        })
    }
}

impl Entity for Order {
    fn entity_metadata() -> EntityMetadata {
        EntityMetadata::new("Order", "orders", EntityId::new("id", None)).with_relation(
            RelationMetadata::new(
                "customer_id",
                "User",
                vec![CascadeType::Persist, CascadeType::Remove],
            ),
        )
    }

    fn entity_id(&self) -> TesseraResult<Value> {
        Ok(Value::I64(self.id))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct Vehicle {
    pub id: i64,
    pub wheels: i32,
}

impl Convertible for Vehicle {
    fn to_value(&self) -> TesseraResult<Value> {
        Ok(Value::Document(doc! { id: (self.id), wheels: (self.wheels) }))
    }

    fn from_value(value: &Value) -> TesseraResult<Self> {
        let doc = Document::from_value(value)?;
        Ok(Vehicle {
            id: field_value(&doc, "id")?,
            wheels: field_value(&doc, "wheels")?,
        })
    }
}

impl Entity for Vehicle {
    fn entity_metadata() -> EntityMetadata {
        EntityMetadata::new("Vehicle", "vehicles", EntityId::new("id", None))
            .with_sub_types(vec!["Car"])
    }

    fn entity_id(&self) -> TesseraResult<Value> {
        Ok(Value::I64(self.id))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct Car {
    pub id: i64,
    pub wheels: i32,
    pub doors: i32,
}

impl Convertible for Car {
    fn to_value(&self) -> TesseraResult<Value> {
        Ok(Value::Document(doc! {
            id: (self.id),
            wheels: (self.wheels),
            doors: (self.doors),
        }))
    }

    fn from_value(value: &Value) -> TesseraResult<Self> {
        let doc = Document::from_value(value)?;
        Ok(Car {
            id: field_value(&doc, "id")?,
            wheels: field_value(&doc, "wheels")?,
            doors: field_value(&doc, "doors")?,
        })
    }
}

impl Entity for Car {
    fn entity_metadata() -> EntityMetadata {
        EntityMetadata::new("Car", "vehicles", EntityId::new("id", None))
            .with_discriminator(Discriminator::new("kind", "car"))
    }

    fn entity_id(&self) -> TesseraResult<Value> {
        Ok(Value::I64(self.id))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct Photo {
    pub id: i64,
    pub title: String,
    pub data: Blob,
}

impl Photo {
    pub fn new(id: i64, title: &str, data: &[u8]) -> Self {
        Photo {
            id,
            title: title.to_string(),
            data: Blob::new(data.to_vec()),
        }
    }
}

impl Convertible for Photo {
    fn to_value(&self) -> TesseraResult<Value> {
        Ok(Value::Document(doc! {
            id: (self.id),
            title: (self.title.clone()),
            data: (self.data.to_value()?),
        }))
    }

    fn from_value(value: &Value) -> TesseraResult<Self> {
        let doc = Document::from_value(value)?;
        Ok(Photo {
            id: field_value(&doc, "id")?,
            title: field_value(&doc, "title")?,
            data: field_value(&doc, "data")?,
        })
    }
}

impl Entity for Photo {
    fn entity_metadata() -> EntityMetadata {
        EntityMetadata::new("Photo", "photos", EntityId::new("id", None)).with_lob_field("data")
    }

    fn entity_id(&self) -> TesseraResult<Value> {
        Ok(Value::I64(self.id))
    }
}

/// Registry with every fixture entity.
pub(crate) fn metadata_context() -> crate::metadata::MetadataContext {
    crate::metadata::MetadataContext::builder()
        .register::<User>()
        .register::<Order>()
        .register::<Vehicle>()
        .register::<Car>()
        .register::<Photo>()
        .build()
        .unwrap()
}
