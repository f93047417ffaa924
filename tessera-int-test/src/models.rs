use tessera::common::Blob;
use tessera_derive::{Convertible, Entity};

#[derive(Debug, Clone, PartialEq, Default, Convertible, Entity)]
#[entity(
    table = "customers",
    id(field = "id"),
    secondary_table(name = "customer_contacts", fields = "email, phone"),
    index(fields = "name")
)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Customer {
    pub fn new(id: i64, name: &str) -> Self {
        Customer {
            id,
            name: name.to_string(),
            email: Some(format!("{}@example.com", name)),
            phone: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Convertible, Entity)]
#[entity(
    table = "invoices",
    id(field = "number"),
    relation(name = "customer_id", target = "Customer", cascade = "persist, remove"),
    index(fields = "total", order = -1)
)]
#[converter(ignored = "printed")]
pub struct Invoice {
    pub number: String,
    pub total: i64,
    pub customer_id: Option<i64>,
    pub printed: bool,
}

impl Invoice {
    pub fn new(number: &str, total: i64, customer_id: i64) -> Self {
        Invoice {
            number: number.to_string(),
            total,
            customer_id: Some(customer_id),
            printed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Convertible, Entity)]
#[entity(table = "shapes", id(field = "id"), subtypes = "Circle, Square")]
pub struct Shape {
    pub id: i64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Default, Convertible, Entity)]
#[entity(
    table = "shapes",
    id(field = "id"),
    discriminator(column = "shape_type", value = "circle")
)]
pub struct Circle {
    pub id: i64,
    pub label: String,
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Convertible, Entity)]
#[entity(
    table = "shapes",
    id(field = "id"),
    discriminator(column = "shape_type", value = "square")
)]
pub struct Square {
    pub id: i64,
    pub label: String,
    pub side: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Convertible, Entity)]
#[entity(name = "Scan", table = "scans", id(field = "id"), lob = "payload")]
pub struct Attachment {
    pub id: String,
    pub file_name: String,
    pub payload: Blob,
}

impl Attachment {
    pub fn new(file_name: &str, payload: &[u8]) -> Self {
        Attachment {
            id: uuid::Uuid::new_v4().to_string(),
            file_name: file_name.to_string(),
            payload: Blob::new(payload),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Convertible)]
pub struct SeatKey {
    pub row: String,
    pub number: i32,
}

#[derive(Debug, Clone, PartialEq, Default, Convertible, Entity)]
#[entity(table = "seats", id(field = "key", embedded_fields = "row, number"))]
pub struct Seat {
    pub key: SeatKey,
    pub holder: Option<String>,
}
