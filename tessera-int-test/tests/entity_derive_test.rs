use tessera::common::{Convertible, Value};
use tessera::lifecycle::LifecycleVerb;
use tessera::metadata::{CascadeType, Entity};
use tessera_derive::{Convertible, Entity};
use tessera_int_test::models::{Attachment, Circle, Customer, Invoice, Seat, SeatKey, Shape};

#[test]
fn test_defaults_from_struct_name() {
    #[derive(Debug, Default, PartialEq, Convertible, Entity)]
    #[entity(id(field = "code"))]
    struct Country {
        code: String,
        name: String,
    }

    let metadata = Country::entity_metadata();
    assert_eq!(metadata.entity_name(), "Country");
    assert_eq!(metadata.table_name(), "Country");
    assert_eq!(metadata.id().field_name(), "code");
    assert!(!metadata.id().is_embedded());
    assert!(metadata.secondary_tables().is_empty());
    assert!(metadata.indexes().is_empty());

    let country = Country { code: "NZ".into(), name: "New Zealand".into() };
    assert_eq!(country.entity_id().unwrap(), Value::from("NZ"));
    let round_trip = Country::from_value(&country.to_value().unwrap()).unwrap();
    assert_eq!(round_trip, country);
}

#[test]
fn test_secondary_tables_and_indexes() {
    let metadata = Customer::entity_metadata();
    assert_eq!(metadata.table_name(), "customers");
    assert_eq!(metadata.collections(), vec!["customers", "customer_contacts"]);
    assert_eq!(metadata.collection_for_field("phone"), "customer_contacts");
    assert_eq!(metadata.collection_for_field("name"), "customers");

    let index = &metadata.indexes()[0];
    assert_eq!(index.field_names(), &vec!["name".to_string()]);
    assert_eq!(index.order(), 1);
    assert_eq!(Invoice::entity_metadata().indexes()[0].order(), -1);
}

#[test]
fn test_relation_cascade_names_are_case_insensitive() {
    let metadata = Invoice::entity_metadata();
    let relation = metadata.relation("customer_id").unwrap();
    assert_eq!(relation.target(), "Customer");
    assert_eq!(
        relation.cascade(),
        &vec![CascadeType::Persist, CascadeType::Remove]
    );
    assert!(relation.cascades(LifecycleVerb::Remove));
    assert!(!relation.cascades(LifecycleVerb::Merge));
}

#[test]
fn test_inheritance_and_large_objects() {
    let shape = Shape::entity_metadata();
    assert_eq!(shape.sub_types(), &vec!["Circle".to_string(), "Square".to_string()]);
    assert!(shape.discriminator().is_none());

    let circle = Circle::entity_metadata();
    let discriminator = circle.discriminator().unwrap();
    assert_eq!(discriminator.column(), "shape_type");
    assert_eq!(discriminator.value(), "circle");

    let scan = Attachment::entity_metadata();
    assert_eq!(scan.entity_name(), "Scan");
    assert_eq!(scan.lob_field(), Some("payload"));
    assert!(scan.is_lob());
}

#[test]
fn test_compound_identifier_metadata() {
    let metadata = Seat::entity_metadata();
    assert!(metadata.id().is_embedded());
    assert_eq!(
        metadata.id().encoded_field_names(),
        vec!["_id.row".to_string(), "_id.number".to_string()]
    );

    let seat = Seat { key: SeatKey { row: "A".into(), number: 1 }, holder: None };
    let id = seat.entity_id().unwrap();
    let id = id.as_document().unwrap();
    assert_eq!(id.get("row"), Some(&Value::from("A")));
    assert_eq!(id.get("number"), Some(&Value::I32(1)));
}

#[test]
fn test_ignored_field_is_not_converted() {
    let mut invoice = Invoice::new("C-1", 5, 1);
    invoice.printed = true;
    let value = invoice.to_value().unwrap();
    let document = value.as_document().unwrap();
    assert!(!document.contains_key("printed"));
    assert_eq!(document.get("number"), Some(&Value::from("C-1")));

    let back = Invoice::from_value(&value).unwrap();
    assert!(!back.printed);
}
