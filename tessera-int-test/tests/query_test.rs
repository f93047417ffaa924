use tessera::client::{JoinTableData, JoinTableOperation, LoadedData, NativeQueryResult};
use tessera::common::Value;
use tessera::errors::{ErrorKind, TesseraResult};
use tessera::filter::{all, field};
use tessera::store::{FindOptions, SortOrder};
use tessera::Tessera;
use tessera_int_test::models::{Attachment, Circle, Customer, Invoice, Shape, Square};
use tessera_int_test::test_util::{cleanup, create_test_context, run_test};

#[ctor::ctor]
fn init() {
    colog::init();
}

fn seed_invoices(db: &Tessera) -> TesseraResult<()> {
    let session = db.session()?;
    session.persist(&Customer::new(1, "anna"))?;
    session.persist(&Customer::new(2, "ben"))?;
    session.persist(&Invoice::new("A-1", 300, 1))?;
    session.persist(&Invoice::new("A-2", 100, 1))?;
    session.persist(&Invoice::new("B-1", 200, 2))?;
    session.commit()
}

#[test]
fn test_load_data_sort_limit_and_count() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            seed_invoices(&db)?;

            let options = FindOptions::new()
                .sort_by("total", SortOrder::Descending)
                .limit(2);
            match db.client().load_data::<Invoice>(&all(), &options, false)? {
                LoadedData::Entities(invoices) => {
                    let totals: Vec<i64> = invoices.iter().map(|i| i.total).collect();
                    assert_eq!(totals, vec![300, 200]);
                }
                other => panic!("unexpected {:?}", other),
            }

            let filter = field("customer_id").eq(1i64);
            assert_eq!(
                db.client().load_data::<Invoice>(&filter, &FindOptions::new(), true)?,
                LoadedData::Count(2)
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_load_data_of_subtype_is_narrowed() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            db.client().persist(&Circle { id: 1, label: "a".into(), radius: 1.0 })?;
            db.client().persist(&Square { id: 2, label: "b".into(), side: 1.0 })?;
            db.client().persist(&Square { id: 3, label: "c".into(), side: 2.0 })?;

            let squares = db.client().load_data::<Square>(&all(), &FindOptions::new(), true)?;
            assert_eq!(squares, LoadedData::Count(2));
            let shapes = db.client().load_data::<Shape>(&all(), &FindOptions::new(), true)?;
            assert_eq!(shapes, LoadedData::Count(3));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_large_object_queries_are_unsupported() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let err = db
                .client()
                .load_data::<Attachment>(&all(), &FindOptions::new(), false)
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::UnsupportedOperation);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_relation_lookups() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            seed_invoices(&db)?;

            let invoices: Vec<Invoice> = db.client().find_by_relation("customer_id", 1i64)?;
            assert_eq!(invoices.len(), 2);

            let ids = db
                .client()
                .find_ids_by_column("invoices", "_id", "customer_id", &Value::I64(2))?;
            assert_eq!(ids, vec![Value::from("B-1")]);

            let found: Vec<Customer> = db
                .client()
                .find_all(vec![Value::I64(1), Value::I64(2), Value::I64(9)])?;
            assert_eq!(found.len(), 2);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_join_table_rows() {
    run_test(
        create_test_context,
        |ctx| {
            let client = ctx.db().client().clone();
            let mut tags = JoinTableData::new(
                "invoice_tags",
                "invoice_id",
                "tag_id",
                JoinTableOperation::Insert,
            );
            tags.add_entry(Value::from("A-1"), vec![Value::I64(1), Value::I64(2)]);
            tags.add_entry(Value::from("A-2"), vec![Value::I64(2)]);
            assert_eq!(client.persist_join_table(&tags)?, 3);

            let tag_ids =
                client.get_columns_by_id("invoice_tags", "invoice_id", "tag_id", &Value::from("A-1"))?;
            assert_eq!(tag_ids, vec![Value::I64(1), Value::I64(2)]);

            let mut untag = JoinTableData::new(
                "invoice_tags",
                "invoice_id",
                "tag_id",
                JoinTableOperation::Delete,
            );
            untag.add_entry(Value::from("A-1"), vec![Value::I64(2)]);
            assert_eq!(client.persist_join_table(&untag)?, 1);
            assert_eq!(ctx.stored("invoice_tags")?, 2);

            let empty = JoinTableData::new(
                "invoice_tags",
                "invoice_id",
                "tag_id",
                JoinTableOperation::Insert,
            );
            assert_eq!(client.persist_join_table(&empty)?, 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_native_queries_shape_results() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            seed_invoices(&db)?;
            let client = db.client();

            match client.execute_native_query::<Invoice>("db.invoices.find({})")? {
                NativeQueryResult::Entities(invoices) => assert_eq!(invoices.len(), 3),
                other => panic!("unexpected {:?}", other),
            }
            match client.execute_native_query::<Customer>("db.customers.findOne()")? {
                NativeQueryResult::Entity(Some(customer)) => assert_eq!(customer.id, 1),
                other => panic!("unexpected {:?}", other),
            }
            match client.execute_native_query::<Invoice>("db.invoices.count()")? {
                NativeQueryResult::Scalar(count) => assert_eq!(count, Value::U64(3)),
                other => panic!("unexpected {:?}", other),
            }
            match client.execute_native_query::<Invoice>(r#"db.invoices.distinct("customer_id")"#)? {
                NativeQueryResult::Values(values) => assert_eq!(values.len(), 2),
                other => panic!("unexpected {:?}", other),
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_indexes_are_created_once() {
    run_test(
        create_test_context,
        |ctx| {
            let client = ctx.db().client().clone();
            assert_eq!(client.create_index("Customer")?, 1);
            assert_eq!(client.create_index("Customer")?, 0);
            assert_eq!(client.create_index("Invoice")?, 1);
            assert_eq!(client.create_index("Shape")?, 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_update_functions_report_sentinel() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            seed_invoices(&db)?;
            let client = db.client();

            let updated = client.handle_update_functions(
                "Invoice",
                &field("_id").eq("A-2"),
                tessera::doc! { total: 150 },
            );
            assert_eq!(updated, 1);
            assert_eq!(client.find::<Invoice>("A-2")?.unwrap().total, 150);

            let missing = client.handle_update_functions(
                "Invoice",
                &field("_id").eq("Z-9"),
                tessera::doc! { total: 1 },
            );
            assert_eq!(missing, -1);
            assert_eq!(
                client.handle_update_functions("Unknown", &all(), tessera::doc! {}),
                -1
            );

            let err = client
                .find_by_columns("Invoice", &Default::default())
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::UnsupportedOperation);
            Ok(())
        },
        cleanup,
    )
}
