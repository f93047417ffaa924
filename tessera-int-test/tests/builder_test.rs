use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tessera::batch::BatchSize;
use tessera::common::{Value, PROP_BATCH_SIZE, PROP_FLUSH_MODE, PROP_PERSISTENCE_CONTEXT, PROP_SHOW_QUERY};
use tessera::errors::{ErrorKind, TesseraError};
use tessera::graph::{EntityEventListener, EntityEvents};
use tessera::lifecycle::{FlushMode, PersistenceContextType};
use tessera::{Tessera, TesseraConfig};
use tessera_int_test::models::{Circle, Customer, Shape};
use tessera_int_test::test_util::{cleanup, create_test_context_with, register_models, run_test};

#[ctor::ctor]
fn init() {
    colog::init();
}

fn properties(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_properties_configure_instance() {
    let props = properties(&[
        (PROP_BATCH_SIZE, "50"),
        (PROP_FLUSH_MODE, "Commit"),
        (PROP_PERSISTENCE_CONTEXT, "transactional"),
        (PROP_SHOW_QUERY, "TRUE"),
        ("tessera.unknown", "ignored"),
    ]);
    let db = register_models(Tessera::builder().properties(&props)).build().unwrap();

    let config = db.config();
    assert_eq!(config.batch_size(), BatchSize::Bounded(50));
    assert_eq!(config.flush_mode(), FlushMode::Commit);
    assert_eq!(config.persistence_context(), PersistenceContextType::Transactional);
    assert!(config.show_query());

    let session = db.session().unwrap();
    assert_eq!(session.flush_mode(), FlushMode::Commit);
    assert_eq!(session.context_type(), PersistenceContextType::Transactional);
    db.close().unwrap();
}

#[test]
fn test_invalid_properties_are_rejected() {
    for (key, value) in [
        (PROP_BATCH_SIZE, "0"),
        (PROP_BATCH_SIZE, "-3"),
        (PROP_FLUSH_MODE, "eventually"),
        (PROP_PERSISTENCE_CONTEXT, "global"),
        (PROP_SHOW_QUERY, "yes"),
    ] {
        let err = TesseraConfig::from_properties(&properties(&[(key, value)])).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ConfigurationError, "{} = {}", key, value);
    }
}

#[test]
fn test_zero_batch_size_fails_build() {
    let err = Tessera::builder().batch_size(0).build().unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::ConfigurationError);
}

#[test]
fn test_missing_subtype_registration_fails_build() {
    let err = Tessera::builder().register::<Shape>().build().unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::ConfigurationError);
}

#[test]
fn test_unregistered_entity_is_reported() {
    let db = Tessera::builder().register::<Customer>().build().unwrap();
    let err = db.client().find::<Circle>(1i64).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::MetadataNotFound);
}

#[test]
fn test_closed_instance_refuses_sessions() {
    let db = register_models(Tessera::builder()).build().unwrap();
    db.close().unwrap();
    assert!(db.is_closed());
    assert_eq!(db.session().unwrap_err().kind(), &ErrorKind::InvalidOperation);
}

#[test]
fn test_entity_listeners_observe_writes() {
    let seen: Arc<Mutex<Vec<(EntityEvents, Value)>>> = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    let listener = EntityEventListener::new(move |info| {
        if let Ok(mut seen) = recorder.lock() {
            seen.push((info.event(), info.id().clone()));
        }
        Ok(())
    });

    let ctx = create_test_context_with(|builder| builder.add_entity_listener(listener)).unwrap();
    let session = ctx.db().session().unwrap();
    let customer = Customer::new(1, "anna");
    session.persist(&customer).unwrap();
    session.flush().unwrap();
    session.remove(&customer).unwrap();
    session.flush().unwrap();
    cleanup(ctx).unwrap();

    let seen = seen.lock().unwrap();
    let events: Vec<EntityEvents> = seen.iter().map(|(event, _)| *event).collect();
    assert_eq!(
        events,
        vec![
            EntityEvents::PrePersist,
            EntityEvents::PostPersist,
            EntityEvents::PreRemove,
            EntityEvents::PostRemove,
        ]
    );
    assert!(seen.iter().all(|(_, id)| *id == Value::I64(1)));
}

#[test]
fn test_listener_error_aborts_batch() {
    run_test(
        || {
            create_test_context_with(|builder| {
                builder.add_entity_listener(EntityEventListener::new(|info| {
                    if info.data().get("name") == Some(&Value::from("mallory")) {
                        return Err(TesseraError::new("blocked", ErrorKind::InvalidOperation));
                    }
                    Ok(())
                }))
            })
        },
        |ctx| {
            let session = ctx.db().session()?;
            session.persist(&Customer::new(1, "mallory"))?;

            let err = session.flush().unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::EventError);
            assert_eq!(ctx.stored("customers")?, 0);
            Ok(())
        },
        cleanup,
    )
}
