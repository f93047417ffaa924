use dashmap::DashMap;
use indexmap::IndexMap;
use regex::Regex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::common::{Document, SubscriberRef, Value, DOC_ID};
use crate::errors::{ErrorKind, TesseraError, TesseraResult};
use crate::filter::{all, Filter};
use crate::store::memory::InMemoryStoreConfig;
use crate::store::{
    DocumentStoreProvider, FindOptions, LargeObject, ScriptResult, StoreEventBus,
    StoreEventInfo, StoreEventListener, StoreEvents,
};

const SCRIPT_PATTERN: &str =
    r#"^\s*db\.([A-Za-z_][\w]*)\.(\w+)\((.*?)\)\s*(?:\.toArray\(\))?\s*;?\s*$"#;

/// Document store kept entirely in memory.
///
/// Collections are keyed by `_id` and keep insertion order. Documents
/// inserted without an `_id` get a random UUID string. Scripts accept a
/// small dialect:
///
/// ```text
/// db.users.find()
/// db.users.findOne()
/// db.users.count()
/// db.users.distinct("city")
/// ```
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<InMemoryStoreInner>,
}

impl InMemoryStore {
    pub fn new(store_config: InMemoryStoreConfig) -> InMemoryStore {
        InMemoryStore {
            inner: Arc::new(InMemoryStoreInner::new(store_config)),
        }
    }

    /// Names of the collections holding at least one document.
    pub fn collection_names(&self) -> Vec<String> {
        self.inner
            .collections
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        InMemoryStore::new(InMemoryStoreConfig::new())
    }
}

impl DocumentStoreProvider for InMemoryStore {
    fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> TesseraResult<Vec<Document>> {
        self.inner.find(collection, filter, options)
    }

    fn count(&self, collection: &str, filter: &Filter) -> TesseraResult<u64> {
        self.inner.count(collection, filter)
    }

    fn insert_many(&self, collection: &str, documents: Vec<Document>) -> TesseraResult<u64> {
        self.inner.insert_many(collection, documents)
    }

    fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        document: Document,
    ) -> TesseraResult<u64> {
        self.inner.update_one(collection, filter, document)
    }

    fn remove_many(&self, collection: &str, filter: &Filter) -> TesseraResult<u64> {
        self.inner.remove_many(collection, filter)
    }

    fn create_index(&self, collection: &str, fields: &[String], order: i32) -> TesseraResult<()> {
        self.inner.create_index(collection, fields, order)
    }

    fn index_fields(&self, collection: &str) -> TesseraResult<HashSet<String>> {
        self.inner.index_fields(collection)
    }

    fn eval_script(&self, script: &str) -> TesseraResult<ScriptResult> {
        self.inner.eval_script(script)
    }

    fn save_large_object(&self, bucket: &str, object: LargeObject) -> TesseraResult<Value> {
        self.inner.save_large_object(bucket, object)
    }

    fn find_large_object(
        &self,
        bucket: &str,
        filter: &Filter,
    ) -> TesseraResult<Option<LargeObject>> {
        self.inner.find_large_object(bucket, filter)
    }

    fn update_large_object_metadata(
        &self,
        bucket: &str,
        file_id: &Value,
        metadata: Document,
    ) -> TesseraResult<()> {
        self.inner.update_large_object_metadata(bucket, file_id, metadata)
    }

    fn remove_large_objects(&self, bucket: &str, filter: &Filter) -> TesseraResult<u64> {
        self.inner.remove_large_objects(bucket, filter)
    }

    fn subscribe(&self, listener: StoreEventListener) -> TesseraResult<SubscriberRef> {
        self.inner.event_bus.register(listener)
    }

    fn unsubscribe(&self, subscriber: SubscriberRef) -> TesseraResult<()> {
        self.inner.event_bus.deregister(subscriber)
    }

    fn close(&self) -> TesseraResult<()> {
        self.inner.close()
    }
}

struct InMemoryStoreInner {
    closed: AtomicBool,
    event_bus: StoreEventBus,
    collections: DashMap<String, IndexMap<Value, Document>>,
    indexes: DashMap<String, IndexMap<String, i32>>,
    buckets: DashMap<String, IndexMap<Value, LargeObject>>,
}

impl InMemoryStoreInner {
    fn new(store_config: InMemoryStoreConfig) -> InMemoryStoreInner {
        let event_bus = StoreEventBus::new();
        for listener in store_config.event_listeners() {
            if let Err(e) = event_bus.register(listener) {
                log::warn!("Failed to register store listener: {}", e);
            }
        }

        InMemoryStoreInner {
            closed: AtomicBool::from(false),
            event_bus,
            collections: DashMap::new(),
            indexes: DashMap::new(),
            buckets: DashMap::new(),
        }
    }

    fn check_opened(&self) -> TesseraResult<()> {
        if self.closed.load(Ordering::Relaxed) {
            log::error!("In-memory store is closed");
            return Err(TesseraError::new(
                "Store is closed",
                ErrorKind::StoreOperationError,
            ));
        }
        Ok(())
    }

    fn alert(&self, event: StoreEvents, collection: &str, affected: u64) -> TesseraResult<()> {
        if !self.event_bus.has_listeners() {
            return Ok(());
        }
        self.event_bus
            .publish(StoreEventInfo::new(event, collection, affected))
    }

    fn matching(
        documents: impl Iterator<Item = Document>,
        filter: &Filter,
    ) -> TesseraResult<Vec<Document>> {
        let mut result = Vec::new();
        for doc in documents {
            if filter.apply(&doc)? {
                result.push(doc);
            }
        }
        Ok(result)
    }

    fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> TesseraResult<Vec<Document>> {
        self.check_opened()?;
        let documents = match self.collections.get(collection) {
            Some(entry) => Self::matching(entry.values().cloned(), filter)?,
            None => Vec::new(),
        };
        Ok(options.apply(documents))
    }

    fn count(&self, collection: &str, filter: &Filter) -> TesseraResult<u64> {
        self.check_opened()?;
        match self.collections.get(collection) {
            Some(entry) => {
                let mut count = 0;
                for doc in entry.values() {
                    if filter.apply(doc)? {
                        count += 1;
                    }
                }
                Ok(count)
            }
            None => Ok(0),
        }
    }

    fn insert_many(&self, collection: &str, documents: Vec<Document>) -> TesseraResult<u64> {
        self.check_opened()?;
        if documents.is_empty() {
            return Ok(0);
        }

        let mut entry = self.collections.entry(collection.to_string()).or_default();
        let mut staged = IndexMap::with_capacity(documents.len());
        for mut doc in documents {
            let id = match doc.id() {
                Some(id) if !id.is_null() => id.clone(),
                _ => {
                    let id = Value::from(uuid::Uuid::new_v4().to_string());
                    doc.put(DOC_ID, id.clone())?;
                    id
                }
            };

            if entry.contains_key(&id) || staged.contains_key(&id) {
                log::error!("Duplicate _id {} in collection {}", id, collection);
                return Err(TesseraError::new(
                    &format!("Duplicate key {} in collection {}", id, collection),
                    ErrorKind::StoreOperationError,
                ));
            }
            staged.insert(id, doc);
        }

        let inserted = staged.len() as u64;
        entry.extend(staged);
        drop(entry);

        self.alert(StoreEvents::Inserted, collection, inserted)?;
        Ok(inserted)
    }

    fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        mut document: Document,
    ) -> TesseraResult<u64> {
        self.check_opened()?;
        let updated = match self.collections.get_mut(collection) {
            Some(mut entry) => {
                let mut target = None;
                for (id, doc) in entry.iter() {
                    if filter.apply(doc)? {
                        target = Some(id.clone());
                        break;
                    }
                }

                match target {
                    Some(id) => {
                        document.put(DOC_ID, id.clone())?;
                        entry.insert(id, document);
                        1
                    }
                    None => 0,
                }
            }
            None => 0,
        };

        if updated > 0 {
            self.alert(StoreEvents::Updated, collection, updated)?;
        }
        Ok(updated)
    }

    fn remove_many(&self, collection: &str, filter: &Filter) -> TesseraResult<u64> {
        self.check_opened()?;
        let removed = match self.collections.get_mut(collection) {
            Some(mut entry) => {
                let mut doomed = Vec::new();
                for (id, doc) in entry.iter() {
                    if filter.apply(doc)? {
                        doomed.push(id.clone());
                    }
                }
                for id in &doomed {
                    entry.shift_remove(id);
                }
                doomed.len() as u64
            }
            None => 0,
        };

        if removed > 0 {
            self.alert(StoreEvents::Removed, collection, removed)?;
        }
        Ok(removed)
    }

    fn create_index(&self, collection: &str, fields: &[String], order: i32) -> TesseraResult<()> {
        self.check_opened()?;
        if fields.is_empty() {
            log::error!("Cannot create an index without fields on {}", collection);
            return Err(TesseraError::new(
                "Index must cover at least one field",
                ErrorKind::InvalidOperation,
            ));
        }

        let mut entry = self.indexes.entry(collection.to_string()).or_default();
        for field in fields {
            entry.entry(field.clone()).or_insert(order);
        }
        Ok(())
    }

    fn index_fields(&self, collection: &str) -> TesseraResult<HashSet<String>> {
        self.check_opened()?;
        Ok(self
            .indexes
            .get(collection)
            .map(|entry| entry.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn eval_script(&self, script: &str) -> TesseraResult<ScriptResult> {
        self.check_opened()?;
        let pattern = Regex::new(SCRIPT_PATTERN)?;
        let captures = match pattern.captures(script) {
            Some(captures) => captures,
            None => return Err(unsupported_script(script)),
        };

        let collection = &captures[1];
        let method = &captures[2];
        let args = captures[3].trim();

        let result = match method {
            "find" if is_empty_query(args) => {
                ScriptResult::Documents(self.find(collection, &all(), &FindOptions::new())?)
            }
            "findOne" if is_empty_query(args) => {
                let mut found = self.find(collection, &all(), &FindOptions::new().limit(1))?;
                ScriptResult::Document(found.pop())
            }
            "count" if is_empty_query(args) => {
                ScriptResult::Scalar(Value::U64(self.count(collection, &all())?))
            }
            "distinct" => {
                let field = quoted_argument(args).ok_or_else(|| unsupported_script(script))?;
                ScriptResult::Values(self.distinct(collection, field)?)
            }
            _ => return Err(unsupported_script(script)),
        };

        let affected = match &result {
            ScriptResult::Document(doc) => doc.is_some() as u64,
            ScriptResult::Documents(docs) => docs.len() as u64,
            ScriptResult::Values(values) => values.len() as u64,
            ScriptResult::Scalar(_) => 1,
        };
        self.alert(StoreEvents::ScriptEvaluated, collection, affected)?;
        Ok(result)
    }

    fn distinct(&self, collection: &str, field: &str) -> TesseraResult<Vec<Value>> {
        let mut seen = IndexMap::new();
        if let Some(entry) = self.collections.get(collection) {
            for doc in entry.values() {
                if let Some(value) = doc.get(field) {
                    seen.entry(value.clone()).or_insert(());
                }
            }
        }
        Ok(seen.into_keys().collect())
    }

    fn save_large_object(&self, bucket: &str, object: LargeObject) -> TesseraResult<Value> {
        self.check_opened()?;
        let file_id = if object.file_id().is_null() {
            Value::from(uuid::Uuid::new_v4().to_string())
        } else {
            object.file_id().clone()
        };

        let object = object.with_file_id(file_id.clone());
        self.buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(file_id.clone(), object);

        self.alert(StoreEvents::LargeObjectSaved, bucket, 1)?;
        Ok(file_id)
    }

    fn find_large_object(
        &self,
        bucket: &str,
        filter: &Filter,
    ) -> TesseraResult<Option<LargeObject>> {
        self.check_opened()?;
        if let Some(entry) = self.buckets.get(bucket) {
            for object in entry.values() {
                if filter.apply(&object.file_document())? {
                    return Ok(Some(object.clone()));
                }
            }
        }
        Ok(None)
    }

    fn update_large_object_metadata(
        &self,
        bucket: &str,
        file_id: &Value,
        metadata: Document,
    ) -> TesseraResult<()> {
        self.check_opened()?;
        let updated = match self.buckets.get_mut(bucket) {
            Some(mut entry) => match entry.get_mut(file_id) {
                Some(object) => {
                    object.set_metadata(metadata);
                    true
                }
                None => false,
            },
            None => false,
        };

        if !updated {
            log::error!("No large object {} in bucket {}", file_id, bucket);
            return Err(TesseraError::new(
                &format!("No large object {} in bucket {}", file_id, bucket),
                ErrorKind::StoreOperationError,
            ));
        }
        self.alert(StoreEvents::Updated, bucket, 1)
    }

    fn remove_large_objects(&self, bucket: &str, filter: &Filter) -> TesseraResult<u64> {
        self.check_opened()?;
        let removed = match self.buckets.get_mut(bucket) {
            Some(mut entry) => {
                let mut doomed = Vec::new();
                for (id, object) in entry.iter() {
                    if filter.apply(&object.file_document())? {
                        doomed.push(id.clone());
                    }
                }
                for id in &doomed {
                    entry.shift_remove(id);
                }
                doomed.len() as u64
            }
            None => 0,
        };

        if removed > 0 {
            self.alert(StoreEvents::LargeObjectRemoved, bucket, removed)?;
        }
        Ok(removed)
    }

    fn close(&self) -> TesseraResult<()> {
        if self.closed.swap(true, Ordering::Relaxed) {
            return Ok(());
        }

        self.alert(StoreEvents::Closed, "", 0)?;
        self.collections.clear();
        self.indexes.clear();
        self.buckets.clear();
        self.event_bus.close()
    }
}

fn is_empty_query(args: &str) -> bool {
    args.is_empty() || args.chars().all(|c| c == '{' || c == '}' || c.is_whitespace())
}

fn quoted_argument(args: &str) -> Option<&str> {
    let args = args.trim();
    let unquoted = args
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| args.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))?;
    if unquoted.is_empty() {
        None
    } else {
        Some(unquoted)
    }
}

fn unsupported_script(script: &str) -> TesseraError {
    log::error!("Unsupported script: {}", script);
    TesseraError::new(
        &format!("Unsupported script: {}", script),
        ErrorKind::UnsupportedOperation,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::filter::{by_id, field};
    use crate::store::{DocumentStore, SortOrder};
    use parking_lot::Mutex;

    fn store_with_users() -> DocumentStore {
        let store = DocumentStore::new(InMemoryStore::default());
        store
            .insert_many(
                "users",
                vec![
                    doc! { _id: 1, name: "alice", city: "Pune" },
                    doc! { _id: 2, name: "bob", city: "Oslo" },
                    doc! { _id: 3, name: "carol", city: "Pune" },
                ],
            )
            .unwrap();
        store
    }

    #[test]
    fn test_insert_and_find() {
        let store = store_with_users();
        let found = store
            .find("users", &field("city").eq("Pune"), &FindOptions::new())
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(store.count("users", &all()).unwrap(), 3);
        assert!(store.find("missing", &all(), &FindOptions::new()).unwrap().is_empty());
    }

    #[test]
    fn test_insert_assigns_missing_id() {
        let store = DocumentStore::new(InMemoryStore::default());
        store.insert_many("logs", vec![doc! { line: "x" }]).unwrap();
        let found = store.find_one("logs", &all()).unwrap().unwrap();
        assert!(found.id().and_then(|id| id.as_str()).is_some());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let store = store_with_users();
        let err = store
            .insert_many("users", vec![doc! { _id: 4 }, doc! { _id: 1 }])
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::StoreOperationError);
        assert_eq!(store.count("users", &all()).unwrap(), 3);
    }

    #[test]
    fn test_update_one_replaces_and_keeps_id() {
        let store = store_with_users();
        let matched = store
            .update_one("users", &by_id(2), doc! { name: "bobby" })
            .unwrap();
        assert_eq!(matched, 1);

        let bob = store.find_one("users", &by_id(2)).unwrap().unwrap();
        assert_eq!(bob, doc! { _id: 2, name: "bobby" });
        assert_eq!(store.update_one("users", &by_id(9), doc! {}).unwrap(), 0);
    }

    #[test]
    fn test_remove_many() {
        let store = store_with_users();
        assert_eq!(store.remove_many("users", &field("city").eq("Pune")).unwrap(), 2);
        assert_eq!(store.count("users", &all()).unwrap(), 1);
        assert_eq!(store.remove_many("nothing", &all()).unwrap(), 0);
    }

    #[test]
    fn test_find_keeps_insertion_order_and_sorts() {
        let store = store_with_users();
        let names: Vec<Value> = store
            .find("users", &all(), &FindOptions::new().sort_by("name", SortOrder::Descending))
            .unwrap()
            .iter()
            .filter_map(|d| d.get("name").cloned())
            .collect();
        assert_eq!(names, vec![Value::from("carol"), Value::from("bob"), Value::from("alice")]);
    }

    #[test]
    fn test_indexes() {
        let store = store_with_users();
        store
            .create_index("users", &["name".to_string(), "city".to_string()], 1)
            .unwrap();
        let fields = store.index_fields("users").unwrap();
        assert!(fields.contains("name") && fields.contains("city"));
        assert!(store.index_fields("orders").unwrap().is_empty());
        assert!(store.create_index("users", &[], 1).is_err());
    }

    #[test]
    fn test_script_dialect() {
        let store = store_with_users();
        match store.eval_script("db.users.find()").unwrap() {
            ScriptResult::Documents(docs) => assert_eq!(docs.len(), 3),
            other => panic!("unexpected {:?}", other),
        }
        match store.eval_script("db.users.findOne({})").unwrap() {
            ScriptResult::Document(Some(doc)) => assert_eq!(doc.id(), Some(&Value::I32(1))),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            store.eval_script("db.users.count();").unwrap(),
            ScriptResult::Scalar(Value::U64(3))
        );
        assert_eq!(
            store.eval_script("db.users.distinct(\"city\")").unwrap(),
            ScriptResult::Values(vec![Value::from("Pune"), Value::from("Oslo")])
        );
        assert_eq!(
            store.eval_script("db.users.find().toArray()").unwrap(),
            store.eval_script("db.users.find()").unwrap()
        );
    }

    #[test]
    fn test_unsupported_scripts() {
        let store = store_with_users();
        for script in [
            "db.users.aggregate([])",
            "db.users.find({\"name\": \"bob\"})",
            "db.users.distinct()",
            "select * from users",
        ] {
            let err = store.eval_script(script).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::UnsupportedOperation, "{}", script);
        }
    }

    #[test]
    fn test_large_object_bucket() {
        let store = DocumentStore::new(InMemoryStore::default());
        let object = LargeObject::new("a.bin", vec![1, 2, 3], doc! { id: 10 });
        let file_id = store.save_large_object("Attachment", object).unwrap();

        let found = store
            .find_large_object("Attachment", &field("metadata.id").eq(10))
            .unwrap()
            .unwrap();
        assert_eq!(found.file_id(), &file_id);
        assert_eq!(found.content().to_vec(), vec![1u8, 2, 3]);

        store
            .update_large_object_metadata("Attachment", &file_id, doc! { id: 10, label: "x" })
            .unwrap();
        let found = store
            .find_large_object("Attachment", &by_id(file_id.clone()))
            .unwrap()
            .unwrap();
        assert_eq!(found.metadata().get("label"), Some(&Value::from("x")));

        assert!(store
            .update_large_object_metadata("Attachment", &Value::from("nope"), doc! {})
            .is_err());
        assert_eq!(
            store
                .remove_large_objects("Attachment", &field("metadata.id").eq(10))
                .unwrap(),
            1
        );
        assert!(store
            .find_large_object("Attachment", &all())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_config_listeners_receive_events() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let config = InMemoryStoreConfig::new();
        config.add_store_listener(StoreEventListener::new(move |info| {
            sink.lock().push((info.event(), info.affected()));
            Ok(())
        }));

        let store = DocumentStore::new(InMemoryStore::new(config));
        store.insert_many("c", vec![doc! { _id: 1 }, doc! { _id: 2 }]).unwrap();
        store.update_one("c", &by_id(1), doc! { v: 1 }).unwrap();
        store.remove_many("c", &all()).unwrap();

        assert_eq!(
            events.lock().as_slice(),
            &[
                (StoreEvents::Inserted, 2),
                (StoreEvents::Updated, 1),
                (StoreEvents::Removed, 2)
            ]
        );
    }

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let count = Arc::new(Mutex::new(0));
        let sink = count.clone();
        let store = DocumentStore::new(InMemoryStore::default());
        let subscriber = store
            .subscribe(StoreEventListener::new(move |_| {
                *sink.lock() += 1;
                Ok(())
            }))
            .unwrap();

        store.insert_many("c", vec![doc! { _id: 1 }]).unwrap();
        store.unsubscribe(subscriber).unwrap();
        store.insert_many("c", vec![doc! { _id: 2 }]).unwrap();
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn test_closed_store_rejects_operations() {
        let memory = InMemoryStore::default();
        let store = DocumentStore::new(memory.clone());
        store.close().unwrap();
        assert!(memory.is_closed());
        assert!(store.close().is_ok());
        let err = store.count("users", &all()).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::StoreOperationError);
    }

    #[test]
    fn test_collection_names_skip_empty() {
        let memory = InMemoryStore::default();
        let store = DocumentStore::new(memory.clone());
        store.insert_many("a", vec![doc! { _id: 1 }]).unwrap();
        store.insert_many("b", vec![doc! { _id: 1 }]).unwrap();
        store.remove_many("b", &all()).unwrap();
        assert_eq!(memory.collection_names(), vec!["a".to_string()]);
    }
}
