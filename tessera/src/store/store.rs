use std::collections::HashSet;
use std::ops::Deref;
use std::sync::Arc;

use crate::common::{Document, SubscriberRef, Value};
use crate::errors::TesseraResult;
use crate::filter::Filter;
use crate::store::{FindOptions, LargeObject, ScriptResult, StoreEventListener};

/// Operations a backing document store provides.
///
/// Every method is a blocking round trip. "Nothing matched" is reported
/// as an empty result or a zero count; errors are reserved for failures
/// of the store itself.
pub trait DocumentStoreProvider: Send + Sync {
    /// Documents of `collection` matching `filter`.
    fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> TesseraResult<Vec<Document>>;

    /// First document of `collection` matching `filter`.
    fn find_one(&self, collection: &str, filter: &Filter) -> TesseraResult<Option<Document>> {
        let mut found = self.find(collection, filter, &FindOptions::new().limit(1))?;
        Ok(if found.is_empty() {
            None
        } else {
            Some(found.swap_remove(0))
        })
    }

    fn count(&self, collection: &str, filter: &Filter) -> TesseraResult<u64>;

    /// Inserts `documents` in one bulk call and returns the number
    /// inserted.
    fn insert_many(&self, collection: &str, documents: Vec<Document>) -> TesseraResult<u64>;

    /// Replaces the first document matching `filter` with `document` and
    /// returns the number of documents matched (0 or 1).
    fn update_one(&self, collection: &str, filter: &Filter, document: Document)
        -> TesseraResult<u64>;

    /// Removes every document matching `filter` and returns the count.
    fn remove_many(&self, collection: &str, filter: &Filter) -> TesseraResult<u64>;

    fn create_index(&self, collection: &str, fields: &[String], order: i32) -> TesseraResult<()>;

    /// Fields already covered by an index on `collection`.
    fn index_fields(&self, collection: &str) -> TesseraResult<HashSet<String>>;

    /// Evaluates a script in the store's native dialect.
    fn eval_script(&self, script: &str) -> TesseraResult<ScriptResult>;

    /// Stores a large object in `bucket` and returns its file id.
    fn save_large_object(&self, bucket: &str, object: LargeObject) -> TesseraResult<Value>;

    /// First large object whose file document matches `filter`.
    fn find_large_object(&self, bucket: &str, filter: &Filter)
        -> TesseraResult<Option<LargeObject>>;

    /// Replaces the metadata of a stored large object without touching its
    /// content.
    fn update_large_object_metadata(
        &self,
        bucket: &str,
        file_id: &Value,
        metadata: Document,
    ) -> TesseraResult<()>;

    fn remove_large_objects(&self, bucket: &str, filter: &Filter) -> TesseraResult<u64>;

    fn subscribe(&self, listener: StoreEventListener) -> TesseraResult<SubscriberRef>;

    fn unsubscribe(&self, subscriber: SubscriberRef) -> TesseraResult<()>;

    fn close(&self) -> TesseraResult<()>;
}

/// Shared handle to a [DocumentStoreProvider].
#[derive(Clone)]
pub struct DocumentStore {
    inner: Arc<dyn DocumentStoreProvider>,
}

impl DocumentStore {
    pub fn new<T: DocumentStoreProvider + 'static>(inner: T) -> Self {
        DocumentStore {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for DocumentStore {
    type Target = Arc<dyn DocumentStoreProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
