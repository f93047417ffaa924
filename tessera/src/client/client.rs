use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::batch::{
    BatchDispatcher, BatchReport, BatchSize, BatchWriter, Batcher, NodeWrite,
};
use crate::client::{
    DocumentMapper, JoinTableData, JoinTableOperation, LoadedData, NativeQueryResult, QueryKind,
    ResolvedEntity,
};
use crate::common::{print_query, Convertible, Document, Value, DOC_ID, LOB_FILE_ID, LOB_METADATA_ID};
use crate::config::TesseraConfig;
use crate::errors::{ErrorKind, TesseraError, TesseraResult};
use crate::filter::{and, by_id, field, Filter};
use crate::graph::{EntityEventBus, Node, TrackedEntity};
use crate::lifecycle::{EntityState, EntityStateManager};
use crate::metadata::{Entity, EntityMetadata, MetadataContext};
use crate::store::{DocumentStore, FindOptions, ScriptResult};

/// Translates entity metadata and predicates into document store calls.
///
/// The client owns the write batch: it implements [Batcher], staging
/// nodes in a [BatchDispatcher] and writing them through the store. Clones
/// share the store, the metadata and the batch.
#[derive(Clone)]
pub struct DocumentClient {
    inner: Arc<DocumentClientInner>,
}

impl DocumentClient {
    pub fn new(
        store: DocumentStore,
        metadata: MetadataContext,
        event_bus: EntityEventBus,
        config: &TesseraConfig,
    ) -> Self {
        DocumentClient {
            inner: Arc::new(DocumentClientInner {
                store,
                metadata,
                event_bus,
                show_query: config.show_query(),
                dispatcher: Mutex::new(BatchDispatcher::new(config.batch_size())),
            }),
        }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.inner.store
    }

    pub fn metadata(&self) -> &MetadataContext {
        &self.inner.metadata
    }

    pub fn entity_events(&self) -> &EntityEventBus {
        &self.inner.event_bus
    }

    /// Finds an entity by id. `None` when no location holds it or when the
    /// stored discriminator belongs to neither `E` nor one of its subtypes.
    pub fn find<E: Entity>(&self, id: impl Into<Value>) -> TesseraResult<Option<E>> {
        let entity_name = self.inner.metadata.metadata_of::<E>()?.entity_name().to_string();
        match self.find_resolved(&entity_name, &id.into())? {
            Some(resolved) => resolved.to_entity().map(Some),
            None => Ok(None),
        }
    }

    /// Finds an entity by id and reports its concrete type and relations.
    pub fn find_resolved(
        &self,
        entity_name: &str,
        id: &Value,
    ) -> TesseraResult<Option<ResolvedEntity>> {
        self.inner.find_resolved(entity_name, id)
    }

    /// Finds every entity whose id is in `ids`, in store order.
    pub fn find_all<E: Entity>(&self, ids: Vec<Value>) -> TesseraResult<Vec<E>> {
        let metadata = self.inner.metadata.metadata_of::<E>()?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        if metadata.is_lob() {
            let mut entities = Vec::with_capacity(ids.len());
            for id in &ids {
                if let Some(resolved) = self.inner.find_large_object(metadata, id)? {
                    entities.push(resolved.to_entity()?);
                }
            }
            return Ok(entities);
        }

        let filter = self.inner.typed_filter(metadata, field(DOC_ID).in_array(ids));
        let documents = self.inner.find_documents(metadata.table_name(), &filter, &FindOptions::new())?;
        self.inner.to_entities(metadata, documents)
    }

    /// Runs `filter` against the entity's primary table.
    ///
    /// With `count` set only the number of matches is returned. Otherwise
    /// sort, skip and limit of `options` apply and every match is completed
    /// from the secondary tables.
    pub fn load_data<E: Entity>(
        &self,
        filter: &Filter,
        options: &FindOptions,
        count: bool,
    ) -> TesseraResult<LoadedData<E>> {
        let metadata = self.inner.metadata.metadata_of::<E>()?;
        if metadata.is_lob() {
            log::error!("Query over large object entity {}", metadata.entity_name());
            return Err(TesseraError::new(
                &format!(
                    "Queries over large object entity {} are not supported",
                    metadata.entity_name()
                ),
                ErrorKind::UnsupportedOperation,
            ));
        }

        let filter = self.inner.typed_filter(metadata, filter.clone());
        if count {
            print_query(
                self.inner.show_query,
                &format!("db.{}.count({})", metadata.table_name(), filter),
            );
            return Ok(LoadedData::Count(self.inner.store.count(metadata.table_name(), &filter)?));
        }

        let documents = self.inner.find_documents(metadata.table_name(), &filter, options)?;
        Ok(LoadedData::Entities(self.inner.to_entities(metadata, documents)?))
    }

    /// Entities whose relation column `column` holds `value`.
    pub fn find_by_relation<E: Entity>(
        &self,
        column: &str,
        value: impl Into<Value>,
    ) -> TesseraResult<Vec<E>> {
        let metadata = self.inner.metadata.metadata_of::<E>()?;
        let filter = self.inner.typed_filter(metadata, field(column).eq(value));
        let documents = self.inner.find_documents(metadata.table_name(), &filter, &FindOptions::new())?;
        self.inner.to_entities(metadata, documents)
    }

    /// Values of `id_column` in rows of `table` where `column == value`.
    pub fn find_ids_by_column(
        &self,
        table: &str,
        id_column: &str,
        column: &str,
        value: &Value,
    ) -> TesseraResult<Vec<Value>> {
        let filter = field(column).eq(value.clone());
        let documents = self.inner.find_documents(table, &filter, &FindOptions::new())?;
        Ok(documents
            .iter()
            .filter_map(|doc| doc.get(id_column).cloned())
            .collect())
    }

    /// Child ids recorded in join table `table` for `parent_id`.
    pub fn get_columns_by_id(
        &self,
        table: &str,
        join_column: &str,
        inverse_join_column: &str,
        parent_id: &Value,
    ) -> TesseraResult<Vec<Value>> {
        self.find_ids_by_column(table, inverse_join_column, join_column, parent_id)
    }

    /// Writes (or removes) the rows of a join table in one store call.
    pub fn persist_join_table(&self, data: &JoinTableData) -> TesseraResult<u64> {
        match data.operation() {
            JoinTableOperation::Insert => {
                let mut rows = Vec::new();
                for (parent, child) in data.pairs() {
                    let mut row = Document::new();
                    row.put(DOC_ID, JoinTableData::row_id(parent, child))?;
                    row.put(data.join_column(), parent.clone())?;
                    row.put(data.inverse_join_column(), child.clone())?;
                    rows.push(row);
                }
                if rows.is_empty() {
                    return Ok(0);
                }
                self.inner.bulk_insert(data.table_name(), rows)
            }
            JoinTableOperation::Delete => {
                let ids: Vec<Value> = data
                    .pairs()
                    .map(|(parent, child)| Value::from(JoinTableData::row_id(parent, child)))
                    .collect();
                if ids.is_empty() {
                    return Ok(0);
                }
                self.inner
                    .remove_documents(data.table_name(), &field(DOC_ID).in_array(ids))
            }
        }
    }

    /// Inserts `entity` immediately, bypassing the batch.
    pub fn persist<E: Entity>(&self, entity: &E) -> TesseraResult<()> {
        let tracked = TrackedEntity::from_entity(entity)?;
        let state = EntityStateManager::with_state(
            EntityState::Managed,
            Default::default(),
            Default::default(),
        );
        self.persist_node(&Node::for_insert(tracked, state))
    }

    /// Writes a single node immediately, bypassing the batch.
    pub fn persist_node(&self, node: &Node) -> TesseraResult<()> {
        node.handle_pre_event(&self.inner.event_bus)?;
        if let NodeWrite::Insert(documents) = self.inner.stage_node(node)? {
            for (collection, document) in documents {
                self.inner.bulk_insert(&collection, vec![document])?;
            }
        }
        node.handle_post_event(&self.inner.event_bus)
    }

    /// Deletes an entity from every location it is stored in.
    pub fn delete(&self, entity_name: &str, id: &Value) -> TesseraResult<u64> {
        let metadata = self.inner.metadata.metadata(entity_name)?;
        self.inner.delete_entity(metadata, id)
    }

    pub fn delete_by_column(&self, table: &str, column: &str, value: &Value) -> TesseraResult<u64> {
        self.inner
            .remove_documents(table, &field(column).eq(value.clone()))
    }

    /// Creates the declared indexes of an entity, skipping fields already
    /// indexed. Returns the number of indexes created.
    pub fn create_index(&self, entity_name: &str) -> TesseraResult<usize> {
        let metadata = self.inner.metadata.metadata(entity_name)?;
        let table = metadata.table_name();
        let mut created = 0;

        for index in metadata.indexes() {
            let existing = self.inner.store.index_fields(table)?;
            let fields: Vec<String> = index
                .field_names()
                .iter()
                .filter(|name| !existing.contains(*name))
                .cloned()
                .collect();
            if fields.is_empty() {
                continue;
            }

            print_query(
                self.inner.show_query,
                &format!("db.{}.createIndex({:?}, {})", table, fields, index.order()),
            );
            self.inner.store.create_index(table, &fields, index.order())?;
            created += 1;
        }
        Ok(created)
    }

    pub fn execute_script(&self, script: &str) -> TesseraResult<ScriptResult> {
        print_query(self.inner.show_query, script);
        self.inner.store.eval_script(script)
    }

    /// Runs a native script and shapes the result by its trailing call.
    pub fn execute_native_query<E: Entity>(
        &self,
        script: &str,
    ) -> TesseraResult<NativeQueryResult<E>> {
        let metadata = self.inner.metadata.metadata_of::<E>()?;
        let kind = QueryKind::of(script);

        let script = match kind {
            QueryKind::Multiple if !script.contains(".toArray(") && script.contains(".find(") => {
                format!("{}.toArray()", script.trim_end().trim_end_matches(';'))
            }
            _ => script.to_string(),
        };
        let result = self.execute_script(&script)?;

        let mapper = DocumentMapper::new(metadata);
        let to_entity = |doc: Document| -> TesseraResult<E> {
            E::from_value(&Value::Document(mapper.from_document(doc)?))
        };

        Ok(match kind {
            QueryKind::Single => {
                let doc = match result {
                    ScriptResult::Document(doc) => doc,
                    ScriptResult::Documents(docs) => docs.into_iter().next(),
                    _ => None,
                };
                NativeQueryResult::Entity(doc.map(to_entity).transpose()?)
            }
            QueryKind::Multiple => {
                let docs = match result {
                    ScriptResult::Documents(docs) => docs,
                    ScriptResult::Document(doc) => doc.into_iter().collect(),
                    _ => Vec::new(),
                };
                let mut entities = Vec::with_capacity(docs.len());
                for doc in docs {
                    entities.push(to_entity(doc)?);
                }
                NativeQueryResult::Entities(entities)
            }
            QueryKind::Scalar => NativeQueryResult::Scalar(match result {
                ScriptResult::Scalar(value) => value,
                ScriptResult::Documents(docs) => Value::from(docs.len()),
                ScriptResult::Values(values) => Value::Array(values),
                ScriptResult::Document(doc) => Value::from(doc),
            }),
            QueryKind::Raw => NativeQueryResult::Values(match result {
                ScriptResult::Values(values) => values,
                ScriptResult::Documents(docs) => docs.into_iter().map(Value::Document).collect(),
                ScriptResult::Document(doc) => doc.into_iter().map(Value::Document).collect(),
                ScriptResult::Scalar(value) => vec![value],
            }),
        })
    }

    /// Merges `update` into the first primary-table document matching
    /// `filter` and writes it back.
    ///
    /// Returns the number of documents updated, or `-1` when the update
    /// fails or nothing matches.
    pub fn handle_update_functions(&self, entity_name: &str, filter: &Filter, update: Document) -> i64 {
        match self.inner.apply_update(entity_name, filter, update) {
            Ok(updated) if updated > 0 => updated as i64,
            Ok(_) => -1,
            Err(e) => {
                log::error!("Update of {} failed: {}", entity_name, e);
                -1
            }
        }
    }

    /// Lookup by arbitrary column combinations is not available on a
    /// document store.
    pub fn find_by_columns(
        &self,
        entity_name: &str,
        _columns: &IndexMap<String, Value>,
    ) -> TesseraResult<Vec<Document>> {
        log::error!("find_by_columns called for {}", entity_name);
        Err(TesseraError::new(
            "Lookup by multiple columns is not supported by document stores",
            ErrorKind::UnsupportedOperation,
        ))
    }

    /// Drops staged writes. The store stays open.
    pub fn close(&self) -> TesseraResult<()> {
        let mut dispatcher = self.inner.dispatcher.lock();
        if !dispatcher.is_empty() {
            log::warn!("Closing client with {} staged nodes", dispatcher.len());
        }
        dispatcher.clear();
        Ok(())
    }
}

impl Batcher for DocumentClient {
    fn add_batch(&self, node: Node) -> TesseraResult<()> {
        let mut dispatcher = self.inner.dispatcher.lock();
        dispatcher.add_batch(node, self.inner.as_ref())?;
        Ok(())
    }

    fn execute_batch(&self) -> TesseraResult<usize> {
        self.inner.dispatcher.lock().execute_batch(self.inner.as_ref())
    }

    fn execute_batch_with_report(&self) -> TesseraResult<BatchReport> {
        self.inner
            .dispatcher
            .lock()
            .execute_batch_with_report(self.inner.as_ref())
    }

    fn replace(&self, node: Node) -> bool {
        self.inner.dispatcher.lock().replace(node)
    }

    fn clear(&self) {
        self.inner.dispatcher.lock().clear()
    }

    fn batch_size(&self) -> BatchSize {
        self.inner.dispatcher.lock().batch_size()
    }

    fn pending(&self) -> usize {
        self.inner.dispatcher.lock().len()
    }
}

struct DocumentClientInner {
    store: DocumentStore,
    metadata: MetadataContext,
    event_bus: EntityEventBus,
    show_query: bool,
    dispatcher: Mutex<BatchDispatcher>,
}

impl DocumentClientInner {
    fn find_documents(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> TesseraResult<Vec<Document>> {
        print_query(self.show_query, &format!("db.{}.find({})", collection, filter));
        self.store.find(collection, filter, options)
    }

    fn find_one(&self, collection: &str, filter: &Filter) -> TesseraResult<Option<Document>> {
        print_query(self.show_query, &format!("db.{}.findOne({})", collection, filter));
        self.store.find_one(collection, filter)
    }

    fn remove_documents(&self, collection: &str, filter: &Filter) -> TesseraResult<u64> {
        print_query(self.show_query, &format!("db.{}.remove({})", collection, filter));
        self.store.remove_many(collection, filter)
    }

    /// Narrows `filter` to the entity's own discriminator value, if any.
    fn typed_filter(&self, metadata: &EntityMetadata, filter: Filter) -> Filter {
        match metadata.discriminator() {
            Some(discriminator) => and(vec![
                filter,
                field(discriminator.column()).eq(discriminator.value()),
            ]),
            None => filter,
        }
    }

    fn find_resolved(
        &self,
        entity_name: &str,
        id: &Value,
    ) -> TesseraResult<Option<ResolvedEntity>> {
        let metadata = self.metadata.metadata(entity_name)?;
        if metadata.is_lob() {
            return self.find_large_object(metadata, id);
        }

        let filter = metadata.id().create_id_filter(id)?;
        let mut merged: Option<Document> = None;
        let mut concrete: Option<&EntityMetadata> = None;

        for collection in metadata.collections() {
            let hit = match self.find_one(collection, &filter)? {
                Some(hit) => hit,
                None => continue,
            };

            let document = merged.get_or_insert_with(Document::new);
            document.merge(&hit);
            if concrete.is_none() {
                concrete = self.metadata.resolve_concrete(metadata, document)?;
            }

            if let Some(resolved) = concrete {
                if is_complete(metadata, resolved, document) {
                    break;
                }
            }
        }

        match (merged, concrete) {
            (Some(document), Some(resolved)) => {
                let document = DocumentMapper::new(resolved).from_document(document)?;
                Ok(Some(ResolvedEntity::new(resolved, document)))
            }
            (Some(_), None) => {
                log::warn!(
                    "Stored discriminator of {} does not resolve to {} or a subtype",
                    id,
                    entity_name
                );
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn find_large_object(
        &self,
        metadata: &EntityMetadata,
        id: &Value,
    ) -> TesseraResult<Option<ResolvedEntity>> {
        let bucket = metadata.table_name();
        let filter = field(LOB_METADATA_ID).eq(id.clone());
        print_query(self.show_query, &format!("db.{}.files.findOne({})", bucket, filter));

        match self.store.find_large_object(bucket, &filter)? {
            Some(object) => {
                let document = DocumentMapper::new(metadata).from_large_object(&object)?;
                Ok(Some(ResolvedEntity::new(metadata, document)))
            }
            None => Ok(None),
        }
    }

    /// Completes primary-table hits from the secondary tables and converts
    /// them to entities.
    fn to_entities<E: Entity>(
        &self,
        metadata: &EntityMetadata,
        documents: Vec<Document>,
    ) -> TesseraResult<Vec<E>> {
        let mapper = DocumentMapper::new(metadata);
        let mut entities = Vec::with_capacity(documents.len());
        for mut document in documents {
            if let Some(id) = document.id().cloned() {
                for table in metadata.secondary_tables() {
                    if let Some(hit) = self.find_one(table.name(), &by_id(id.clone()))? {
                        document.merge(&hit);
                    }
                }
            }
            let document = mapper.from_document(document)?;
            entities.push(E::from_value(&Value::Document(document))?);
        }
        Ok(entities)
    }

    fn delete_entity(&self, metadata: &EntityMetadata, id: &Value) -> TesseraResult<u64> {
        if metadata.is_lob() {
            let bucket = metadata.table_name();
            let filter = field(LOB_METADATA_ID).eq(id.clone());
            print_query(self.show_query, &format!("db.{}.files.remove({})", bucket, filter));
            return self.store.remove_large_objects(bucket, &filter);
        }

        let filter = metadata.id().create_id_filter(id)?;
        let mut removed = 0;
        for table in metadata.secondary_tables() {
            removed += self.remove_documents(table.name(), &filter)?;
        }
        removed += self.remove_documents(metadata.table_name(), &filter)?;
        Ok(removed)
    }

    fn write_large_object(&self, metadata: &EntityMetadata, node: &Node) -> TesseraResult<()> {
        let bucket = metadata.table_name();
        let object = DocumentMapper::new(metadata).to_large_object(node.data(), node.entity_id())?;
        let filter = field(LOB_METADATA_ID).eq(node.entity_id().clone());
        let existing = self.store.find_large_object(bucket, &filter)?;

        match existing {
            Some(existing) if existing.content_hash() == object.content_hash() => {
                print_query(
                    self.show_query,
                    &format!("db.{}.files.update({}, metadata)", bucket, existing.file_id()),
                );
                self.store
                    .update_large_object_metadata(bucket, existing.file_id(), object.metadata().clone())
            }
            Some(existing) => {
                print_query(self.show_query, &format!("db.{}.files.save({})", bucket, object.filename()));
                self.store.save_large_object(bucket, object)?;
                self.store
                    .remove_large_objects(bucket, &field(LOB_FILE_ID).eq(existing.file_id().clone()))?;
                Ok(())
            }
            None => {
                print_query(self.show_query, &format!("db.{}.files.save({})", bucket, object.filename()));
                self.store.save_large_object(bucket, object).map(|_| ())
            }
        }
    }

    /// Find-then-merge-or-insert of each collection document.
    fn update_documents(&self, documents: IndexMap<String, Document>) -> TesseraResult<u64> {
        let mut written = 0;
        for (collection, document) in documents {
            let id = document.id().cloned().unwrap_or(Value::Null);
            let filter = by_id(id);
            match self.find_one(&collection, &filter)? {
                Some(mut existing) => {
                    existing.merge(&document);
                    print_query(self.show_query, &format!("db.{}.update({})", collection, filter));
                    written += self.store.update_one(&collection, &filter, existing)?;
                }
                None => {
                    written += self.bulk_insert(&collection, vec![document])?;
                }
            }
        }
        Ok(written)
    }

    fn apply_update(&self, entity_name: &str, filter: &Filter, update: Document) -> TesseraResult<u64> {
        let metadata = self.metadata.metadata(entity_name)?;
        let table = metadata.table_name();
        let mut existing = match self.find_one(table, filter)? {
            Some(existing) => existing,
            None => return Ok(0),
        };

        let id = existing.id().cloned().unwrap_or(Value::Null);
        existing.merge(&update);
        print_query(self.show_query, &format!("db.{}.update({}, {})", table, filter, update));
        self.store.update_one(table, &by_id(id), existing)
    }
}

/// Whether the fan-out can stop: the concrete type is known and every
/// relation column and secondary-table field has been seen.
fn is_complete(metadata: &EntityMetadata, concrete: &EntityMetadata, document: &Document) -> bool {
    concrete
        .relations()
        .iter()
        .all(|relation| document.contains_key(relation.name()))
        && metadata
            .secondary_tables()
            .iter()
            .flat_map(|table| table.fields().iter())
            .all(|name| document.contains_key(name))
}

impl BatchWriter for DocumentClientInner {
    fn entity_events(&self) -> &EntityEventBus {
        &self.event_bus
    }

    fn stage_node(&self, node: &Node) -> TesseraResult<NodeWrite> {
        let metadata = self.metadata.metadata(node.entity_name())?;
        if node.is_in_state(EntityState::Removed) {
            return Ok(NodeWrite::Deleted(self.delete_entity(metadata, node.entity_id())?));
        }

        if metadata.is_lob() {
            self.write_large_object(metadata, node)?;
            return Ok(NodeWrite::LargeObject);
        }

        let documents = DocumentMapper::new(metadata).to_documents(
            node.data(),
            node.entity_id(),
            node.relations(),
        )?;
        if node.is_update() {
            Ok(NodeWrite::Updated(self.update_documents(documents)?))
        } else {
            Ok(NodeWrite::Insert(documents))
        }
    }

    fn bulk_insert(&self, collection: &str, documents: Vec<Document>) -> TesseraResult<u64> {
        print_query(
            self.show_query,
            &format!("db.{}.insertMany({} documents)", collection, documents.len()),
        );
        self.store.insert_many(collection, documents)
    }
}
