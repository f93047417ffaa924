use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::batch::Batcher;
use crate::client::DocumentClient;
use crate::common::Value;
use crate::errors::{ErrorKind, TesseraError, TesseraResult};
use crate::graph::{Node, TrackedEntity};
use crate::lifecycle::{
    EntityState, EntityStateManager, FlushMode, LifecycleVerb, PersistenceContextType,
    TransitionEffect,
};
use crate::metadata::{Entity, MetadataContext};

/// A persistence context: tracks entities through their lifecycle and
/// stages their writes.
///
/// Every entity the session touches is held in an identity map keyed by
/// entity name and id. A verb moves the entity's [EntityStateManager]
/// and, when the entity needs a write, stages a node with the session's
/// [DocumentClient]. Staged nodes reach the store when the configured
/// batch size is reached, on [Session::flush] in `AUTO` flush mode, or on
/// [Session::commit].
///
/// ```ignore
/// let session = db.session();
/// session.persist(&user)?;
/// session.flush()?;
/// let found: Option<User> = session.find(1)?;
/// session.commit()?;
/// ```
///
/// Relations cascade only to entities the session already tracks.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    pub(crate) fn new(
        client: DocumentClient,
        metadata: MetadataContext,
        flush_mode: FlushMode,
        context_type: PersistenceContextType,
    ) -> Self {
        Session {
            inner: Arc::new(SessionInner {
                id: Uuid::new_v4().to_string(),
                active: AtomicBool::new(true),
                client,
                metadata,
                flush_mode,
                context_type,
                context: Mutex::new(PersistenceContext::default()),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Client writing this session's batches.
    pub fn client(&self) -> &DocumentClient {
        &self.inner.client
    }

    pub fn flush_mode(&self) -> FlushMode {
        self.inner.flush_mode
    }

    pub fn context_type(&self) -> PersistenceContextType {
        self.inner.context_type
    }

    /// Makes a transient entity managed and stages its insert. Persisting
    /// a managed entity cascades to tracked related entities.
    pub fn persist<E: Entity>(&self, entity: &E) -> TesseraResult<()> {
        self.inner.check_active()?;
        let tracked = TrackedEntity::from_entity(entity)?;
        let key = tracked.key();
        let mut context = self.inner.context.lock();

        if !context.nodes.contains_key(&key) {
            let node = Node::new(tracked, self.inner.new_state_manager());
            context.nodes.insert(key.clone(), node);
        }

        let effect = self.inner.transition(&mut context, &key, LifecycleVerb::Persist)?;
        match effect {
            TransitionEffect::Cascade => {
                self.inner
                    .cascade(&mut context, &key, LifecycleVerb::Persist, &mut HashSet::new())
            }
            _ => {
                if let Some(node) = context.nodes.get_mut(&key) {
                    node.mark_dirty(false);
                }
                self.inner.stage(&mut context, &key)
            }
        }
    }

    /// Schedules a managed entity for deletion, cascading to tracked
    /// related entities whose policy covers removal.
    pub fn remove<E: Entity>(&self, entity: &E) -> TesseraResult<()> {
        self.inner.check_active()?;
        let key = TrackedEntity::from_entity(entity)?.key();
        let mut context = self.inner.context.lock();
        self.inner.remove_tracked(&mut context, &key, &mut HashSet::new())
    }

    /// Copies the state of `entity` into the tracked instance.
    ///
    /// A detached entity becomes managed again. A managed entity takes the
    /// new field values and cascades the merge. Merging an entity the
    /// session has never seen does nothing.
    pub fn merge<E: Entity>(&self, entity: &E) -> TesseraResult<()> {
        self.inner.check_active()?;
        let metadata = self.inner.metadata.metadata_of::<E>()?;
        let tracked = TrackedEntity::from_entity(entity)?;
        let key = tracked.key();
        let mut context = self.inner.context.lock();

        if !context.nodes.contains_key(&key) {
            log::debug!("Merge of untracked entity {} ignored", key);
            return Ok(());
        }

        let effect = self.inner.transition(&mut context, &key, LifecycleVerb::Merge)?;
        if let Some(node) = context.nodes.get_mut(&key) {
            node.tracked_mut().replace_data(metadata, tracked.data().clone())?;
            node.mark_dirty(true);
        }
        self.inner.stage(&mut context, &key)?;

        if effect == TransitionEffect::Cascade {
            self.inner
                .cascade(&mut context, &key, LifecycleVerb::Merge, &mut HashSet::new())?;
        }
        Ok(())
    }

    /// Finds an entity by id, preferring the managed instance. An entity
    /// loaded from the store becomes managed; a detached instance, which
    /// [Session::contains] reports as absent, is read again from the store.
    pub fn find<E: Entity>(&self, id: impl Into<Value>) -> TesseraResult<Option<E>> {
        self.inner.check_active()?;
        let id = id.into();
        let key = self.inner.key_of::<E>(&id)?;
        let mut context = self.inner.context.lock();

        if let Some(node) = context.nodes.get_mut(&key) {
            node.state_manager_mut().find()?;
            if node.is_in_state(EntityState::Removed) {
                return Ok(None);
            }
            if !node.is_in_state(EntityState::Detached) {
                return node.tracked().to_entity().map(Some);
            }
        }

        let entity: E = match self.inner.client.find(id)? {
            Some(entity) => entity,
            None => return Ok(None),
        };
        let tracked = TrackedEntity::from_entity(&entity)?;
        let mut node = Node::new(
            tracked,
            EntityStateManager::with_state(
                EntityState::Managed,
                self.inner.flush_mode,
                self.inner.context_type,
            ),
        );
        node.mark_written();
        context.nodes.insert(key, node);
        Ok(Some(entity))
    }

    /// Returns the tracked instance, or reads the entity from the store
    /// without tracking it.
    pub fn get_reference<E: Entity>(&self, id: impl Into<Value>) -> TesseraResult<Option<E>> {
        self.inner.check_active()?;
        let id = id.into();
        let key = self.inner.key_of::<E>(&id)?;
        let mut context = self.inner.context.lock();

        match context.nodes.get_mut(&key) {
            Some(node) => {
                node.state_manager_mut().get_reference()?;
                node.tracked().to_entity().map(Some)
            }
            None => self.inner.client.find(id),
        }
    }

    /// Reloads a managed entity from the store. Writes of the entity still
    /// waiting in the batch are executed first. Returns `None` if the store
    /// no longer holds it.
    pub fn refresh<E: Entity>(&self, entity: &E) -> TesseraResult<Option<E>> {
        self.inner.check_active()?;
        let metadata = self.inner.metadata.metadata_of::<E>()?;
        let key = TrackedEntity::from_entity(entity)?.key();
        let mut context = self.inner.context.lock();

        if !context.nodes.contains_key(&key) {
            return self.inner.untracked(LifecycleVerb::Refresh).map(|_| None);
        }
        if context.pending.contains(&key) {
            self.inner.execute(&mut context)?;
        }

        let effect = self.inner.transition(&mut context, &key, LifecycleVerb::Refresh)?;
        if effect != TransitionEffect::Reload {
            return Ok(None);
        }

        let loaded = self
            .inner
            .client
            .find_resolved(metadata.entity_name(), &entity.entity_id()?)?;
        match (loaded, context.nodes.get_mut(&key)) {
            (Some(resolved), Some(node)) => {
                node.tracked_mut()
                    .replace_data(resolved.metadata(), resolved.document().clone())?;
                node.clear_dirty();
                node.tracked().to_entity().map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Leaves the entity's state untouched.
    pub fn detach<E: Entity>(&self, entity: &E) -> TesseraResult<()> {
        self.apply_no_op(entity, LifecycleVerb::Detach)
    }

    pub fn lock<E: Entity>(&self, entity: &E) -> TesseraResult<()> {
        self.apply_no_op(entity, LifecycleVerb::Lock)
    }

    /// Whether `entity` is managed by this session.
    pub fn contains<E: Entity>(&self, entity: &E) -> TesseraResult<bool> {
        self.inner.check_active()?;
        let key = TrackedEntity::from_entity(entity)?.key();
        let context = self.inner.context.lock();
        Ok(context
            .nodes
            .get(&key)
            .map(|node| node.state_manager().contains())
            .unwrap_or(false))
    }

    /// Lifecycle state of a tracked entity.
    pub fn state_of<E: Entity>(&self, entity: &E) -> TesseraResult<Option<EntityState>> {
        let key = TrackedEntity::from_entity(entity)?.key();
        let context = self.inner.context.lock();
        Ok(context.nodes.get(&key).map(|node| node.state()))
    }

    /// Writes staged changes in `AUTO` flush mode; in `COMMIT` mode the
    /// writes wait for [Session::commit].
    pub fn flush(&self) -> TesseraResult<()> {
        self.inner.check_active()?;
        let mut context = self.inner.context.lock();

        let mut synchronize = false;
        for node in context.nodes.values_mut() {
            if node.state_manager_mut().flush()? == TransitionEffect::Synchronize {
                synchronize = true;
            }
        }

        if synchronize || (self.inner.flush_mode == FlushMode::Auto && !context.pending.is_empty())
        {
            self.inner.execute(&mut context)
        } else {
            log::debug!("Flush deferred to commit for session {}", self.inner.id);
            Ok(())
        }
    }

    /// Writes every staged change and detaches the managed entities.
    pub fn commit(&self) -> TesseraResult<()> {
        self.inner.check_active()?;
        let mut context = self.inner.context.lock();
        self.inner.execute(&mut context)?;
        self.inner.end_context(&mut context, LifecycleVerb::Commit)
    }

    /// Drops every staged change. Managed entities become transient in an
    /// extended context and detached in a transactional one.
    ///
    /// Writes already sent to the store because the batch size was reached
    /// are not undone.
    pub fn rollback(&self) -> TesseraResult<()> {
        self.inner.check_active()?;
        let mut context = self.inner.context.lock();
        self.inner.client.clear();
        context.pending.clear();
        self.inner.end_context(&mut context, LifecycleVerb::Rollback)
    }

    /// Detaches every entity and drops the staged changes. Closing twice
    /// is allowed.
    pub fn close(&self) -> TesseraResult<()> {
        if self
            .inner
            .active
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(());
        }

        let mut context = self.inner.context.lock();
        for node in context.nodes.values_mut() {
            node.state_manager_mut().close()?;
        }
        context.nodes.clear();
        context.pending.clear();
        self.inner.client.close()
    }

    /// Forgets every tracked entity and staged change.
    pub fn clear(&self) -> TesseraResult<()> {
        self.inner.check_active()?;
        let mut context = self.inner.context.lock();
        for node in context.nodes.values_mut() {
            node.state_manager_mut().clear()?;
        }
        context.nodes.clear();
        context.pending.clear();
        self.inner.client.clear();
        Ok(())
    }

    fn apply_no_op<E: Entity>(&self, entity: &E, verb: LifecycleVerb) -> TesseraResult<()> {
        self.inner.check_active()?;
        let key = TrackedEntity::from_entity(entity)?.key();
        let mut context = self.inner.context.lock();
        if context.nodes.contains_key(&key) {
            self.inner.transition(&mut context, &key, verb).map(|_| ())
        } else {
            self.inner.untracked(verb).map(|_| ())
        }
    }
}

impl Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("active", &self.is_active())
            .field("flush_mode", &self.inner.flush_mode)
            .field("context_type", &self.inner.context_type)
            .finish()
    }
}

#[derive(Default)]
struct PersistenceContext {
    nodes: IndexMap<String, Node>,
    /// Keys with a write sitting in the client's batch.
    pending: HashSet<String>,
}

struct SessionInner {
    id: String,
    active: AtomicBool,
    client: DocumentClient,
    metadata: MetadataContext,
    flush_mode: FlushMode,
    context_type: PersistenceContextType,
    context: Mutex<PersistenceContext>,
}

impl SessionInner {
    fn check_active(&self) -> TesseraResult<()> {
        if !self.active.load(Ordering::SeqCst) {
            log::error!("Session {} is closed", self.id);
            return Err(TesseraError::new("Session is closed", ErrorKind::InvalidOperation));
        }
        Ok(())
    }

    fn new_state_manager(&self) -> EntityStateManager {
        EntityStateManager::new(self.flush_mode, self.context_type)
    }

    fn key_of<E: Entity>(&self, id: &Value) -> TesseraResult<String> {
        let metadata = self.metadata.metadata_of::<E>()?;
        Ok(format!("{}#{}", metadata.entity_name(), id))
    }

    /// Applies `verb` to an entity the session does not track, which is
    /// transient from the session's point of view.
    fn untracked(&self, verb: LifecycleVerb) -> TesseraResult<TransitionEffect> {
        self.new_state_manager().apply(verb)
    }

    fn transition(
        &self,
        context: &mut PersistenceContext,
        key: &str,
        verb: LifecycleVerb,
    ) -> TesseraResult<TransitionEffect> {
        match context.nodes.get_mut(key) {
            Some(node) => node.state_manager_mut().apply(verb),
            None => self.untracked(verb),
        }
    }

    fn remove_tracked(
        &self,
        context: &mut PersistenceContext,
        key: &str,
        visited: &mut HashSet<String>,
    ) -> TesseraResult<()> {
        visited.insert(key.to_string());
        let before = context.nodes.get(key).map(|node| node.state());
        let effect = self.transition(context, key, LifecycleVerb::Remove)?;

        if before == Some(EntityState::Managed) {
            if let Some(node) = context.nodes.get_mut(key) {
                let is_update = node.is_update();
                node.mark_dirty(is_update);
            }
            self.stage(context, key)?;
        }

        if effect == TransitionEffect::Cascade {
            self.cascade(context, key, LifecycleVerb::Remove, visited)?;
        }
        Ok(())
    }

    /// Applies `verb` to the tracked entities related to `key` whose
    /// cascade policy covers it.
    fn cascade(
        &self,
        context: &mut PersistenceContext,
        key: &str,
        verb: LifecycleVerb,
        visited: &mut HashSet<String>,
    ) -> TesseraResult<()> {
        visited.insert(key.to_string());
        let targets: Vec<String> = match context.nodes.get(key) {
            Some(node) => node
                .relations()
                .iter()
                .filter(|holder| holder.cascades(verb))
                .map(|holder| format!("{}#{}", holder.target_entity(), holder.related_id()))
                .filter(|target| context.nodes.contains_key(target))
                .collect(),
            None => return Ok(()),
        };

        for target in targets {
            if visited.contains(&target) {
                continue;
            }
            log::debug!("Cascading {} from {} to {}", verb, key, target);
            if verb == LifecycleVerb::Remove {
                self.remove_tracked(context, &target, visited)?;
            } else {
                visited.insert(target.clone());
                if self.transition(context, &target, verb)? == TransitionEffect::Cascade {
                    self.cascade(context, &target, verb, visited)?;
                }
            }
        }
        Ok(())
    }

    /// Hands a copy of the tracked node to the batch. A write of the same
    /// entity still waiting in the batch is replaced, so the batch holds
    /// the entity's latest state once and nothing reaches the store early.
    fn stage(&self, context: &mut PersistenceContext, key: &str) -> TesseraResult<()> {
        let staged = match context.nodes.get_mut(key) {
            Some(node) if node.is_dirty() => {
                let staged = node.clone();
                node.mark_written();
                staged
            }
            _ => return Ok(()),
        };

        if context.pending.contains(key) && self.client.replace(staged.clone()) {
            log::debug!("Replaced staged write of {}", key);
            return Ok(());
        }

        context.pending.insert(key.to_string());
        self.client.add_batch(staged)?;
        if self.client.pending() == 0 {
            context.pending.clear();
        }
        Ok(())
    }

    fn execute(&self, context: &mut PersistenceContext) -> TesseraResult<()> {
        let report = self.client.execute_batch_with_report()?;
        if report.nodes > 0 {
            log::debug!(
                "Session {} wrote {} nodes into {} collections",
                self.id,
                report.nodes,
                report.collections
            );
        }
        context.pending.clear();
        Ok(())
    }

    /// Applies commit or rollback to every tracked entity and forgets the
    /// ones that leave the context.
    fn end_context(&self, context: &mut PersistenceContext, verb: LifecycleVerb) -> TesseraResult<()> {
        for node in context.nodes.values_mut() {
            node.state_manager_mut().apply(verb)?;
        }

        let committed = verb == LifecycleVerb::Commit;
        context.nodes.retain(|_, node| match node.state() {
            EntityState::Transient => false,
            EntityState::Removed => !committed,
            EntityState::Managed | EntityState::Detached => true,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::filter::all;
    use crate::fixtures::{Order, User};
    use crate::graph::EntityEventListener;
    use crate::store::FindOptions;
    use crate::Tessera;

    fn open(builder: crate::TesseraBuilder) -> Tessera {
        builder
            .register::<User>()
            .register::<Order>()
            .build()
            .unwrap()
    }

    fn stored(db: &Tessera, collection: &str) -> usize {
        db.store()
            .find(collection, &all(), &FindOptions::new())
            .unwrap()
            .len()
    }

    #[test]
    fn test_persist_then_flush_writes() {
        let db = open(Tessera::builder());
        let session = db.session().unwrap();
        let user = User::new(1, "alice", Some("bio"));

        session.persist(&user).unwrap();
        assert_eq!(session.state_of(&user).unwrap(), Some(EntityState::Managed));
        assert!(session.contains(&user).unwrap());
        assert_eq!(stored(&db, "users"), 0);

        session.flush().unwrap();
        assert_eq!(stored(&db, "users"), 1);
        assert_eq!(db.client().find::<User>(1i64).unwrap(), Some(user));
    }

    #[test]
    fn test_commit_flush_mode_defers_until_commit() {
        let db = open(Tessera::builder().flush_mode(FlushMode::Commit));
        let session = db.session().unwrap();
        let user = User::new(1, "alice", None);

        session.persist(&user).unwrap();
        session.flush().unwrap();
        assert_eq!(stored(&db, "users"), 0);

        session.commit().unwrap();
        assert_eq!(stored(&db, "users"), 1);
        assert_eq!(session.state_of(&user).unwrap(), Some(EntityState::Detached));
        assert!(!session.contains(&user).unwrap());
    }

    #[test]
    fn test_batch_size_two_writes_without_flush() {
        let db = open(Tessera::builder().batch_size(2));
        let session = db.session().unwrap();

        session.persist(&User::new(1, "a", None)).unwrap();
        assert_eq!(stored(&db, "users"), 0);
        session.persist(&User::new(2, "b", None)).unwrap();
        assert_eq!(stored(&db, "users"), 2);
        assert_eq!(session.client().pending(), 0);
    }

    #[test]
    fn test_commit_mode_merge_then_rollback_writes_nothing() {
        let db = open(Tessera::builder().flush_mode(FlushMode::Commit));
        let session = db.session().unwrap();

        session.persist(&User::new(1, "alice", None)).unwrap();
        session.merge(&User::new(1, "alicia", None)).unwrap();
        assert_eq!(stored(&db, "users"), 0);
        assert_eq!(session.client().pending(), 1);

        session.rollback().unwrap();
        assert_eq!(stored(&db, "users"), 0);
    }

    #[test]
    fn test_commit_mode_merge_then_commit_inserts_latest_state() {
        let db = open(Tessera::builder().flush_mode(FlushMode::Commit));
        let session = db.session().unwrap();

        session.persist(&User::new(1, "alice", None)).unwrap();
        session.merge(&User::new(1, "alicia", None)).unwrap();
        session.commit().unwrap();

        assert_eq!(stored(&db, "users"), 1);
        assert_eq!(db.client().find::<User>(1i64).unwrap().unwrap().name, "alicia");
    }

    #[test]
    fn test_failed_flush_keeps_earlier_inserts() {
        let blocked = Arc::new(AtomicBool::new(true));
        let gate = blocked.clone();
        let db = open(Tessera::builder().add_entity_listener(EntityEventListener::new(
            move |info| {
                if gate.load(Ordering::SeqCst)
                    && info.data().get("name") == Some(&Value::from("mallory"))
                {
                    return Err(TesseraError::new("blocked", ErrorKind::InvalidOperation));
                }
                Ok(())
            },
        )));
        let session = db.session().unwrap();

        session.persist(&User::new(1, "alice", None)).unwrap();
        session.persist(&User::new(2, "mallory", None)).unwrap();
        assert!(session.flush().is_err());
        assert_eq!(stored(&db, "users"), 1);

        blocked.store(false, Ordering::SeqCst);
        session.flush().unwrap();
        session.commit().unwrap();
        assert_eq!(stored(&db, "users"), 2);
        assert!(db.client().find::<User>(1i64).unwrap().is_some());
        assert!(db.client().find::<User>(2i64).unwrap().is_some());
    }

    #[test]
    fn test_find_after_commit_reads_store() {
        let db = open(Tessera::builder());
        let session = db.session().unwrap();
        let user = User::new(1, "alice", None);
        session.persist(&user).unwrap();
        session.commit().unwrap();

        db.client()
            .handle_update_functions("User", &all(), crate::doc! { name: "changed" });
        let found: User = session.find(1i64).unwrap().unwrap();
        assert_eq!(found.name, "changed");
        assert_eq!(session.state_of(&found).unwrap(), Some(EntityState::Managed));
    }

    #[test]
    fn test_persist_detached_is_illegal() {
        let db = open(Tessera::builder());
        let session = db.session().unwrap();
        let user = User::new(1, "alice", None);
        session.persist(&user).unwrap();
        session.commit().unwrap();

        let err = session.persist(&user).unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::IllegalEntityState(EntityState::Detached, LifecycleVerb::Persist)
        );
    }

    #[test]
    fn test_remove_untracked_is_illegal() {
        let db = open(Tessera::builder());
        let session = db.session().unwrap();
        let err = session.remove(&User::new(9, "x", None)).unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::IllegalEntityState(EntityState::Transient, LifecycleVerb::Remove)
        );
    }

    #[test]
    fn test_remove_after_unflushed_persist() {
        let db = open(Tessera::builder());
        let session = db.session().unwrap();
        let user = User::new(1, "alice", Some("bio"));

        session.persist(&user).unwrap();
        session.remove(&user).unwrap();
        assert_eq!(session.state_of(&user).unwrap(), Some(EntityState::Removed));
        session.flush().unwrap();

        assert_eq!(stored(&db, "users"), 0);
        assert_eq!(stored(&db, "user_profiles"), 0);
        assert_eq!(session.find::<User>(1i64).unwrap(), None);
    }

    #[test]
    fn test_remove_cascades_to_tracked_relations() {
        let db = open(Tessera::builder());
        let session = db.session().unwrap();
        let customer = User::new(10, "carol", None);
        let order = Order { id: 1, total: 9, customer_id: Some(10) };

        session.persist(&customer).unwrap();
        session.persist(&order).unwrap();
        session.flush().unwrap();

        session.remove(&order).unwrap();
        assert_eq!(session.state_of(&customer).unwrap(), Some(EntityState::Removed));
        session.flush().unwrap();
        assert_eq!(stored(&db, "orders"), 0);
        assert_eq!(stored(&db, "users"), 0);
    }

    #[test]
    fn test_merge_updates_managed_entity() {
        let db = open(Tessera::builder());
        let session = db.session().unwrap();
        session.persist(&User::new(1, "alice", None)).unwrap();
        session.merge(&User::new(1, "alicia", Some("new"))).unwrap();
        session.flush().unwrap();

        let user = db.client().find::<User>(1i64).unwrap().unwrap();
        assert_eq!(user.name, "alicia");
        assert_eq!(stored(&db, "users"), 1);
    }

    #[test]
    fn test_merge_reattaches_detached_entity() {
        let db = open(Tessera::builder());
        let session = db.session().unwrap();
        let user = User::new(1, "alice", None);
        session.persist(&user).unwrap();
        session.commit().unwrap();

        session.merge(&User::new(1, "al", None)).unwrap();
        assert_eq!(session.state_of(&user).unwrap(), Some(EntityState::Managed));
        session.commit().unwrap();
        assert_eq!(db.client().find::<User>(1i64).unwrap().unwrap().name, "al");
    }

    #[test]
    fn test_merge_untracked_is_ignored() {
        let db = open(Tessera::builder());
        let session = db.session().unwrap();
        let user = User::new(3, "ghost", None);
        session.merge(&user).unwrap();
        assert_eq!(session.state_of(&user).unwrap(), None);
    }

    #[test]
    fn test_find_tracks_loaded_entity() {
        let db = open(Tessera::builder());
        db.client().persist(&User::new(1, "alice", None)).unwrap();

        let session = db.session().unwrap();
        let user: User = session.find(1i64).unwrap().unwrap();
        assert!(session.contains(&user).unwrap());
        assert!(session.find::<User>(2i64).unwrap().is_none());

        session.merge(&User::new(1, "alicia", None)).unwrap();
        session.flush().unwrap();
        assert_eq!(stored(&db, "users"), 1);
    }

    #[test]
    fn test_refresh_discards_unwritten_changes() {
        let db = open(Tessera::builder().flush_mode(FlushMode::Commit));
        db.client().persist(&User::new(1, "alice", None)).unwrap();
        let session = db.session().unwrap();
        let user: User = session.find(1i64).unwrap().unwrap();

        db.client()
            .handle_update_functions("User", &all(), crate::doc! { name: "changed" });
        let refreshed = session.refresh(&user).unwrap().unwrap();
        assert_eq!(refreshed.name, "changed");

        let err = session.refresh(&User::new(5, "x", None)).unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::IllegalEntityState(EntityState::Transient, LifecycleVerb::Refresh)
        );
    }

    #[test]
    fn test_rollback_extended_forgets_entities() {
        let db = open(Tessera::builder());
        let session = db.session().unwrap();
        let user = User::new(1, "alice", None);
        session.persist(&user).unwrap();
        session.rollback().unwrap();

        assert_eq!(session.state_of(&user).unwrap(), None);
        assert_eq!(stored(&db, "users"), 0);
        session.persist(&user).unwrap();
        assert_eq!(session.state_of(&user).unwrap(), Some(EntityState::Managed));
    }

    #[test]
    fn test_rollback_transactional_detaches() {
        let db = open(
            Tessera::builder().persistence_context(PersistenceContextType::Transactional),
        );
        let session = db.session().unwrap();
        let user = User::new(1, "alice", None);
        session.persist(&user).unwrap();
        session.rollback().unwrap();

        assert_eq!(session.state_of(&user).unwrap(), Some(EntityState::Detached));
        assert_eq!(stored(&db, "users"), 0);
    }

    #[test]
    fn test_no_op_verbs_keep_state() {
        let db = open(Tessera::builder());
        let session = db.session().unwrap();
        let user = User::new(1, "alice", None);
        session.persist(&user).unwrap();

        session.detach(&user).unwrap();
        session.lock(&user).unwrap();
        assert_eq!(session.state_of(&user).unwrap(), Some(EntityState::Managed));
        let reference: User = session.get_reference(1i64).unwrap().unwrap();
        assert_eq!(reference, user);
    }

    #[test]
    fn test_clear_drops_tracking_and_staged_writes() {
        let db = open(Tessera::builder());
        let session = db.session().unwrap();
        let user = User::new(1, "alice", None);
        session.persist(&user).unwrap();
        session.clear().unwrap();

        assert_eq!(session.state_of(&user).unwrap(), None);
        session.flush().unwrap();
        assert_eq!(stored(&db, "users"), 0);
    }

    #[test]
    fn test_closed_session_rejects_verbs() {
        let db = open(Tessera::builder());
        let session = db.session().unwrap();
        session.persist(&User::new(1, "alice", None)).unwrap();
        session.close().unwrap();
        session.close().unwrap();

        assert!(!session.is_active());
        assert_eq!(stored(&db, "users"), 0);
        let err = session.persist(&User::new(2, "bob", None)).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
    }
}
