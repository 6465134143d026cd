//! Live query engine.
//!
//! `LiveQuery` holds every live query keyed by its structural signature, fans
//! transaction batches and workspace events out to them, runs backend
//! refreshes on the Tokio runtime and delivers change sets to subscribers.
//!
//! Two locks guard the engine. The delivery lock is taken first and held
//! while callbacks run, so every subscriber observes one total order of
//! changes. The state lock is taken second and released before any callback
//! is invoked, so callbacks may call back into the engine.

use crate::change_set::ChangeSet;
use crate::config::LiveQueryConfig;
use crate::query::{Query, QueryId, QueryKey, TxOutcome};
use crate::queue::Queue;
use crate::subscription::{ChangeCallback, SubscriptionId};
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use hashbrown::HashMap;
use parking_lot::{Mutex, ReentrantMutex};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, trace, warn};
use vigil_core::{
    ClassRef, DocChange, DocId, DocSource, Document, DocumentStore, Error, Filter, FindOptions, FindResult, Hierarchy,
    LookupValue, Matcher, Result, SpaceClause, Tx, WorkspaceEvent,
};

/// Completion of a refresh, awaitable by any number of callers.
type RefreshFuture = Shared<BoxFuture<'static, ()>>;

/// Callbacks paired with the change set they should receive.
type Delivery = Vec<(Vec<ChangeCallback>, ChangeSet)>;

#[derive(Default)]
struct RefreshState {
    in_flight: Option<RefreshFuture>,
    abort: Option<AbortHandle>,
    /// Set when the in-flight fetch may predate a change; the response is
    /// then discarded and the fetch repeated.
    dirty: bool,
}

struct Entry {
    query: Query,
    refresh: RefreshState,
}

struct State {
    queries: HashMap<QueryId, Entry>,
    by_key: HashMap<QueryKey, QueryId>,
    queue: Queue,
    next_id: QueryId,
    clock: u64,
}

impl State {
    fn new(config: &LiveQueryConfig) -> Self {
        Self {
            queries: HashMap::new(),
            by_key: HashMap::new(),
            queue: Queue::new(config.queue_capacity),
            next_id: 1,
            clock: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn insert(&mut self, key: QueryKey, tick: u64) -> QueryId {
        let id = self.next_id;
        self.next_id += 1;
        let mut query = Query::new(id, key.clone());
        query.touch(tick);
        self.queries.insert(
            id,
            Entry {
                query,
                refresh: RefreshState::default(),
            },
        );
        self.by_key.insert(key, id);
        id
    }

    fn remove(&mut self, id: QueryId) -> Option<Entry> {
        let entry = self.queries.remove(&id)?;
        self.by_key.remove(entry.query.key());
        self.queue.remove(id);
        if let Some(abort) = entry.refresh.abort.as_ref() {
            abort.abort();
        }
        Some(entry)
    }

    /// Queues a query that lost its last callback.
    fn enqueue(&mut self, id: QueryId) {
        for evicted in self.queue.push(id) {
            debug!(query = evicted, "evicted queued query");
            self.remove(evicted);
        }
    }

    /// Finds a query whose result can answer `key`: same signature, with
    /// either the same projection or none.
    fn reusable(&self, key: &QueryKey) -> Option<QueryId> {
        if let Some(id) = self.by_key.get(key) {
            return Some(*id);
        }
        let unprojected = key.without_projection();
        self.by_key.get(&unprojected).copied()
    }

    fn apply_change(&mut self, hierarchy: &Hierarchy, change: &DocChange<'_>, outcomes: &mut BTreeMap<QueryId, TxOutcome>) {
        trace!(doc = %change.id(), class = %change.class(), "applying transaction");
        // Queries earlier in the loop already hold the changed document
        let before = EngineSource::new(&self.queries).get(change.id());
        let ids: Vec<QueryId> = self.queries.keys().copied().collect();
        for id in ids {
            let Some(mut entry) = self.queries.remove(&id) else {
                continue;
            };
            let outcome = {
                let source = EngineSource {
                    queries: &self.queries,
                    pinned: Some((change.id(), before.as_ref())),
                };
                entry.query.apply(hierarchy, &source, change)
            };
            self.queries.insert(id, entry);

            if outcome != TxOutcome::Unchanged {
                let slot = outcomes.entry(id).or_insert(TxOutcome::Unchanged);
                *slot = (*slot).max(outcome);
            }
        }
    }

    fn route_event(&self, hierarchy: &Hierarchy, event: &WorkspaceEvent) -> Vec<QueryId> {
        self.queries
            .values()
            .filter(|entry| is_affected(hierarchy, entry.query.key(), event))
            .map(|entry| entry.query.id())
            .collect()
    }

    fn pending_refreshes(&mut self) -> Vec<RefreshFuture> {
        let mut pending = Vec::new();
        for entry in self.queries.values_mut() {
            let Some(in_flight) = entry.refresh.in_flight.as_ref() else {
                continue;
            };
            if in_flight.peek().is_some() {
                // The task ended without landing (cancelled or panicked)
                entry.refresh = RefreshState::default();
            } else {
                pending.push(in_flight.clone());
            }
        }
        pending
    }
}

fn is_affected(hierarchy: &Hierarchy, key: &QueryKey, event: &WorkspaceEvent) -> bool {
    match event {
        WorkspaceEvent::IndexingUpdate { classes } => {
            key.filter.has_search() && classes.iter().any(|c| hierarchy.is_derived(&key.class, c))
        }
        WorkspaceEvent::BulkUpdate { classes } => classes.iter().any(|c| hierarchy.is_compatible(c, &key.class)),
        WorkspaceEvent::SecurityChange { space } => match key.filter.space_clause() {
            SpaceClause::Literal(literal) => literal == *space,
            SpaceClause::NonLiteral | SpaceClause::Absent => true,
        },
    }
}

/// Answers lookups from the documents already cached by the engine.
///
/// A miss proves nothing, so the source reports itself incomplete.
struct EngineSource<'a> {
    queries: &'a HashMap<QueryId, Entry>,
    /// A document answered from a snapshot instead of the live results.
    pinned: Option<(&'a DocId, Option<&'a Document>)>,
}

impl<'a> EngineSource<'a> {
    fn new(queries: &'a HashMap<QueryId, Entry>) -> Self {
        Self { queries, pinned: None }
    }

    fn candidates(&self) -> impl Iterator<Item = &'a Document> + 'a {
        let queries: &'a HashMap<QueryId, Entry> = self.queries;
        queries
            .values()
            .filter(|entry| !entry.query.key().is_projected())
            .filter_map(|entry| entry.query.result())
            .flat_map(|docs| docs.iter().flat_map(|doc| std::iter::once(doc).chain(lookup_docs(doc))))
    }
}

fn lookup_docs(doc: &Document) -> impl Iterator<Item = &Document> {
    doc.lookup.values().flat_map(|value| match value {
        LookupValue::One(found) => std::slice::from_ref(found.as_ref()).iter(),
        LookupValue::Many(members) => members.iter(),
    })
}

impl DocSource for EngineSource<'_> {
    fn get(&self, id: &DocId) -> Option<Document> {
        if let Some((pinned, doc)) = self.pinned {
            if pinned == id {
                return doc.cloned();
            }
        }
        self.candidates()
            .filter(|doc| doc.id == *id)
            .max_by_key(|doc| doc.modified_on)
            .map(Document::without_lookup)
    }

    fn attached(&self, _class: &ClassRef, _attribute: &str, _owner: &DocId) -> Option<Vec<Document>> {
        None
    }

    fn is_complete(&self) -> bool {
        false
    }
}

fn deliver(deliveries: Delivery) {
    for (callbacks, changes) in deliveries {
        for callback in callbacks {
            callback(&changes);
        }
    }
}

fn project(doc: &Document, key: &QueryKey) -> Document {
    match key.options.projection.as_ref() {
        Some(projection) => doc.project(projection),
        None => doc.clone(),
    }
}

struct Inner<S> {
    store: Arc<S>,
    hierarchy: Arc<Hierarchy>,
    config: LiveQueryConfig,
    delivery: ReentrantMutex<()>,
    state: Mutex<State>,
    closed: AtomicBool,
}

/// The live query engine.
///
/// Cloning is cheap; clones share the same queries.
pub struct LiveQuery<S: DocumentStore> {
    inner: Arc<Inner<S>>,
}

impl<S: DocumentStore> Clone for LiveQuery<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: DocumentStore> LiveQuery<S> {
    /// Creates an engine over `store` with default configuration.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, LiveQueryConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: LiveQueryConfig) -> Self {
        let hierarchy = store.hierarchy();
        let state = State::new(&config);
        Self {
            inner: Arc::new(Inner {
                store,
                hierarchy,
                config,
                delivery: ReentrantMutex::new(()),
                state: Mutex::new(state),
                closed: AtomicBool::new(false),
            }),
        }
    }

    #[inline]
    pub fn store(&self) -> &Arc<S> {
        &self.inner.store
    }

    /// Returns the document hierarchy the engine matches against.
    #[inline]
    pub fn hierarchy(&self) -> &Arc<Hierarchy> {
        &self.inner.hierarchy
    }

    #[inline]
    pub fn config(&self) -> &LiveQueryConfig {
        &self.inner.config
    }

    /// Returns true once `close` has been called.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Number of queries with at least one callback.
    pub fn active_count(&self) -> usize {
        let state = self.inner.state.lock();
        state.queries.values().filter(|entry| entry.query.is_active()).count()
    }

    /// Number of queued queries.
    pub fn queued_count(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    /// Subscribes `callback` to the live result of a query.
    ///
    /// A structurally identical query is shared rather than fetched again.
    /// When it already holds a result, that result is delivered before this
    /// call returns; otherwise the first callback fires when the initial fetch
    /// lands.
    pub fn query<F>(&self, class: impl Into<ClassRef>, filter: Filter, options: FindOptions, callback: F) -> Result<QueryHandle<S>>
    where
        F: Fn(&ChangeSet) + Send + Sync + 'static,
    {
        self.ensure_open()?;
        let class = class.into();
        self.inner.hierarchy.require(&class)?;
        let key = QueryKey::new(class, filter, options.with_required_projection());

        let _delivery = self.inner.delivery.lock();
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        let tick = state.tick();

        let existing = state.by_key.get(&key).copied().filter(|id| state.queries.contains_key(id));
        let (id, subscription, initial) = match existing {
            Some(id) => {
                state.queue.remove(id);
                let Some(entry) = state.queries.get_mut(&id) else {
                    return Err(Error::invalid_operation("query vanished while subscribing"));
                };
                entry.query.touch(tick);
                let subscription = entry.query.subscribe(callback);
                let initial = entry
                    .query
                    .snapshot()
                    .and_then(|changes| entry.query.callback(subscription).map(|cb| (vec![cb], changes)));
                let stale = entry.query.is_stale() && entry.refresh.in_flight.is_none();
                debug!(query = id, subscription, "reusing live query");

                if stale && self.inner.config.refresh_stale_on_reactivate {
                    self.schedule_refresh(state, id);
                }
                (id, subscription, initial)
            }
            None => {
                let id = state.insert(key, tick);
                let subscription = match state.queries.get_mut(&id) {
                    Some(entry) => {
                        debug!(query = id, class = %entry.query.key().class, "created live query");
                        entry.query.subscribe(callback)
                    }
                    None => return Err(Error::invalid_operation("query vanished while subscribing")),
                };
                self.schedule_refresh(state, id);
                (id, subscription, None)
            }
        };

        drop(guard);
        if let Some(initial) = initial {
            deliver(vec![initial]);
        }

        Ok(QueryHandle {
            engine: self.clone(),
            query: id,
            subscription,
            subscribed: AtomicBool::new(true),
        })
    }

    fn remove_callback(&self, id: QueryId, subscription: SubscriptionId) {
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        let Some(entry) = state.queries.get_mut(&id) else {
            return;
        };
        entry.query.unsubscribe(subscription);
        if entry.query.is_active() {
            return;
        }
        debug!(query = id, "queued live query");
        state.enqueue(id);
    }

    /// Finds all matching documents once.
    ///
    /// A cached query with the same signature answers directly when it is
    /// settled; otherwise the store is asked.
    pub async fn find_all(&self, class: impl Into<ClassRef>, filter: Filter, options: FindOptions) -> Result<FindResult> {
        self.ensure_open()?;
        let class = class.into();
        self.inner.hierarchy.require(&class)?;
        let key = QueryKey::new(class, filter, options.with_required_projection());

        {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            if let Some(id) = state.by_key.get(&key).copied() {
                let tick = state.tick();
                if let Some(entry) = state.queries.get_mut(&id) {
                    let settled = entry.refresh.in_flight.is_none() && !entry.query.is_stale();
                    if let (true, Some(docs)) = (settled, entry.query.result()) {
                        let found = FindResult::new(docs.to_vec(), entry.query.total());
                        entry.query.touch(tick);
                        state.queue.touch(id);
                        trace!(query = id, "find_all answered from cache");
                        return Ok(found);
                    }
                }
            }
        }

        self.inner.store.find_all(&key.class, &key.filter, &key.options).await
    }

    /// Finds the first matching document.
    ///
    /// The limit is forced to one and any projection gains the header
    /// fields. The returned document is a copy of the cached state.
    pub async fn find_one(&self, class: impl Into<ClassRef>, filter: Filter, options: FindOptions) -> Result<Option<Document>> {
        self.ensure_open()?;
        let class = class.into();
        self.inner.hierarchy.require(&class)?;
        let key = QueryKey::new(class, filter, options.with_limit(1).with_required_projection());

        let (id, wait) = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let tick = state.tick();

            match state.reusable(&key) {
                Some(id) => {
                    let Some(entry) = state.queries.get_mut(&id) else {
                        return Err(Error::invalid_operation("query vanished while reading"));
                    };
                    entry.query.touch(tick);
                    let in_flight = entry.refresh.in_flight.clone();
                    let unsettled = entry.query.result().is_none() || entry.query.is_stale();
                    state.queue.touch(id);
                    trace!(query = id, "find_one reusing cached query");

                    let wait = match in_flight {
                        Some(in_flight) => Some(in_flight),
                        None if unsettled => self.schedule_refresh(state, id),
                        None => None,
                    };
                    (Some(id), wait)
                }
                None => {
                    if let Some(doc) = self.cached_reference(state, &key) {
                        trace!(doc = %doc.id, "find_one answered from reference cache");
                        return Ok(Some(doc));
                    }
                    let id = state.insert(key.clone(), tick);
                    debug!(query = id, class = %key.class, "created queued query");
                    state.enqueue(id);
                    if state.queries.contains_key(&id) {
                        (Some(id), self.schedule_refresh(state, id))
                    } else {
                        (None, None)
                    }
                }
            }
        };

        if let Some(wait) = wait {
            wait.await;
        }
        self.ensure_open()?;

        if let Some(id) = id {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            if let Some(entry) = state.queries.get(&id) {
                if let Some(docs) = entry.query.result() {
                    return Ok(docs.first().map(|doc| project(doc, &key)));
                }
                if let Some(err) = entry.query.last_error().cloned() {
                    state.remove(id);
                    return Err(err);
                }
            }
        }

        self.inner.store.find_one(&key.class, &key.filter, &key.options).await
    }

    fn cached_reference(&self, state: &State, key: &QueryKey) -> Option<Document> {
        let id = key.filter.id_literal()?;
        if key.options.lookup().is_some() {
            return None;
        }
        let doc = EngineSource::new(&state.queries).get(&id)?;
        let matcher = Matcher::new(&self.inner.hierarchy);
        if !matcher.matches(&doc, &key.class, &key.filter) {
            return None;
        }
        Some(project(&doc, key))
    }

    /// Full-text search, passed through to the store.
    pub async fn search_fulltext(&self, text: &str, limit: Option<usize>) -> Result<FindResult> {
        self.ensure_open()?;
        self.inner.store.search_fulltext(text, limit).await
    }

    /// Applies a batch of transactions and waits for the refreshes it caused.
    ///
    /// Every affected query is notified once, after the whole batch.
    pub async fn tx(&self, txes: &[Tx]) {
        let waits = self.apply_batch(txes);
        join_all(waits).await;
    }

    /// Refreshes the queries a workspace event may have invalidated.
    pub async fn handle_workspace_event(&self, event: WorkspaceEvent) {
        let waits = self.apply_batch(&[Tx::Workspace(event)]);
        join_all(waits).await;
    }

    /// Applies a batch synchronously and returns the refreshes it scheduled.
    fn apply_batch(&self, txes: &[Tx]) -> Vec<RefreshFuture> {
        if self.is_closed() || txes.is_empty() {
            return Vec::new();
        }
        let _delivery = self.inner.delivery.lock();
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        let hierarchy = &*self.inner.hierarchy;

        let mut outcomes = BTreeMap::new();
        for tx in txes {
            match tx {
                Tx::Workspace(event) => {
                    let affected = state.route_event(hierarchy, event);
                    debug!(?event, queries = affected.len(), "workspace event");
                    for id in affected {
                        outcomes.insert(id, TxOutcome::NeedsRefresh);
                    }
                }
                _ => {
                    if let Some(change) = DocChange::from_tx(tx) {
                        state.apply_change(hierarchy, &change, &mut outcomes);
                    }
                }
            }
        }

        let mut deliveries = Delivery::new();
        let mut waits = Vec::new();
        for (id, outcome) in outcomes {
            match outcome {
                TxOutcome::NeedsRefresh => {
                    if let Some(entry) = state.queries.get_mut(&id) {
                        entry.query.discard_pending();
                    }
                    waits.extend(self.schedule_refresh(state, id));
                }
                TxOutcome::Patched => {
                    let Some(entry) = state.queries.get_mut(&id) else {
                        continue;
                    };
                    if let Some(in_flight) = entry.refresh.in_flight.as_ref() {
                        entry.refresh.dirty = true;
                        waits.push(in_flight.clone());
                    }
                    let changes = entry.query.take_pending();
                    deliveries.push((entry.query.callbacks(), changes));
                }
                TxOutcome::Unchanged => {}
            }
        }

        drop(guard);
        deliver(deliveries);
        waits
    }

    /// Consumes transaction batches from `rx` on a background task, in order.
    ///
    /// The task ends when the channel closes or the engine is closed.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn listen(&self, mut rx: UnboundedReceiver<Vec<Tx>>) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            while let Some(batch) = rx.recv().await {
                if engine.is_closed() {
                    break;
                }
                engine.apply_batch(&batch);
            }
            debug!("transaction stream ended");
        })
    }

    /// Re-synchronizes after a transport reconnect.
    ///
    /// Queries without callbacks are dropped. The others refresh; with
    /// `clean` they first deliver an empty result.
    pub async fn refresh_connect(&self, clean: bool) {
        let waits = self.reconnect(clean);
        join_all(waits).await;
    }

    fn reconnect(&self, clean: bool) -> Vec<RefreshFuture> {
        if self.is_closed() {
            return Vec::new();
        }
        let _delivery = self.inner.delivery.lock();
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;

        let mut idle = Vec::new();
        let mut live = Vec::new();
        for (id, entry) in state.queries.iter() {
            if entry.query.is_active() {
                live.push(*id);
            } else {
                idle.push(*id);
            }
        }
        live.sort_unstable();
        for id in &idle {
            state.remove(*id);
        }
        info!(clean, refreshed = live.len(), dropped = idle.len(), "reconnected");

        let mut deliveries = Delivery::new();
        let mut waits = Vec::new();
        for id in live {
            if clean {
                if let Some(entry) = state.queries.get_mut(&id) {
                    let changes = entry.query.clear_result();
                    deliveries.push((entry.query.callbacks(), changes));
                }
            }
            waits.extend(self.schedule_refresh(state, id));
        }

        drop(guard);
        deliver(deliveries);
        waits
    }

    /// Waits until no refresh is in flight.
    pub async fn flush(&self) {
        loop {
            let pending = self.inner.state.lock().pending_refreshes();
            if pending.is_empty() {
                return;
            }
            join_all(pending).await;
        }
    }

    /// Releases every query and cancels pending refreshes.
    ///
    /// Later calls are no-ops; responses that arrive afterwards are dropped.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _delivery = self.inner.delivery.lock();
        let mut state = self.inner.state.lock();
        let count = state.queries.len();
        for entry in state.queries.values() {
            if let Some(abort) = entry.refresh.abort.as_ref() {
                abort.abort();
            }
        }
        state.queries.clear();
        state.by_key.clear();
        state.queue.clear();
        info!(queries = count, "live query engine closed");
    }

    /// Starts a refresh of `id`, or folds the request into the one in flight.
    fn schedule_refresh(&self, state: &mut State, id: QueryId) -> Option<RefreshFuture> {
        let entry = state.queries.get_mut(&id)?;
        if let Some(in_flight) = entry.refresh.in_flight.as_ref() {
            entry.refresh.dirty = true;
            debug!(query = id, "coalesced refresh");
            return Some(in_flight.clone());
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(err) => {
                warn!(query = id, error = %err, "no runtime to refresh on");
                entry.query.fail(Error::invalid_operation("refresh requires a Tokio runtime"));
                return None;
            }
        };

        let engine = self.clone();
        let handle = runtime.spawn(async move { engine.run_refresh(id).await });
        let abort = handle.abort_handle();
        let in_flight = handle.map(|_| ()).boxed().shared();
        entry.refresh = RefreshState {
            in_flight: Some(in_flight.clone()),
            abort: Some(abort),
            dirty: false,
        };
        debug!(query = id, "scheduled refresh");
        Some(in_flight)
    }

    async fn run_refresh(self, id: QueryId) {
        loop {
            let key = {
                let mut state = self.inner.state.lock();
                match state.queries.get_mut(&id) {
                    Some(entry) => {
                        entry.refresh.dirty = false;
                        entry.query.key().clone()
                    }
                    None => return,
                }
            };

            let found = self.inner.store.find_all(&key.class, &key.filter, &key.options).await;
            if self.is_closed() {
                return;
            }
            if self.land_refresh(id, found) {
                return;
            }
        }
    }

    /// Installs a refresh response. Returns false when the response was
    /// superseded and the fetch must be repeated.
    fn land_refresh(&self, id: QueryId, found: Result<FindResult>) -> bool {
        let _delivery = self.inner.delivery.lock();
        let mut state = self.inner.state.lock();
        let Some(entry) = state.queries.get_mut(&id) else {
            return true;
        };
        if entry.refresh.dirty {
            debug!(query = id, "discarding superseded refresh");
            return false;
        }
        entry.refresh = RefreshState::default();

        match found {
            Ok(found) => {
                let changes = entry.query.replace_result(found);
                let callbacks = entry.query.callbacks();
                debug!(query = id, docs = changes.result.len(), "refresh landed");
                drop(state);
                deliver(vec![(callbacks, changes)]);
            }
            Err(err) => {
                warn!(query = id, error = %err, "refresh failed; keeping cached result");
                entry.query.fail(err);
            }
        }
        true
    }
}

/// A subscription to a live query.
///
/// Dropping the handle keeps the subscription; call `unsubscribe` to detach
/// the callback.
pub struct QueryHandle<S: DocumentStore> {
    engine: LiveQuery<S>,
    query: QueryId,
    subscription: SubscriptionId,
    subscribed: AtomicBool,
}

impl<S: DocumentStore> QueryHandle<S> {
    #[inline]
    pub fn query_id(&self) -> QueryId {
        self.query
    }

    #[inline]
    pub fn subscription_id(&self) -> SubscriptionId {
        self.subscription
    }

    #[inline]
    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::SeqCst)
    }

    /// Detaches the callback. A query left without callbacks is queued.
    /// Calling this more than once has no further effect.
    pub fn unsubscribe(&self) {
        if self.subscribed.swap(false, Ordering::SeqCst) {
            self.engine.remove_callback(self.query, self.subscription);
        }
    }
}
