//! Live query state.
//!
//! A `Query` owns one subscription signature's cached result, its callbacks,
//! and the logic that applies a single document change to the result: match
//! through the filter, place through the sort/limit window, patch `$lookup`
//! data, or give up and ask for a refresh.

use crate::change_set::ChangeSet;
use crate::subscription::{ChangeCallback, SubscriptionId, SubscriptionManager};
use crate::window::{Admission, Window};
use tracing::{trace, warn};
use vigil_core::{
    ClassRef, DocChange, DocId, DocSource, Document, Error, Filter, FindOptions, FindResult, Hierarchy, LookupPatch,
    Matcher, Resolver,
};

/// Unique identifier for a query within an engine.
pub type QueryId = u64;

/// Structural identity of a query.
///
/// Filter conditions and option maps are ordered, so two keys built in
/// different orders compare and hash equal.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueryKey {
    pub class: ClassRef,
    pub filter: Filter,
    pub options: FindOptions,
}

impl QueryKey {
    pub fn new(class: impl Into<ClassRef>, filter: Filter, options: FindOptions) -> Self {
        Self {
            class: class.into(),
            filter,
            options,
        }
    }

    /// Returns the key with its projection dropped.
    pub fn without_projection(&self) -> QueryKey {
        QueryKey {
            class: self.class.clone(),
            filter: self.filter.clone(),
            options: self.options.without_projection(),
        }
    }

    /// Returns true if results are projected.
    #[inline]
    pub fn is_projected(&self) -> bool {
        self.options.projection.is_some()
    }

    /// Returns true if `key` survives the projection.
    pub fn is_visible(&self, key: &str) -> bool {
        match self.options.projection.as_ref() {
            None => true,
            Some(projection) => {
                projection.contains(key)
                    || key
                        .split('.')
                        .next()
                        .map(|head| projection.contains(head))
                        .unwrap_or(false)
            }
        }
    }

    fn project(&self, doc: Document) -> Document {
        match self.options.projection.as_ref() {
            Some(projection) => doc.project(projection),
            None => doc,
        }
    }
}

/// Outcome of applying one change to a query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TxOutcome {
    /// Nothing observable changed.
    Unchanged,
    /// The cached result was patched locally.
    Patched,
    /// The cached result can no longer be proven correct.
    NeedsRefresh,
}

/// Marks the document a creation introduces as having no collection members
/// yet, so reverse lookups on it resolve to empty instead of unknown.
struct FreshSource<'a> {
    inner: &'a dyn DocSource,
    fresh: &'a DocId,
}

impl DocSource for FreshSource<'_> {
    fn get(&self, id: &DocId) -> Option<Document> {
        self.inner.get(id)
    }

    fn attached(&self, class: &ClassRef, attribute: &str, owner: &DocId) -> Option<Vec<Document>> {
        if owner == self.fresh {
            Some(Vec::new())
        } else {
            self.inner.attached(class, attribute, owner)
        }
    }

    fn is_complete(&self) -> bool {
        self.inner.is_complete()
    }
}

/// One live query.
pub struct Query {
    id: QueryId,
    key: QueryKey,
    /// `None` until the first fetch lands.
    result: Option<Vec<Document>>,
    total: Option<usize>,
    subscriptions: SubscriptionManager,
    /// Changes applied locally but not yet delivered.
    pending: ChangeSet,
    /// The last refresh failed; the result may be out of date.
    stale: bool,
    last_error: Option<Error>,
    last_used: u64,
}

impl Query {
    pub fn new(id: QueryId, key: QueryKey) -> Self {
        Self {
            id,
            key,
            result: None,
            total: None,
            subscriptions: SubscriptionManager::new(),
            pending: ChangeSet::new(),
            stale: false,
            last_error: None,
            last_used: 0,
        }
    }

    #[inline]
    pub fn id(&self) -> QueryId {
        self.id
    }

    #[inline]
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Returns the cached result, if the first fetch has landed.
    #[inline]
    pub fn result(&self) -> Option<&[Document]> {
        self.result.as_deref()
    }

    #[inline]
    pub fn total(&self) -> Option<usize> {
        self.total
    }

    /// Returns true while at least one callback is attached.
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.subscriptions.is_empty()
    }

    #[inline]
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Returns the error of the last failed refresh.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    #[inline]
    pub fn last_used(&self) -> u64 {
        self.last_used
    }

    pub fn touch(&mut self, tick: u64) {
        self.last_used = tick;
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeSet) + Send + Sync + 'static,
    {
        self.subscriptions.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.unsubscribe(id)
    }

    pub fn callback(&self, id: SubscriptionId) -> Option<ChangeCallback> {
        self.subscriptions.callback(id)
    }

    pub fn callbacks(&self) -> Vec<ChangeCallback> {
        self.subscriptions.callbacks()
    }

    /// The current result as an initial change set, for a new subscriber.
    pub fn snapshot(&self) -> Option<ChangeSet> {
        self.result
            .as_ref()
            .map(|docs| ChangeSet::initial(docs.clone(), self.total))
    }

    /// Replaces the result with a store response.
    pub fn replace_result(&mut self, found: FindResult) -> ChangeSet {
        let changes = match self.result.as_deref() {
            Some(before) => ChangeSet::diff(before, found.docs.clone(), found.total),
            None => ChangeSet::initial(found.docs.clone(), found.total),
        };
        self.result = Some(found.docs);
        self.total = found.total;
        self.pending.clear();
        self.stale = false;
        self.last_error = None;
        changes
    }

    /// Empties the result, signalling that fresh results are pending.
    pub fn clear_result(&mut self) -> ChangeSet {
        let total = if self.key.options.total { Some(0) } else { None };
        let before = self.result.take().unwrap_or_default();
        self.result = Some(Vec::new());
        self.total = total;
        self.pending.clear();
        ChangeSet::diff(&before, Vec::new(), total)
    }

    /// Records a failed refresh. The result is kept.
    pub fn fail(&mut self, error: Error) {
        self.stale = true;
        self.last_error = Some(error);
    }

    /// Takes the locally applied changes for delivery.
    pub fn take_pending(&mut self) -> ChangeSet {
        let mut changes = std::mem::take(&mut self.pending);
        changes.result = self.result.clone().unwrap_or_default();
        changes.total = self.total;
        changes
    }

    /// Drops locally applied changes a refresh will supersede.
    pub fn discard_pending(&mut self) {
        self.pending.clear();
    }

    /// Applies one document change.
    ///
    /// `source` answers lookups from documents cached elsewhere in the engine.
    pub fn apply(&mut self, hierarchy: &Hierarchy, source: &dyn DocSource, change: &DocChange<'_>) -> TxOutcome {
        let compatible = hierarchy.is_compatible(change.class(), &self.key.class);
        let Some(mut docs) = self.result.take() else {
            // The first fetch may predate this change
            return if compatible || self.key.options.lookup().is_some() {
                TxOutcome::NeedsRefresh
            } else {
                TxOutcome::Unchanged
            };
        };

        let mut patcher = Patcher {
            id: self.id,
            key: &self.key,
            hierarchy,
            source,
            pending: &mut self.pending,
            total: &mut self.total,
        };
        let mut outcome = patcher.patch_lookups(change, &mut docs);
        if outcome != TxOutcome::NeedsRefresh && compatible {
            outcome = outcome.max(patcher.apply_direct(change, &mut docs));
        }
        self.result = Some(docs);

        trace!(query = self.id, doc = %change.id(), ?outcome, "applied change");
        outcome
    }
}

/// Applies one change to a detached result, recording what it did.
struct Patcher<'q> {
    id: QueryId,
    key: &'q QueryKey,
    hierarchy: &'q Hierarchy,
    source: &'q dyn DocSource,
    pending: &'q mut ChangeSet,
    total: &'q mut Option<usize>,
}

impl<'q> Patcher<'q> {
    fn window(&self) -> Window<'q> {
        let key = self.key;
        Window::new(self.hierarchy, &key.class, &key.options.sort, key.options.limit)
    }

    fn matches(&self, doc: &Document) -> bool {
        Matcher::new(self.hierarchy).matches(doc, &self.key.class, &self.key.filter)
    }

    fn patch_lookups(&mut self, change: &DocChange<'_>, docs: &mut [Document]) -> TxOutcome {
        let Some(spec) = self.key.options.lookup() else {
            return TxOutcome::Unchanged;
        };
        let resolver = Resolver::new(self.hierarchy, self.source);
        let mut outcome = TxOutcome::Unchanged;
        for doc in docs.iter_mut().filter(|d| d.id != *change.id()) {
            match resolver.patch(doc, spec, change) {
                LookupPatch::Unchanged => {}
                LookupPatch::Patched => {
                    self.pending.modify(doc.id.clone());
                    outcome = TxOutcome::Patched;
                }
                LookupPatch::NeedsRefresh => return TxOutcome::NeedsRefresh,
            }
        }
        outcome
    }

    fn apply_direct(&mut self, change: &DocChange<'_>, docs: &mut Vec<Document>) -> TxOutcome {
        if self.key.filter.has_search() {
            // Relevance cannot be replayed locally
            return TxOutcome::NeedsRefresh;
        }
        let window = self.window();
        let position = window.position_of(docs, change.id());

        match (change, position) {
            (DocChange::Created(created), None) => {
                let fresh = FreshSource {
                    inner: self.source,
                    fresh: &created.id,
                };
                self.admit(&fresh, docs, created.without_lookup(), true)
            }
            (DocChange::Created(created), Some(pos)) => {
                if self.matches(created) {
                    let mut doc = created.without_lookup();
                    doc.lookup = docs[pos].lookup.clone();
                    let doc = self.key.project(doc);
                    self.place(docs, pos, doc)
                } else {
                    self.evict(docs, pos)
                }
            }
            (DocChange::Removed { .. }, Some(pos)) => self.evict(docs, pos),
            (DocChange::Removed { .. }, None) => {
                if self.key.options.total && window.is_full(docs.len()) {
                    // May have been a match beyond the window
                    TxOutcome::NeedsRefresh
                } else {
                    TxOutcome::Unchanged
                }
            }
            (_, Some(pos)) => self.update_cached(change, docs, pos),
            (_, None) => self.update_uncached(change, docs),
        }
    }

    /// Admits a document that was not in the result.
    fn admit(&mut self, source: &dyn DocSource, docs: &mut Vec<Document>, mut doc: Document, counted: bool) -> TxOutcome {
        if !self.matches(&doc) {
            return TxOutcome::Unchanged;
        }
        if let Some(spec) = self.key.options.lookup() {
            if !Resolver::new(self.hierarchy, source).resolve(&mut doc, spec) {
                return TxOutcome::NeedsRefresh;
            }
        }
        let doc = self.key.project(doc);
        let id = doc.id.clone();
        let total_changed = counted && self.bump_total(1);

        match self.window().admit(docs, doc) {
            Admission::NeedsRefresh => TxOutcome::NeedsRefresh,
            Admission::Unchanged if total_changed => TxOutcome::Patched,
            Admission::Unchanged => TxOutcome::Unchanged,
            _ => {
                self.pending.add(id);
                TxOutcome::Patched
            }
        }
    }

    fn evict(&mut self, docs: &mut Vec<Document>, pos: usize) -> TxOutcome {
        let id = docs[pos].id.clone();
        self.bump_total(-1);
        match self.window().evict(docs, pos) {
            Admission::NeedsRefresh => TxOutcome::NeedsRefresh,
            _ => {
                self.pending.remove(id);
                TxOutcome::Patched
            }
        }
    }

    fn place(&mut self, docs: &mut Vec<Document>, pos: usize, doc: Document) -> TxOutcome {
        let id = doc.id.clone();
        match self.window().reposition(docs, pos, doc) {
            Admission::NeedsRefresh => TxOutcome::NeedsRefresh,
            _ => {
                self.pending.modify(id);
                TxOutcome::Patched
            }
        }
    }

    fn update_cached(&mut self, change: &DocChange<'_>, docs: &mut Vec<Document>, pos: usize) -> TxOutcome {
        let key = self.key;
        let filter_touched = key.filter.attributes().any(|a| change.touches(a)) || self.changes_membership(change);
        let sort_touched = key.options.sort.keys().iter().any(|(k, _)| change.touches(k));

        if key.is_projected() && (filter_touched || (sort_touched && !sort_visible(key))) {
            // The projected copy cannot be re-matched
            return TxOutcome::NeedsRefresh;
        }

        let mut doc = docs[pos].clone();
        match change.apply(&mut doc) {
            Ok(false) => return TxOutcome::Unchanged,
            Ok(true) => {}
            Err(err) => {
                warn!(query = self.id, doc = %change.id(), error = %err, "malformed transaction");
                return TxOutcome::NeedsRefresh;
            }
        }

        if let Some(spec) = key.options.lookup() {
            let forward_touched = spec.forward_entries().any(|(attr, _)| change.touches(attr));
            if forward_touched && !Resolver::new(self.hierarchy, self.source).resolve_forward(&mut doc, spec) {
                return TxOutcome::NeedsRefresh;
            }
        }

        if !filter_touched || self.matches(&doc) {
            let doc = key.project(doc);
            self.place(docs, pos, doc)
        } else {
            self.evict(docs, pos)
        }
    }

    fn update_uncached(&mut self, change: &DocChange<'_>, docs: &mut Vec<Document>) -> TxOutcome {
        let key = self.key;

        if let Some(found) = self.source.get(change.id()) {
            let mut doc = found.without_lookup();
            if let Err(err) = change.apply(&mut doc) {
                warn!(query = self.id, doc = %change.id(), error = %err, "malformed transaction");
                return TxOutcome::NeedsRefresh;
            }
            let matches = self.matches(&doc);
            let full = self.window().is_full(docs.len());
            return match (matches, full) {
                (false, false) => TxOutcome::Unchanged,
                (_, true) if key.options.total => TxOutcome::NeedsRefresh,
                (false, true) => TxOutcome::Unchanged,
                (true, _) => {
                    let source = self.source;
                    self.admit(source, docs, doc, !full)
                }
            };
        }

        let referenced = key.filter.attributes().any(|a| change.touches(a))
            || key.options.sort.keys().iter().any(|(k, _)| change.touches(k));
        if self.changes_membership(change) || referenced {
            TxOutcome::NeedsRefresh
        } else {
            TxOutcome::Unchanged
        }
    }

    /// A mixin of the query class can move a document in or out of it.
    fn changes_membership(&self, change: &DocChange<'_>) -> bool {
        matches!(change, DocChange::Mixin { mixin, .. } if self.hierarchy.is_derived(mixin, &self.key.class))
    }

    fn bump_total(&mut self, delta: i64) -> bool {
        if !self.key.options.total {
            return false;
        }
        match self.total.as_mut() {
            Some(total) => {
                *total = (*total as i64 + delta).max(0) as usize;
                true
            }
            None => false,
        }
    }
}

fn sort_visible(key: &QueryKey) -> bool {
    key.options.sort.keys().iter().all(|(k, _)| key.is_visible(k))
}
