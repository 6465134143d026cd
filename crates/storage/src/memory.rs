//! In-memory document store.
//!
//! `MemoryStore` holds documents in a `BTreeMap`, executes finds through the
//! executor, applies committed transactions and pushes every committed batch to
//! its subscribers in commit order.

use crate::executor::{execute, search_matches, Snapshot};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use vigil_core::{
    ClassRef, DocChange, DocId, Document, DocumentStore, Error, Filter, FindOptions, FindResult, Hierarchy, Result, Tx,
};

/// Failure and latency injection, plus call accounting.
#[derive(Default)]
struct Instrumentation {
    find_all_calls: AtomicUsize,
    fail_next: AtomicUsize,
    latency: Mutex<Option<Duration>>,
}

/// An in-memory backing store.
pub struct MemoryStore {
    hierarchy: Arc<Hierarchy>,
    docs: RwLock<BTreeMap<DocId, Document>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Vec<Tx>>>>,
    instrumentation: Instrumentation,
}

impl MemoryStore {
    /// Creates an empty store over `hierarchy`.
    pub fn new(hierarchy: Hierarchy) -> Self {
        Self {
            hierarchy: Arc::new(hierarchy),
            docs: RwLock::new(BTreeMap::new()),
            subscribers: Mutex::new(Vec::new()),
            instrumentation: Instrumentation::default(),
        }
    }

    /// Inserts a document without notifying subscribers.
    pub fn insert(&self, doc: Document) {
        self.docs.write().insert(doc.id.clone(), doc);
    }

    /// Returns a copy of a stored document.
    pub fn get(&self, id: &DocId) -> Option<Document> {
        self.docs.read().get(id).cloned()
    }

    /// Returns the number of stored documents.
    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    /// Returns true if the store holds no documents.
    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    /// Applies one transaction to the stored documents.
    pub fn apply(&self, tx: &Tx) -> Result<()> {
        let Some(change) = DocChange::from_tx(tx) else {
            return Ok(());
        };
        let mut docs = self.docs.write();
        match change {
            DocChange::Created(doc) => {
                docs.insert(doc.id.clone(), doc.without_lookup());
            }
            DocChange::Removed { id, .. } => {
                docs.remove(id);
            }
            DocChange::Updated { id, .. } | DocChange::Mixin { id, .. } => {
                let current = docs
                    .get(id)
                    .ok_or_else(|| Error::invalid_operation(format!("document not found: {}", id)))?;
                let mut next = current.clone();
                change.apply(&mut next)?;
                docs.insert(id.clone(), next);
            }
        }
        trace!(doc = ?tx.object_id(), "applied transaction");
        Ok(())
    }

    /// Applies a batch and pushes it to subscribers.
    ///
    /// The batch is applied in order; the first failing transaction aborts the
    /// remainder and nothing is pushed.
    pub fn commit(&self, txs: Vec<Tx>) -> Result<Vec<Tx>> {
        for tx in &txs {
            self.apply(tx)?;
        }
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|s| s.send(txs.clone()).is_ok());
        debug!(count = txs.len(), subscribers = subscribers.len(), "committed batch");
        Ok(txs)
    }

    /// Returns a channel receiving every committed batch.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Vec<Tx>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Number of `find_all` calls served so far, including failed ones.
    pub fn find_all_calls(&self) -> usize {
        self.instrumentation.find_all_calls.load(Ordering::SeqCst)
    }

    /// Makes the next `count` finds fail with a backend error.
    pub fn fail_next(&self, count: usize) {
        self.instrumentation.fail_next.store(count, Ordering::SeqCst);
    }

    /// Delays every find response. The snapshot is taken before the delay.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.instrumentation.latency.lock() = latency;
    }

    fn take_failure(&self) -> bool {
        self.instrumentation
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    async fn delay(&self) {
        let latency = *self.instrumentation.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn hierarchy(&self) -> Arc<Hierarchy> {
        self.hierarchy.clone()
    }

    async fn find_all(&self, class: &ClassRef, filter: &Filter, options: &FindOptions) -> Result<FindResult> {
        self.instrumentation.find_all_calls.fetch_add(1, Ordering::SeqCst);
        let result = if self.take_failure() {
            Err(Error::backend("injected failure"))
        } else {
            let docs = self.docs.read();
            execute(&Snapshot::new(&self.hierarchy, &docs), class, filter, options)
        };
        self.delay().await;
        result
    }

    async fn search_fulltext(&self, text: &str, limit: Option<usize>) -> Result<FindResult> {
        let mut docs: Vec<Document> = self
            .docs
            .read()
            .values()
            .filter(|d| search_matches(d, text))
            .cloned()
            .collect();
        let total = docs.len();
        if let Some(limit) = limit {
            docs.truncate(limit);
        }
        self.delay().await;
        Ok(FindResult::new(docs, Some(total)))
    }
}
