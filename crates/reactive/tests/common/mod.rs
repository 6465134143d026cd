//! Shared fixtures for the live query integration tests.
//!
//! The model is the smallest one that exercises every code path: plain
//! documents (`Space`), attached collections (`TestComment` on `AttachedDoc`)
//! and a mixin on `Space`.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;
use vigil_core::{DocId, Document, Hierarchy, Tx, TxFactory};
use vigil_reactive::{ChangeSet, LiveQuery, LiveQueryConfig};
use vigil_storage::MemoryStore;

pub const DOC: &str = "core:class:Doc";
pub const SPACE: &str = "core:class:Space";
pub const ATTACHED_DOC: &str = "core:class:AttachedDoc";
pub const COMMENT: &str = "test:class:TestComment";
pub const MIXIN: &str = "test:mixin:TestMixin";
pub const MODEL_SPACE: &str = "core:space:Model";

pub fn hierarchy() -> Hierarchy {
    Hierarchy::builder()
        .class(DOC, None, Vec::<String>::new())
        .class(SPACE, Some(DOC), ["name", "description", "private", "archived", "members"])
        .class(ATTACHED_DOC, Some(DOC), ["attachedTo", "attachedToClass", "collection"])
        .class(COMMENT, Some(ATTACHED_DOC), ["message"])
        .mixin(MIXIN, SPACE, ["arr"])
        .build()
        .unwrap()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub engine: LiveQuery<MemoryStore>,
    pub factory: TxFactory,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(LiveQueryConfig::default())
    }

    pub fn with_config(config: LiveQueryConfig) -> Self {
        init_tracing();
        let store = Arc::new(MemoryStore::new(hierarchy()));
        let engine = LiveQuery::with_config(store.clone(), config);
        Self {
            store,
            engine,
            factory: TxFactory::new(),
        }
    }

    /// Commits a batch to the store, then applies it to the engine.
    pub async fn commit(&self, txs: Vec<Tx>) -> Vec<Tx> {
        let txs = self.store.commit(txs).unwrap();
        self.engine.tx(&txs).await;
        txs
    }

    /// Creates a public space named `name`.
    pub async fn create_space(&self, name: &str) -> DocId {
        let tx = self.factory.create_doc(
            SPACE,
            MODEL_SPACE,
            [
                ("name", vigil_core::Value::from(name)),
                ("private", vigil_core::Value::from(false)),
            ],
        );
        let id = tx.object_id().cloned().unwrap();
        self.commit(vec![tx]).await;
        id
    }

    /// Creates `count` spaces named `space-00`, `space-01`, ...
    pub async fn create_spaces(&self, count: usize) -> Vec<DocId> {
        let mut ids = Vec::with_capacity(count);
        for i in 0..count {
            ids.push(self.create_space(&format!("space-{:02}", i)).await);
        }
        ids
    }
}

/// Records every change set delivered to a callback.
#[derive(Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<ChangeSet>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(&self) -> impl Fn(&ChangeSet) + Send + Sync + 'static {
        let calls = self.calls.clone();
        move |changes| calls.lock().push(changes.clone())
    }

    pub fn count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn last(&self) -> ChangeSet {
        self.calls.lock().last().cloned().expect("no change set delivered")
    }

    pub fn all(&self) -> Vec<ChangeSet> {
        self.calls.lock().clone()
    }

    /// Waits until at least `count` change sets have arrived.
    pub async fn wait_for(&self, count: usize) {
        for _ in 0..200 {
            if self.count() >= count {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("expected {} deliveries, got {}", count, self.count());
    }
}

pub fn names(docs: &[Document]) -> Vec<String> {
    docs.iter()
        .map(|d| d.get("name").and_then(|v| v.as_str().map(str::to_string)).unwrap_or_default())
        .collect()
}
