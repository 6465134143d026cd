//! Vigil Reactive - Live queries over a document store.
//!
//! This crate keeps the results of subscribed queries current as transactions
//! arrive. Each transaction is matched against every cached query; the result
//! is patched locally when that is provably correct and re-fetched from the
//! store otherwise.
//!
//! # Core Concepts
//!
//! - `LiveQuery`: The engine. Owns the queries and the refresh tasks
//! - `Query`: One cached result plus its callbacks
//! - `Window`: Sorted, limited placement of documents in a result
//! - `ChangeSet`: What a callback receives (added, removed, modified ids and the result)
//! - `Queue`: Unsubscribed queries kept warm for reuse
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vigil_core::{Filter, FindOptions, Hierarchy, SortOrder};
//! use vigil_reactive::LiveQuery;
//! use vigil_storage::MemoryStore;
//!
//! # async fn demo() -> vigil_core::Result<()> {
//! let hierarchy = Hierarchy::builder()
//!     .class("core:class:Doc", None, Vec::<String>::new())
//!     .class("core:class:Space", Some("core:class:Doc"), ["name"])
//!     .build()?;
//! let store = Arc::new(MemoryStore::new(hierarchy));
//! let engine = LiveQuery::new(store.clone());
//!
//! let handle = engine.query(
//!     "core:class:Space",
//!     Filter::new(),
//!     FindOptions::new().with_sort("name", SortOrder::Ascending).with_limit(3),
//!     |changes| println!("{} spaces", changes.result.len()),
//! )?;
//!
//! // Feed the store's transactions into the engine
//! engine.listen(store.subscribe());
//!
//! handle.unsubscribe();
//! engine.close();
//! # Ok(())
//! # }
//! ```

pub mod change_set;
pub mod config;
pub mod query;
pub mod queue;
pub mod registry;
pub mod subscription;
pub mod window;

pub use change_set::ChangeSet;
pub use config::LiveQueryConfig;
pub use query::{Query, QueryId, QueryKey, TxOutcome};
pub use queue::Queue;
pub use registry::{LiveQuery, QueryHandle};
pub use subscription::{ChangeCallback, Subscription, SubscriptionId, SubscriptionManager};
pub use window::{Admission, Window};
