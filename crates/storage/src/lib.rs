//! Vigil Storage - In-memory backing store for the Vigil live query cache.
//!
//! This crate provides:
//!
//! - `MemoryStore`: Document storage implementing `DocumentStore`, with an
//!   ordered push channel of committed transaction batches
//! - `executor`: Find execution (filter, search, sort, total, limit, lookup, projection)
//!
//! # Example
//!
//! ```rust
//! use vigil_core::{Hierarchy, TxFactory};
//! use vigil_storage::MemoryStore;
//!
//! let hierarchy = Hierarchy::builder()
//!     .class("core:class:Doc", None, Vec::<String>::new())
//!     .class("core:class:Space", Some("core:class:Doc"), ["name"])
//!     .build()
//!     .unwrap();
//! let store = MemoryStore::new(hierarchy);
//!
//! let factory = TxFactory::new();
//! store
//!     .commit(vec![factory.create_doc("core:class:Space", "model", [("name", "general")])])
//!     .unwrap();
//! assert_eq!(store.len(), 1);
//! ```

pub mod executor;
pub mod memory;

pub use executor::Snapshot;
pub use memory::MemoryStore;
