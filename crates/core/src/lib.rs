//! Vigil Core - Document model and query vocabulary for the Vigil live query cache.
//!
//! This crate provides the foundational types shared by the store and the
//! live query engine:
//!
//! - `Value`: Dynamic attribute values, totally ordered and hashable
//! - `Document`: A record with identity header, attributes, mixin overlays and `$lookup` data
//! - `Hierarchy`: The class/mixin hierarchy service
//! - `Filter` / `Matcher`: Filter expressions and their evaluation
//! - `FindOptions`: Sort, limit, projection, lookup and total
//! - `Resolver`: Resolution and incremental patching of `$lookup` data
//! - `Tx`: Transactions and workspace events
//! - `DocumentStore`: The backing store interface
//! - `Error`: Error types
//!
//! # Example
//!
//! ```rust
//! use vigil_core::{ClassRef, Document, Filter, Hierarchy, Matcher};
//!
//! let hierarchy = Hierarchy::builder()
//!     .class("core:class:Doc", None, Vec::<String>::new())
//!     .class("core:class:Space", Some("core:class:Doc"), ["name", "private"])
//!     .build()
//!     .unwrap();
//!
//! let doc = Document::new("s1", "core:class:Space", "s1").with("private", false);
//! let filter = Filter::new().eq("private", false);
//!
//! let matcher = Matcher::new(&hierarchy);
//! assert!(matcher.matches(&doc, &ClassRef::from("core:class:Doc"), &filter));
//! ```

pub mod document;
mod error;
pub mod filter;
pub mod hierarchy;
mod ids;
pub mod lookup;
pub mod options;
pub mod store;
pub mod tx;
mod value;

pub use document::{Document, LookupValue};
pub use error::{Error, Result};
pub use filter::{Condition, Filter, Matcher, SpaceClause};
pub use hierarchy::{AttributeKey, ClassKind, Hierarchy};
pub use ids::{ClassRef, DocId, SpaceRef, Timestamp};
pub use lookup::{DocSource, LookupPatch, Resolver};
pub use options::{FindOptions, LookupSpec, SortOrder, SortSpec};
pub use store::{DocumentStore, FindResult};
pub use tx::{DocChange, DocumentUpdate, Tx, TxFactory, WorkspaceEvent};
pub use value::Value;
