//! Transactions and workspace events.
//!
//! A `Tx` is one committed change delivered by the transport: a document
//! create/update/remove, a mixin application, or a workspace-level event that
//! is not expressible as a document change.

use crate::document::Document;
use crate::error::{Error, Result};
use crate::ids::{ClassRef, DocId, SpaceRef, Timestamp};
use crate::options::DEFAULT_REVERSE_ATTRIBUTE;
use crate::value::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Attribute holding the class of the collection owner.
pub const ATTACHED_TO_CLASS_KEY: &str = "attachedToClass";
/// Attribute holding the collection name on the owner.
pub const COLLECTION_KEY: &str = "collection";

/// Update operations applied to a document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocumentUpdate {
    pub set: BTreeMap<String, Value>,
    pub unset: BTreeSet<String>,
    pub inc: BTreeMap<String, Value>,
    pub push: BTreeMap<String, Value>,
    pub pull: BTreeMap<String, Value>,
}

impl DocumentUpdate {
    /// Creates an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an attribute.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(key.into(), value.into());
        self
    }

    /// Removes an attribute.
    pub fn unset(mut self, key: impl Into<String>) -> Self {
        self.unset.insert(key.into());
        self
    }

    /// Increments a numeric attribute.
    pub fn inc(mut self, key: impl Into<String>, by: impl Into<Value>) -> Self {
        self.inc.insert(key.into(), by.into());
        self
    }

    /// Appends to an array attribute.
    pub fn push(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push.insert(key.into(), value.into());
        self
    }

    /// Removes matching elements from an array attribute.
    pub fn pull(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.pull.insert(key.into(), value.into());
        self
    }

    /// Returns true if the update changes nothing.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
            && self.unset.is_empty()
            && self.inc.is_empty()
            && self.push.is_empty()
            && self.pull.is_empty()
    }

    /// Iterates over every attribute key the update writes.
    pub fn touched(&self) -> impl Iterator<Item = &str> {
        self.set
            .keys()
            .chain(self.unset.iter())
            .chain(self.inc.keys())
            .chain(self.push.keys())
            .chain(self.pull.keys())
            .map(|k| k.as_str())
    }

    /// Returns true if the update writes `key` or a path above/below it.
    pub fn touches(&self, key: &str) -> bool {
        self.touched().any(|k| {
            k == key
                || k.strip_prefix(key).map(|r| r.starts_with('.')).unwrap_or(false)
                || key.strip_prefix(k).map(|r| r.starts_with('.')).unwrap_or(false)
        })
    }

    /// Applies the update in place. Returns whether the document changed.
    pub fn apply(&self, doc: &mut Document) -> Result<bool> {
        let before = doc.clone();

        for (key, value) in &self.set {
            doc.set(key, value.clone());
        }
        for key in &self.unset {
            doc.attributes.remove(key);
        }
        for (key, by) in &self.inc {
            let current = doc.attributes.get(key).cloned().unwrap_or(Value::Int64(0));
            let next = match (&current, by) {
                (Value::Int64(a), Value::Int64(b)) => match a.checked_add(*b) {
                    Some(sum) => Value::Int64(sum),
                    None => {
                        return Err(Error::malformed_tx(format!(
                            "incrementing attribute '{}' by {} overflows",
                            key, b
                        )))
                    }
                },
                (a, b) => match (a.as_f64(), b.as_f64()) {
                    (Some(a), Some(b)) => Value::Float64(a + b),
                    _ => {
                        return Err(Error::malformed_tx(format!(
                            "cannot increment {} attribute '{}' by {}",
                            current.kind(),
                            key,
                            by.kind()
                        )))
                    }
                },
            };
            doc.attributes.insert(key.clone(), next);
        }
        for (key, value) in &self.push {
            match doc.attributes.entry(key.clone()).or_insert_with(|| Value::Array(Vec::new())) {
                Value::Array(items) => items.push(value.clone()),
                other => {
                    return Err(Error::malformed_tx(format!(
                        "cannot push to {} attribute '{}'",
                        other.kind(),
                        key
                    )))
                }
            }
        }
        for (key, value) in &self.pull {
            match doc.attributes.get_mut(key) {
                None => {}
                Some(Value::Array(items)) => items.retain(|i| !i.loose_eq(value)),
                Some(other) => {
                    return Err(Error::malformed_tx(format!(
                        "cannot pull from {} attribute '{}'",
                        other.kind(),
                        key
                    )))
                }
            }
        }

        Ok(*doc != before)
    }
}

/// Backend-originated events that are not document changes.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkspaceEvent {
    /// The full-text index was rebuilt for these classes.
    IndexingUpdate { classes: Vec<ClassRef> },
    /// Documents of these classes were changed in bulk, bypassing transactions.
    BulkUpdate { classes: Vec<ClassRef> },
    /// Membership or access rules of a space changed.
    SecurityChange { space: SpaceRef },
}

/// A committed transaction.
#[derive(Clone, Debug, PartialEq)]
pub enum Tx {
    CreateDoc {
        doc: Document,
    },
    UpdateDoc {
        id: DocId,
        class: ClassRef,
        space: SpaceRef,
        operations: DocumentUpdate,
        modified_on: Timestamp,
        /// Collection owner, when the document is attached to one.
        attached_to: Option<DocId>,
    },
    RemoveDoc {
        id: DocId,
        class: ClassRef,
        space: SpaceRef,
        attached_to: Option<DocId>,
    },
    Mixin {
        id: DocId,
        class: ClassRef,
        space: SpaceRef,
        mixin: ClassRef,
        attributes: BTreeMap<String, Value>,
        modified_on: Timestamp,
    },
    Workspace(WorkspaceEvent),
}

impl Tx {
    /// Returns the id of the document this transaction changes.
    pub fn object_id(&self) -> Option<&DocId> {
        match self {
            Tx::CreateDoc { doc } => Some(&doc.id),
            Tx::UpdateDoc { id, .. } | Tx::RemoveDoc { id, .. } | Tx::Mixin { id, .. } => Some(id),
            Tx::Workspace(_) => None,
        }
    }

    /// Returns the class of the document this transaction changes.
    pub fn object_class(&self) -> Option<&ClassRef> {
        match self {
            Tx::CreateDoc { doc } => Some(&doc.class),
            Tx::UpdateDoc { class, .. } | Tx::RemoveDoc { class, .. } | Tx::Mixin { class, .. } => {
                Some(class)
            }
            Tx::Workspace(_) => None,
        }
    }

    /// Returns the space of the document this transaction changes.
    pub fn object_space(&self) -> Option<&SpaceRef> {
        match self {
            Tx::CreateDoc { doc } => Some(&doc.space),
            Tx::UpdateDoc { space, .. } | Tx::RemoveDoc { space, .. } | Tx::Mixin { space, .. } => {
                Some(space)
            }
            Tx::Workspace(_) => None,
        }
    }
}

/// Borrowed view of the document-level effect of a transaction.
#[derive(Clone, Copy, Debug)]
pub enum DocChange<'a> {
    Created(&'a Document),
    Updated {
        id: &'a DocId,
        class: &'a ClassRef,
        space: &'a SpaceRef,
        operations: &'a DocumentUpdate,
        modified_on: Timestamp,
        attached_to: Option<&'a DocId>,
    },
    Mixin {
        id: &'a DocId,
        class: &'a ClassRef,
        space: &'a SpaceRef,
        mixin: &'a ClassRef,
        attributes: &'a BTreeMap<String, Value>,
        modified_on: Timestamp,
    },
    Removed {
        id: &'a DocId,
        class: &'a ClassRef,
        space: &'a SpaceRef,
        attached_to: Option<&'a DocId>,
    },
}

impl<'a> DocChange<'a> {
    /// Returns the document change carried by `tx`, if any.
    pub fn from_tx(tx: &'a Tx) -> Option<Self> {
        Some(match tx {
            Tx::CreateDoc { doc } => DocChange::Created(doc),
            Tx::UpdateDoc {
                id,
                class,
                space,
                operations,
                modified_on,
                attached_to,
            } => DocChange::Updated {
                id,
                class,
                space,
                operations,
                modified_on: *modified_on,
                attached_to: attached_to.as_ref(),
            },
            Tx::Mixin {
                id,
                class,
                space,
                mixin,
                attributes,
                modified_on,
            } => DocChange::Mixin {
                id,
                class,
                space,
                mixin,
                attributes,
                modified_on: *modified_on,
            },
            Tx::RemoveDoc {
                id,
                class,
                space,
                attached_to,
            } => DocChange::Removed {
                id,
                class,
                space,
                attached_to: attached_to.as_ref(),
            },
            Tx::Workspace(_) => return None,
        })
    }

    #[inline]
    pub fn id(&self) -> &'a DocId {
        match *self {
            DocChange::Created(doc) => &doc.id,
            DocChange::Updated { id, .. } | DocChange::Mixin { id, .. } | DocChange::Removed { id, .. } => id,
        }
    }

    #[inline]
    pub fn class(&self) -> &'a ClassRef {
        match *self {
            DocChange::Created(doc) => &doc.class,
            DocChange::Updated { class, .. }
            | DocChange::Mixin { class, .. }
            | DocChange::Removed { class, .. } => class,
        }
    }

    #[inline]
    pub fn space(&self) -> &'a SpaceRef {
        match *self {
            DocChange::Created(doc) => &doc.space,
            DocChange::Updated { space, .. }
            | DocChange::Mixin { space, .. }
            | DocChange::Removed { space, .. } => space,
        }
    }

    /// Collection owner hint carried by the transaction.
    pub fn attached_to(&self) -> Option<&'a DocId> {
        match *self {
            DocChange::Updated { attached_to, .. } | DocChange::Removed { attached_to, .. } => attached_to,
            DocChange::Created(_) | DocChange::Mixin { .. } => None,
        }
    }

    /// Returns true if the change may alter the value read under `key`.
    /// Creations and removals touch everything.
    pub fn touches(&self, key: &str) -> bool {
        match *self {
            DocChange::Created(_) | DocChange::Removed { .. } => true,
            DocChange::Updated { operations, .. } => operations.touches(key),
            DocChange::Mixin { mixin, attributes, .. } => attributes.keys().any(|attr| {
                let qualified = format!("{}.{}", mixin, attr);
                attr == key || qualified == key || key.starts_with(&format!("{}.", qualified))
            }),
        }
    }

    /// Returns true if the change sets `key` to `value` on the base document.
    pub fn sets(&self, key: &str, value: &Value) -> bool {
        match *self {
            DocChange::Updated { operations, .. } => operations
                .set
                .get(key)
                .map(|v| v.loose_eq(value))
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Applies an update or mixin change to `doc`. Returns whether it changed.
    pub fn apply(&self, doc: &mut Document) -> Result<bool> {
        match *self {
            DocChange::Updated {
                operations,
                modified_on,
                ..
            } => {
                let changed = operations.apply(doc)?;
                if changed {
                    doc.modified_on = modified_on;
                }
                Ok(changed)
            }
            DocChange::Mixin {
                mixin,
                attributes,
                modified_on,
                ..
            } => {
                let before = doc.mixins.get(mixin).cloned();
                doc.apply_mixin(mixin, attributes);
                let changed = doc.mixins.get(mixin) != before.as_ref();
                if changed {
                    doc.modified_on = modified_on;
                }
                Ok(changed)
            }
            DocChange::Created(_) | DocChange::Removed { .. } => Ok(false),
        }
    }
}

/// Builds well-formed transactions with fresh ids and monotonic timestamps.
pub struct TxFactory {
    clock: AtomicI64,
}

impl Default for TxFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl TxFactory {
    /// Creates a factory whose clock starts at the current time.
    pub fn new() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Self {
            clock: AtomicI64::new(now),
        }
    }

    fn tick(&self) -> Timestamp {
        self.clock.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Creates a document.
    pub fn create_doc<K, V, I>(&self, class: impl Into<ClassRef>, space: impl Into<SpaceRef>, attributes: I) -> Tx
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut doc = Document::new(DocId::generate(), class, space).with_modified_on(self.tick());
        for (k, v) in attributes {
            let key: String = k.into();
            doc.set(&key, v.into());
        }
        Tx::CreateDoc { doc }
    }

    /// Creates a document attached to `attached_to` in `collection`.
    pub fn add_collection<K, V, I>(
        &self,
        class: impl Into<ClassRef>,
        space: impl Into<SpaceRef>,
        attached_to: &DocId,
        attached_to_class: impl Into<ClassRef>,
        collection: &str,
        attributes: I,
    ) -> Tx
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut tx = self.create_doc(class, space, attributes);
        if let Tx::CreateDoc { doc } = &mut tx {
            doc.set(DEFAULT_REVERSE_ATTRIBUTE, Value::from(attached_to));
            doc.set(ATTACHED_TO_CLASS_KEY, Value::from(&attached_to_class.into()));
            doc.set(COLLECTION_KEY, Value::from(collection));
        }
        tx
    }

    /// Updates a document.
    pub fn update_doc(
        &self,
        class: impl Into<ClassRef>,
        space: impl Into<SpaceRef>,
        id: &DocId,
        operations: DocumentUpdate,
    ) -> Tx {
        Tx::UpdateDoc {
            id: id.clone(),
            class: class.into(),
            space: space.into(),
            operations,
            modified_on: self.tick(),
            attached_to: None,
        }
    }

    /// Updates a document attached to `attached_to`.
    pub fn update_collection(
        &self,
        class: impl Into<ClassRef>,
        space: impl Into<SpaceRef>,
        id: &DocId,
        attached_to: &DocId,
        operations: DocumentUpdate,
    ) -> Tx {
        let mut tx = self.update_doc(class, space, id, operations);
        if let Tx::UpdateDoc { attached_to: slot, .. } = &mut tx {
            *slot = Some(attached_to.clone());
        }
        tx
    }

    /// Removes a document.
    pub fn remove_doc(&self, class: impl Into<ClassRef>, space: impl Into<SpaceRef>, id: &DocId) -> Tx {
        Tx::RemoveDoc {
            id: id.clone(),
            class: class.into(),
            space: space.into(),
            attached_to: None,
        }
    }

    /// Removes a document attached to `attached_to`.
    pub fn remove_collection(
        &self,
        class: impl Into<ClassRef>,
        space: impl Into<SpaceRef>,
        id: &DocId,
        attached_to: &DocId,
    ) -> Tx {
        Tx::RemoveDoc {
            id: id.clone(),
            class: class.into(),
            space: space.into(),
            attached_to: Some(attached_to.clone()),
        }
    }

    /// Applies a mixin to a document.
    pub fn create_mixin<K, V, I>(
        &self,
        id: &DocId,
        class: impl Into<ClassRef>,
        space: impl Into<SpaceRef>,
        mixin: impl Into<ClassRef>,
        attributes: I,
    ) -> Tx
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Tx::Mixin {
            id: id.clone(),
            class: class.into(),
            space: space.into(),
            mixin: mixin.into(),
            attributes: attributes.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            modified_on: self.tick(),
        }
    }
}
