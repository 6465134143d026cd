//! Document structure for Vigil.
//!
//! A `Document` is an open record with a fixed identity header (`_id`,
//! `_class`, `space`, `modifiedOn`), a map of base attributes, a side table of
//! mixin overlays, and the `$lookup` data attached by the lookup resolver.

use crate::hierarchy::{AttributeKey, Hierarchy};
use crate::ids::{ClassRef, DocId, SpaceRef, Timestamp};
use crate::value::Value;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

/// Reserved key for the document id.
pub const ID_KEY: &str = "_id";
/// Reserved key for the document class.
pub const CLASS_KEY: &str = "_class";
/// Reserved key for the document space.
pub const SPACE_KEY: &str = "space";
/// Reserved key for the modification timestamp.
pub const MODIFIED_ON_KEY: &str = "modifiedOn";

/// Header fields every projection must keep for incremental matching to work.
pub const REQUIRED_FIELDS: [&str; 4] = [ID_KEY, CLASS_KEY, SPACE_KEY, MODIFIED_ON_KEY];

/// Resolved `$lookup` entry.
#[derive(Clone, Debug, PartialEq)]
pub enum LookupValue {
    /// Forward lookup: the referenced document.
    One(Box<Document>),
    /// Reverse lookup: all documents pointing at the owner.
    Many(Vec<Document>),
}

impl LookupValue {
    /// Returns the single document of a forward lookup.
    pub fn as_one(&self) -> Option<&Document> {
        match self {
            LookupValue::One(d) => Some(d),
            LookupValue::Many(_) => None,
        }
    }

    /// Returns the documents of a reverse lookup.
    pub fn as_many(&self) -> Option<&[Document]> {
        match self {
            LookupValue::One(_) => None,
            LookupValue::Many(v) => Some(v.as_slice()),
        }
    }
}

/// A document in the store.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub id: DocId,
    /// Most-derived class of the document.
    pub class: ClassRef,
    pub space: SpaceRef,
    pub modified_on: Timestamp,
    /// Base attributes, excluding the header fields.
    pub attributes: BTreeMap<String, Value>,
    /// Mixin overlays keyed by mixin class.
    pub mixins: BTreeMap<ClassRef, BTreeMap<String, Value>>,
    /// `$lookup` data, keyed by lookup name.
    pub lookup: BTreeMap<String, LookupValue>,
}

impl Document {
    /// Creates a document with no attributes.
    pub fn new(id: impl Into<DocId>, class: impl Into<ClassRef>, space: impl Into<SpaceRef>) -> Self {
        Self {
            id: id.into(),
            class: class.into(),
            space: space.into(),
            modified_on: 0,
            attributes: BTreeMap::new(),
            mixins: BTreeMap::new(),
            lookup: BTreeMap::new(),
        }
    }

    /// Sets an attribute, builder style.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Sets the modification timestamp, builder style.
    pub fn with_modified_on(mut self, modified_on: Timestamp) -> Self {
        self.modified_on = modified_on;
        self
    }

    /// Gets a base attribute or header field by key. Dotted keys descend into
    /// nested objects.
    pub fn get(&self, key: &str) -> Option<Cow<'_, Value>> {
        match key {
            ID_KEY => Some(Cow::Owned(Value::from(&self.id))),
            CLASS_KEY => Some(Cow::Owned(Value::from(&self.class))),
            SPACE_KEY => Some(Cow::Owned(Value::from(&self.space))),
            MODIFIED_ON_KEY => Some(Cow::Owned(Value::Int64(self.modified_on))),
            _ => get_in(&self.attributes, key).map(Cow::Borrowed),
        }
    }

    /// Sets a base attribute. Header fields are routed to their typed slots.
    pub fn set(&mut self, key: &str, value: Value) {
        match key {
            ID_KEY => {
                if let Some(s) = value.as_str() {
                    self.id = DocId::from(s);
                }
            }
            CLASS_KEY => {
                if let Some(s) = value.as_str() {
                    self.class = ClassRef::from(s);
                }
            }
            SPACE_KEY => {
                if let Some(s) = value.as_str() {
                    self.space = SpaceRef::from(s);
                }
            }
            MODIFIED_ON_KEY => {
                if let Some(ts) = value.as_i64() {
                    self.modified_on = ts;
                }
            }
            _ => {
                self.attributes.insert(key.to_string(), value);
            }
        }
    }

    /// Returns true if the mixin has been applied to this document.
    pub fn has_mixin(&self, mixin: &ClassRef) -> bool {
        self.mixins.contains_key(mixin)
    }

    /// Merges attributes into the overlay of `mixin`.
    pub fn apply_mixin(&mut self, mixin: &ClassRef, attributes: &BTreeMap<String, Value>) {
        let overlay = self.mixins.entry(mixin.clone()).or_default();
        for (k, v) in attributes {
            overlay.insert(k.clone(), v.clone());
        }
    }

    /// Reads `key` as seen through `class`, honoring mixin overlays.
    ///
    /// Mixin-qualified keys and attributes declared on a mixin read the
    /// overlay; an attribute absent from the base falls back to any applied
    /// overlay carrying it.
    pub fn resolve_attribute(
        &self,
        hierarchy: &Hierarchy,
        class: &ClassRef,
        key: &str,
    ) -> Option<Cow<'_, Value>> {
        match hierarchy.check_mixin_key(key, class) {
            AttributeKey::Mixin { mixin, attribute } => self
                .mixins
                .get(&mixin)
                .and_then(|overlay| get_in(overlay, &attribute))
                .map(Cow::Borrowed),
            AttributeKey::Base(key) => self.get(&key).or_else(|| {
                self.mixins
                    .values()
                    .find_map(|overlay| get_in(overlay, &key))
                    .map(Cow::Borrowed)
            }),
        }
    }

    /// Returns a copy restricted to the projected attributes. Header fields are
    /// always kept; `$lookup` data is kept as is.
    pub fn project(&self, projection: &BTreeSet<String>) -> Document {
        let keep = |key: &str| {
            projection.contains(key)
                || key
                    .split('.')
                    .next()
                    .map(|head| projection.contains(head))
                    .unwrap_or(false)
        };
        let attributes = self
            .attributes
            .iter()
            .filter(|(k, _)| keep(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let mut mixins = BTreeMap::new();
        for (mixin, overlay) in &self.mixins {
            let kept: BTreeMap<String, Value> = overlay
                .iter()
                .filter(|(k, _)| {
                    projection.contains(mixin.as_str())
                        || projection.contains(&format!("{}.{}", mixin, k))
                })
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            if !kept.is_empty() {
                mixins.insert(mixin.clone(), kept);
            }
        }
        Document {
            id: self.id.clone(),
            class: self.class.clone(),
            space: self.space.clone(),
            modified_on: self.modified_on,
            attributes,
            mixins,
            lookup: self.lookup.clone(),
        }
    }

    /// Returns the document without its `$lookup` data.
    pub fn without_lookup(&self) -> Document {
        Document {
            lookup: BTreeMap::new(),
            ..self.clone()
        }
    }
}

/// Reads a possibly dotted key out of an attribute map.
fn get_in<'a>(map: &'a BTreeMap<String, Value>, key: &str) -> Option<&'a Value> {
    if let Some(v) = map.get(key) {
        return Some(v);
    }
    let (head, rest) = key.split_once('.')?;
    map.get(head)?.get_path(rest)
}
