//! Find options: sort, limit, projection, lookup and total.

use crate::document::{Document, REQUIRED_FIELDS};
use crate::hierarchy::Hierarchy;
use crate::ids::ClassRef;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Attribute a reverse lookup matches against when none is named.
pub const DEFAULT_REVERSE_ATTRIBUTE: &str = "attachedTo";

/// Sort direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SortOrder {
    /// Smallest first
    Ascending,
    /// Largest first
    Descending,
}

impl SortOrder {
    /// Applies this order to a comparison result.
    #[inline]
    pub fn apply(&self, ord: Ordering) -> Ordering {
        match self {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        }
    }
}

/// An ordered list of sort keys.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortSpec {
    keys: Vec<(String, SortOrder)>,
}

impl SortSpec {
    /// Creates an empty sort spec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sort key. Later keys break ties of earlier ones.
    pub fn by(mut self, key: impl Into<String>, order: SortOrder) -> Self {
        let key = key.into();
        self.keys.retain(|(k, _)| *k != key);
        self.keys.push((key, order));
        self
    }

    /// Returns true if no sort keys are set.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns the sort keys.
    pub fn keys(&self) -> &[(String, SortOrder)] {
        &self.keys
    }

    /// Returns true if `key` takes part in ordering.
    pub fn references(&self, key: &str) -> bool {
        self.keys.iter().any(|(k, _)| {
            k == key
                || k.strip_prefix(key).map(|r| r.starts_with('.')).unwrap_or(false)
                || key.strip_prefix(k.as_str()).map(|r| r.starts_with('.')).unwrap_or(false)
        })
    }

    /// Compares the sort keys only. Missing values sort first.
    pub fn compare_keys(&self, hierarchy: &Hierarchy, class: &ClassRef, a: &Document, b: &Document) -> Ordering {
        for (key, order) in &self.keys {
            let av = a.resolve_attribute(hierarchy, class, key);
            let bv = b.resolve_attribute(hierarchy, class, key);
            let cmp = match (av.as_deref(), bv.as_deref()) {
                (Some(x), Some(y)) => x.loose_cmp(y),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            if cmp != Ordering::Equal {
                return order.apply(cmp);
            }
        }
        Ordering::Equal
    }

    /// Total order over documents: sort keys, then document id.
    pub fn compare(&self, hierarchy: &Hierarchy, class: &ClassRef, a: &Document, b: &Document) -> Ordering {
        self.compare_keys(hierarchy, class, a, b)
            .then_with(|| a.id.cmp(&b.id))
    }
}

/// Target of a forward lookup, with an optional nested lookup applied to the
/// resolved document.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LookupTarget {
    pub class: ClassRef,
    pub nested: Option<Box<LookupSpec>>,
}

/// A reverse lookup: documents of `class` whose `attribute` equals the owner id.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReverseLookup {
    pub class: ClassRef,
    pub attribute: String,
}

/// Which references to resolve into `$lookup`.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LookupSpec {
    forward: BTreeMap<String, LookupTarget>,
    reverse: BTreeMap<String, ReverseLookup>,
}

impl LookupSpec {
    /// Creates an empty lookup spec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the reference stored in `attribute` to a document of `class`.
    pub fn forward(mut self, attribute: impl Into<String>, class: impl Into<ClassRef>) -> Self {
        self.forward.insert(
            attribute.into(),
            LookupTarget {
                class: class.into(),
                nested: None,
            },
        );
        self
    }

    /// Like `forward`, then applies `nested` to the resolved document.
    pub fn forward_nested(
        mut self,
        attribute: impl Into<String>,
        class: impl Into<ClassRef>,
        nested: LookupSpec,
    ) -> Self {
        self.forward.insert(
            attribute.into(),
            LookupTarget {
                class: class.into(),
                nested: Some(Box::new(nested)),
            },
        );
        self
    }

    /// Collects documents of `class` attached to the owner into `$lookup[name]`.
    pub fn reverse(self, name: impl Into<String>, class: impl Into<ClassRef>) -> Self {
        self.reverse_on(name, class, DEFAULT_REVERSE_ATTRIBUTE)
    }

    /// Like `reverse`, matching on a custom attribute.
    pub fn reverse_on(
        mut self,
        name: impl Into<String>,
        class: impl Into<ClassRef>,
        attribute: impl Into<String>,
    ) -> Self {
        self.reverse.insert(
            name.into(),
            ReverseLookup {
                class: class.into(),
                attribute: attribute.into(),
            },
        );
        self
    }

    /// Iterates over forward lookups.
    pub fn forward_entries(&self) -> impl Iterator<Item = (&str, &LookupTarget)> {
        self.forward.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates over reverse lookups.
    pub fn reverse_entries(&self) -> impl Iterator<Item = (&str, &ReverseLookup)> {
        self.reverse.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns true if nothing is looked up.
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty() && self.reverse.is_empty()
    }

    /// Returns true if `attribute` holds a forward reference.
    pub fn has_forward(&self, attribute: &str) -> bool {
        self.forward.contains_key(attribute)
    }
}

/// Options of a find or live query.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FindOptions {
    pub sort: SortSpec,
    pub limit: Option<usize>,
    pub projection: Option<BTreeSet<String>>,
    pub lookup: Option<LookupSpec>,
    /// Report the total number of matches, ignoring `limit`.
    pub total: bool,
    pub show_archived: bool,
}

impl FindOptions {
    /// Creates default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sort key.
    pub fn with_sort(mut self, key: impl Into<String>, order: SortOrder) -> Self {
        self.sort = self.sort.by(key, order);
        self
    }

    /// Sets the limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the projection.
    pub fn with_projection<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the lookup spec.
    pub fn with_lookup(mut self, lookup: LookupSpec) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Requests the total count.
    pub fn with_total(mut self) -> Self {
        self.total = true;
        self
    }

    /// Returns a copy whose projection, if any, also contains the header
    /// fields needed for incremental matching and sorting.
    pub fn with_required_projection(&self) -> FindOptions {
        let mut options = self.clone();
        if let Some(projection) = options.projection.as_mut() {
            projection.extend(REQUIRED_FIELDS.iter().map(|f| f.to_string()));
        }
        options
    }

    /// Returns a copy without projection.
    pub fn without_projection(&self) -> FindOptions {
        FindOptions {
            projection: None,
            ..self.clone()
        }
    }

    /// Returns the lookup spec when it resolves something.
    pub fn lookup(&self) -> Option<&LookupSpec> {
        self.lookup.as_ref().filter(|l| !l.is_empty())
    }
}
