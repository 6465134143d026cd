//! Change set for tracking query result changes.
//!
//! A ChangeSet is what a result callback receives: the ids that were added,
//! removed and modified since the previous delivery, plus the complete current
//! result and total.

use vigil_core::{DocId, Document};

/// A set of changes to a live query result.
///
/// This struct tracks:
/// - `added`: Documents that entered the result
/// - `removed`: Documents that left the result
/// - `modified`: Documents that stayed but changed (including their `$lookup` data)
/// - `result`: The complete current result after applying changes
/// - `total`: The number of matches ignoring `limit`, when requested
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangeSet {
    /// Ids that were added to the result
    pub added: Vec<DocId>,
    /// Ids that were removed from the result
    pub removed: Vec<DocId>,
    /// Ids whose documents were modified
    pub modified: Vec<DocId>,
    /// The complete current result
    pub result: Vec<Document>,
    /// The total number of matches, when requested
    pub total: Option<usize>,
}

impl ChangeSet {
    /// Creates a new empty change set.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a change set representing an initial result.
    ///
    /// All documents are treated as additions.
    pub fn initial(result: Vec<Document>, total: Option<usize>) -> Self {
        Self {
            added: result.iter().map(|d| d.id.clone()).collect(),
            removed: Vec::new(),
            modified: Vec::new(),
            result,
            total,
        }
    }

    /// Creates a change set describing the move from `before` to `after`.
    pub fn diff(before: &[Document], after: Vec<Document>, total: Option<usize>) -> Self {
        let mut changes = Self::new();
        for doc in &after {
            match before.iter().find(|d| d.id == doc.id) {
                None => changes.add(doc.id.clone()),
                Some(old) if old != doc => changes.modify(doc.id.clone()),
                Some(_) => {}
            }
        }
        for doc in before {
            if !after.iter().any(|d| d.id == doc.id) {
                changes.remove(doc.id.clone());
            }
        }
        changes.result = after;
        changes.total = total;
        changes
    }

    /// Returns true if there are no changes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Returns the total number of changes.
    #[inline]
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }

    /// Returns the document with `id` from the current result.
    pub fn get(&self, id: &DocId) -> Option<&Document> {
        self.result.iter().find(|d| d.id == *id)
    }

    /// Merges a later change set into this one. The later result wins.
    pub fn merge(&mut self, other: ChangeSet) {
        for id in other.added {
            self.removed.retain(|r| *r != id);
            self.add(id);
        }
        for id in other.removed {
            let was_added = self.added.contains(&id);
            self.added.retain(|a| *a != id);
            self.modified.retain(|m| *m != id);
            if !was_added {
                self.remove(id);
            }
        }
        for id in other.modified {
            if !self.added.contains(&id) {
                self.modify(id);
            }
        }
        self.result = other.result;
        self.total = other.total;
    }

    /// Clears all changes, keeping the result.
    pub fn clear(&mut self) {
        self.added.clear();
        self.removed.clear();
        self.modified.clear();
    }

    /// Records an added id.
    #[inline]
    pub fn add(&mut self, id: DocId) {
        if !self.added.contains(&id) {
            self.added.push(id);
        }
    }

    /// Records a removed id.
    #[inline]
    pub fn remove(&mut self, id: DocId) {
        if !self.removed.contains(&id) {
            self.removed.push(id);
        }
    }

    /// Records a modified id.
    #[inline]
    pub fn modify(&mut self, id: DocId) {
        if !self.modified.contains(&id) {
            self.modified.push(id);
        }
    }
}
