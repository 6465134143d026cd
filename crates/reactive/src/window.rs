//! Sort/limit window.
//!
//! Maintains an ordered, optionally bounded slice of documents and decides
//! whether a single document change can be resolved locally. A window that is
//! at capacity cannot see the documents ranked just past its end, so any
//! change that may pull one of them in answers `NeedsRefresh`.

use std::cmp::Ordering;
use vigil_core::{ClassRef, DocId, Document, Hierarchy, SortSpec};

/// What a single change did to the window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// The window is unaffected.
    Unchanged,
    /// The document was inserted at the given position.
    Inserted(usize),
    /// The document at the given position was removed.
    Removed(usize),
    /// The document was replaced in place.
    Replaced(usize),
    /// The document moved between positions.
    Moved { from: usize, to: usize },
    /// The change cannot be resolved without re-running the query.
    NeedsRefresh,
}

/// An ordered, bounded view over a query result.
#[derive(Clone, Copy)]
pub struct Window<'a> {
    hierarchy: &'a Hierarchy,
    class: &'a ClassRef,
    sort: &'a SortSpec,
    limit: Option<usize>,
}

impl<'a> Window<'a> {
    pub fn new(hierarchy: &'a Hierarchy, class: &'a ClassRef, sort: &'a SortSpec, limit: Option<usize>) -> Self {
        Self {
            hierarchy,
            class,
            sort,
            limit,
        }
    }

    /// Total order used by the window: sort keys, then id.
    #[inline]
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        self.sort.compare(self.hierarchy, self.class, a, b)
    }

    /// Returns the position of the document with `id`.
    pub fn position_of(&self, docs: &[Document], id: &DocId) -> Option<usize> {
        docs.iter().position(|d| d.id == *id)
    }

    /// Returns where `doc` belongs in `docs`.
    pub fn insertion_point(&self, docs: &[Document], doc: &Document) -> usize {
        docs.partition_point(|d| self.compare(d, doc) == Ordering::Less)
    }

    /// Returns true if the window holds `limit` documents.
    #[inline]
    pub fn is_full(&self, len: usize) -> bool {
        self.limit.map(|l| len >= l).unwrap_or(false)
    }

    /// Admits a document that was not in the window and now matches.
    pub fn admit(&self, docs: &mut Vec<Document>, doc: Document) -> Admission {
        if self.limit == Some(0) {
            return Admission::Unchanged;
        }
        if !self.is_full(docs.len()) {
            let pos = self.insertion_point(docs, &doc);
            docs.insert(pos, doc);
            return Admission::Inserted(pos);
        }
        if self.sort.is_empty() {
            // Backend order is not replayable without a sort
            return Admission::NeedsRefresh;
        }
        match docs.last() {
            Some(last) if self.compare(&doc, last) == Ordering::Greater => Admission::Unchanged,
            _ => Admission::NeedsRefresh,
        }
    }

    /// Removes the document at `pos`. A full window cannot refill the
    /// vacated slot locally.
    pub fn evict(&self, docs: &mut Vec<Document>, pos: usize) -> Admission {
        let was_full = self.is_full(docs.len());
        docs.remove(pos);
        if was_full {
            Admission::NeedsRefresh
        } else {
            Admission::Removed(pos)
        }
    }

    /// Replaces the document at `pos` with its changed version, moving it if
    /// its sort keys changed.
    pub fn reposition(&self, docs: &mut Vec<Document>, pos: usize, doc: Document) -> Admission {
        if self.sort.compare_keys(self.hierarchy, self.class, &docs[pos], &doc) == Ordering::Equal {
            docs[pos] = doc;
            return Admission::Replaced(pos);
        }
        let was_full = self.is_full(docs.len());
        docs.remove(pos);
        let to = self.insertion_point(docs, &doc);
        let lands_last = to == docs.len();
        docs.insert(to, doc);
        if was_full && lands_last {
            // Something outside the window may now outrank it
            return Admission::NeedsRefresh;
        }
        if to == pos {
            Admission::Replaced(pos)
        } else {
            Admission::Moved { from: pos, to }
        }
    }
}
