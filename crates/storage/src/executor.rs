//! Find executor.
//!
//! Runs a find over a document snapshot: class and filter matching, `$search`,
//! sort, total, limit, lookup resolution and projection, in that order.

use std::collections::BTreeMap;
use vigil_core::lookup::reference_of;
use vigil_core::{
    ClassRef, DocId, DocSource, Document, Filter, FindOptions, FindResult, Hierarchy, Matcher, Resolver, Result,
};

/// A read-only view of the stored documents.
pub struct Snapshot<'a> {
    hierarchy: &'a Hierarchy,
    docs: &'a BTreeMap<DocId, Document>,
}

impl<'a> Snapshot<'a> {
    pub fn new(hierarchy: &'a Hierarchy, docs: &'a BTreeMap<DocId, Document>) -> Self {
        Self { hierarchy, docs }
    }
}

impl DocSource for Snapshot<'_> {
    fn get(&self, id: &DocId) -> Option<Document> {
        self.docs.get(id).cloned()
    }

    fn attached(&self, class: &ClassRef, attribute: &str, owner: &DocId) -> Option<Vec<Document>> {
        Some(
            self.docs
                .values()
                .filter(|d| self.hierarchy.is_derived(&d.class, class))
                .filter(|d| reference_of(self.hierarchy, d, attribute).as_ref() == Some(owner))
                .cloned()
                .collect(),
        )
    }
}

/// Returns true if any string attribute contains `text`, ignoring case.
pub fn search_matches(doc: &Document, text: &str) -> bool {
    let needle = text.to_lowercase();
    doc.attributes
        .values()
        .chain(doc.mixins.values().flat_map(|overlay| overlay.values()))
        .filter_map(|v| v.as_str())
        .any(|s| s.to_lowercase().contains(&needle))
}

/// Executes a find over `snapshot`.
pub fn execute(snapshot: &Snapshot<'_>, class: &ClassRef, filter: &Filter, options: &FindOptions) -> Result<FindResult> {
    let hierarchy = snapshot.hierarchy;
    hierarchy.require(class)?;
    let matcher = Matcher::new(hierarchy);

    let mut docs: Vec<Document> = snapshot
        .docs
        .values()
        .filter(|d| matcher.matches(d, class, filter))
        .filter(|d| filter.search_text().map(|t| search_matches(d, t)).unwrap_or(true))
        .cloned()
        .collect();

    docs.sort_by(|a, b| options.sort.compare(hierarchy, class, a, b));

    let total = options.total.then_some(docs.len());
    if let Some(limit) = options.limit {
        docs.truncate(limit);
    }

    if let Some(lookup) = options.lookup() {
        let resolver = Resolver::new(hierarchy, snapshot);
        for doc in docs.iter_mut() {
            resolver.resolve(doc, lookup);
        }
    }

    if let Some(projection) = options.projection.as_ref() {
        docs = docs.iter().map(|d| d.project(projection)).collect();
    }

    Ok(FindResult::new(docs, total))
}
