//! Backing store interface.

use crate::document::Document;
use crate::error::Result;
use crate::filter::Filter;
use crate::hierarchy::Hierarchy;
use crate::ids::ClassRef;
use crate::options::FindOptions;
use async_trait::async_trait;
use std::sync::Arc;

/// Result of a `find_all` call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FindResult {
    pub docs: Vec<Document>,
    /// Number of matches ignoring `limit`, when requested.
    pub total: Option<usize>,
}

impl FindResult {
    pub fn new(docs: Vec<Document>, total: Option<usize>) -> Self {
        Self { docs, total }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

/// A document store the live query engine reads through.
///
/// Implementations execute the full filter and option vocabulary, including
/// `$search` and lookups, and are the source of truth a refresh replaces the
/// cached result with.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// The class hierarchy of the stored model.
    fn hierarchy(&self) -> Arc<Hierarchy>;

    /// Finds all documents of `class` matching `filter`.
    async fn find_all(&self, class: &ClassRef, filter: &Filter, options: &FindOptions) -> Result<FindResult>;

    /// Finds the first document of `class` matching `filter`.
    async fn find_one(&self, class: &ClassRef, filter: &Filter, options: &FindOptions) -> Result<Option<Document>> {
        let options = FindOptions {
            limit: Some(1),
            total: false,
            ..options.clone()
        };
        Ok(self.find_all(class, filter, &options).await?.docs.into_iter().next())
    }

    /// Full-text search across all classes.
    async fn search_fulltext(&self, text: &str, limit: Option<usize>) -> Result<FindResult>;
}
