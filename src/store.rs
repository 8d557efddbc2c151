//! In-memory document store
//!
//! Holds triaged documents for the lifetime of the process, keyed by the
//! content fingerprint of the source PDF. Re-uploading the same PDF reuses
//! the existing entry instead of paying for extraction and summaries again.

use crate::qa::triage::TriagedDocument;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Shared store of triaged documents
#[derive(Default)]
pub struct DocumentStore {
    documents: RwLock<HashMap<String, Arc<TriagedDocument>>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a document under its fingerprint, returning the shared handle
    pub fn insert(&self, document: TriagedDocument) -> Arc<TriagedDocument> {
        let id = document.indexed.document.fingerprint.clone();
        let handle = Arc::new(document);
        self.documents
            .write()
            .unwrap()
            .insert(id, handle.clone());
        handle
    }

    pub fn get(&self, id: &str) -> Option<Arc<TriagedDocument>> {
        self.documents.read().unwrap().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.documents.read().unwrap().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.documents.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().unwrap().is_empty()
    }
}
