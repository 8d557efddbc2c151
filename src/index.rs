//! Triage index over an extracted Document
//!
//! Flattens the section tree into an order-preserving lookup from section id
//! to its position in the tree. Pure and deterministic; an empty Document
//! yields an empty index.

use crate::document::{Document, Section};
use std::collections::HashMap;

/// Order-preserving section lookup
#[derive(Debug, Clone, Default)]
pub struct SectionIndex {
    /// Section ids in document (depth-first) order
    order: Vec<String>,
    /// id → child-index path into the tree
    paths: HashMap<String, Vec<usize>>,
}

impl SectionIndex {
    /// Build the index for a document
    pub fn build(document: &Document) -> Self {
        let mut index = SectionIndex::default();
        let mut path = Vec::new();
        walk(&document.sections, &mut path, &mut index);
        index
    }

    /// Section ids in document order
    pub fn ids(&self) -> &[String] {
        &self.order
    }

    pub fn contains(&self, id: &str) -> bool {
        self.paths.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Resolve an id against the document this index was built from
    pub fn get<'a>(&self, document: &'a Document, id: &str) -> Option<&'a Section> {
        let path = self.paths.get(id)?;
        let mut sections = &document.sections;
        let mut current: Option<&Section> = None;
        for &child in path {
            current = sections.get(child);
            sections = &current?.subsections;
        }
        current
    }
}

fn walk(sections: &[Section], path: &mut Vec<usize>, index: &mut SectionIndex) {
    for (i, section) in sections.iter().enumerate() {
        path.push(i);
        index.order.push(section.id.clone());
        index.paths.insert(section.id.clone(), path.clone());
        walk(&section.subsections, path, index);
        path.pop();
    }
}

/// A Document paired with its index; what the answerer operates on
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub document: Document,
    pub index: SectionIndex,
}

impl IndexedDocument {
    pub fn new(document: Document) -> Self {
        let index = SectionIndex::build(&document);
        Self { document, index }
    }

    pub fn resolve(&self, id: &str) -> Option<&Section> {
        self.index.get(&self.document, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_document() -> Document {
        let mut policy = Section::new("1".to_string(), Some("Policy".to_string()), 1);
        policy
            .subsections
            .push(Section::new("1.1".to_string(), Some("Scope".to_string()), 2));
        let mut terms = Section::new("1.2".to_string(), Some("Terms".to_string()), 2);
        terms.subsections.push(Section::new(
            "1.2.1".to_string(),
            Some("Definitions".to_string()),
            3,
        ));
        policy.subsections.push(terms);

        Document {
            fingerprint: "fp".to_string(),
            title: None,
            sections: vec![
                policy,
                Section::new("2".to_string(), Some("Appendix".to_string()), 1),
            ],
        }
    }

    #[test]
    fn test_index_preserves_document_order() {
        let doc = sample_document();
        let index = SectionIndex::build(&doc);
        assert_eq!(index.ids(), &["1", "1.1", "1.2", "1.2.1", "2"]);
        assert_eq!(index.len(), 5);
    }

    #[test]
    fn test_get_resolves_nested_sections() {
        let doc = sample_document();
        let index = SectionIndex::build(&doc);
        assert_eq!(
            index.get(&doc, "1.2.1").unwrap().title.as_deref(),
            Some("Definitions")
        );
        assert_eq!(index.get(&doc, "2").unwrap().title.as_deref(), Some("Appendix"));
        assert!(index.get(&doc, "3").is_none());
        assert!(index.get(&doc, "").is_none());
    }

    #[test]
    fn test_empty_document_yields_empty_index() {
        let doc = Document {
            fingerprint: "fp".to_string(),
            title: None,
            sections: vec![],
        };
        let index = SectionIndex::build(&doc);
        assert!(index.is_empty());
        assert!(!index.contains("1"));
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let doc = sample_document();
        let a = SectionIndex::build(&doc);
        let b = SectionIndex::build(&doc);
        assert_eq!(a.ids(), b.ids());
    }

    #[test]
    fn test_indexed_document_resolve() {
        let indexed = IndexedDocument::new(sample_document());
        assert!(indexed.resolve("1.1").is_some());
        assert!(indexed.resolve("9.9").is_none());
    }
}
