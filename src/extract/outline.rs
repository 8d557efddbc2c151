//! Section tree assembly
//!
//! Walks the triaged element stream in document order. Headings open
//! sections (nesting by heading level); everything else becomes paragraph
//! content of the innermost open section. Dotted ids reflect the position in
//! the finished tree: the second child of section "1" is "1.2" regardless of
//! its heading level.

use super::elements::{ElementKind, TriagedElement};
use crate::document::{Document, ParagraphText, Section};
use std::collections::HashMap;

/// Build a Document from triaged elements and the table renditions
pub fn build_document(
    fingerprint: String,
    elements: &[TriagedElement],
    tables: &HashMap<String, String>,
) -> Document {
    let mut builder = OutlineBuilder::default();

    for element in elements {
        match &element.kind {
            ElementKind::Title => {
                if builder.title.is_none() {
                    builder.title = element.text.clone();
                }
            }
            ElementKind::Heading(level) => {
                builder.open_section(*level, element.text.clone(), element.page);
            }
            kind => {
                let text = match kind {
                    ElementKind::Table => table_markdown(element, tables),
                    _ => element.text.clone(),
                };
                if let Some(text) = text {
                    builder.push_paragraph(ParagraphText {
                        text,
                        origin: kind.origin(),
                        aside: element.aside,
                    });
                    builder.record_page(element.page);
                }
            }
        }
    }

    builder.finish(fingerprint)
}

/// Markdown for a table element, preferring the CSV renditions
fn table_markdown(element: &TriagedElement, tables: &HashMap<String, String>) -> Option<String> {
    let renditions: Vec<&str> = element
        .table_paths
        .iter()
        .filter_map(|p| tables.get(p).map(|s| s.as_str()))
        .collect();
    if renditions.is_empty() {
        return element.text.clone();
    }
    Some(renditions.join("\n\n"))
}

#[derive(Default)]
struct OutlineBuilder {
    roots: Vec<Section>,
    stack: Vec<Section>,
    title: Option<String>,
}

impl OutlineBuilder {
    fn open_section(&mut self, level: u8, title: Option<String>, page: Option<u32>) {
        self.close_to_level(level);

        let id = match self.stack.last() {
            Some(parent) => format!("{}.{}", parent.id, parent.subsections.len() + 1),
            None => (self.roots.len() + 1).to_string(),
        };
        let mut section = Section::new(id, title, level);
        if let Some(page) = page {
            section.pages.insert(page);
        }
        self.stack.push(section);
    }

    /// Pop and attach every open section at `level` or deeper
    fn close_to_level(&mut self, level: u8) {
        while self.stack.last().map_or(false, |s| s.level >= level) {
            let section = self.stack.pop().unwrap();
            self.attach(section);
        }
    }

    fn attach(&mut self, section: Section) {
        match self.stack.last_mut() {
            Some(parent) => parent.subsections.push(section),
            None => self.roots.push(section),
        }
    }

    fn push_paragraph(&mut self, paragraph: ParagraphText) {
        if self.stack.is_empty() {
            // Preamble text before any heading gets an untitled section
            self.open_section(1, None, None);
        }
        self.stack
            .last_mut()
            .expect("section opened above")
            .paragraphs
            .push(paragraph);
    }

    fn record_page(&mut self, page: Option<u32>) {
        if let (Some(section), Some(page)) = (self.stack.last_mut(), page) {
            section.pages.insert(page);
        }
    }

    fn finish(mut self, fingerprint: String) -> Document {
        while let Some(section) = self.stack.pop() {
            self.attach(section);
        }
        Document {
            fingerprint,
            title: self.title,
            sections: self.roots,
        }
    }
}
