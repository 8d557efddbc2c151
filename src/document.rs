//! Document model for extracted PDFs
//!
//! A Document is the root of an ordered tree of Sections, as detected by the
//! extraction vendor from heading structure (H1..H6). Section ids are dotted
//! outline numbers ("1", "1.2", "1.2.3") assigned in document order; answers
//! cite these ids.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Where a piece of text came from in the source PDF
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TextOrigin {
    /// Table of contents
    Toc,
    /// Regular paragraph
    Paragraph,
    /// Item inside a list
    List,
    /// Table (stored as Markdown)
    Table,
    /// Figure caption or text inside a figure
    Figure,
}

/// A paragraph of extracted text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParagraphText {
    pub text: String,
    pub origin: TextOrigin,
    /// Element sat next to a table or figure
    #[serde(default)]
    pub aside: bool,
}

/// A citable section of the document
///
/// Sections nest: an H2 under an H1 becomes a subsection. Paragraphs and
/// subsections keep document order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    /// Dotted outline id, e.g. "1.2.1"
    pub id: String,
    pub title: Option<String>,
    /// Heading level that opened this section (1..=6)
    pub level: u8,
    /// Pages the section spans (0-indexed, as reported by the vendor)
    pub pages: BTreeSet<u32>,
    pub paragraphs: Vec<ParagraphText>,
    pub subsections: Vec<Section>,
}

impl Section {
    pub fn new(id: String, title: Option<String>, level: u8) -> Self {
        Self {
            id,
            title,
            level,
            pages: BTreeSet::new(),
            paragraphs: Vec::new(),
            subsections: Vec::new(),
        }
    }

    /// First page the section appears on, if known
    pub fn starting_page(&self) -> Option<u32> {
        self.pages.iter().next().copied()
    }

    /// Title without a leading outline-number prefix ("1.2.3 Scope" → "Scope")
    pub fn title_clean(&self) -> Option<String> {
        static NUMBERING: OnceLock<regex::Regex> = OnceLock::new();
        let re = NUMBERING.get_or_init(|| regex::Regex::new(r"^(\d+\.?)+").unwrap());
        self.title
            .as_deref()
            .map(|t| re.replace(t, "").trim_start().to_string())
    }

    /// Text of this section's own paragraphs (subsections excluded)
    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Text of this section including all nested subsections, document order
    pub fn deep_text(&self) -> String {
        let mut parts = Vec::new();
        self.collect_text(&mut parts);
        parts.join("\n\n")
    }

    fn collect_text(&self, out: &mut Vec<String>) {
        let own = self.text();
        if !own.is_empty() {
            out.push(own);
        }
        for sub in &self.subsections {
            if let Some(title) = &sub.title {
                out.push(format!("## {}", title));
            }
            sub.collect_text(out);
        }
    }
}

/// The root of a tree of Sections, produced once per PDF upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// SHA-256 of the source PDF bytes (hex, truncated); stable document id
    pub fingerprint: String,
    /// Document title, when the vendor reports one
    pub title: Option<String>,
    pub sections: Vec<Section>,
}

impl Document {
    /// Total number of sections, all nesting levels included
    pub fn section_count(&self) -> usize {
        fn count(sections: &[Section]) -> usize {
            sections.len() + sections.iter().map(|s| count(&s.subsections)).sum::<usize>()
        }
        count(&self.sections)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Fingerprint PDF bytes into a short stable hex id
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..8])
}
