//! Raw extraction elements and their triage
//!
//! `structuredData.json` carries one element per text span with a structure
//! path like `//Document/Sect[2]/H1` or `//Document/Table[3]`. The path
//! determines what the element is; headings open sections, everything else
//! becomes paragraph content of the current section.
//!
//! Text cleanup follows the source material: leader runs (3+ dots or
//! underscores) removed, trailing whitespace stripped, purely numeric
//! fragments (page numbers) and empty fragments dropped.

use crate::document::TextOrigin;
use serde::Deserialize;
use std::sync::OnceLock;

/// One element as emitted by the vendor
#[derive(Debug, Clone, Deserialize)]
pub struct RawElement {
    #[serde(rename = "Path", default)]
    pub path: Option<String>,
    #[serde(rename = "Text", default)]
    pub text: Option<String>,
    #[serde(rename = "Page", default)]
    pub page: Option<u32>,
    /// Relative archive paths of table CSVs for Table elements
    #[serde(rename = "filePaths", default)]
    pub file_paths: Vec<String>,
}

/// Top-level shape of structuredData.json
#[derive(Debug, Deserialize)]
pub struct StructuredData {
    #[serde(default)]
    pub elements: Vec<RawElement>,
}

/// What an element is, as decided from its structure path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementKind {
    /// Document title element
    Title,
    /// Heading at the given level (1..=6)
    Heading(u8),
    Paragraph,
    List,
    Table,
    Figure,
    Toc,
}

impl ElementKind {
    pub fn origin(&self) -> TextOrigin {
        match self {
            ElementKind::Toc => TextOrigin::Toc,
            ElementKind::List => TextOrigin::List,
            ElementKind::Table => TextOrigin::Table,
            ElementKind::Figure => TextOrigin::Figure,
            _ => TextOrigin::Paragraph,
        }
    }
}

/// An element after triage, ready for outline assembly
#[derive(Debug, Clone)]
pub struct TriagedElement {
    pub kind: ElementKind,
    pub text: Option<String>,
    pub page: Option<u32>,
    pub aside: bool,
    pub table_paths: Vec<String>,
}

/// Last path segment without its `[n]` index, e.g. `//Document/Sect[2]/H1[3]` → `H1`
fn leaf_tag(path: &str) -> &str {
    let leaf = path.rsplit('/').next().unwrap_or(path);
    match leaf.find('[') {
        Some(idx) => &leaf[..idx],
        None => leaf,
    }
}

/// Classify an element from its structure path
///
/// Containers win over leaves: a `P` nested under a `Table` or `TOC` is table
/// or TOC content, not a free paragraph.
pub fn classify_path(path: &str) -> Option<ElementKind> {
    if path.contains("/Table") {
        return Some(ElementKind::Table);
    }
    if path.contains("/TOC") {
        return Some(ElementKind::Toc);
    }
    if path.contains("/Figure") {
        return Some(ElementKind::Figure);
    }
    if path.contains("/L[") || path.contains("/L/") || path.ends_with("/L") || path.contains("/LI")
    {
        return Some(ElementKind::List);
    }

    match leaf_tag(path) {
        "Title" => Some(ElementKind::Title),
        "P" | "ParagraphSpan" | "Span" | "Sub" => Some(ElementKind::Paragraph),
        "Lbl" | "LBody" => Some(ElementKind::List),
        tag if tag.len() == 2 && tag.starts_with('H') => tag[1..]
            .parse::<u8>()
            .ok()
            .filter(|l| (1..=6).contains(l))
            .map(ElementKind::Heading),
        _ => None,
    }
}

/// Whether the element sits in an aside (next to a table or figure)
pub fn is_aside(path: &str) -> bool {
    path.contains("Aside")
}

/// Clean a raw text fragment; None means the fragment carries no content
pub fn clean_text(raw: &str) -> Option<String> {
    static LEADERS: OnceLock<regex::Regex> = OnceLock::new();
    let re = LEADERS.get_or_init(|| regex::Regex::new(r"(_|\.){3,}").unwrap());

    let cleaned = re.replace_all(raw, "");
    let cleaned = cleaned.trim_end();
    if cleaned.is_empty() {
        return None;
    }
    // Bare numbers are page artifacts
    if cleaned.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(cleaned.to_string())
}

/// Triage every element of a structured-data payload, keeping document order
pub fn triage_elements(data: &StructuredData) -> Vec<TriagedElement> {
    data.elements
        .iter()
        .filter_map(|raw| {
            let path = raw.path.as_deref()?;
            let kind = classify_path(path)?;
            let text = raw.text.as_deref().and_then(clean_text);
            // Tables carry content via file paths; everything else needs text
            if text.is_none() && kind != ElementKind::Table {
                return None;
            }
            Some(TriagedElement {
                aside: is_aside(path),
                kind,
                text,
                page: raw.page,
                table_paths: raw.file_paths.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_path_headings() {
        assert_eq!(
            classify_path("//Document/H1"),
            Some(ElementKind::Heading(1))
        );
        assert_eq!(
            classify_path("//Document/Sect/H2[3]"),
            Some(ElementKind::Heading(2))
        );
        assert_eq!(classify_path("//Document/H7"), None);
    }

    #[test]
    fn test_classify_path_containers_win() {
        assert_eq!(
            classify_path("//Document/Table[2]/TR/TD/P"),
            Some(ElementKind::Table)
        );
        assert_eq!(
            classify_path("//Document/TOC/TOCI/P"),
            Some(ElementKind::Toc)
        );
        assert_eq!(
            classify_path("//Document/Figure[1]"),
            Some(ElementKind::Figure)
        );
    }

    #[test]
    fn test_classify_path_lists_and_paragraphs() {
        assert_eq!(classify_path("//Document/Sect/P[4]"), Some(ElementKind::Paragraph));
        assert_eq!(classify_path("//Document/L[1]/LI/LBody"), Some(ElementKind::List));
        assert_eq!(classify_path("//Document/Title"), Some(ElementKind::Title));
        assert_eq!(classify_path("//Document/Artifact"), None);
    }

    #[test]
    fn test_is_aside() {
        assert!(is_aside("//Document/Aside/P"));
        assert!(!is_aside("//Document/Sect/P"));
    }

    #[test]
    fn test_clean_text_removes_leaders() {
        assert_eq!(
            clean_text("Scope ........ 12"),
            Some("Scope  12".to_string())
        );
        assert_eq!(clean_text("Name ___________"), Some("Name".to_string()));
    }

    #[test]
    fn test_clean_text_drops_page_numbers_and_empty() {
        assert_eq!(clean_text("42"), None);
        assert_eq!(clean_text(""), None);
        assert_eq!(clean_text("   \n"), None);
        assert_eq!(clean_text("........."), None);
    }

    #[test]
    fn test_clean_text_keeps_trailing_strip() {
        assert_eq!(clean_text("Hello world.  \n"), Some("Hello world.".to_string()));
    }

    #[test]
    fn test_triage_elements_keeps_order_and_drops_noise() {
        let data: StructuredData = serde_json::from_str(
            r#"{"elements":[
                {"Path":"//Document/H1","Text":"Introduction","Page":0},
                {"Path":"//Document/P","Text":"First paragraph.","Page":0},
                {"Path":"//Document/P","Text":"17","Page":0},
                {"Path":"//Document/Table[1]","filePaths":["tables/fileoutpart0.csv"],"Page":1},
                {"Path":"//Document/Artifact","Text":"header artifact","Page":1}
            ]}"#,
        )
        .unwrap();

        let triaged = triage_elements(&data);
        assert_eq!(triaged.len(), 3);
        assert_eq!(triaged[0].kind, ElementKind::Heading(1));
        assert_eq!(triaged[1].text.as_deref(), Some("First paragraph."));
        assert_eq!(triaged[2].kind, ElementKind::Table);
        assert_eq!(triaged[2].table_paths, vec!["tables/fileoutpart0.csv"]);
    }
}
