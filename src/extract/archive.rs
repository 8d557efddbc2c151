//! Result-archive handling
//!
//! The Extract job delivers a ZIP with `structuredData.json` at the root and
//! table renditions under `tables/`. Table CSVs are converted to Markdown so
//! the LLM sees them as readable tables.

use super::elements::StructuredData;
use super::ExtractError;
use std::collections::HashMap;
use std::io::{Cursor, Read};

/// Unpacked extraction result
pub struct ExtractResult {
    pub structured: StructuredData,
    /// Archive path (e.g. "tables/fileoutpart0.csv") → Markdown rendition
    pub tables: HashMap<String, String>,
}

/// Open the result ZIP and parse its contents
pub fn read_archive(zip_bytes: &[u8]) -> Result<ExtractResult, ExtractError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(zip_bytes))
        .map_err(|e| ExtractError::Archive(format!("Not a ZIP archive: {}", e)))?;

    let mut structured: Option<StructuredData> = None;
    let mut tables = HashMap::new();

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ExtractError::Archive(format!("Bad archive entry: {}", e)))?;
        let name = entry.name().to_string();

        if name == "structuredData.json" {
            let mut content = String::new();
            entry
                .read_to_string(&mut content)
                .map_err(|e| ExtractError::Archive(format!("Unreadable {}: {}", name, e)))?;
            let data: StructuredData = serde_json::from_str(&content)
                .map_err(|e| ExtractError::Archive(format!("Malformed {}: {}", name, e)))?;
            structured = Some(data);
        } else if name.starts_with("tables/") && name.ends_with(".csv") {
            let mut content = String::new();
            entry
                .read_to_string(&mut content)
                .map_err(|e| ExtractError::Archive(format!("Unreadable {}: {}", name, e)))?;
            match csv_to_markdown(&content) {
                Some(markdown) => {
                    tables.insert(name, markdown);
                }
                None => {
                    eprintln!("[Extract] Skipping empty or malformed table {}", name);
                }
            }
        }
    }

    let structured = structured
        .ok_or_else(|| ExtractError::Archive("Archive has no structuredData.json".to_string()))?;

    Ok(ExtractResult { structured, tables })
}

/// Render a CSV table as a Markdown table; None if there is nothing usable
pub fn csv_to_markdown(csv_text: &str) -> Option<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(csv_text.as_bytes());

    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record.ok()?;
        rows.push(record.iter().map(|f| f.trim().replace('|', "\\|")).collect());
    }
    if rows.is_empty() {
        return None;
    }

    let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    if width == 0 {
        return None;
    }

    let render_row = |row: &[String]| {
        let mut cells: Vec<String> = row.to_vec();
        cells.resize(width, String::new());
        format!("| {} |", cells.join(" | "))
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(render_row(&rows[0]));
    lines.push(format!("|{}|", vec![" --- "; width].join("|")));
    for row in &rows[1..] {
        lines.push(render_row(row));
    }
    Some(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_archive(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            for (name, content) in entries {
                writer
                    .start_file(*name, SimpleFileOptions::default())
                    .unwrap();
                writer.write_all(content.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn test_read_archive_parses_elements_and_tables() {
        let structured = r#"{"elements":[{"Path":"//Document/H1","Text":"Scope","Page":0}]}"#;
        let table = "Year,Budget\n2023,\"1,200\"\n2024,900\n";
        let bytes = build_archive(&[
            ("structuredData.json", structured),
            ("tables/fileoutpart0.csv", table),
        ]);

        let result = read_archive(&bytes).unwrap();
        assert_eq!(result.structured.elements.len(), 1);
        let markdown = result.tables.get("tables/fileoutpart0.csv").unwrap();
        assert!(markdown.starts_with("| Year | Budget |"));
        assert!(markdown.contains("| 2023 | 1,200 |"));
    }

    #[test]
    fn test_read_archive_requires_structured_data() {
        let bytes = build_archive(&[("tables/fileoutpart0.csv", "a,b\n1,2\n")]);
        assert!(matches!(
            read_archive(&bytes),
            Err(ExtractError::Archive(_))
        ));
    }

    #[test]
    fn test_read_archive_rejects_garbage() {
        assert!(matches!(
            read_archive(b"definitely not a zip"),
            Err(ExtractError::Archive(_))
        ));
    }

    #[test]
    fn test_csv_to_markdown_shapes_table() {
        let markdown = csv_to_markdown("Name,Role\nAda,Lead\nGrace,Review\n").unwrap();
        let lines: Vec<&str> = markdown.lines().collect();
        assert_eq!(lines[0], "| Name | Role |");
        assert_eq!(lines[1], "| --- | --- |");
        assert_eq!(lines[2], "| Ada | Lead |");
        assert_eq!(lines[3], "| Grace | Review |");
    }

    #[test]
    fn test_csv_to_markdown_pads_ragged_rows_and_escapes_pipes() {
        let markdown = csv_to_markdown("a|x,b\nonly\n").unwrap();
        assert!(markdown.contains("| a\\|x | b |"));
        assert!(markdown.contains("| only |  |"));
    }

    #[test]
    fn test_csv_to_markdown_empty() {
        assert_eq!(csv_to_markdown(""), None);
    }
}
