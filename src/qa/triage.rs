//! PDFTriage flow: summarize, select, refine
//!
//! Ingestion summarizes every non-empty section once. A question is answered
//! in two phases: a selection call where the model sees the document outline
//! (with summaries) and picks sections via the fetch_sections tool, then a
//! refine loop folding each fetched section's full text into the answer.
//! Section ids the model invents are dropped before the Answer is returned.

use super::openai::{extract_json_object, ChatOutcome, Message, OpenAiClient};
use super::{prompts, Answer, AnswerError};
use crate::document::Section;
use crate::index::{IndexedDocument, SectionIndex};
use futures::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

const SUMMARY_CONCURRENCY: usize = 4;
const SUMMARY_MAX_TOKENS: u32 = 300;
const SELECTION_MAX_TOKENS: u32 = 700;
const REFINE_MAX_TOKENS: u32 = 900;

/// An indexed document with its per-section summaries; ready for questions
pub struct TriagedDocument {
    pub indexed: IndexedDocument,
    /// Section id → summary; None for sections with no own text
    pub summaries: HashMap<String, Option<String>>,
}

/// Summarize every non-empty section of an indexed document
pub async fn prepare(
    indexed: IndexedDocument,
    client: &OpenAiClient,
) -> Result<TriagedDocument, AnswerError> {
    let mut summaries: HashMap<String, Option<String>> = HashMap::new();
    let mut jobs = Vec::new();

    for id in indexed.index.ids() {
        let section = indexed.resolve(id).expect("indexed id resolves");
        let text = section.text();
        if text.trim().is_empty() {
            summaries.insert(id.clone(), None);
        } else {
            let title = section.title_clean().unwrap_or_default();
            jobs.push((id.clone(), title, text));
        }
    }

    if !jobs.is_empty() {
        println!("[QA] Summarizing {} sections", jobs.len());
    }

    let results: Vec<(String, Result<String, AnswerError>)> = stream::iter(jobs)
        .map(|(id, title, text)| async move {
            let result = summarize_section(client, &title, &text).await;
            (id, result)
        })
        .buffer_unordered(SUMMARY_CONCURRENCY)
        .collect()
        .await;

    for (id, result) in results {
        summaries.insert(id, Some(result?));
    }

    Ok(TriagedDocument { indexed, summaries })
}

async fn summarize_section(
    client: &OpenAiClient,
    title: &str,
    text: &str,
) -> Result<String, AnswerError> {
    let prompt = prompts::summary_prompt(title, text);
    let outcome = client
        .chat(&[Message::user(prompt)], None, SUMMARY_MAX_TOKENS)
        .await?;

    let raw = match outcome {
        ChatOutcome::Text(t) => t,
        ChatOutcome::ToolCall { name, .. } => {
            return Err(AnswerError::MalformedResponse(format!(
                "Unexpected tool call in summary step: {}",
                name
            )))
        }
    };

    #[derive(Deserialize)]
    struct SummaryOut {
        #[serde(default)]
        summary: Option<String>,
    }

    // Models occasionally answer in prose; the prose is the summary then
    match extract_json_object(&raw)
        .ok()
        .and_then(|json| serde_json::from_str::<SummaryOut>(&json).ok())
        .and_then(|out| out.summary)
    {
        Some(summary) => Ok(summary),
        None => Ok(raw.trim().to_string()),
    }
}

/// Answer a question against a triaged document
pub async fn answer(
    doc: &TriagedDocument,
    question: &str,
    client: &OpenAiClient,
) -> Result<Answer, AnswerError> {
    if doc.indexed.document.is_empty() {
        return Err(AnswerError::EmptyDocument);
    }

    // Phase 1: let the model pick sections from the outline
    let metadata = structured_metadata(doc);
    let metadata_json = serde_json::to_string_pretty(&metadata)
        .map_err(|e| AnswerError::MalformedResponse(format!("Metadata serialization: {}", e)))?;
    let messages = [
        Message::system(prompts::selection_system_prompt()),
        Message::user(prompts::selection_prompt(&metadata_json, question)),
    ];
    let tools = prompts::fetch_sections_tool();
    let outcome = client
        .chat(&messages, Some(&tools), SELECTION_MAX_TOKENS)
        .await?;

    let args = match outcome {
        ChatOutcome::ToolCall { name, arguments } if name == "fetch_sections" => {
            parse_fetch_args(&arguments)?
        }
        ChatOutcome::ToolCall { name, .. } => {
            return Err(AnswerError::MalformedResponse(format!(
                "Unexpected tool call: {}",
                name
            )))
        }
        // Some models skip the tool and emit the arguments as JSON text
        ChatOutcome::Text(text) => parse_fetch_args(&text)?,
    };

    if let Some(reasoning) = &args.reasoning {
        println!("[QA] Section selection: {}", reasoning);
    }

    let selected = validate_citations(&doc.indexed.index, &args.section_ids);
    if selected.is_empty() {
        return Err(AnswerError::NoSectionsSelected);
    }
    println!("[QA] Fetching sections: {}", selected.join(", "));

    // Phase 2: refine an answer over the fetched sections
    let mut state = RefineState::default();
    for id in &selected {
        let section = doc.indexed.resolve(id).expect("validated id resolves");
        let state_json = serde_json::to_string(&state)
            .map_err(|e| AnswerError::MalformedResponse(format!("State serialization: {}", e)))?;
        let prompt = prompts::refine_prompt(&state_json, &section_payload(id, section), question);

        let outcome = client
            .chat(&[Message::user(prompt)], None, REFINE_MAX_TOKENS)
            .await?;
        let text = match outcome {
            ChatOutcome::Text(t) => t,
            ChatOutcome::ToolCall { name, .. } => {
                return Err(AnswerError::MalformedResponse(format!(
                    "Unexpected tool call in refine step: {}",
                    name
                )))
            }
        };
        state = parse_refine_state(&text)?;
    }

    if state.intermediate_answer.trim().is_empty() {
        return Err(AnswerError::MalformedResponse(
            "Model produced an empty answer".to_string(),
        ));
    }

    let mut cited = validate_citations(&doc.indexed.index, &state.section_ids);
    if cited.is_empty() {
        // The refine loop only ever saw the selected sections
        cited = selected;
    }

    Ok(Answer {
        text: state.intermediate_answer,
        cited_sections: cited,
    })
}

/// Structured metadata shown to the model in the selection call
pub fn structured_metadata(doc: &TriagedDocument) -> serde_json::Value {
    fn section_value(
        section: &Section,
        summaries: &HashMap<String, Option<String>>,
    ) -> serde_json::Value {
        let mut value = serde_json::json!({
            "id": section.id,
            "title": section.title_clean(),
            "pages": section.pages.iter().collect::<Vec<_>>(),
        });
        if let Some(Some(summary)) = summaries.get(&section.id) {
            value["summary"] = serde_json::json!(summary);
        }
        let subsections: Vec<serde_json::Value> = section
            .subsections
            .iter()
            .map(|s| section_value(s, summaries))
            .collect();
        if !subsections.is_empty() {
            value["sections"] = serde_json::json!(subsections);
        }
        value
    }

    let sections: Vec<serde_json::Value> = doc
        .indexed
        .document
        .sections
        .iter()
        .map(|s| section_value(s, &doc.summaries))
        .collect();

    serde_json::json!({
        "document": {
            "title": doc.indexed.document.title,
            "sections": sections,
        }
    })
}

fn section_payload(id: &str, section: &Section) -> String {
    serde_json::json!({
        "id": id,
        "title": section.title_clean(),
        "text": section.deep_text(),
    })
    .to_string()
}

#[derive(Debug, Deserialize)]
struct FetchArgs {
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    section_ids: Vec<String>,
}

fn parse_fetch_args(raw: &str) -> Result<FetchArgs, AnswerError> {
    let json = extract_json_object(raw)?;
    serde_json::from_str(&json)
        .map_err(|e| AnswerError::MalformedResponse(format!("Bad fetch_sections arguments: {}", e)))
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RefineState {
    #[serde(default)]
    intermediate_answer: String,
    #[serde(default)]
    section_ids: Vec<String>,
}

fn parse_refine_state(raw: &str) -> Result<RefineState, AnswerError> {
    let json = extract_json_object(raw)?;
    serde_json::from_str(&json)
        .map_err(|e| AnswerError::MalformedResponse(format!("Bad refine output: {}", e)))
}

/// Keep only ids that exist in the index, deduped, in document order
fn validate_citations(index: &SectionIndex, ids: &[String]) -> Vec<String> {
    let requested: HashSet<&str> = ids.iter().map(|s| s.as_str()).collect();
    let valid: Vec<String> = index
        .ids()
        .iter()
        .filter(|id| requested.contains(id.as_str()))
        .cloned()
        .collect();

    let dropped = requested.len() - valid.len();
    if dropped > 0 {
        eprintln!("[QA] Dropped {} unknown section id(s) from model output", dropped);
    }
    valid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, ParagraphText, TextOrigin};

    fn three_section_document() -> Document {
        let titles = ["Introduction", "Methodology", "Conclusion"];
        let texts = [
            "This report describes the annual compliance review.",
            "Quarterly staff surveys and audit sampling were used.",
            "Compliance improved across all departments.",
        ];
        let sections = titles
            .iter()
            .zip(texts.iter())
            .enumerate()
            .map(|(i, (title, text))| {
                let mut s = Section::new((i + 1).to_string(), Some(title.to_string()), 1);
                s.paragraphs.push(ParagraphText {
                    text: text.to_string(),
                    origin: TextOrigin::Paragraph,
                    aside: false,
                });
                s
            })
            .collect();
        Document {
            fingerprint: "fp".to_string(),
            title: Some("Compliance Review".to_string()),
            sections,
        }
    }

    fn triaged(document: Document) -> TriagedDocument {
        let indexed = IndexedDocument::new(document);
        let summaries = indexed
            .index
            .ids()
            .iter()
            .map(|id| (id.clone(), Some(format!("Summary of {}", id))))
            .collect();
        TriagedDocument { indexed, summaries }
    }

    fn dummy_client() -> OpenAiClient {
        OpenAiClient::new("sk-test".to_string(), "gpt-4o".to_string()).unwrap()
    }

    #[test]
    fn test_parse_fetch_args() {
        let args =
            parse_fetch_args(r#"{"reasoning":"methodology lives in 2","section_ids":["2"]}"#)
                .unwrap();
        assert_eq!(args.section_ids, vec!["2"]);
        assert!(args.reasoning.unwrap().contains("methodology"));
    }

    #[test]
    fn test_parse_fetch_args_fenced_and_minimal() {
        let args = parse_fetch_args("```json\n{\"section_ids\": [\"1\", \"3\"]}\n```").unwrap();
        assert_eq!(args.section_ids, vec!["1", "3"]);
        assert!(args.reasoning.is_none());
    }

    #[test]
    fn test_parse_fetch_args_rejects_garbage() {
        assert!(parse_fetch_args("I could not decide").is_err());
    }

    #[test]
    fn test_validate_citations_drops_unknown_and_orders() {
        let doc = triaged(three_section_document());
        let ids = vec![
            "3".to_string(),
            "9".to_string(),
            "1".to_string(),
            "1".to_string(),
        ];
        assert_eq!(
            validate_citations(&doc.indexed.index, &ids),
            vec!["1".to_string(), "3".to_string()]
        );
    }

    #[test]
    fn test_validate_citations_scenario_keeps_methodology() {
        let doc = triaged(three_section_document());
        let ids = vec!["2".to_string(), "intro".to_string()];
        assert_eq!(
            validate_citations(&doc.indexed.index, &ids),
            vec!["2".to_string()]
        );
        assert_eq!(
            doc.indexed.resolve("2").unwrap().text(),
            "Quarterly staff surveys and audit sampling were used."
        );
    }

    #[test]
    fn test_structured_metadata_shape() {
        let doc = triaged(three_section_document());
        let metadata = structured_metadata(&doc);
        let sections = metadata["document"]["sections"].as_array().unwrap();
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[1]["id"], "2");
        assert_eq!(sections[1]["title"], "Methodology");
        assert_eq!(sections[1]["summary"], "Summary of 2");
        assert_eq!(metadata["document"]["title"], "Compliance Review");
    }

    #[test]
    fn test_structured_metadata_omits_missing_summary() {
        let indexed = IndexedDocument::new(three_section_document());
        let doc = TriagedDocument {
            indexed,
            summaries: HashMap::new(),
        };
        let metadata = structured_metadata(&doc);
        assert!(metadata["document"]["sections"][0].get("summary").is_none());
    }

    #[test]
    fn test_parse_refine_state_defaults() {
        let state = parse_refine_state(r#"{"intermediate_answer":"Surveys were used."}"#).unwrap();
        assert_eq!(state.intermediate_answer, "Surveys were used.");
        assert!(state.section_ids.is_empty());
    }

    #[tokio::test]
    async fn test_answer_rejects_empty_document() {
        let doc = triaged(Document {
            fingerprint: "fp".to_string(),
            title: None,
            sections: vec![],
        });
        let result = answer(&doc, "anything?", &dummy_client()).await;
        assert!(matches!(result, Err(AnswerError::EmptyDocument)));
    }

    #[tokio::test]
    async fn test_prepare_empty_document_makes_no_calls() {
        let indexed = IndexedDocument::new(Document {
            fingerprint: "fp".to_string(),
            title: None,
            sections: vec![],
        });
        let doc = prepare(indexed, &dummy_client()).await.unwrap();
        assert!(doc.summaries.is_empty());
    }
}
