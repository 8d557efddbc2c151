//! Prompt templates for the triage flow
//!
//! Three prompts: per-section summary, section selection (with the
//! fetch_sections tool), and answer refinement. All instruct the model to
//! return raw JSON so parsing stays mechanical.

/// Prompt for summarizing one section
pub fn summary_prompt(section_title: &str, section_text: &str) -> String {
    format!(
        r#"Summarize this section of a policy document in 1-3 sentences.
Keep concrete obligations, amounts, dates, and named parties.

SECTION TITLE: {section_title}

SECTION TEXT:
{section_text}

Return ONLY raw JSON, no markdown:
{{"summary": "..."}}"#,
    )
}

/// System prompt for the section-selection call
pub fn selection_system_prompt() -> String {
    "You answer questions about a policy document. You see the document's \
section outline with per-section summaries. Call fetch_sections with the \
exact id(s) of the section(s) most likely to contain the answer. Use the ids \
exactly as given in the outline. Prefer few, specific sections."
        .to_string()
}

/// User prompt carrying the document metadata and the question
pub fn selection_prompt(metadata_json: &str, question: &str) -> String {
    format!(
        r#"DOCUMENT OUTLINE (ids, titles, pages, summaries):
{metadata_json}

QUESTION: {question}

Call fetch_sections with the section id(s) to read in full."#,
    )
}

/// Tool definition for fetch_sections (OpenAI function calling)
pub fn fetch_sections_tool() -> serde_json::Value {
    serde_json::json!([{
        "type": "function",
        "function": {
            "name": "fetch_sections",
            "description": "Fetches an entire section or sections from the document that might contain an answer to the question",
            "parameters": {
                "type": "object",
                "properties": {
                    "reasoning": {
                        "type": "string",
                        "description": "Why these sections were selected"
                    },
                    "section_ids": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "The exact id(s) of the section(s) to fetch"
                    }
                },
                "required": ["section_ids"]
            }
        }
    }])
}

/// Prompt for one step of the refine loop
pub fn refine_prompt(refine_state_json: &str, section_json: &str, question: &str) -> String {
    format!(
        r#"You are refining an answer to a question about a policy document,
one section at a time.

QUESTION: {question}

CURRENT STATE (intermediate answer and the section ids it is grounded in):
{refine_state_json}

NEW SECTION (title, id, full text):
{section_json}

Refine the intermediate answer with anything relevant from the new section.
If the section adds nothing, keep the answer and its section ids unchanged.
If the section was used, add its id to section_ids.

Return ONLY raw JSON, no markdown:
{{"intermediate_answer": "...", "section_ids": ["..."]}}"#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_prompt_carries_section() {
        let prompt = summary_prompt("Methodology", "Surveys were conducted.");
        assert!(prompt.contains("Methodology"));
        assert!(prompt.contains("Surveys were conducted."));
        assert!(prompt.contains(r#"{"summary": "..."}"#));
    }

    #[test]
    fn test_fetch_sections_tool_shape() {
        let tools = fetch_sections_tool();
        assert_eq!(tools[0]["function"]["name"], "fetch_sections");
        let required = &tools[0]["function"]["parameters"]["required"];
        assert_eq!(required[0], "section_ids");
    }

    #[test]
    fn test_refine_prompt_carries_state_and_question() {
        let prompt = refine_prompt(
            r#"{"intermediate_answer":"","section_ids":[]}"#,
            r#"{"id":"2","title":"Methodology"}"#,
            "What methodology was used?",
        );
        assert!(prompt.contains("What methodology was used?"));
        assert!(prompt.contains(r#""id":"2""#));
        assert!(prompt.contains("intermediate_answer"));
    }
}
