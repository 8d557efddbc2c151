//! Question answering over an indexed document
//!
//! PDFTriage-style flow: every section gets a short LLM summary at ingestion;
//! a question is answered by showing the model the document's structured
//! metadata, letting it pick sections to fetch, then refining an answer over
//! the fetched section texts. Answers carry the ids of the sections they are
//! grounded in.

pub mod openai;
pub mod prompts;
pub mod triage;

use serde::Serialize;
use thiserror::Error;

/// An answer grounded in document sections
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    /// Ids of the sections the answer is grounded in, document order
    pub cited_sections: Vec<String>,
}

/// Errors produced while answering a question
#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("Document has no extractable sections")]
    EmptyDocument,

    #[error("OPENAI_API_KEY not set")]
    MissingApiKey,

    #[error("LLM vendor error ({status}): {body}")]
    Vendor { status: u16, body: String },

    #[error("LLM request timed out")]
    Timeout,

    #[error("LLM request failed: {0}")]
    Transport(String),

    #[error("Malformed LLM response: {0}")]
    MalformedResponse(String),

    #[error("Model selected no valid sections for this question")]
    NoSectionsSelected,
}
