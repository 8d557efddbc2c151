//! PDF structuring via the Adobe PDF Services Extract API
//!
//! The vendor takes a PDF and returns a ZIP archive containing
//! `structuredData.json` (one element per text span, with a structure path
//! and page number) plus `tables/*.csv`. This module drives the vendor job,
//! unpacks the archive, triages the raw elements, and assembles the Section
//! tree.
//!
//! Pipeline: adobe (network) → archive (zip/csv) → elements (triage) →
//! outline (tree).

pub mod adobe;
pub mod archive;
pub mod elements;
pub mod outline;

use crate::document::{fingerprint_bytes, Document};
use thiserror::Error;

/// Errors produced while structuring a PDF
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Input is not a PDF (missing %PDF header)")]
    NotAPdf,

    #[error("PDF too large: {0} MB (limit {1} MB)")]
    TooLarge(usize, usize),

    #[error("Extraction vendor rejected credentials: {0}")]
    Auth(String),

    #[error("Extraction vendor error ({status}): {body}")]
    Vendor { status: u16, body: String },

    #[error("Extraction request failed: {0}")]
    Transport(String),

    #[error("Extraction job failed: {0}")]
    JobFailed(String),

    #[error("Extraction job did not finish within the poll budget")]
    PollBudgetExhausted,

    #[error("Malformed extraction result: {0}")]
    Archive(String),
}

/// Run the full extraction pipeline: vendor job, archive, section tree
pub async fn load_document(
    pdf_bytes: &[u8],
    client: &adobe::AdobeClient,
) -> Result<Document, ExtractError> {
    let fingerprint = fingerprint_bytes(pdf_bytes);
    println!(
        "[Extract] Submitting PDF {} ({} KB) to vendor",
        fingerprint,
        pdf_bytes.len() / 1024
    );

    let zip_bytes = client.extract(pdf_bytes).await?;
    let result = archive::read_archive(&zip_bytes)?;
    let triaged = elements::triage_elements(&result.structured);
    let document = outline::build_document(fingerprint, &triaged, &result.tables);

    println!(
        "[Extract] Document {} structured: {} sections",
        document.fingerprint,
        document.section_count()
    );
    Ok(document)
}
