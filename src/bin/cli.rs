//! doctriage CLI
//!
//! Usage: doctriage-cli <COMMAND>
//!
//! Runs the extraction and question-answering pipeline from the terminal.
//! Supports JSON output for scripting.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use doctriage_lib::document::{Document, Section};
use doctriage_lib::extract::{
    self,
    adobe::{AdobeClient, AdobeConfig},
};
use doctriage_lib::index::IndexedDocument;
use doctriage_lib::qa::{openai::OpenAiClient, triage};
use doctriage_lib::settings;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "doctriage-cli",
    version,
    about = "Ask questions about PDF policy documents with section citations"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a PDF and print its section outline
    Outline {
        /// Path to the PDF
        file: PathBuf,
        /// Print the outline as JSON
        #[arg(long)]
        json: bool,
    },
    /// Extract a PDF and answer one question about it
    Ask {
        /// Path to the PDF
        file: PathBuf,
        /// The question to answer
        question: String,
        /// Print the answer as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show accumulated LLM token usage
    Usage,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    settings::init_default();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Commands::Outline { file, json } => {
            let document = load_document(&file).await?;
            if json {
                let out = serde_json::to_string_pretty(&document)
                    .map_err(|e| format!("Failed to serialize outline: {}", e))?;
                println!("{}", out);
            } else {
                if let Some(title) = &document.title {
                    println!("{}", title);
                }
                if document.is_empty() {
                    println!("(no extractable sections)");
                }
                print_outline(&document.sections, 0);
            }
            Ok(())
        }
        Commands::Ask {
            file,
            question,
            json,
        } => {
            let document = load_document(&file).await?;
            let indexed = IndexedDocument::new(document);
            let client = OpenAiClient::from_settings().map_err(|e| e.to_string())?;
            let triaged = triage::prepare(indexed, &client)
                .await
                .map_err(|e| e.to_string())?;
            let answer = triage::answer(&triaged, &question, &client)
                .await
                .map_err(|e| e.to_string())?;

            if json {
                let sections: Vec<serde_json::Value> = answer
                    .cited_sections
                    .iter()
                    .map(|id| {
                        serde_json::json!({
                            "id": id,
                            "title": triaged.indexed.resolve(id).and_then(|s| s.title_clean()),
                        })
                    })
                    .collect();
                let out = serde_json::json!({ "answer": answer.text, "sections": sections });
                println!("{}", serde_json::to_string_pretty(&out).unwrap_or_default());
            } else {
                println!("{}", answer.text);
                println!();
                println!("Grounded in:");
                for id in &answer.cited_sections {
                    let title = triaged
                        .indexed
                        .resolve(id)
                        .and_then(|s| s.title_clean())
                        .unwrap_or_else(|| "(untitled)".to_string());
                    println!("  {} {}", id, title);
                }
            }
            Ok(())
        }
        Commands::Usage => {
            let usage = settings::usage();
            println!("LLM requests:      {}", usage.requests);
            println!("Prompt tokens:     {}", usage.prompt_tokens);
            println!("Completion tokens: {}", usage.completion_tokens);
            if let Some(at) = &usage.last_request_at {
                println!("Last request:      {}", at);
            }
            Ok(())
        }
        Commands::Completions { shell } => {
            generate(
                shell,
                &mut Cli::command(),
                "doctriage-cli",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}

async fn load_document(file: &Path) -> Result<Document, String> {
    let bytes =
        std::fs::read(file).map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;

    let (client_id, client_secret) = settings::get_adobe_credentials()
        .ok_or("ADOBE_CLIENT_ID / ADOBE_CLIENT_SECRET not set")?;
    let mut config = AdobeConfig::new(client_id, client_secret);
    config.poll_interval = Duration::from_secs(settings::poll_interval_secs());
    config.poll_budget = settings::poll_budget();

    let client = AdobeClient::new(config).map_err(|e| e.to_string())?;
    extract::load_document(&bytes, &client)
        .await
        .map_err(|e| e.to_string())
}

fn print_outline(sections: &[Section], depth: usize) {
    for section in sections {
        let title = section
            .title_clean()
            .unwrap_or_else(|| "(untitled)".to_string());
        let pages = match section.starting_page() {
            Some(page) => format!("  (p. {})", page + 1),
            None => String::new(),
        };
        println!("{}{} {}{}", "  ".repeat(depth), section.id, title, pages);
        print_outline(&section.subsections, depth + 1);
    }
}
