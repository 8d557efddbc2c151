//! doctriage server entrypoint
//!
//! Loads .env and settings, then serves the local web GUI. Vendor credentials
//! come from the environment (ADOBE_CLIENT_ID, ADOBE_CLIENT_SECRET,
//! OPENAI_API_KEY) or the settings file.

use doctriage_lib::{http_server, settings, store::DocumentStore};
use std::sync::Arc;

fn main() {
    dotenvy::dotenv().ok();
    settings::init_default();

    if !settings::has_adobe_credentials() {
        eprintln!("[Main] ADOBE_CLIENT_ID / ADOBE_CLIENT_SECRET not set; uploads will fail");
    }
    if !settings::has_openai_api_key() {
        eprintln!("[Main] OPENAI_API_KEY not set; questions will fail");
    }

    let runtime = tokio::runtime::Runtime::new().expect("Failed to start async runtime");
    let store = Arc::new(DocumentStore::new());

    let port = std::env::var("DOCTRIAGE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(http_server::DEFAULT_PORT);

    if let Err(e) = http_server::run(store, runtime.handle().clone(), port) {
        eprintln!("[Main] {}", e);
        std::process::exit(1);
    }
}
