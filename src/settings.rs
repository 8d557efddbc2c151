//! Application settings storage
//!
//! Stores configuration and token-usage stats in a JSON file in the platform
//! config directory. The three vendor credentials are read from the
//! environment first (ADOBE_CLIENT_ID, ADOBE_CLIENT_SECRET, OPENAI_API_KEY),
//! falling back to the stored settings.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

/// Global settings instance
static SETTINGS: RwLock<Option<Settings>> = RwLock::new(None);

/// Path to config file (set during init)
static CONFIG_PATH: RwLock<Option<PathBuf>> = RwLock::new(None);

/// Accumulated LLM token usage across sessions
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UsageStats {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub requests: u64,
    /// RFC 3339 timestamp of the most recent LLM round-trip
    #[serde(default)]
    pub last_request_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub adobe_client_id: Option<String>,
    #[serde(default)]
    pub adobe_client_secret: Option<String>,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    /// Chat model used for triage and answering
    #[serde(default = "default_model")]
    pub model: String,
    /// Seconds between extract-job polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Maximum extract-job polls before giving up
    #[serde(default = "default_poll_budget")]
    pub poll_budget: u32,
    #[serde(default)]
    pub usage: UsageStats,
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_poll_interval() -> u64 {
    2
}

fn default_poll_budget() -> u32 {
    60
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            adobe_client_id: None,
            adobe_client_secret: None,
            openai_api_key: None,
            model: default_model(),
            poll_interval_secs: default_poll_interval(),
            poll_budget: default_poll_budget(),
            usage: UsageStats::default(),
        }
    }
}

impl Settings {
    /// Load settings from disk or create default
    fn load(path: &PathBuf) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
                Err(_) => Settings::default(),
            }
        } else {
            Settings::default()
        }
    }

    /// Save settings to disk
    fn save(&self, path: &PathBuf) -> Result<(), String> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(path, content).map_err(|e| format!("Failed to write settings: {}", e))?;
        Ok(())
    }
}

/// Initialize settings from a specific config directory
pub fn init(config_dir: PathBuf) {
    let path = config_dir.join("settings.json");
    let settings = Settings::load(&path);
    *CONFIG_PATH.write().unwrap() = Some(path);
    *SETTINGS.write().unwrap() = Some(settings);
}

/// Initialize settings from the platform config directory
pub fn init_default() {
    let dir = dirs::config_dir()
        .map(|p| p.join("doctriage"))
        .unwrap_or_else(|| PathBuf::from(".doctriage"));
    init(dir);
}

fn with_settings<T>(f: impl FnOnce(&Settings) -> T) -> T {
    let guard = SETTINGS.read().unwrap();
    match guard.as_ref() {
        Some(settings) => f(settings),
        None => f(&Settings::default()),
    }
}

fn update_settings(f: impl FnOnce(&mut Settings)) -> Result<(), String> {
    let mut guard = SETTINGS.write().unwrap();
    let settings = guard.get_or_insert_with(Settings::default);
    f(settings);
    if let Some(path) = CONFIG_PATH.read().unwrap().as_ref() {
        settings.save(path)?;
    }
    Ok(())
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Extraction credentials: env vars first, then stored settings
pub fn get_adobe_credentials() -> Option<(String, String)> {
    let id = env_non_empty("ADOBE_CLIENT_ID")
        .or_else(|| with_settings(|s| s.adobe_client_id.clone()))?;
    let secret = env_non_empty("ADOBE_CLIENT_SECRET")
        .or_else(|| with_settings(|s| s.adobe_client_secret.clone()))?;
    Some((id, secret))
}

/// LLM API key: env var first, then stored setting
pub fn get_openai_api_key() -> Option<String> {
    env_non_empty("OPENAI_API_KEY").or_else(|| with_settings(|s| s.openai_api_key.clone()))
}

pub fn has_adobe_credentials() -> bool {
    get_adobe_credentials().is_some()
}

pub fn has_openai_api_key() -> bool {
    get_openai_api_key().is_some()
}

pub fn model() -> String {
    with_settings(|s| s.model.clone())
}

pub fn poll_interval_secs() -> u64 {
    with_settings(|s| s.poll_interval_secs)
}

pub fn poll_budget() -> u32 {
    with_settings(|s| s.poll_budget)
}

/// Record one LLM round-trip's token usage
pub fn add_openai_usage(prompt_tokens: u64, completion_tokens: u64) -> Result<(), String> {
    update_settings(|s| {
        s.usage.prompt_tokens += prompt_tokens;
        s.usage.completion_tokens += completion_tokens;
        s.usage.requests += 1;
        s.usage.last_request_at = Some(chrono::Utc::now().to_rfc3339());
    })
}

pub fn usage() -> UsageStats {
    with_settings(|s| s.usage.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut settings = Settings::default();
        settings.openai_api_key = Some("sk-test".to_string());
        settings.usage.prompt_tokens = 120;
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path);
        assert_eq!(loaded.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(loaded.usage.prompt_tokens, 120);
        assert_eq!(loaded.model, "gpt-4o");
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("absent.json"));
        assert!(settings.openai_api_key.is_none());
        assert_eq!(settings.poll_budget, 60);
    }

    #[test]
    fn test_load_tolerates_unknown_and_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"model":"gpt-4o-mini","future_field":true}"#).unwrap();
        let settings = Settings::load(&path);
        assert_eq!(settings.model, "gpt-4o-mini");
        assert_eq!(settings.poll_interval_secs, 2);
    }
}
