//! OpenAI chat-completions client
//!
//! One request shape for the whole triage flow: optional tool definitions,
//! plain text or tool-call responses. Token usage is folded into settings
//! after every round-trip.

use super::AnswerError;
use crate::settings;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Chat message
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// What the model came back with
#[derive(Debug, Clone)]
pub enum ChatOutcome {
    Text(String),
    ToolCall { name: String, arguments: String },
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a serde_json::Value>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Deserialize)]
struct FunctionCall {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Chat client bound to one API key and model
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, model: String) -> Result<Self, AnswerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| AnswerError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key,
            model,
        })
    }

    /// Build a client from settings; fails when no API key is configured
    pub fn from_settings() -> Result<Self, AnswerError> {
        let api_key = settings::get_openai_api_key().ok_or(AnswerError::MissingApiKey)?;
        Self::new(api_key, settings::model())
    }

    /// One chat round-trip; retries once on 429/5xx
    pub async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&serde_json::Value>,
        max_tokens: u32,
    ) -> Result<ChatOutcome, AnswerError> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            max_tokens,
            temperature: 0.1,
            tools,
        };

        let mut response = None;
        for attempt in 0..2 {
            let result = self
                .client
                .post(OPENAI_API_URL)
                .bearer_auth(&self.api_key)
                .header("Content-Type", "application/json")
                .json(&request)
                .send()
                .await;

            match result {
                Ok(r) if r.status().as_u16() == 429 || r.status().is_server_error() => {
                    if attempt == 0 {
                        eprintln!("[QA] Vendor returned {}, retrying once", r.status());
                        tokio::time::sleep(Duration::from_secs(2)).await;
                        continue;
                    }
                    let status = r.status();
                    let body = r.text().await.unwrap_or_default();
                    return Err(AnswerError::Vendor {
                        status: status.as_u16(),
                        body,
                    });
                }
                Ok(r) => {
                    response = Some(r);
                    break;
                }
                Err(e) if e.is_timeout() => return Err(AnswerError::Timeout),
                Err(e) => return Err(AnswerError::Transport(e.to_string())),
            }
        }
        let response = response.expect("loop either set a response or returned");

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AnswerError::Vendor {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AnswerError::MalformedResponse(format!("Invalid response JSON: {}", e)))?;

        if let Some(usage) = &parsed.usage {
            let _ = settings::add_openai_usage(usage.prompt_tokens, usage.completion_tokens);
        }

        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| AnswerError::MalformedResponse("No choices in response".to_string()))?;

        if let Some(call) = message.tool_calls.and_then(|mut calls| {
            if calls.is_empty() {
                None
            } else {
                Some(calls.remove(0))
            }
        }) {
            return Ok(ChatOutcome::ToolCall {
                name: call.function.name,
                arguments: call.function.arguments,
            });
        }

        match message.content {
            Some(text) if !text.trim().is_empty() => Ok(ChatOutcome::Text(text)),
            _ => Err(AnswerError::MalformedResponse(
                "Response had neither content nor tool call".to_string(),
            )),
        }
    }
}

/// Extract the first JSON object from model output, tolerating markdown fences
pub fn extract_json_object(text: &str) -> Result<String, AnswerError> {
    let stripped = if text.trim_start().starts_with("```") {
        text.lines()
            .skip(1)
            .take_while(|l| !l.starts_with("```"))
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        text.to_string()
    };

    let start = stripped.find('{');
    let end = stripped.rfind('}');
    match (start, end) {
        (Some(s), Some(e)) if s < e => Ok(stripped[s..=e].to_string()),
        _ => {
            // Find a safe char boundary for the preview
            let mut end = text.len().min(200);
            while end > 0 && !text.is_char_boundary(end) {
                end -= 1;
            }
            Err(AnswerError::MalformedResponse(format!(
                "No JSON object in model output: {}",
                &text[..end]
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_response_parses_text_content() {
        let json = r#"{
            "choices": [{"message": {"content": "The policy covers retention."}}],
            "usage": {"prompt_tokens": 100, "completion_tokens": 20}
        }"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("The policy covers retention.")
        );
        assert_eq!(parsed.usage.as_ref().unwrap().prompt_tokens, 100);
    }

    #[test]
    fn test_chat_response_parses_tool_call() {
        let json = r#"{
            "choices": [{"message": {
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "fetch_sections", "arguments": "{\"section_ids\":[\"2\"]}"}
                }]
            }}]
        }"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        let calls = parsed.choices[0].message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "fetch_sections");
        assert!(calls[0].function.arguments.contains("section_ids"));
    }

    #[test]
    fn test_extract_json_object_plain() {
        let json = extract_json_object(r#"{"answer": "yes"}"#).unwrap();
        assert_eq!(json, r#"{"answer": "yes"}"#);
    }

    #[test]
    fn test_extract_json_object_fenced() {
        let text = "```json\n{\"answer\": \"yes\"}\n```";
        assert_eq!(extract_json_object(text).unwrap(), r#"{"answer": "yes"}"#);
    }

    #[test]
    fn test_extract_json_object_with_prose() {
        let text = "Here is the result: {\"answer\": \"yes\"} hope that helps";
        assert_eq!(extract_json_object(text).unwrap(), r#"{"answer": "yes"}"#);
    }

    #[test]
    fn test_extract_json_object_missing() {
        assert!(extract_json_object("no json here").is_err());
    }

    #[test]
    fn test_request_skips_tools_when_absent() {
        let messages = vec![Message::user("hi")];
        let request = ChatRequest {
            model: "gpt-4o",
            messages: &messages,
            max_tokens: 10,
            temperature: 0.1,
            tools: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("tools").is_none());
        assert_eq!(value["messages"][0]["role"], "user");
    }
}
