//! Local web GUI server
//!
//! Runs on localhost, provides the upload/ask surface:
//! - GET  /                       - single-page GUI
//! - POST /documents              - PDF bytes → extract + triage, returns outline
//! - GET  /documents/{id}/outline - section outline
//! - POST /documents/{id}/ask     - {"question": ...} → answer + cited sections
//! - GET  /status                 - liveness, version, usage totals

use crate::extract::{self, adobe::AdobeClient, adobe::AdobeConfig, ExtractError};
use crate::index::IndexedDocument;
use crate::qa::{openai::OpenAiClient, triage, AnswerError};
use crate::settings;
use crate::store::DocumentStore;
use crate::document::Section;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tiny_http::{Header, Method, Request, Response, Server};

pub const DEFAULT_PORT: u16 = 7878;
const VERSION: &str = env!("CARGO_PKG_VERSION");
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;
const MAX_QUESTION_BYTES: usize = 64 * 1024;

/// Run the GUI server on the calling thread
pub fn run(
    store: Arc<DocumentStore>,
    runtime: tokio::runtime::Handle,
    port: u16,
) -> Result<(), String> {
    let addr = format!("127.0.0.1:{}", port);
    let server =
        Server::http(&addr).map_err(|e| format!("Failed to start server on {}: {}", addr, e))?;
    println!("[HTTP] Listening on http://{}", addr);

    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, &store, &runtime) {
            eprintln!("[HTTP] Error handling request: {}", e);
        }
    }
    Ok(())
}

fn handle_request(
    mut request: Request,
    store: &DocumentStore,
    runtime: &tokio::runtime::Handle,
) -> Result<(), String> {
    let path = request.url().split('?').next().unwrap_or("").to_string();
    let method = request.method().clone();

    println!("[HTTP] {} {}", method, request.url());

    let response = match (method, path.as_str()) {
        (Method::Options, _) => cors_response(Response::from_string("")),
        (Method::Get, "/") => html_response(INDEX_HTML),
        (Method::Get, "/status") => handle_status(store),
        (Method::Post, "/documents") => {
            let name = extract_query_param(request.url(), "name");
            let mut body = Vec::new();
            request
                .as_reader()
                .take((MAX_UPLOAD_BYTES + 1) as u64)
                .read_to_end(&mut body)
                .map_err(|e| format!("Failed to read body: {}", e))?;
            if body.len() > MAX_UPLOAD_BYTES {
                json_response(413, r#"{"error":"PDF larger than the 100 MB limit"}"#)
            } else {
                handle_upload(store, runtime, &body, name.as_deref())
            }
        }
        (Method::Get, p) if p.starts_with("/documents/") && p.ends_with("/outline") => {
            let id = &p["/documents/".len()..p.len() - "/outline".len()];
            handle_outline(store, id)
        }
        (Method::Post, p) if p.starts_with("/documents/") && p.ends_with("/ask") => {
            let id = p["/documents/".len()..p.len() - "/ask".len()].to_string();
            let mut body = String::new();
            request
                .as_reader()
                .take(MAX_QUESTION_BYTES as u64)
                .read_to_string(&mut body)
                .map_err(|e| format!("Failed to read body: {}", e))?;
            handle_ask(store, runtime, &id, &body)
        }
        _ => cors_response(json_response(404, r#"{"error":"Not found"}"#)),
    };

    request
        .respond(response)
        .map_err(|e| format!("Failed to send response: {}", e))
}

fn extract_query_param(url: &str, param: &str) -> Option<String> {
    let query_start = url.find('?')?;
    let query = &url[query_start + 1..];
    for pair in query.split('&') {
        let mut parts = pair.splitn(2, '=');
        if let (Some(key), Some(value)) = (parts.next(), parts.next()) {
            if key == param {
                return Some(urlencoding::decode(value).unwrap_or_default().to_string());
            }
        }
    }
    None
}

/// POST /documents - extract, triage, and store one PDF
fn handle_upload(
    store: &DocumentStore,
    runtime: &tokio::runtime::Handle,
    pdf_bytes: &[u8],
    name: Option<&str>,
) -> Response<std::io::Cursor<Vec<u8>>> {
    let (client_id, client_secret) = match settings::get_adobe_credentials() {
        Some(creds) => creds,
        None => {
            return cors_response(json_response(
                503,
                r#"{"error":"ADOBE_CLIENT_ID / ADOBE_CLIENT_SECRET not set"}"#,
            ));
        }
    };
    let openai = match OpenAiClient::from_settings() {
        Ok(c) => c,
        Err(e) => return answer_error_response(&e),
    };

    let mut config = AdobeConfig::new(client_id, client_secret);
    config.poll_interval = Duration::from_secs(settings::poll_interval_secs());
    config.poll_budget = settings::poll_budget();
    let adobe = match AdobeClient::new(config) {
        Ok(c) => c,
        Err(e) => return extract_error_response(&e),
    };

    let result = runtime.block_on(async {
        let mut document = extract::load_document(pdf_bytes, &adobe).await?;
        if document.title.is_none() {
            // Vendor reported no Title element; fall back to the upload name
            document.title = name.map(|n| n.trim_end_matches(".pdf").to_string());
        }
        let indexed = IndexedDocument::new(document);
        triage::prepare(indexed, &openai)
            .await
            .map_err(UploadError::Answer)
    });

    match result {
        Ok(doc) => {
            let handle = store.insert(doc);
            let body = serde_json::json!({
                "document_id": handle.indexed.document.fingerprint,
                "title": handle.indexed.document.title,
                "sections": outline_values(&handle.indexed.document.sections),
            });
            cors_response(json_response(200, &body.to_string()))
        }
        Err(UploadError::Extract(e)) => extract_error_response(&e),
        Err(UploadError::Answer(e)) => answer_error_response(&e),
    }
}

enum UploadError {
    Extract(ExtractError),
    Answer(AnswerError),
}

impl From<ExtractError> for UploadError {
    fn from(e: ExtractError) -> Self {
        UploadError::Extract(e)
    }
}

/// GET /documents/{id}/outline
fn handle_outline(store: &DocumentStore, id: &str) -> Response<std::io::Cursor<Vec<u8>>> {
    match store.get(id) {
        Some(doc) => {
            let body = serde_json::json!({
                "document_id": doc.indexed.document.fingerprint,
                "title": doc.indexed.document.title,
                "sections": outline_values(&doc.indexed.document.sections),
            });
            cors_response(json_response(200, &body.to_string()))
        }
        None => cors_response(json_response(404, r#"{"error":"Unknown document"}"#)),
    }
}

/// POST /documents/{id}/ask
fn handle_ask(
    store: &DocumentStore,
    runtime: &tokio::runtime::Handle,
    id: &str,
    body: &str,
) -> Response<std::io::Cursor<Vec<u8>>> {
    #[derive(serde::Deserialize)]
    struct AskRequest {
        question: String,
    }

    let req: AskRequest = match serde_json::from_str(body) {
        Ok(r) => r,
        Err(e) => {
            return cors_response(json_response(
                400,
                &serde_json::json!({"error": format!("Invalid JSON: {}", e)}).to_string(),
            ));
        }
    };
    if req.question.trim().is_empty() {
        return cors_response(json_response(400, r#"{"error":"Question is empty"}"#));
    }

    let doc = match store.get(id) {
        Some(d) => d,
        None => return cors_response(json_response(404, r#"{"error":"Unknown document"}"#)),
    };
    let openai = match OpenAiClient::from_settings() {
        Ok(c) => c,
        Err(e) => return answer_error_response(&e),
    };

    match runtime.block_on(triage::answer(&doc, &req.question, &openai)) {
        Ok(answer) => {
            let sections: Vec<serde_json::Value> = answer
                .cited_sections
                .iter()
                .map(|sid| {
                    let title = doc.indexed.resolve(sid).and_then(|s| s.title_clean());
                    serde_json::json!({"id": sid, "title": title})
                })
                .collect();
            let body = serde_json::json!({
                "answer": answer.text,
                "sections": sections,
            });
            cors_response(json_response(200, &body.to_string()))
        }
        Err(e) => answer_error_response(&e),
    }
}

/// GET /status
fn handle_status(store: &DocumentStore) -> Response<std::io::Cursor<Vec<u8>>> {
    let usage = settings::usage();
    let body = serde_json::json!({
        "connected": true,
        "version": VERSION,
        "documents": store.len(),
        "extraction_configured": settings::has_adobe_credentials(),
        "llm_configured": settings::has_openai_api_key(),
        "usage": {
            "prompt_tokens": usage.prompt_tokens,
            "completion_tokens": usage.completion_tokens,
            "requests": usage.requests,
            "last_request_at": usage.last_request_at,
        }
    });
    cors_response(json_response(200, &body.to_string()))
}

fn outline_values(sections: &[Section]) -> Vec<serde_json::Value> {
    sections
        .iter()
        .map(|s| {
            serde_json::json!({
                "id": s.id,
                "title": s.title_clean(),
                "pages": s.pages.iter().collect::<Vec<_>>(),
                "sections": outline_values(&s.subsections),
            })
        })
        .collect()
}

fn extract_error_response(e: &ExtractError) -> Response<std::io::Cursor<Vec<u8>>> {
    let status = match e {
        ExtractError::NotAPdf | ExtractError::TooLarge(..) => 400,
        ExtractError::Auth(_) => 401,
        ExtractError::PollBudgetExhausted => 504,
        _ => 502,
    };
    error_response(status, &e.to_string())
}

fn answer_error_response(e: &AnswerError) -> Response<std::io::Cursor<Vec<u8>>> {
    let status = match e {
        AnswerError::EmptyDocument | AnswerError::NoSectionsSelected => 422,
        AnswerError::MissingApiKey => 503,
        AnswerError::Timeout => 504,
        _ => 502,
    };
    error_response(status, &e.to_string())
}

fn error_response(status: u16, message: &str) -> Response<std::io::Cursor<Vec<u8>>> {
    cors_response(json_response(
        status,
        &serde_json::json!({ "error": message }).to_string(),
    ))
}

fn json_response(status: u16, body: &str) -> Response<std::io::Cursor<Vec<u8>>> {
    let data = body.as_bytes().to_vec();
    let len = data.len();
    Response::new(
        tiny_http::StatusCode(status),
        vec![Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap()],
        std::io::Cursor::new(data),
        Some(len),
        None,
    )
}

fn html_response(body: &str) -> Response<std::io::Cursor<Vec<u8>>> {
    let data = body.as_bytes().to_vec();
    let len = data.len();
    Response::new(
        tiny_http::StatusCode(200),
        vec![Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=utf-8"[..]).unwrap()],
        std::io::Cursor::new(data),
        Some(len),
        None,
    )
}

fn cors_response(
    mut response: Response<std::io::Cursor<Vec<u8>>>,
) -> Response<std::io::Cursor<Vec<u8>>> {
    response.add_header(
        Header::from_bytes(&b"Access-Control-Allow-Origin"[..], &b"*"[..]).unwrap(),
    );
    response.add_header(
        Header::from_bytes(
            &b"Access-Control-Allow-Methods"[..],
            &b"GET, POST, OPTIONS"[..],
        )
        .unwrap(),
    );
    response.add_header(
        Header::from_bytes(&b"Access-Control-Allow-Headers"[..], &b"Content-Type"[..]).unwrap(),
    );
    response
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>doctriage</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 760px; margin: 2rem auto; padding: 0 1rem; }
  fieldset { border: 1px solid #ccc; margin-bottom: 1rem; }
  #answer { white-space: pre-wrap; background: #f6f6f6; padding: 1rem; }
  .cite { color: #356; font-size: 0.9em; }
  .err { color: #a00; }
</style>
</head>
<body>
<h1>doctriage</h1>
<fieldset>
  <legend>1. Upload a policy PDF</legend>
  <input type="file" id="pdf" accept="application/pdf">
  <button id="upload">Upload</button>
  <span id="upload-state"></span>
  <ul id="outline"></ul>
</fieldset>
<fieldset>
  <legend>2. Ask a question</legend>
  <input type="text" id="question" size="60" placeholder="What methodology was used?">
  <button id="ask" disabled>Ask</button>
  <div id="answer"></div>
  <div id="citations" class="cite"></div>
</fieldset>
<script>
let documentId = null;

function renderOutline(sections, list) {
  for (const s of sections) {
    const li = document.createElement('li');
    li.textContent = s.id + ' ' + (s.title || '(untitled)');
    list.appendChild(li);
    if (s.sections && s.sections.length) {
      const sub = document.createElement('ul');
      li.appendChild(sub);
      renderOutline(s.sections, sub);
    }
  }
}

document.getElementById('upload').onclick = async () => {
  const file = document.getElementById('pdf').files[0];
  const state = document.getElementById('upload-state');
  if (!file) { state.textContent = 'Pick a PDF first'; return; }
  state.textContent = 'Extracting…';
  const resp = await fetch('/documents?name=' + encodeURIComponent(file.name), { method: 'POST', body: await file.arrayBuffer() });
  const data = await resp.json();
  if (!resp.ok) { state.innerHTML = '<span class="err">' + data.error + '</span>'; return; }
  documentId = data.document_id;
  state.textContent = (data.title || file.name) + ' — ready';
  const list = document.getElementById('outline');
  list.innerHTML = '';
  renderOutline(data.sections, list);
  document.getElementById('ask').disabled = false;
};

document.getElementById('ask').onclick = async () => {
  const question = document.getElementById('question').value;
  const answer = document.getElementById('answer');
  const citations = document.getElementById('citations');
  answer.textContent = 'Thinking…';
  citations.textContent = '';
  const resp = await fetch('/documents/' + documentId + '/ask', {
    method: 'POST',
    headers: { 'Content-Type': 'application/json' },
    body: JSON.stringify({ question })
  });
  const data = await resp.json();
  if (!resp.ok) { answer.innerHTML = '<span class="err">' + data.error + '</span>'; return; }
  answer.textContent = data.answer;
  citations.textContent = 'Grounded in: ' + data.sections.map(s => s.id + (s.title ? ' ' + s.title : '')).join(', ');
};
</script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::index::IndexedDocument;
    use crate::qa::triage::TriagedDocument;
    use std::collections::HashMap;

    #[test]
    fn test_extract_query_param() {
        assert_eq!(
            extract_query_param("/documents?name=annual%20report.pdf", "name").as_deref(),
            Some("annual report.pdf")
        );
        assert_eq!(extract_query_param("/documents", "name"), None);
        assert_eq!(extract_query_param("/documents?other=x", "name"), None);
    }

    #[test]
    fn test_outline_values_nested_shape() {
        let mut parent = Section::new("1".to_string(), Some("1. Policy".to_string()), 1);
        parent
            .subsections
            .push(Section::new("1.1".to_string(), Some("Scope".to_string()), 2));
        let values = outline_values(&[parent]);
        assert_eq!(values[0]["id"], "1");
        assert_eq!(values[0]["title"], "Policy");
        assert_eq!(values[0]["sections"][0]["id"], "1.1");
    }

    #[test]
    fn test_error_status_mapping() {
        let r = extract_error_response(&ExtractError::NotAPdf);
        assert_eq!(r.status_code().0, 400);
        let r = extract_error_response(&ExtractError::PollBudgetExhausted);
        assert_eq!(r.status_code().0, 504);
        let r = answer_error_response(&AnswerError::EmptyDocument);
        assert_eq!(r.status_code().0, 422);
        let r = answer_error_response(&AnswerError::MissingApiKey);
        assert_eq!(r.status_code().0, 503);
    }

    #[test]
    fn test_handle_outline_unknown_document() {
        let store = DocumentStore::new();
        let r = handle_outline(&store, "nope");
        assert_eq!(r.status_code().0, 404);
    }

    #[test]
    fn test_handle_outline_known_document() {
        let store = DocumentStore::new();
        let document = Document {
            fingerprint: "fp1".to_string(),
            title: Some("Policy".to_string()),
            sections: vec![Section::new("1".to_string(), Some("Scope".to_string()), 1)],
        };
        store.insert(TriagedDocument {
            indexed: IndexedDocument::new(document),
            summaries: HashMap::new(),
        });
        let r = handle_outline(&store, "fp1");
        assert_eq!(r.status_code().0, 200);
    }
}
