//! Adobe PDF Services Extract client
//!
//! Server-to-server OAuth flow:
//! 1. POST /token with client id + secret → bearer token
//! 2. POST /assets → presigned upload URI, PUT the PDF bytes there
//! 3. POST /operation/extractpdf → job location (201)
//! 4. Poll the location until done/failed, then download the result ZIP
//!
//! Transient vendor responses (429/5xx) get one retry; everything else
//! surfaces to the caller.

use super::ExtractError;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

const PDF_SERVICES_BASE: &str = "https://pdf-services.adobe.io";
const MAX_PDF_MB: usize = 100;
const MAX_RESULT_MB: usize = 200;

/// Credentials and polling knobs for one extraction client
#[derive(Debug, Clone)]
pub struct AdobeConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Delay between job polls
    pub poll_interval: Duration,
    /// Maximum number of polls before giving up
    pub poll_budget: u32,
    /// Override for tests; defaults to the production endpoint
    pub base_url: Option<String>,
}

impl AdobeConfig {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
            poll_interval: Duration::from_secs(2),
            poll_budget: 60,
            base_url: None,
        }
    }
}

/// Extract API client
pub struct AdobeClient {
    client: Client,
    config: AdobeConfig,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetResponse {
    upload_uri: String,
    #[serde(rename = "assetID")]
    asset_id: String,
}

#[derive(Deserialize)]
struct JobStatus {
    status: String,
    #[serde(default)]
    content: Option<JobResource>,
    #[serde(default)]
    resource: Option<JobResource>,
    #[serde(default)]
    error: Option<JobError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobResource {
    download_uri: String,
}

#[derive(Deserialize)]
struct JobError {
    #[serde(default)]
    message: String,
}

/// Reject anything that is not a plausible PDF before spending a vendor call
pub fn validate_pdf_bytes(bytes: &[u8]) -> Result<(), ExtractError> {
    if bytes.len() < 4 || &bytes[0..4] != b"%PDF" {
        return Err(ExtractError::NotAPdf);
    }
    let mb = bytes.len() / 1024 / 1024;
    if mb > MAX_PDF_MB {
        return Err(ExtractError::TooLarge(mb, MAX_PDF_MB));
    }
    Ok(())
}

/// Validate a vendor-supplied download URL before fetching it
fn is_valid_download_url(url_str: &str) -> bool {
    let parsed = match url::Url::parse(url_str) {
        Ok(u) => u,
        Err(_) => return false,
    };
    if parsed.scheme() != "https" {
        return false;
    }
    match parsed.host_str() {
        Some(host) => host.contains('.') && host != "localhost",
        None => false,
    }
}

impl AdobeClient {
    pub fn new(config: AdobeConfig) -> Result<Self, ExtractError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ExtractError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(PDF_SERVICES_BASE)
    }

    /// Submit a PDF and return the result ZIP bytes
    pub async fn extract(&self, pdf_bytes: &[u8]) -> Result<Vec<u8>, ExtractError> {
        validate_pdf_bytes(pdf_bytes)?;

        let token = self.fetch_token().await?;
        let asset = self.create_asset(&token).await?;
        self.upload_pdf(&asset.upload_uri, pdf_bytes).await?;
        let location = self.start_job(&token, &asset.asset_id).await?;
        let download_uri = self.poll_job(&token, &location).await?;
        self.download_result(&download_uri).await
    }

    async fn fetch_token(&self) -> Result<String, ExtractError> {
        let response = self
            .client
            .post(format!("{}/token", self.base_url()))
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ExtractError::Transport(format!("Token request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Auth(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Vendor {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::Transport(format!("Malformed token response: {}", e)))?;
        Ok(token.access_token)
    }

    async fn create_asset(&self, token: &str) -> Result<AssetResponse, ExtractError> {
        let response = self
            .send_with_retry(|| {
                self.client
                    .post(format!("{}/assets", self.base_url()))
                    .header("X-API-Key", &self.config.client_id)
                    .bearer_auth(token)
                    .json(&serde_json::json!({ "mediaType": "application/pdf" }))
            })
            .await?;

        response
            .json()
            .await
            .map_err(|e| ExtractError::Transport(format!("Malformed asset response: {}", e)))
    }

    async fn upload_pdf(&self, upload_uri: &str, pdf_bytes: &[u8]) -> Result<(), ExtractError> {
        // Presigned URI: no auth headers
        let response = self
            .client
            .put(upload_uri)
            .header("Content-Type", "application/pdf")
            .body(pdf_bytes.to_vec())
            .send()
            .await
            .map_err(|e| ExtractError::Transport(format!("Upload failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Vendor {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    async fn start_job(&self, token: &str, asset_id: &str) -> Result<String, ExtractError> {
        let response = self
            .send_with_retry(|| {
                self.client
                    .post(format!("{}/operation/extractpdf", self.base_url()))
                    .header("X-API-Key", &self.config.client_id)
                    .bearer_auth(token)
                    .json(&serde_json::json!({
                        "assetID": asset_id,
                        "elementsToExtract": ["text", "tables"],
                        "tableOutputFormat": "csv",
                    }))
            })
            .await?;

        response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                ExtractError::Transport("Job accepted but no location header returned".to_string())
            })
    }

    async fn poll_job(&self, token: &str, location: &str) -> Result<String, ExtractError> {
        for attempt in 0..self.config.poll_budget {
            if attempt > 0 {
                tokio::time::sleep(self.config.poll_interval).await;
            }

            let response = self
                .send_with_retry(|| {
                    self.client
                        .get(location)
                        .header("X-API-Key", &self.config.client_id)
                        .bearer_auth(token)
                })
                .await?;

            let job: JobStatus = response
                .json()
                .await
                .map_err(|e| ExtractError::Transport(format!("Malformed job status: {}", e)))?;

            match job.status.as_str() {
                "done" => {
                    let uri = job
                        .content
                        .or(job.resource)
                        .map(|r| r.download_uri)
                        .ok_or_else(|| {
                            ExtractError::Transport(
                                "Job done but no download URI returned".to_string(),
                            )
                        })?;
                    return Ok(uri);
                }
                "failed" => {
                    let message = job
                        .error
                        .map(|e| e.message)
                        .filter(|m| !m.is_empty())
                        .unwrap_or_else(|| "no error detail".to_string());
                    return Err(ExtractError::JobFailed(message));
                }
                other => {
                    println!("[Extract] Job status: {} (poll {})", other, attempt + 1);
                }
            }
        }

        Err(ExtractError::PollBudgetExhausted)
    }

    async fn download_result(&self, download_uri: &str) -> Result<Vec<u8>, ExtractError> {
        if !is_valid_download_url(download_uri) {
            return Err(ExtractError::Transport(format!(
                "Vendor returned suspicious download URL: {}",
                download_uri
            )));
        }

        let response = self
            .client
            .get(download_uri)
            .send()
            .await
            .map_err(|e| ExtractError::Transport(format!("Result download failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Vendor {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ExtractError::Transport(format!("Result download failed: {}", e)))?
            .to_vec();

        let mb = bytes.len() / 1024 / 1024;
        if mb > MAX_RESULT_MB {
            return Err(ExtractError::TooLarge(mb, MAX_RESULT_MB));
        }
        Ok(bytes)
    }

    /// Send a request, retrying once on 429/5xx
    async fn send_with_retry<F>(&self, build: F) -> Result<reqwest::Response, ExtractError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        for attempt in 0..2 {
            let response = build()
                .send()
                .await
                .map_err(|e| ExtractError::Transport(format!("Request failed: {}", e)))?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                if attempt == 0 {
                    println!("[Extract] Vendor returned {}, retrying once", status);
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    continue;
                }
                let body = response.text().await.unwrap_or_default();
                return Err(ExtractError::Vendor {
                    status: status.as_u16(),
                    body,
                });
            }
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                let body = response.text().await.unwrap_or_default();
                return Err(ExtractError::Auth(body));
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ExtractError::Vendor {
                    status: status.as_u16(),
                    body,
                });
            }
            return Ok(response);
        }
        unreachable!("retry loop returns on second attempt")
    }
}
