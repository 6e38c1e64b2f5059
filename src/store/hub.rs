//! Seen-links blob kept as a file in a Hugging Face dataset repository.
//!
//! Download resolves the file at a revision; upload creates a commit through
//! the Hub commit API with an NDJSON body (a header line followed by one file
//! line carrying base64 content). On download only a 404 tagged
//! `X-Error-Code: EntryNotFound` means the file has never been committed; a
//! missing repository or revision is an error like any other.

use super::BlobStore;
use crate::utils::truncate_for_log;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, StatusCode};
use serde_json::json;
use std::error::Error;
use std::fmt;
use tracing::{debug, instrument};

pub const DEFAULT_HUB_ENDPOINT: &str = "https://huggingface.co";

/// Response header carrying the Hub's machine-readable error kind.
const ERROR_CODE_HEADER: &str = "x-error-code";
/// Error kind for a file absent from an existing repository and revision.
const ENTRY_NOT_FOUND: &str = "EntryNotFound";

#[derive(Clone)]
pub struct HubBlobStore {
    client: Client,
    endpoint: String,
    repo_id: String,
    filename: String,
    revision: String,
    token: Option<String>,
}

impl fmt::Debug for HubBlobStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubBlobStore")
            .field("endpoint", &self.endpoint)
            .field("repo_id", &self.repo_id)
            .field("filename", &self.filename)
            .field("revision", &self.revision)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl HubBlobStore {
    pub fn new(
        client: Client,
        repo_id: impl Into<String>,
        filename: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            client,
            endpoint: DEFAULT_HUB_ENDPOINT.to_string(),
            repo_id: repo_id.into(),
            filename: filename.into(),
            revision: "main".to_string(),
            token,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }

    fn resolve_url(&self) -> String {
        format!(
            "{}/datasets/{}/resolve/{}/{}",
            self.endpoint,
            self.repo_id,
            urlencoding::encode(&self.revision),
            self.encoded_filename()
        )
    }

    /// The filename with each path segment percent-encoded.
    fn encoded_filename(&self) -> String {
        self.filename
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn commit_url(&self) -> String {
        format!(
            "{}/api/datasets/{}/commit/{}",
            self.endpoint,
            self.repo_id,
            urlencoding::encode(&self.revision)
        )
    }

    fn commit_body(&self, body: &str) -> String {
        let header = json!({
            "key": "header",
            "value": { "summary": "Update seen links", "description": "" }
        });
        let file = json!({
            "key": "file",
            "value": {
                "path": self.filename,
                "content": STANDARD.encode(body.as_bytes()),
                "encoding": "base64"
            }
        });
        format!("{header}\n{file}\n")
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl BlobStore for HubBlobStore {
    #[instrument(level = "debug", skip_all, fields(repo = %self.repo_id, file = %self.filename))]
    async fn download(&self) -> Result<Option<String>, Box<dyn Error>> {
        let response = self
            .authorize(self.client.get(self.resolve_url()))
            .send()
            .await?;

        let status = response.status();
        let error_code = response
            .headers()
            .get(ERROR_CODE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if status == StatusCode::NOT_FOUND && error_code.as_deref() == Some(ENTRY_NOT_FOUND) {
            debug!("Seen-links file not found in dataset");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!(
                "HTTP {} ({}): {}",
                status,
                error_code.as_deref().unwrap_or("no error code"),
                truncate_for_log(&body, 200)
            )
            .into());
        }
        Ok(Some(response.text().await?))
    }

    #[instrument(level = "debug", skip_all, fields(repo = %self.repo_id, file = %self.filename, bytes = body.len()))]
    async fn upload(&self, body: &str) -> Result<(), Box<dyn Error>> {
        let response = self
            .authorize(self.client.post(self.commit_url()))
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(self.commit_body(body))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("HTTP {}: {}", status, truncate_for_log(&body, 200)).into());
        }
        debug!("Committed seen-links file");
        Ok(())
    }
}
