//! Minimal client for the Gemini API: Veo long-running video operations
//! and text generation for the podcast transcript.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::download::{ensure_success, request_to_file};
use crate::job::{JobState, RemoteJob};
use crate::{Error, Result};

pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    key: String,
}

/// A long-running operation record. `done == false` means pending; a
/// present `error` means the operation failed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<OperationError>,
    #[serde(default)]
    pub response: Option<OperationResponse>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResponse {
    #[serde(default)]
    pub generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoResponse {
    #[serde(default)]
    pub generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedSample {
    pub video: VideoFile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoFile {
    pub uri: String,
}

impl Operation {
    /// URI of the first generated video, if the operation produced one.
    pub fn video_uri(&self) -> Option<&str> {
        self.response
            .as_ref()?
            .generate_video_response
            .as_ref()?
            .generated_samples
            .first()
            .map(|s| s.video.uri.as_str())
    }
}

impl RemoteJob for Operation {
    fn state(&self) -> JobState {
        if !self.done {
            JobState::Pending
        } else if self.error.is_some() {
            JobState::Failed
        } else {
            JobState::Succeeded
        }
    }

    fn failure_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.message.clone())
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GeminiClient {
    pub fn new(key: String) -> Self {
        Self::with_base_url(key, DEFAULT_API_URL)
    }

    pub fn with_base_url(key: String, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            key,
        }
    }

    /// Start a Veo generation. `body` carries the instances/parameters
    /// payload assembled by the tool.
    pub async fn generate_videos(&self, model: &str, body: serde_json::Value) -> Result<Operation> {
        let url = format!("{}/models/{}:predictLongRunning", self.base_url, model);
        debug!(%url, "starting video operation");
        let resp = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.key)
            .json(&body)
            .send()
            .await?;
        Ok(ensure_success(resp).await?.json().await?)
    }

    /// Refresh a long-running operation by its resource name.
    pub async fn get_operation(&self, name: &str) -> Result<Operation> {
        let url = format!("{}/{}", self.base_url, name.trim_start_matches('/'));
        let resp = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, &self.key)
            .send()
            .await?;
        Ok(ensure_success(resp).await?.json().await?)
    }

    /// Download a generated file URI (already absolute) to `path`.
    pub async fn download_file(&self, uri: &str, path: &Path) -> Result<u64> {
        request_to_file(self.http.get(uri).header(API_KEY_HEADER, &self.key), path).await
    }

    /// Single-turn text generation; returns the first candidate's text.
    pub async fn generate_content(
        &self,
        model: &str,
        prompt: &str,
        temperature: f64,
    ) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": temperature },
        });
        debug!(%url, "generating content");
        let resp = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.key)
            .json(&body)
            .send()
            .await?;
        let parsed: GenerateContentResponse = ensure_success(resp).await?.json().await?;

        let text = parsed
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(Error::InvalidResponse(
                "model returned no text candidates".to_string(),
            ));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_until_done() {
        let op: Operation =
            serde_json::from_str(r#"{"name": "operations/abc", "done": false}"#).unwrap();
        assert_eq!(op.state(), JobState::Pending);
    }

    #[test]
    fn done_with_error_is_failure() {
        let op: Operation = serde_json::from_str(
            r#"{"name": "operations/abc", "done": true, "error": {"message": "blocked"}}"#,
        )
        .unwrap();
        assert_eq!(op.state(), JobState::Failed);
        assert_eq!(op.failure_message().as_deref(), Some("blocked"));
    }

    #[test]
    fn video_uri_extracted_from_response() {
        let op: Operation = serde_json::from_str(
            r#"{
                "name": "operations/abc",
                "done": true,
                "response": {
                    "generateVideoResponse": {
                        "generatedSamples": [{"video": {"uri": "https://example.com/v.mp4"}}]
                    }
                }
            }"#,
        )
        .unwrap();
        assert_eq!(op.state(), JobState::Succeeded);
        assert_eq!(op.video_uri(), Some("https://example.com/v.mp4"));
    }

    #[test]
    fn done_without_samples_has_no_uri() {
        let op: Operation =
            serde_json::from_str(r#"{"name": "operations/abc", "done": true}"#).unwrap();
        assert_eq!(op.state(), JobState::Succeeded);
        assert_eq!(op.video_uri(), None);
    }
}
