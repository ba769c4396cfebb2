//! Minimal client for the OpenAI videos (Sora) API.

use std::fmt;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::download::{ensure_success, request_to_file};
use crate::job::{JobState, RemoteJob};
use crate::Result;

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    key: String,
}

/// Transient copy of a vendor-owned video job record.
#[derive(Debug, Clone, Deserialize)]
pub struct Video {
    pub id: String,
    pub status: VideoStatus,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub error: Option<VideoError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoError {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VideoStatus::Queued => "queued",
            VideoStatus::InProgress => "in_progress",
            VideoStatus::Completed => "completed",
            VideoStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl RemoteJob for Video {
    fn state(&self) -> JobState {
        match self.status {
            VideoStatus::Queued | VideoStatus::InProgress => JobState::Pending,
            VideoStatus::Completed => JobState::Succeeded,
            VideoStatus::Failed => JobState::Failed,
        }
    }

    fn failure_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.message.clone())
    }
}

impl OpenAiClient {
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

    /// Text-to-video.
    pub async fn create_video(
        &self,
        model: &str,
        prompt: &str,
        size: Option<&str>,
        seconds: Option<&str>,
    ) -> Result<Video> {
        let mut body = serde_json::json!({ "model": model, "prompt": prompt });
        if let Some(size) = size {
            body["size"] = size.into();
        }
        if let Some(seconds) = seconds {
            body["seconds"] = seconds.into();
        }
        self.post_json(&format!("{}/videos", self.base_url), &body).await
    }

    /// Image-to-video: the reference frame rides along as a multipart part.
    pub async fn create_video_from_image(
        &self,
        model: &str,
        prompt: &str,
        size: Option<&str>,
        seconds: Option<&str>,
        image: &Path,
        mime: &str,
    ) -> Result<Video> {
        let bytes = std::fs::read(image)?;
        let file_name = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "reference".to_string());
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime)?;
        let mut form = reqwest::multipart::Form::new()
            .text("model", model.to_string())
            .text("prompt", prompt.to_string())
            .part("input_reference", part);
        if let Some(size) = size {
            form = form.text("size", size.to_string());
        }
        if let Some(seconds) = seconds {
            form = form.text("seconds", seconds.to_string());
        }

        let url = format!("{}/videos", self.base_url);
        debug!(%url, "creating video from image");
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.key)
            .multipart(form)
            .send()
            .await?;
        Ok(ensure_success(resp).await?.json().await?)
    }

    /// Iterative editing of an existing video.
    pub async fn remix_video(&self, video_id: &str, model: &str, prompt: &str) -> Result<Video> {
        let body = serde_json::json!({ "model": model, "prompt": prompt });
        self.post_json(&format!("{}/videos/{}/remix", self.base_url, video_id), &body)
            .await
    }

    /// Refresh a video job by id.
    pub async fn get_video(&self, id: &str) -> Result<Video> {
        let url = format!("{}/videos/{}", self.base_url, id);
        let resp = self.http.get(&url).bearer_auth(&self.key).send().await?;
        Ok(ensure_success(resp).await?.json().await?)
    }

    /// Download the finished video bytes to `path`.
    pub async fn download_content(&self, id: &str, path: &Path) -> Result<u64> {
        let url = format!("{}/videos/{}/content", self.base_url, id);
        request_to_file(self.http.get(&url).bearer_auth(&self.key), path).await
    }

    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<Video> {
        debug!(%url, "creating video job");
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.key)
            .json(body)
            .send()
            .await?;
        Ok(ensure_success(resp).await?.json().await?)
    }
}
