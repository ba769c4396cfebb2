//! Minimal client for the Replicate predictions API.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use base64::Engine as _;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::download::ensure_success;
use crate::job::{JobState, RemoteJob};
use crate::{Error, Result};

pub const DEFAULT_API_URL: &str = "https://api.replicate.com/v1";

pub struct ReplicateClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

/// Transient copy of a vendor-owned prediction record.
#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub status: PredictionStatus,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub output: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PredictionStatus::Starting => "starting",
            PredictionStatus::Processing => "processing",
            PredictionStatus::Succeeded => "succeeded",
            PredictionStatus::Failed => "failed",
            PredictionStatus::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

impl RemoteJob for Prediction {
    fn state(&self) -> JobState {
        match self.status {
            PredictionStatus::Starting | PredictionStatus::Processing => JobState::Pending,
            PredictionStatus::Succeeded => JobState::Succeeded,
            PredictionStatus::Failed => JobState::Failed,
            PredictionStatus::Canceled => JobState::Canceled,
        }
    }

    fn failure_message(&self) -> Option<String> {
        match &self.error {
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) if !other.is_null() => Some(other.to_string()),
            _ => None,
        }
    }
}

impl ReplicateClient {
    pub fn new(token: String) -> Self {
        Self::with_base_url(token, DEFAULT_API_URL)
    }

    pub fn with_base_url(token: String, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            token,
        }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Create a prediction for `model` (e.g. `minimax/speech-2.6-hd`).
    pub async fn create(&self, model: &str, input: Value) -> Result<Prediction> {
        let url = format!("{}/models/{}/predictions", self.base_url, model);
        debug!(%url, "creating prediction");
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "input": input }))
            .send()
            .await?;
        Ok(ensure_success(resp).await?.json().await?)
    }

    /// Create with backoff on HTTP 429: sleep 10s, 20s, ... between
    /// attempts, up to `max_attempts` submissions. `backoff` is invoked
    /// before each wait with the attempt number and wait duration, so the
    /// caller can report the delay.
    pub async fn create_with_retry(
        &self,
        model: &str,
        input: Value,
        max_attempts: u32,
        mut backoff: impl FnMut(u32, Duration),
    ) -> Result<Prediction> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.create(model, input.clone()).await {
                Err(Error::Api { status, .. })
                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS =>
                {
                    if attempt >= max_attempts {
                        return Err(Error::JobFailed(format!(
                            "rate limited after {max_attempts} attempts"
                        )));
                    }
                    let wait = Duration::from_secs(10 * attempt as u64);
                    warn!(attempt, wait_s = wait.as_secs(), "rate limited, backing off");
                    backoff(attempt, wait);
                    tokio::time::sleep(wait).await;
                }
                other => return other,
            }
        }
    }

    /// Refresh a prediction by id.
    pub async fn get(&self, id: &str) -> Result<Prediction> {
        let url = format!("{}/predictions/{}", self.base_url, id);
        let resp = self.http.get(&url).bearer_auth(&self.token).send().await?;
        Ok(ensure_success(resp).await?.json().await?)
    }
}

/// Pull a URL (or opaque reference) out of a prediction output. Vendors
/// return either a bare string, a list of URLs, or an object keyed by
/// media type (`{"audio": ...}`, `{"voice_id": ...}`).
pub fn output_url(output: &Value, key: &str) -> Option<String> {
    match output {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.first().and_then(Value::as_str).map(str::to_string),
        Value::Object(map) => map.get(key).and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

/// Inline a local file as a base64 data URI, the upload form the
/// predictions API accepts for small inputs.
pub fn file_data_uri(path: &Path, mime: &str) -> Result<String> {
    let bytes = std::fs::read(path)?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:{mime};base64,{encoded}"))
}
