//! AssemblyAI adapter (speech transcription).
//!
//! Implements the upload → transcript job → poll cycle. The poll loop is a
//! free function over an injected fetch closure so tests can drive it with
//! canned status sequences and a zero interval.

use std::{future::Future, path::Path, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;

use minbar_core::{
    errors::Error,
    ports::{Transcript, TranscriptionPort},
    Result,
};

const DEFAULT_BASE_URL: &str = "https://api.assemblyai.com/v2";

#[derive(Clone, Debug)]
pub struct AssemblyAiClient {
    api_key: Option<String>,
    base_url: String,
    http: reqwest::Client,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl AssemblyAiClient {
    pub fn new(api_key: Option<String>, poll_interval: Duration, poll_timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client build");
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            http,
            poll_interval,
            poll_timeout,
        }
    }

    async fn upload(&self, api_key: &str, bytes: Vec<u8>) -> Result<String> {
        let resp = self
            .http
            .post(format!("{}/upload", self.base_url))
            .header("authorization", api_key)
            .body(bytes)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("assemblyai upload error: {e}")))?;

        let v: UploadResponse = read_json(resp, "upload").await?;
        Ok(v.upload_url)
    }

    async fn create_job(&self, api_key: &str, audio_url: &str) -> Result<String> {
        let body = serde_json::json!({
            "audio_url": audio_url,
            "language_detection": true,
        });

        let resp = self
            .http
            .post(format!("{}/transcript", self.base_url))
            .header("authorization", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("assemblyai create error: {e}")))?;

        let v: JobStatus = read_json(resp, "create").await?;
        if v.id.is_empty() {
            return Err(Error::Transcription(
                "assemblyai returned no transcript id".to_string(),
            ));
        }
        Ok(v.id)
    }

    async fn fetch_job(&self, api_key: &str, id: &str) -> Result<JobStatus> {
        let resp = self
            .http
            .get(format!("{}/transcript/{id}", self.base_url))
            .header("authorization", api_key)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("assemblyai poll error: {e}")))?;

        read_json(resp, "poll").await
    }
}

#[async_trait]
impl TranscriptionPort for AssemblyAiClient {
    async fn transcribe(&self, audio: &Path) -> Result<Transcript> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(Error::Config("ASSEMBLYAI_API_KEY is not set".to_string()));
        };

        let bytes = tokio::fs::read(audio).await.map_err(Error::Io)?;
        let upload_url = self.upload(api_key, bytes).await?;
        let id = self.create_job(api_key, &upload_url).await?;

        poll_until_complete(
            || self.fetch_job(api_key, &id),
            self.poll_interval,
            self.poll_timeout,
        )
        .await
    }
}

/// One snapshot of a transcript job, as the service reports it.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct JobStatus {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
    #[serde(default)]
    pub language_confidence: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Deserialize)]
struct UploadResponse {
    upload_url: String,
}

enum PollOutcome {
    Pending,
    Done(Transcript),
    Failed(String),
}

fn classify(status: &JobStatus) -> PollOutcome {
    match status.status.as_str() {
        "completed" => PollOutcome::Done(Transcript {
            text: status.text.clone().unwrap_or_default(),
            language_code: status.language_code.clone(),
            language_confidence: status.language_confidence,
        }),
        "error" => PollOutcome::Failed(
            status
                .error
                .clone()
                .unwrap_or_else(|| "transcription failed".to_string()),
        ),
        // "queued" / "processing"
        _ => PollOutcome::Pending,
    }
}

/// Poll `fetch` every `interval` until the job reaches a terminal state or
/// the accumulated wait passes `timeout`. Exactly one of completed / error /
/// timeout terminates the loop.
pub async fn poll_until_complete<F, Fut>(
    mut fetch: F,
    interval: Duration,
    timeout: Duration,
) -> Result<Transcript>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<JobStatus>>,
{
    let mut waited = Duration::ZERO;
    loop {
        let status = fetch().await?;
        match classify(&status) {
            PollOutcome::Done(t) => return Ok(t),
            PollOutcome::Failed(msg) => return Err(Error::Transcription(msg)),
            PollOutcome::Pending => {
                if waited >= timeout {
                    return Err(Error::Transcription(format!(
                        "transcription timed out after {}s",
                        timeout.as_secs()
                    )));
                }
                tokio::time::sleep(interval).await;
                waited += interval;
            }
        }
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(resp: reqwest::Response, what: &str) -> Result<T> {
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Transport(format!(
            "assemblyai {what} failed: {status} {}",
            body.chars().take(200).collect::<String>()
        )));
    }

    resp.json()
        .await
        .map_err(|e| Error::Transport(format!("assemblyai {what} json error: {e}")))
}
