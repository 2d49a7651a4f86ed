//! OpenAI adapter (chat completion).
//!
//! One request, one response: the bot keeps no conversation history, so
//! every call carries the full system prompt plus the user content.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use minbar_core::{errors::Error, lang::Lang, ports::CompletionPort, prompt, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const TEMPERATURE: f64 = 0.3;
const MAX_TOKENS: u32 = 1024;

#[derive(Clone, Debug)]
pub struct OpenAiClient {
    api_key: Option<String>,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(api_key: Option<String>, model: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client build");
        Self {
            api_key,
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http,
        }
    }
}

#[async_trait]
impl CompletionPort for OpenAiClient {
    async fn complete(
        &self,
        user_content: &str,
        target: Lang,
        detected_language: Option<&str>,
    ) -> Result<String> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(Error::Config("OPENAI_API_KEY is not set".to_string()));
        };

        let system = prompt::system_prompt(target, detected_language);
        let body = build_request_body(&self.model, &system, user_content);

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("openai request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Completion(format!(
                "openai completion failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: ChatCompletionResponse = resp
            .json()
            .await
            .map_err(|e| Error::Completion(format!("openai response decode failed: {e}")))?;

        extract_content(parsed)
    }
}

fn build_request_body(model: &str, system: &str, user: &str) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "messages": [
            { "role": "system", "content": system },
            { "role": "user", "content": user }
        ],
        "temperature": TEMPERATURE,
        "max_tokens": MAX_TOKENS,
    })
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// An empty string is a valid answer only when the service itself returned
/// one; a response with no message content at all is a failure.
fn extract_content(resp: ChatCompletionResponse) -> Result<String> {
    resp.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| Error::Completion("response contained no message content".to_string()))
}
