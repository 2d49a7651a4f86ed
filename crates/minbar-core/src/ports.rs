use std::path::Path;

use async_trait::async_trait;

use crate::{lang::Lang, Result};

/// Result of transcribing one media message. Ephemeral: nothing is stored
/// after the reply is sent.
#[derive(Clone, Debug, PartialEq)]
pub struct Transcript {
    pub text: String,
    /// Detected language, when the service performed detection.
    pub language_code: Option<String>,
    pub language_confidence: Option<f64>,
}

/// Hexagonal port for the speech-transcription service.
#[async_trait]
pub trait TranscriptionPort: Send + Sync {
    /// Transcribe a local audio file. May suspend for the duration of the
    /// upload plus a bounded poll loop.
    async fn transcribe(&self, audio: &Path) -> Result<Transcript>;
}

/// Hexagonal port for the LLM completion service.
#[async_trait]
pub trait CompletionPort: Send + Sync {
    /// Generate an answer to `user_content`, replying in `target`. The
    /// detected transcription language, when known, is only a prompt hint;
    /// the stored preference stays authoritative.
    async fn complete(
        &self,
        user_content: &str,
        target: Lang,
        detected_language: Option<&str>,
    ) -> Result<String>;
}
