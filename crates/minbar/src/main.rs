use std::sync::Arc;

use minbar_assemblyai::AssemblyAiClient;
use minbar_core::config::Config;
use minbar_openai::OpenAiClient;

#[tokio::main]
async fn main() -> Result<(), minbar_core::Error> {
    minbar_core::logging::init("minbar")?;

    let cfg = Arc::new(Config::load()?);

    let transcriber = Arc::new(AssemblyAiClient::new(
        cfg.assemblyai_api_key.clone(),
        cfg.transcription_poll_interval,
        cfg.transcription_timeout,
    ));
    let completer = Arc::new(OpenAiClient::new(
        cfg.openai_api_key.clone(),
        cfg.completion_model.clone(),
        cfg.completion_timeout,
    ));

    minbar_telegram::router::run_polling(cfg, transcriber, completer)
        .await
        .map_err(|e| minbar_core::Error::Transport(format!("telegram bot failed: {e}")))?;

    Ok(())
}
