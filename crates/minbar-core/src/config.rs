use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration for the bot.
///
/// Everything comes from the environment (with an optional `.env` file).
/// The bot token is required at startup; the two service keys degrade to
/// per-call failures when absent.
#[derive(Clone, Debug)]
pub struct Config {
    // Credentials
    pub telegram_bot_token: String,
    pub assemblyai_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub transcription_available: bool,

    // Completion service
    pub completion_model: String,
    pub completion_timeout: Duration,

    // Transcription poll loop
    pub transcription_poll_interval: Duration,
    pub transcription_timeout: Duration,

    // Runtime constants
    pub temp_dir: PathBuf,
    pub telegram_safe_limit: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        // Optional providers: absence is reported per call, not at startup.
        let assemblyai_api_key = env_str("ASSEMBLYAI_API_KEY").and_then(non_empty);
        let openai_api_key = env_str("OPENAI_API_KEY").and_then(non_empty);
        let transcription_available = assemblyai_api_key.is_some();

        let completion_model =
            env_str("COMPLETION_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());
        let completion_timeout =
            Duration::from_millis(env_u64("COMPLETION_TIMEOUT_MS").unwrap_or(60_000));

        let transcription_poll_interval =
            Duration::from_millis(env_u64("TRANSCRIPTION_POLL_INTERVAL_MS").unwrap_or(3_000));
        let transcription_timeout =
            Duration::from_millis(env_u64("TRANSCRIPTION_TIMEOUT_MS").unwrap_or(300_000));

        // Scratch space for downloaded media; transient only.
        let temp_dir = PathBuf::from(env_str("TEMP_DIR").unwrap_or("/tmp/minbar".to_string()));
        fs::create_dir_all(&temp_dir)?;

        let telegram_safe_limit = env_usize("TELEGRAM_SAFE_LIMIT").unwrap_or(4_000);

        Ok(Self {
            telegram_bot_token,
            assemblyai_api_key,
            openai_api_key,
            transcription_available,
            completion_model,
            completion_timeout,
            transcription_poll_interval,
            transcription_timeout,
            temp_dir,
            telegram_safe_limit,
        })
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
