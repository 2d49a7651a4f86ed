/// Core error type for the relay bot.
///
/// Adapter crates map their specific failures into this taxonomy so the
/// dispatcher can handle them consistently (user-facing notice vs log-only).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A credential or setting is missing. Fatal at startup for the bot
    /// token, a per-call failure for the secondary service keys.
    #[error("config error: {0}")]
    Config(String),

    /// Network/HTTP failure against any external service.
    #[error("transport error: {0}")]
    Transport(String),

    /// The transcription service reported an error status or the poll
    /// deadline elapsed before completion.
    #[error("transcription error: {0}")]
    Transcription(String),

    /// Non-success response from the completion service.
    #[error("completion error: {0}")]
    Completion(String),

    /// A message kind with no handler.
    #[error("unsupported message type")]
    Unsupported,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
