use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::InlineKeyboard,
    Result,
};

/// Hexagonal port for the chat platform.
///
/// Telegram is the first implementation; the dispatcher and its tests only
/// depend on this trait.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    /// Send a message with rich (HTML) formatting.
    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef>;

    /// Send a message with no formatting at all.
    async fn send_plain(&self, chat_id: ChatId, text: &str) -> Result<MessageRef>;

    /// Replace the text of a previously sent message.
    async fn edit_html(&self, msg: MessageRef, html: &str) -> Result<()>;

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef>;

    /// Remove the inline keyboard from a previously sent message.
    async fn clear_reply_markup(&self, msg: MessageRef) -> Result<()>;

    async fn answer_callback_query(&self, callback_id: &str) -> Result<()>;

    /// Best-effort "typing..." indicator.
    async fn send_typing(&self, chat_id: ChatId) -> Result<()>;

    /// Download a platform-hosted file into `dest_dir`, returning the local
    /// path of the scratch copy.
    async fn download_file(&self, file_id: &str, dest_dir: &Path) -> Result<PathBuf>;
}
