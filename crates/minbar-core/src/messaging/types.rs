use crate::domain::{ChatId, MessageRef};

/// Cross-messenger incoming update model.
///
/// Telegram-specific fields live in the Telegram adapter; the dispatcher
/// only ever sees this shape.
#[derive(Clone, Debug)]
pub enum IncomingUpdate {
    Text(TextMessage),
    Voice(VoiceMessage),
    Audio(AudioMessage),
    Callback(CallbackQuery),
    /// A message kind the bot has no pipeline for (stickers, photos, ...).
    Unsupported { chat_id: ChatId },
}

impl IncomingUpdate {
    pub fn chat_id(&self) -> ChatId {
        match self {
            IncomingUpdate::Text(m) => m.chat_id,
            IncomingUpdate::Voice(m) => m.chat_id,
            IncomingUpdate::Audio(m) => m.chat_id,
            IncomingUpdate::Callback(q) => q.chat_id,
            IncomingUpdate::Unsupported { chat_id } => *chat_id,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TextMessage {
    pub chat_id: ChatId,
    pub text: String,
}

#[derive(Clone, Debug)]
pub struct VoiceMessage {
    pub chat_id: ChatId,
    pub file_id: String,
    pub duration_secs: u32,
}

#[derive(Clone, Debug)]
pub struct AudioMessage {
    pub chat_id: ChatId,
    pub file_id: String,
    pub duration_secs: u32,
    pub title: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CallbackQuery {
    pub chat_id: ChatId,
    pub callback_id: String,
    pub data: String,
    /// The message carrying the inline keyboard, when Telegram supplied it.
    pub message: Option<MessageRef>,
}

/// Inline keyboard (buttons) used for the language menu.
#[derive(Clone, Debug)]
pub struct InlineKeyboard {
    pub buttons: Vec<InlineButton>,
}

#[derive(Clone, Debug)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineKeyboard {
    pub fn new(buttons: Vec<InlineButton>) -> Self {
        Self { buttons }
    }
}
