//! teloxide update → core `IncomingUpdate` classification.

use teloxide::types::{CallbackQuery as TgCallbackQuery, Message};

use minbar_core::{
    domain::{ChatId, MessageId, MessageRef},
    messaging::types::{
        AudioMessage, CallbackQuery, IncomingUpdate, TextMessage, VoiceMessage,
    },
};

pub fn classify_message(msg: &Message) -> IncomingUpdate {
    let chat_id = ChatId(msg.chat.id.0);

    if let Some(text) = msg.text() {
        return IncomingUpdate::Text(TextMessage {
            chat_id,
            text: text.to_string(),
        });
    }

    if let Some(voice) = msg.voice() {
        return IncomingUpdate::Voice(VoiceMessage {
            chat_id,
            file_id: voice.file.id.clone(),
            duration_secs: voice.duration,
        });
    }

    if let Some(audio) = msg.audio() {
        return IncomingUpdate::Audio(AudioMessage {
            chat_id,
            file_id: audio.file.id.clone(),
            duration_secs: audio.duration,
            title: audio.title.clone(),
        });
    }

    IncomingUpdate::Unsupported { chat_id }
}

/// `None` when the callback carries no originating message (nowhere to
/// reply into); the router still answers it.
pub fn classify_callback(q: &TgCallbackQuery) -> Option<IncomingUpdate> {
    let msg = q.message.as_ref()?;
    let chat_id = ChatId(msg.chat.id.0);

    Some(IncomingUpdate::Callback(CallbackQuery {
        chat_id,
        callback_id: q.id.clone(),
        data: q.data.clone().unwrap_or_default(),
        message: Some(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        }),
    }))
}
