//! Response-language preference: the only per-chat state the bot keeps.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use crate::domain::ChatId;

/// Language the user wants replies delivered in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lang {
    English,
    Arabic,
}

impl Lang {
    /// The two-letter code used in commands, callback data, and env config.
    pub fn code(&self) -> &'static str {
        match self {
            Lang::English => "en",
            Lang::Arabic => "ar",
        }
    }

    pub fn english_name(&self) -> &'static str {
        match self {
            Lang::English => "English",
            Lang::Arabic => "Arabic",
        }
    }

    /// Parse a user-supplied code. Only `en`/`ar` (case-insensitive) are
    /// accepted; anything else is `None`.
    pub fn parse(code: &str) -> Option<Lang> {
        match code.trim().to_ascii_lowercase().as_str() {
            "en" => Some(Lang::English),
            "ar" => Some(Lang::Arabic),
            _ => None,
        }
    }
}

/// In-memory chat → language map. Lives for the process lifetime; there is
/// deliberately no persistence.
///
/// Per-key writes are last-write-wins. A human drives one interaction at a
/// time per chat, so no ordering guarantee is needed across interleavings.
#[derive(Debug, Default)]
pub struct PreferenceStore {
    inner: Mutex<HashMap<ChatId, Lang>>,
}

impl PreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored preference for the chat, or English when none was ever set.
    pub fn get(&self, chat_id: ChatId) -> Lang {
        let map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.get(&chat_id).copied().unwrap_or(Lang::English)
    }

    /// Store a preference. Returns false (state unchanged) for any code
    /// other than `en`/`ar`.
    pub fn set(&self, chat_id: ChatId, code: &str) -> bool {
        let Some(lang) = Lang::parse(code) else {
            return false;
        };
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.insert(chat_id, lang);
        true
    }
}
