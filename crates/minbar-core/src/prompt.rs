//! System-prompt construction for the completion service.
//!
//! These are prompt-construction rules only; the bot does not verify that
//! the model obeys them.

use crate::lang::Lang;

const BASE: &str = "You are a careful, knowledgeable assistant answering questions about Islam.\n\
When primary sources support the answer, cite them briefly (Qur'an verse numbers, \
well-known hadith collections).\n\
Stay neutral between schools of thought and avoid sectarian bias.";

/// Build the system prompt for one completion call.
///
/// The response language is fixed to `target` (the stored chat preference).
/// A detected transcription language, when present and different from the
/// target, is surfaced purely as a translation hint.
pub fn system_prompt(target: Lang, detected_language: Option<&str>) -> String {
    let mut out = format!(
        "{BASE}\n\nAlways answer in {}. If the question is written or spoken in another \
language, first translate or summarize it, then answer in {}.",
        target.english_name(),
        target.english_name()
    );

    if let Some(code) = detected_language {
        let code = code.trim();
        if !code.is_empty() && !code.eq_ignore_ascii_case(target.code()) {
            out.push_str(&format!(
                "\n\nThe question was transcribed from speech; the detected language code \
is \"{code}\"."
            ));
        }
    }

    out
}
