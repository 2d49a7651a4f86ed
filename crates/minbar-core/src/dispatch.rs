//! The Dispatcher: routes each inbound update into its pipeline.
//!
//! This is the task boundary for failures: errors from the client ports are
//! logged for operators and converted into short fixed notices. Raw error
//! text never reaches the chat.

use std::{path::PathBuf, sync::Arc, time::Duration};

use tokio::{sync::oneshot, task::JoinHandle};

use crate::{
    domain::{ChatId, MessageRef},
    formatting::{convert_markdown_to_html, escape_html, preview, split_message},
    lang::{Lang, PreferenceStore},
    messaging::{
        port::MessagingPort,
        types::{CallbackQuery, IncomingUpdate, InlineButton, InlineKeyboard},
    },
    ports::{CompletionPort, TranscriptionPort},
    Result,
};

const WELCOME_TEXT: &str = "Assalamu alaikum! Send me a question as text or a voice note \
and I will answer it.\n\nChoose the language for my answers:";
const LANGUAGE_MENU_TEXT: &str = "Choose the language for my answers:";
const TRANSCRIBING_STATUS: &str = "🎤 Transcribing...";
const TRANSCRIPTION_UNCONFIGURED: &str =
    "Voice transcription is not configured. Please send your question as text.";
const TRANSCRIPTION_APOLOGY: &str =
    "Sorry, I couldn't process that audio. Please try again or send your question as text.";
const COMPLETION_APOLOGY: &str =
    "Sorry, something went wrong while preparing an answer. Please try again in a moment.";
const UNSUPPORTED_NOTICE: &str =
    "I can only handle text, voice, and audio messages right now.";

const SET_LANG_PREFIX: &str = "set_lang:";
const TRANSCRIPT_PREVIEW_CHARS: usize = 300;
const TYPING_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Clone, Debug)]
pub struct DispatchOptions {
    /// Where downloaded media lands before transcription.
    pub scratch_dir: PathBuf,
    /// False when no transcription credential was supplied at startup.
    pub transcription_available: bool,
    /// Replies longer than this are split into multiple messages.
    pub safe_message_len: usize,
}

pub struct Dispatcher {
    messenger: Arc<dyn MessagingPort>,
    transcriber: Arc<dyn TranscriptionPort>,
    completer: Arc<dyn CompletionPort>,
    prefs: PreferenceStore,
    opts: DispatchOptions,
}

impl Dispatcher {
    pub fn new(
        messenger: Arc<dyn MessagingPort>,
        transcriber: Arc<dyn TranscriptionPort>,
        completer: Arc<dyn CompletionPort>,
        prefs: PreferenceStore,
        opts: DispatchOptions,
    ) -> Self {
        Self {
            messenger,
            transcriber,
            completer,
            prefs,
            opts,
        }
    }

    /// Handle one inbound update. Never fails: anything the pipelines could
    /// not turn into a user notice themselves is logged here.
    pub async fn dispatch(&self, update: IncomingUpdate) {
        let chat_id = update.chat_id();
        let outcome = match update {
            IncomingUpdate::Text(m) => self.handle_text(m.chat_id, &m.text).await,
            IncomingUpdate::Voice(m) => self.handle_media(m.chat_id, &m.file_id, "voice").await,
            IncomingUpdate::Audio(m) => self.handle_media(m.chat_id, &m.file_id, "audio").await,
            IncomingUpdate::Callback(q) => self.handle_callback(q).await,
            IncomingUpdate::Unsupported { chat_id } => self.handle_unsupported(chat_id).await,
        };
        if let Err(err) = outcome {
            // Send failures land here; there is nothing further to tell the user.
            tracing::error!(chat_id = chat_id.0, error = %err, "update handling failed");
        }
    }

    async fn handle_text(&self, chat_id: ChatId, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        if let Some((cmd, args)) = parse_command(text) {
            match cmd.as_str() {
                "start" => return self.send_language_menu(chat_id, WELCOME_TEXT).await,
                "lang" => return self.handle_lang_command(chat_id, &args).await,
                // Not part of the grammar: treat it as a normal question.
                _ => {}
            }
        }

        self.answer_question(chat_id, text, None).await
    }

    async fn handle_lang_command(&self, chat_id: ChatId, args: &str) -> Result<()> {
        match Lang::parse(args) {
            Some(lang) => {
                self.prefs.set(chat_id, lang.code());
                self.messenger
                    .send_plain(chat_id, confirmation_text(lang))
                    .await?;
                Ok(())
            }
            // Missing or unknown argument: re-offer the menu, never an error.
            None => self.send_language_menu(chat_id, LANGUAGE_MENU_TEXT).await,
        }
    }

    async fn send_language_menu(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.messenger
            .send_inline_keyboard(chat_id, text, language_menu())
            .await?;
        Ok(())
    }

    async fn handle_callback(&self, q: CallbackQuery) -> Result<()> {
        let lang = q
            .data
            .strip_prefix(SET_LANG_PREFIX)
            .and_then(Lang::parse);

        let Some(lang) = lang else {
            // Unrecognized payload: acknowledge it so the button stops spinning.
            tracing::warn!(chat_id = q.chat_id.0, data = %q.data, "unrecognized callback payload");
            self.messenger.answer_callback_query(&q.callback_id).await?;
            return Ok(());
        };

        self.prefs.set(q.chat_id, lang.code());
        self.messenger.answer_callback_query(&q.callback_id).await?;
        if let Some(msg) = q.message {
            let _ = self.messenger.clear_reply_markup(msg).await;
        }
        self.messenger
            .send_plain(q.chat_id, confirmation_text(lang))
            .await?;
        Ok(())
    }

    async fn handle_media(&self, chat_id: ChatId, file_id: &str, kind: &str) -> Result<()> {
        if !self.opts.transcription_available {
            self.messenger
                .send_plain(chat_id, TRANSCRIPTION_UNCONFIGURED)
                .await?;
            return Ok(());
        }

        let status = self
            .messenger
            .send_plain(chat_id, TRANSCRIBING_STATUS)
            .await
            .ok();

        let path = match self
            .messenger
            .download_file(file_id, &self.opts.scratch_dir)
            .await
        {
            Ok(p) => p,
            Err(err) => {
                tracing::error!(chat_id = chat_id.0, kind, error = %err, "media download failed");
                return self.finish_status(chat_id, status, TRANSCRIPTION_APOLOGY).await;
            }
        };

        let transcript = self.transcriber.transcribe(&path).await;
        let _ = tokio::fs::remove_file(&path).await;

        let transcript = match transcript {
            Ok(t) => t,
            Err(err) => {
                tracing::error!(chat_id = chat_id.0, kind, error = %err, "transcription failed");
                return self.finish_status(chat_id, status, TRANSCRIPTION_APOLOGY).await;
            }
        };

        // Echo a short transcript preview in place of the status line.
        if let Some(st) = status {
            let echo = format!(
                "🎤 \"{}\"",
                escape_html(&preview(&transcript.text, TRANSCRIPT_PREVIEW_CHARS))
            );
            let _ = self.messenger.edit_html(st, &echo).await;
        }

        self.answer_question(chat_id, &transcript.text, transcript.language_code.as_deref())
            .await
    }

    async fn handle_unsupported(&self, chat_id: ChatId) -> Result<()> {
        self.messenger.send_plain(chat_id, UNSUPPORTED_NOTICE).await?;
        Ok(())
    }

    /// The completion leg shared by the text and media pipelines. The stored
    /// preference is authoritative for the response language; the detected
    /// transcription language is only a prompt hint.
    async fn answer_question(
        &self,
        chat_id: ChatId,
        content: &str,
        detected_language: Option<&str>,
    ) -> Result<()> {
        let target = self.prefs.get(chat_id);

        let typing = self.start_typing(chat_id);
        let answer = self
            .completer
            .complete(content, target, detected_language)
            .await;
        typing.stop().await;

        match answer {
            Ok(answer) => self.deliver(chat_id, &answer).await,
            Err(err) => {
                tracing::error!(chat_id = chat_id.0, error = %err, "completion failed");
                self.messenger.send_plain(chat_id, COMPLETION_APOLOGY).await?;
                Ok(())
            }
        }
    }

    /// Attempt rich delivery; on rejection, retry that chunk once as plain
    /// text.
    async fn deliver(&self, chat_id: ChatId, answer: &str) -> Result<()> {
        for chunk in split_message(answer, self.opts.safe_message_len) {
            let html = convert_markdown_to_html(&chunk);
            if let Err(err) = self.messenger.send_html(chat_id, &html).await {
                tracing::warn!(chat_id = chat_id.0, error = %err, "rich delivery rejected, retrying as plain text");
                self.messenger.send_plain(chat_id, &chunk).await?;
            }
        }
        Ok(())
    }

    async fn finish_status(
        &self,
        chat_id: ChatId,
        status: Option<MessageRef>,
        notice: &str,
    ) -> Result<()> {
        match status {
            Some(st) => {
                if self.messenger.edit_html(st, notice).await.is_err() {
                    self.messenger.send_plain(chat_id, notice).await?;
                }
                Ok(())
            }
            None => {
                self.messenger.send_plain(chat_id, notice).await?;
                Ok(())
            }
        }
    }

    fn start_typing(&self, chat_id: ChatId) -> TypingGuard {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let messenger = Arc::clone(&self.messenger);
        let task = tokio::spawn(async move {
            let mut tick = tokio::time::interval(TYPING_INTERVAL);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let _ = messenger.send_typing(chat_id).await;
                    }
                    _ = &mut stop_rx => break,
                }
            }
        });
        TypingGuard {
            stop: stop_tx,
            task,
        }
    }
}

struct TypingGuard {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl TypingGuard {
    async fn stop(self) {
        let _ = self.stop.send(());
        let _ = self.task.await;
    }
}

fn language_menu() -> InlineKeyboard {
    InlineKeyboard::new(vec![
        InlineButton {
            label: "English".to_string(),
            callback_data: format!("{SET_LANG_PREFIX}en"),
        },
        InlineButton {
            label: "العربية".to_string(),
            callback_data: format!("{SET_LANG_PREFIX}ar"),
        },
    ])
}

fn confirmation_text(lang: Lang) -> &'static str {
    match lang {
        Lang::English => "Language set to English.",
        Lang::Arabic => "تم ضبط اللغة على العربية.",
    }
}

/// Split `/cmd@botname arg1 ...` into a lowercased command name and its
/// argument string. `None` when the text is not slash-prefixed.
fn parse_command(text: &str) -> Option<(String, String)> {
    if !text.starts_with('/') {
        return None;
    }

    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    Some((cmd, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{
        atomic::{AtomicBool, AtomicI32, Ordering},
        Mutex,
    };

    use async_trait::async_trait;
    use std::path::Path;

    use crate::{
        errors::Error,
        messaging::types::{AudioMessage, TextMessage, VoiceMessage},
        ports::Transcript,
    };

    #[derive(Clone, Debug, PartialEq)]
    enum Sent {
        Html(ChatId, String),
        Plain(ChatId, String),
        Edit(MessageRef, String),
        Keyboard(ChatId, String, Vec<String>),
        ClearMarkup(MessageRef),
        AnswerCallback(String),
        Typing(ChatId),
        Download(String),
    }

    #[derive(Default)]
    struct RecordingMessenger {
        sent: Mutex<Vec<Sent>>,
        fail_html: AtomicBool,
        next_id: AtomicI32,
    }

    impl RecordingMessenger {
        fn record(&self, s: Sent) {
            self.sent.lock().unwrap().push(s);
        }

        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }

        /// Text messages visible to the user (excludes typing indicators
        /// and downloads).
        fn visible_texts(&self) -> Vec<String> {
            self.sent()
                .into_iter()
                .filter_map(|s| match s {
                    Sent::Html(_, t) | Sent::Plain(_, t) | Sent::Edit(_, t) => Some(t),
                    Sent::Keyboard(_, t, _) => Some(t),
                    _ => None,
                })
                .collect()
        }

        fn alloc(&self, chat_id: ChatId) -> MessageRef {
            MessageRef {
                chat_id,
                message_id: crate::domain::MessageId(self.next_id.fetch_add(1, Ordering::SeqCst)),
            }
        }
    }

    #[async_trait]
    impl MessagingPort for RecordingMessenger {
        async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
            if self.fail_html.load(Ordering::SeqCst) {
                return Err(Error::Transport("can't parse entities".to_string()));
            }
            self.record(Sent::Html(chat_id, html.to_string()));
            Ok(self.alloc(chat_id))
        }

        async fn send_plain(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
            self.record(Sent::Plain(chat_id, text.to_string()));
            Ok(self.alloc(chat_id))
        }

        async fn edit_html(&self, msg: MessageRef, html: &str) -> Result<()> {
            self.record(Sent::Edit(msg, html.to_string()));
            Ok(())
        }

        async fn send_inline_keyboard(
            &self,
            chat_id: ChatId,
            text: &str,
            keyboard: InlineKeyboard,
        ) -> Result<MessageRef> {
            let datas = keyboard
                .buttons
                .iter()
                .map(|b| b.callback_data.clone())
                .collect();
            self.record(Sent::Keyboard(chat_id, text.to_string(), datas));
            Ok(self.alloc(chat_id))
        }

        async fn clear_reply_markup(&self, msg: MessageRef) -> Result<()> {
            self.record(Sent::ClearMarkup(msg));
            Ok(())
        }

        async fn answer_callback_query(&self, callback_id: &str) -> Result<()> {
            self.record(Sent::AnswerCallback(callback_id.to_string()));
            Ok(())
        }

        async fn send_typing(&self, chat_id: ChatId) -> Result<()> {
            self.record(Sent::Typing(chat_id));
            Ok(())
        }

        async fn download_file(&self, file_id: &str, dest_dir: &Path) -> Result<PathBuf> {
            self.record(Sent::Download(file_id.to_string()));
            Ok(dest_dir.join("stub-media.oga"))
        }
    }

    enum TranscriberBehavior {
        Succeed(Transcript),
        Fail(String),
    }

    struct StubTranscriber(TranscriberBehavior);

    #[async_trait]
    impl TranscriptionPort for StubTranscriber {
        async fn transcribe(&self, _audio: &Path) -> Result<Transcript> {
            match &self.0 {
                TranscriberBehavior::Succeed(t) => Ok(t.clone()),
                TranscriberBehavior::Fail(msg) => Err(Error::Transcription(msg.clone())),
            }
        }
    }

    #[derive(Default)]
    struct StubCompleter {
        answer: String,
        fail: bool,
        seen: Mutex<Vec<(String, Lang, Option<String>)>>,
    }

    #[async_trait]
    impl CompletionPort for StubCompleter {
        async fn complete(
            &self,
            user_content: &str,
            target: Lang,
            detected_language: Option<&str>,
        ) -> Result<String> {
            self.seen.lock().unwrap().push((
                user_content.to_string(),
                target,
                detected_language.map(|s| s.to_string()),
            ));
            if self.fail {
                return Err(Error::Completion("503 upstream unavailable".to_string()));
            }
            Ok(self.answer.clone())
        }
    }

    struct Harness {
        messenger: Arc<RecordingMessenger>,
        completer: Arc<StubCompleter>,
        dispatcher: Dispatcher,
    }

    fn harness_with(transcriber: StubTranscriber, completer: StubCompleter) -> Harness {
        let messenger = Arc::new(RecordingMessenger::default());
        let completer = Arc::new(completer);
        let messenger_port: Arc<dyn MessagingPort> = messenger.clone();
        let completer_port: Arc<dyn CompletionPort> = completer.clone();
        let dispatcher = Dispatcher::new(
            messenger_port,
            Arc::new(transcriber),
            completer_port,
            PreferenceStore::new(),
            DispatchOptions {
                scratch_dir: PathBuf::from("/tmp"),
                transcription_available: true,
                safe_message_len: 4_000,
            },
        );
        Harness {
            messenger,
            completer,
            dispatcher,
        }
    }

    fn harness(answer: &str) -> Harness {
        harness_with(
            StubTranscriber(TranscriberBehavior::Fail("unused".to_string())),
            StubCompleter {
                answer: answer.to_string(),
                ..Default::default()
            },
        )
    }

    fn text(chat: i64, s: &str) -> IncomingUpdate {
        IncomingUpdate::Text(TextMessage {
            chat_id: ChatId(chat),
            text: s.to_string(),
        })
    }

    fn voice(chat: i64) -> IncomingUpdate {
        IncomingUpdate::Voice(VoiceMessage {
            chat_id: ChatId(chat),
            file_id: "file-1".to_string(),
            duration_secs: 4,
        })
    }

    #[tokio::test]
    async fn text_question_yields_exactly_one_answer_message() {
        let h = harness("Answer");
        h.dispatcher.dispatch(text(1, "What is fasting?")).await;

        let answers: Vec<_> = h
            .messenger
            .sent()
            .into_iter()
            .filter(|s| matches!(s, Sent::Html(_, t) if t.contains("Answer")))
            .collect();
        assert_eq!(answers.len(), 1);

        let seen = h.completer.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "What is fasting?");
        assert_eq!(seen[0].1, Lang::English);
        assert_eq!(seen[0].2, None);
    }

    #[tokio::test]
    async fn callback_updates_preference_and_confirms_once() {
        let h = harness("Answer");
        let menu_msg = MessageRef {
            chat_id: ChatId(5),
            message_id: crate::domain::MessageId(10),
        };
        h.dispatcher
            .dispatch(IncomingUpdate::Callback(CallbackQuery {
                chat_id: ChatId(5),
                callback_id: "cb-1".to_string(),
                data: "set_lang:ar".to_string(),
                message: Some(menu_msg),
            }))
            .await;

        let sent = h.messenger.sent();
        let confirmations = sent
            .iter()
            .filter(|s| matches!(s, Sent::Plain(_, t) if t == confirmation_text(Lang::Arabic)))
            .count();
        assert_eq!(confirmations, 1);
        assert_eq!(
            sent.iter()
                .filter(|s| matches!(s, Sent::ClearMarkup(m) if *m == menu_msg))
                .count(),
            1
        );
        assert_eq!(
            sent.iter()
                .filter(|s| matches!(s, Sent::AnswerCallback(id) if id == "cb-1"))
                .count(),
            1
        );

        // The stored preference now drives the completion target.
        h.dispatcher.dispatch(text(5, "سؤال")).await;
        let seen = h.completer.seen.lock().unwrap().clone();
        assert_eq!(seen[0].1, Lang::Arabic);
    }

    #[tokio::test]
    async fn unrecognized_callback_is_answered_and_ignored() {
        let h = harness("Answer");
        h.dispatcher
            .dispatch(IncomingUpdate::Callback(CallbackQuery {
                chat_id: ChatId(5),
                callback_id: "cb-2".to_string(),
                data: "set_lang:xx".to_string(),
                message: None,
            }))
            .await;

        let sent = h.messenger.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], Sent::AnswerCallback("cb-2".to_string()));
    }

    #[tokio::test]
    async fn unsupported_kind_gets_single_fixed_notice() {
        let h = harness("Answer");
        h.dispatcher
            .dispatch(IncomingUpdate::Unsupported { chat_id: ChatId(9) })
            .await;

        let sent = h.messenger.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0],
            Sent::Plain(ChatId(9), UNSUPPORTED_NOTICE.to_string())
        );
    }

    #[tokio::test]
    async fn unknown_lang_argument_reoffers_menu() {
        let h = harness("Answer");
        h.dispatcher.dispatch(text(2, "/lang fr")).await;

        let sent = h.messenger.sent();
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            Sent::Keyboard(chat, _, datas) => {
                assert_eq!(*chat, ChatId(2));
                assert_eq!(datas, &vec!["set_lang:en".to_string(), "set_lang:ar".to_string()]);
            }
            other => panic!("expected keyboard, got {other:?}"),
        }
        assert!(h.completer.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn lang_command_with_valid_code_confirms() {
        let h = harness("Answer");
        h.dispatcher.dispatch(text(2, "/lang@SomeBot AR")).await;

        let sent = h.messenger.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0],
            Sent::Plain(ChatId(2), confirmation_text(Lang::Arabic).to_string())
        );

        h.dispatcher.dispatch(text(2, "hello")).await;
        assert_eq!(h.completer.seen.lock().unwrap()[0].1, Lang::Arabic);
    }

    #[tokio::test]
    async fn start_command_offers_menu_without_completion() {
        let h = harness("Answer");
        h.dispatcher.dispatch(text(3, "/start")).await;

        assert!(matches!(&h.messenger.sent()[0], Sent::Keyboard(_, t, _) if t == WELCOME_TEXT));
        assert!(h.completer.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn transcription_failure_sends_fixed_apology_not_raw_error() {
        let h = harness_with(
            StubTranscriber(TranscriberBehavior::Fail(
                "job 123 exploded: internal stack trace".to_string(),
            )),
            StubCompleter {
                answer: "Answer".to_string(),
                ..Default::default()
            },
        );
        h.dispatcher.dispatch(voice(4)).await;

        let texts = h.messenger.visible_texts();
        assert!(texts.iter().any(|t| t == TRANSCRIPTION_APOLOGY));
        assert!(texts.iter().all(|t| !t.contains("stack trace")));
        assert!(h.completer.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn voice_pipeline_transcribes_then_completes() {
        let h = harness_with(
            StubTranscriber(TranscriberBehavior::Succeed(Transcript {
                text: "What breaks the fast?".to_string(),
                language_code: Some("ar".to_string()),
                language_confidence: Some(0.93),
            })),
            StubCompleter {
                answer: "Answer".to_string(),
                ..Default::default()
            },
        );
        h.dispatcher.dispatch(voice(4)).await;

        let seen = h.completer.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "What breaks the fast?");
        // Stored preference (unset => English) wins over the detected code.
        assert_eq!(seen[0].1, Lang::English);
        assert_eq!(seen[0].2, Some("ar".to_string()));

        let sent = h.messenger.sent();
        assert!(sent
            .iter()
            .any(|s| matches!(s, Sent::Edit(_, t) if t.contains("What breaks the fast?"))));
        assert!(sent
            .iter()
            .any(|s| matches!(s, Sent::Html(_, t) if t.contains("Answer"))));
    }

    #[tokio::test]
    async fn media_without_transcription_credential_gets_config_notice() {
        let messenger = Arc::new(RecordingMessenger::default());
        let messenger_port: Arc<dyn MessagingPort> = messenger.clone();
        let dispatcher = Dispatcher::new(
            messenger_port,
            Arc::new(StubTranscriber(TranscriberBehavior::Fail("unused".into()))),
            Arc::new(StubCompleter::default()),
            PreferenceStore::new(),
            DispatchOptions {
                scratch_dir: PathBuf::from("/tmp"),
                transcription_available: false,
                safe_message_len: 4_000,
            },
        );

        dispatcher
            .dispatch(IncomingUpdate::Audio(AudioMessage {
                chat_id: ChatId(6),
                file_id: "file-2".to_string(),
                duration_secs: 30,
                title: Some("lecture".to_string()),
            }))
            .await;

        let sent = messenger.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0],
            Sent::Plain(ChatId(6), TRANSCRIPTION_UNCONFIGURED.to_string())
        );
    }

    #[tokio::test]
    async fn completion_failure_sends_fixed_apology() {
        let h = harness_with(
            StubTranscriber(TranscriberBehavior::Fail("unused".to_string())),
            StubCompleter {
                fail: true,
                ..Default::default()
            },
        );
        h.dispatcher.dispatch(text(7, "a question")).await;

        let texts = h.messenger.visible_texts();
        assert_eq!(texts, vec![COMPLETION_APOLOGY.to_string()]);
    }

    #[tokio::test]
    async fn rejected_rich_delivery_retries_once_as_plain() {
        let h = harness("**Answer**");
        h.messenger.fail_html.store(true, Ordering::SeqCst);
        h.dispatcher.dispatch(text(8, "question")).await;

        let sent = h.messenger.sent();
        // The HTML attempt failed before recording, so only the plain retry
        // (with the raw markdown) is visible.
        assert!(sent
            .iter()
            .any(|s| matches!(s, Sent::Plain(_, t) if t == "**Answer**")));
        assert_eq!(
            sent.iter()
                .filter(|s| matches!(s, Sent::Plain(_, _)))
                .count(),
            1
        );
    }

    #[test]
    fn command_parsing_strips_bot_name_and_case_folds() {
        assert_eq!(
            parse_command("/Lang@MinbarBot ar"),
            Some(("lang".to_string(), "ar".to_string()))
        );
        assert_eq!(
            parse_command("/start"),
            Some(("start".to_string(), String::new()))
        );
        assert_eq!(parse_command("not a command"), None);
    }
}
