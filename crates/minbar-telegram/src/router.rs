use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*, types::CallbackQuery};

use minbar_core::{
    config::Config,
    dispatch::{DispatchOptions, Dispatcher as UpdateDispatcher},
    lang::PreferenceStore,
    messaging::port::MessagingPort,
    ports::{CompletionPort, TranscriptionPort},
};

use crate::update::{classify_callback, classify_message};
use crate::TelegramMessenger;

/// Start long polling and route every update through the core dispatcher.
/// This is the process's only persistent connection; it runs until the
/// process is terminated.
pub async fn run_polling(
    cfg: Arc<Config>,
    transcriber: Arc<dyn TranscriptionPort>,
    completer: Arc<dyn CompletionPort>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    if let Ok(me) = bot.get_me().await {
        tracing::info!("minbar started: @{}", me.username());
    }
    if !cfg.transcription_available {
        tracing::warn!("ASSEMBLYAI_API_KEY not set; voice and audio messages will be declined");
    }

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let dispatcher = Arc::new(UpdateDispatcher::new(
        messenger,
        transcriber,
        completer,
        PreferenceStore::new(),
        DispatchOptions {
            scratch_dir: cfg.temp_dir.clone(),
            transcription_available: cfg.transcription_available,
            safe_message_len: cfg.telegram_safe_limit,
        },
    ));

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handle_callback))
        .branch(Update::filter_message().endpoint(handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![dispatcher])
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(
    msg: Message,
    dispatcher: Arc<UpdateDispatcher>,
) -> ResponseResult<()> {
    dispatcher.dispatch(classify_message(&msg)).await;
    Ok(())
}

async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    dispatcher: Arc<UpdateDispatcher>,
) -> ResponseResult<()> {
    match classify_callback(&q) {
        Some(update) => dispatcher.dispatch(update).await,
        None => {
            // No originating message: nothing to do beyond acknowledging it.
            let _ = bot.answer_callback_query(q.id).await;
        }
    }
    Ok(())
}
