use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::info;

use wab_core::{
    assistant::Assistant, audit::RequestLogger, config::Config, keys::Secret,
    messaging::port::MessagingPort,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub assistant: Arc<Assistant>,
    pub messenger: Arc<dyn MessagingPort>,
    pub requests: Arc<RequestLogger>,
}

pub async fn run_polling(
    cfg: Arc<Config>,
    token: Secret,
    assistant: Arc<Assistant>,
) -> anyhow::Result<()> {
    let bot = Bot::new(token.expose());

    match bot.get_me().await {
        Ok(me) => info!(bot = %me.username(), "Starting Weather Assistant Bot..."),
        Err(e) => anyhow::bail!("telegram rejected the bot token: {e}"),
    }
    info!(
        request_log = %cfg.request_log_path.display(),
        enabled = cfg.request_log_enabled,
        "request logging"
    );

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        assistant,
        messenger,
        requests: Arc::new(RequestLogger::new(
            cfg.request_log_path.clone(),
            cfg.request_log_enabled,
        )),
    });

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}
