//! Telegram adapter (teloxide).
//!
//! This crate implements the `wab-core` MessagingPort over Telegram Bot API.

use async_trait::async_trait;

use teloxide::{prelude::*, types::InputFile};

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use wab_core::{
    domain::{ChatId, ImagePayload, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{ChatAction, MessagingCapabilities},
    },
    Result,
};

pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    fn message_ref(chat_id: ChatId, msg: &Message) -> MessageRef {
        MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        }
    }

    /// One retry, and only when Telegram asks us to wait (429 flood control).
    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(teloxide::RequestError::RetryAfter(d)) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    tracing::warn!(wait = ?d, "telegram flood control, retrying once");
                    sleep(d).await;
                }
                Err(other) => return Err(Self::map_err(other)),
            }
        }
    }
}

fn split_for_telegram(text: &str, limit: usize) -> Vec<String> {
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(limit)
        .map(|c| c.iter().collect::<String>())
        .collect()
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            supports_photos: true,
            supports_chat_actions: true,
            max_message_len: TELEGRAM_MESSAGE_LIMIT,
        }
    }

    /// Plain text; anything past the Telegram limit goes out as extra messages.
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        let mut first = None;
        for chunk in split_for_telegram(text, self.capabilities().max_message_len) {
            let msg = self
                .with_retry(|| self.bot.send_message(Self::tg_chat(chat_id), chunk.clone()))
                .await?;
            first.get_or_insert(Self::message_ref(chat_id, &msg));
        }
        first.ok_or_else(|| Error::External("telegram error: nothing to send".to_string()))
    }

    async fn send_photo(&self, chat_id: ChatId, image: &ImagePayload) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                let file = InputFile::memory(image.bytes.clone()).file_name(image.file_name());
                self.bot.send_photo(Self::tg_chat(chat_id), file)
            })
            .await?;
        Ok(Self::message_ref(chat_id, &msg))
    }

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()> {
        let tg_action = match action {
            ChatAction::Typing => teloxide::types::ChatAction::Typing,
            ChatAction::UploadPhoto => teloxide::types::ChatAction::UploadPhoto,
        };
        self.with_retry(|| self.bot.send_chat_action(Self::tg_chat(chat_id), tg_action))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_sent_as_is() {
        assert_eq!(split_for_telegram("hello", 10), vec!["hello".to_string()]);
        assert_eq!(split_for_telegram("", 10), vec![String::new()]);
    }

    #[test]
    fn long_text_is_split_on_char_boundaries() {
        let text = "ё".repeat(25);
        let parts = split_for_telegram(&text, 10);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].chars().count(), 10);
        assert_eq!(parts[2].chars().count(), 5);
        assert_eq!(parts.concat(), text);
    }

    #[test]
    fn capabilities_match_telegram_limits() {
        let caps = TelegramMessenger::new(Bot::new("123:token")).capabilities();
        assert!(caps.supports_photos);
        assert!(caps.supports_chat_actions);
        assert_eq!(caps.max_message_len, TELEGRAM_MESSAGE_LIMIT);
    }
}
