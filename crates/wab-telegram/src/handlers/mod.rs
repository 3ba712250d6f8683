//! Telegram update handlers.
//!
//! Each handler converts the update into the core's `TextMessage`, records it in
//! the request log and lets the `Assistant` decide what to reply.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{Chat, Message},
};
use tracing::{debug, error};

use wab_core::{
    domain::{ChatId, UserId},
    messaging::types::TextMessage,
};

use crate::router::AppState;

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(incoming) = to_text_message(&msg) else {
        debug!(chat_id = msg.chat.id.0, "ignoring non-text message");
        return Ok(());
    };

    state.requests.log(&incoming);

    if let Err(e) = state
        .assistant
        .respond(state.messenger.as_ref(), &incoming)
        .await
    {
        error!(chat_id = incoming.chat_id.0, error = %e, "failed to reply");
    }
    Ok(())
}

pub fn to_text_message(msg: &Message) -> Option<TextMessage> {
    let text = msg.text()?;
    let user = msg.from()?;

    Some(TextMessage {
        chat_id: ChatId(msg.chat.id.0),
        user_id: UserId(user.id.0 as i64),
        username: user.username.clone(),
        first_name: Some(user.first_name.clone()).filter(|s| !s.is_empty()),
        last_name: user.last_name.clone(),
        chat_type: chat_kind(&msg.chat).to_string(),
        text: text.to_string(),
    })
}

fn chat_kind(chat: &Chat) -> &'static str {
    if chat.is_private() {
        "private"
    } else if chat.is_supergroup() {
        "supergroup"
    } else if chat.is_group() {
        "group"
    } else {
        "channel"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(json: serde_json::Value) -> Message {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn private_text_message_is_converted() {
        let msg = message(serde_json::json!({
            "message_id": 5,
            "date": 1_700_000_000,
            "chat": {"id": 42, "type": "private", "first_name": "Ada"},
            "from": {"id": 7, "is_bot": false, "first_name": "Ada", "last_name": "Lovelace", "username": "ada"},
            "text": "London"
        }));

        let m = to_text_message(&msg).unwrap();
        assert_eq!(m.chat_id, ChatId(42));
        assert_eq!(m.user_id, UserId(7));
        assert_eq!(m.username.as_deref(), Some("ada"));
        assert_eq!(m.first_name.as_deref(), Some("Ada"));
        assert_eq!(m.last_name.as_deref(), Some("Lovelace"));
        assert_eq!(m.chat_type, "private");
        assert_eq!(m.text, "London");
    }

    #[test]
    fn chat_kinds() {
        let chat = |json: serde_json::Value| -> Chat { serde_json::from_value(json).unwrap() };

        assert_eq!(
            chat_kind(&chat(serde_json::json!({"id": 42, "type": "private", "first_name": "Ada"}))),
            "private"
        );
        assert_eq!(
            chat_kind(&chat(serde_json::json!({"id": -100, "type": "supergroup", "title": "weather"}))),
            "supergroup"
        );
        assert_eq!(
            chat_kind(&chat(serde_json::json!({"id": -5, "type": "group", "title": "friends"}))),
            "group"
        );
    }
}
