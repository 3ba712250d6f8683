use crate::domain::{ChatId, UserId};

/// Incoming plain-text message.
///
/// Telegram-specific fields should live in the Telegram adapter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextMessage {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// "private", "group", "supergroup" or "channel".
    pub chat_type: String,
    pub text: String,
}

/// Outgoing "chat action" (typing indicator, etc).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatAction {
    Typing,
    UploadPhoto,
}

/// Capabilities / feature flags of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub supports_photos: bool,
    pub supports_chat_actions: bool,
    pub max_message_len: usize,
}
