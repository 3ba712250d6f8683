//! Bot dialogue: what to say for a given incoming text.
//!
//! Transport-agnostic. The Telegram crate converts updates into `TextMessage`
//! and hands them to `Assistant::respond` together with a `MessagingPort`.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    audit::ErrorLogger,
    domain::{CityName, ImagePayload},
    facade::ApiService,
    messaging::{
        port::MessagingPort,
        types::{ChatAction, TextMessage},
    },
    services::WeatherService,
    Result,
};

pub const START_MESSAGE: &str = "👋 Hi! I'm your Weather Assistant Bot!\n\n\
I can help you with:\n\
🌤️ Current weather in any city\n\
📊 City population information\n\
📚 Random historical facts\n\
🖼️ Random images\n\n\
Just type any city name to get started!";

pub const HELP_MESSAGE: &str = "🤖 Here's what I can do:\n\n\
1️⃣ Get weather - just type a city name\n\
2️⃣ View population stats - included with weather\n\
3️⃣ Learn history - random event with each request\n\
4️⃣ See images - automatic with each weather request\n\n\
Commands:\n\
/start - Start the bot\n\
/help - Show this help message\n\
/stop - Stop the bot";

pub const STOP_MESSAGE: &str = "🌟 Thanks for using Weather Assistant Bot!\n\
Come back anytime - just type /start to begin again.";

pub const ERROR_MESSAGE: &str = "⚠️ Oops! Something went wrong...\n\
Please make sure to:\n\
- Use English characters only\n\
- Type a valid city name\n\
Try again or type /help for assistance.";

pub const PRESERVED_WORD_MESSAGE: &str = "⛔ This word is no longer supported.\n\
Please use regular city names instead.";

pub const IMAGE_BELOW_LINE: &str = "🖼️ Below we have a random image for you. Enjoy!";

/// Retired inputs, compared case-insensitively.
const PRESERVED_WORDS: &[&str] = &[
    "orgrimar",
    "orgrimmar",
    "orgri",
    "лампочка",
    "lampo4ka",
    "lampochka",
    "deepthroatovoassenburg",
    "assachussats",
    "missititty",
];

pub fn is_preserved_word(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    PRESERVED_WORDS.iter().any(|w| *w == lower)
}

/// Incoming text, classified once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Incoming {
    Start,
    Help,
    Stop,
    UnknownCommand(String),
    Preserved,
    City(CityName),
    Invalid,
}

impl Incoming {
    pub fn classify(text: &str) -> Self {
        let text = text.trim();
        if text.starts_with('/') {
            return match command_name(text).as_str() {
                "start" => Self::Start,
                "help" => Self::Help,
                "stop" => Self::Stop,
                other => Self::UnknownCommand(other.to_string()),
            };
        }
        if is_preserved_word(text) {
            return Self::Preserved;
        }
        match CityName::parse(text) {
            Ok(city) => Self::City(city),
            Err(_) => Self::Invalid,
        }
    }

    /// Fixed reply for everything except a city lookup.
    pub fn canned_reply(&self) -> Option<&'static str> {
        match self {
            Self::Start => Some(START_MESSAGE),
            Self::Help | Self::UnknownCommand(_) => Some(HELP_MESSAGE),
            Self::Stop => Some(STOP_MESSAGE),
            Self::Preserved => Some(PRESERVED_WORD_MESSAGE),
            Self::Invalid => Some(ERROR_MESSAGE),
            Self::City(_) => None,
        }
    }
}

// Telegram may send `/cmd@botname arg1 ...`
fn command_name(text: &str) -> String {
    text.split_whitespace()
        .next()
        .unwrap_or("")
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase()
}

/// Everything the bot has to say about one city.
#[derive(Clone, Debug)]
pub struct CityReport {
    pub weather: String,
    pub population: String,
    pub event: String,
    pub image: Option<ImagePayload>,
}

impl CityReport {
    pub fn render_text(&self) -> String {
        let mut out = format!(
            "🌍 Weather section:\n{}\n\n\
👥 City population info:\n{}\n\n\
📜 Random historical event:\n{}",
            self.weather, self.population, self.event
        );
        if self.image.is_some() {
            out.push_str("\n\n");
            out.push_str(IMAGE_BELOW_LINE);
        }
        out
    }
}

pub struct Assistant {
    api: Arc<ApiService>,
    weather: Arc<WeatherService>,
    errors: Arc<ErrorLogger>,
    image_category: Option<String>,
}

impl Assistant {
    pub fn new(
        api: Arc<ApiService>,
        weather: Arc<WeatherService>,
        errors: Arc<ErrorLogger>,
        image_category: Option<String>,
    ) -> Self {
        Self {
            api,
            weather,
            errors,
            image_category,
        }
    }

    /// The four upstream lookups run concurrently; none of them can fail.
    pub async fn city_report(&self, city: &CityName) -> CityReport {
        let (weather, population, event, image) = tokio::join!(
            self.weather.get_formatted_weather(city),
            self.api.population_summary(city),
            self.api.random_event(None),
            self.api.random_image(self.image_category.as_deref()),
        );
        CityReport {
            weather,
            population,
            event,
            image,
        }
    }

    /// Reply to one message. Only a failure to deliver the text is an error.
    pub async fn respond(&self, messenger: &dyn MessagingPort, msg: &TextMessage) -> Result<()> {
        let city = match Incoming::classify(&msg.text) {
            Incoming::City(city) => city,
            other => {
                if let Some(reply) = other.canned_reply() {
                    messenger.send_text(msg.chat_id, reply).await?;
                }
                return Ok(());
            }
        };

        let caps = messenger.capabilities();
        if caps.supports_chat_actions {
            indicate(messenger, msg, ChatAction::Typing).await;
        }

        let mut report = self.city_report(&city).await;
        if !caps.supports_photos {
            report.image = None;
        }
        info!(
            city = %city,
            chat_id = msg.chat_id.0,
            has_image = report.image.is_some(),
            "city report ready"
        );
        messenger
            .send_text(msg.chat_id, &report.render_text())
            .await?;

        let Some(image) = report.image.as_ref() else {
            return Ok(());
        };
        if caps.supports_chat_actions {
            indicate(messenger, msg, ChatAction::UploadPhoto).await;
        }
        if let Err(e) = messenger.send_photo(msg.chat_id, image).await {
            warn!(city = %city, "photo delivery failed");
            self.errors.log(&e, "send_photo", Some(city.as_str()));
        }
        Ok(())
    }
}

// Chat actions are cosmetic; a failure is only worth a debug line.
async fn indicate(messenger: &dyn MessagingPort, msg: &TextMessage, action: ChatAction) {
    if let Err(e) = messenger.send_chat_action(msg.chat_id, action).await {
        debug!(?action, error = %e, "chat action failed");
    }
}
