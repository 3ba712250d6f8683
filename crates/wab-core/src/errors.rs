/// Core error type for the bot.
///
/// Upstream adapters map their failures into this type so the presentation
/// layer can turn any of them into a polite sentence. Secret errors are the only
/// ones expected to reach `main` and abort startup.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("city not found: {0}")]
    CityNotFound(String),

    #[error("no historical event for year {0}")]
    EventNotFound(i32),

    #[error("upstream error{}: {message}", status_suffix(.status))]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    #[error("secret not found: {0}")]
    SecretNotFound(String),

    #[error("secret invalid: {0}")]
    SecretInvalid(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }

    /// HTTP status carried by an upstream failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => *status,
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::CityNotFound(_) | Self::EventNotFound(_))
    }

    /// Configuration problems that should stop the bot from starting.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SecretNotFound(_) | Self::SecretInvalid(_) | Self::Config(_)
        )
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_display_includes_status_when_known() {
        let e = Error::upstream(Some(503), "city: service unavailable");
        assert_eq!(e.to_string(), "upstream error (503): city: service unavailable");
        assert_eq!(e.status(), Some(503));

        let e = Error::upstream(None, "timed out");
        assert_eq!(e.to_string(), "upstream error: timed out");
        assert_eq!(e.status(), None);
    }

    #[test]
    fn only_configuration_errors_are_fatal() {
        assert!(Error::SecretNotFound("telegram-bot-token".into()).is_fatal());
        assert!(Error::SecretInvalid("city-provider-key".into()).is_fatal());
        assert!(!Error::CityNotFound("Atlantis".into()).is_fatal());
        assert!(!Error::upstream(Some(500), "boom").is_fatal());
    }
}
