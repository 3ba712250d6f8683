use std::{env, path::PathBuf, time::Duration};

use tracing::warn;

use crate::{
    errors::Error,
    services::timezone::{is_valid_time_format, Zone, DEFAULT_TIME_FORMAT},
    Result,
};

pub const DEFAULT_API_NINJAS_BASE_URL: &str = "https://api.api-ninjas.com/v1";
pub const DEFAULT_OPENWEATHER_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// Typed runtime configuration.
///
/// Secrets are not part of it; they are resolved through `KeyStore`.
#[derive(Clone, Debug)]
pub struct Config {
    // Secrets
    pub keys_dir: PathBuf,

    // Upstreams
    pub api_ninjas_base_url: String,
    pub openweather_base_url: String,
    pub http_timeout: Duration,
    pub image_category: Option<String>,

    // Presentation
    pub temp_precision: usize,
    pub time_format: String,
    pub default_timezone: Zone,

    // Logs
    pub error_log_path: PathBuf,
    pub error_log_max_bytes: u64,
    pub request_log_path: PathBuf,
    pub request_log_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            keys_dir: PathBuf::from("private_keys"),
            api_ninjas_base_url: DEFAULT_API_NINJAS_BASE_URL.to_string(),
            openweather_base_url: DEFAULT_OPENWEATHER_BASE_URL.to_string(),
            http_timeout: Duration::from_secs(10),
            image_category: None,
            temp_precision: 1,
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            default_timezone: Zone::utc(),
            error_log_path: PathBuf::from("error_logs/error.logs"),
            error_log_max_bytes: 10 * 1024 * 1024,
            request_log_path: PathBuf::from("logs/user_requests.jsonl"),
            request_log_enabled: true,
        }
    }
}

impl Config {
    /// `.env` (if any) then the process environment; unset keys keep their defaults.
    pub fn load() -> Result<Self> {
        // Existing env always wins over `.env`.
        match dotenvy::dotenv() {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => return Err(Error::Config(format!("failed to read .env: {e}"))),
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key/value source. `load` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let d = Self::default();
        let get = |key: &str| lookup(key).and_then(non_empty);

        let http_timeout_secs = parse_u64(get("HTTP_TIMEOUT_SECS"), "HTTP_TIMEOUT_SECS")?
            .unwrap_or(d.http_timeout.as_secs());
        if http_timeout_secs == 0 {
            return Err(Error::Config("HTTP_TIMEOUT_SECS must be > 0".to_string()));
        }

        let temp_precision = parse_u64(get("TEMP_PRECISION"), "TEMP_PRECISION")?
            .map(|p| p.min(6) as usize)
            .unwrap_or(d.temp_precision);

        let time_format = match get("TIME_FORMAT") {
            Some(f) if is_valid_time_format(&f) => f,
            Some(f) => {
                warn!(time_format = %f, "invalid TIME_FORMAT, using default");
                d.time_format
            }
            None => d.time_format,
        };

        let default_timezone = match get("DEFAULT_TIMEZONE") {
            Some(tz) => Zone::parse(&tz)?,
            None => d.default_timezone,
        };

        let error_log_max_bytes = parse_u64(get("ERROR_LOG_MAX_MB"), "ERROR_LOG_MAX_MB")?
            .map(|mb| mb.saturating_mul(1024 * 1024))
            .unwrap_or(d.error_log_max_bytes);

        Ok(Self {
            keys_dir: get("KEYS_DIR").map(PathBuf::from).unwrap_or(d.keys_dir),
            api_ninjas_base_url: get("API_NINJAS_BASE_URL").unwrap_or(d.api_ninjas_base_url),
            openweather_base_url: get("OPENWEATHER_BASE_URL").unwrap_or(d.openweather_base_url),
            http_timeout: Duration::from_secs(http_timeout_secs),
            image_category: get("IMAGE_CATEGORY"),
            temp_precision,
            time_format,
            default_timezone,
            error_log_path: get("ERROR_LOG_PATH")
                .map(PathBuf::from)
                .unwrap_or(d.error_log_path),
            error_log_max_bytes,
            request_log_path: get("REQUEST_LOG_PATH")
                .map(PathBuf::from)
                .unwrap_or(d.request_log_path),
            request_log_enabled: get("REQUEST_LOG_ENABLED")
                .map(|v| parse_bool(&v))
                .unwrap_or(d.request_log_enabled),
        })
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_u64(v: Option<String>, key: &str) -> Result<Option<u64>> {
    v.map(|s| {
        s.trim()
            .parse::<u64>()
            .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got {s:?}")))
    })
    .transpose()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.trim().to_string())
    }
}
