use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{errors::Error, Result};

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a sent message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

const CITY_NAME_MAX_CHARS: usize = 100;

/// A city name as typed by a user, trimmed and checked.
///
/// Every upstream adapter takes this instead of a raw `&str`; malformed input is
/// `InvalidArgument`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CityName(String);

impl CityName {
    pub fn parse(raw: &str) -> Result<Self> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(Error::InvalidArgument("city name is empty".to_string()));
        }
        if name.chars().count() > CITY_NAME_MAX_CHARS {
            return Err(Error::InvalidArgument(format!(
                "city name is longer than {CITY_NAME_MAX_CHARS} characters"
            )));
        }
        if name.chars().any(char::is_control) {
            return Err(Error::InvalidArgument(
                "city name contains control characters".to_string(),
            ));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CityName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Latitude / longitude pair. Both values are finite.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Option<Self> {
        if lat.is_finite() && lng.is_finite() {
            Some(Self { lat, lng })
        } else {
            None
        }
    }
}

/// One entry of the city lookup API.
///
/// Population comes from a free-tier data set and is often missing or stale.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CityRecord {
    pub name: String,
    pub country: String,
    #[serde(default)]
    pub population: Option<u64>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub is_capital: bool,
    #[serde(default)]
    pub region: Option<String>,
}

impl CityRecord {
    pub fn coordinates(&self) -> Option<Coordinates> {
        Coordinates::new(self.latitude, self.longitude)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoricalEvent {
    pub year: i32,
    pub description: String,
}

pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Raw image bytes plus their declared content type.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl ImagePayload {
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            content_type: JPEG_CONTENT_TYPE.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File name used when the transport needs one for an upload.
    pub fn file_name(&self) -> &'static str {
        match self.content_type.as_str() {
            "image/png" => "image.png",
            "image/gif" => "image.gif",
            _ => "image.jpg",
        }
    }
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

const KELVIN_OFFSET: f64 = 273.15;

/// A temperature reading, stored in Kelvin as the weather API reports it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Temperature {
    kelvin: f64,
}

impl Temperature {
    pub fn from_kelvin(kelvin: f64) -> Self {
        Self { kelvin }
    }

    pub fn celsius(&self) -> f64 {
        self.kelvin - KELVIN_OFFSET
    }

    pub fn fahrenheit(&self) -> f64 {
        self.celsius() * 9.0 / 5.0 + 32.0
    }

    /// `(celsius, fahrenheit)` rendered with `precision` decimals.
    pub fn format(&self, precision: usize) -> (String, String) {
        (
            format!("{:.*}", precision, self.celsius()),
            format!("{:.*}", precision, self.fahrenheit()),
        )
    }
}

/// Current conditions for one city.
#[derive(Clone, Debug, PartialEq)]
pub struct WeatherSnapshot {
    pub city_name: String,
    pub temperature: Temperature,
    pub feels_like: Temperature,
    pub condition: String,
    pub description: String,
    pub humidity: Option<u32>,
    pub pressure: Option<u32>,
    pub wind_speed: Option<f64>,
}
