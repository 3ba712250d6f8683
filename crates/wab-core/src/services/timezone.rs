use std::sync::Arc;

use async_trait::async_trait;
use chrono::{
    format::{Item, StrftimeItems},
    DateTime, FixedOffset, Offset, Utc,
};
use chrono_tz::Tz;
use tracing::debug;
use tzf_rs::DefaultFinder;

use crate::{
    domain::{CityName, Coordinates},
    errors::Error,
    Result,
};

pub const DEFAULT_TIME_FORMAT: &str = "%H-%M";
pub const NO_TIME_DIFFERENCE_TEXT: &str =
    "Unable to determine time difference - timezone not found";

/// Source of city coordinates (the aggregation façade in production).
#[async_trait]
pub trait CoordinatesProvider: Send + Sync {
    async fn coordinates(&self, city: &CityName) -> Option<Coordinates>;
}

/// Pure mapping from a point on the map to a timezone.
pub trait TimezoneLocator: Send + Sync {
    fn locate(&self, at: Coordinates) -> Option<Zone>;
}

/// An IANA timezone. Offsets depend on the instant (daylight saving).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Zone(Tz);

impl Zone {
    pub fn utc() -> Self {
        Self(Tz::UTC)
    }

    /// Nautical zone for whole-hour offsets east of UTC.
    ///
    /// Names follow the IANA `Etc/GMT` convention, where the sign is inverted:
    /// `Etc/GMT-3` is three hours *ahead* of UTC.
    pub fn nautical(hours_east: i32) -> Option<Self> {
        if !(-12..=14).contains(&hours_east) {
            return None;
        }
        let name = match hours_east {
            0 => "Etc/GMT".to_string(),
            h if h > 0 => format!("Etc/GMT-{h}"),
            h => format!("Etc/GMT+{}", -h),
        };
        Self::parse(&name).ok()
    }

    /// Parse an IANA name such as `Europe/London`, `UTC` or `Etc/GMT+5`.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s == "Z" {
            return Ok(Self::utc());
        }
        s.parse::<Tz>()
            .map(Self)
            .map_err(|_| Error::Config(format!("unsupported timezone: {s}")))
    }

    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    pub fn offset_at(&self, at: DateTime<Utc>) -> FixedOffset {
        at.with_timezone(&self.0).offset().fix()
    }

    pub fn offset_hours_at(&self, at: DateTime<Utc>) -> f64 {
        f64::from(self.offset_at(at).local_minus_utc()) / 3600.0
    }
}

/// Longitude-based locator: 15° bands around the prime meridian.
///
/// Ignores political borders and daylight saving.
#[derive(Clone, Copy, Debug, Default)]
pub struct NauticalLocator;

impl TimezoneLocator for NauticalLocator {
    fn locate(&self, at: Coordinates) -> Option<Zone> {
        if !(-180.0..=180.0).contains(&at.lng) {
            return None;
        }
        let hours = (at.lng / 15.0).round() as i32;
        Zone::nautical(hours.clamp(-12, 12))
    }
}

/// Locator backed by the timezone boundary polygons bundled with `tzf-rs`.
///
/// Points the polygons don't resolve fall back to the nautical band.
pub struct BoundaryLocator {
    finder: DefaultFinder,
}

impl BoundaryLocator {
    pub fn new() -> Self {
        Self {
            finder: DefaultFinder::new(),
        }
    }
}

impl Default for BoundaryLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl TimezoneLocator for BoundaryLocator {
    fn locate(&self, at: Coordinates) -> Option<Zone> {
        let name = self.finder.get_tz_name(at.lng, at.lat);
        match Zone::parse(name) {
            Ok(zone) => Some(zone),
            Err(_) => {
                debug!(lat = at.lat, lng = at.lng, name, "no boundary zone, using nautical band");
                NauticalLocator.locate(at)
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct TimezoneConfig {
    pub time_format: String,
    pub default_zone: Zone,
}

impl Default for TimezoneConfig {
    fn default() -> Self {
        Self {
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            default_zone: Zone::utc(),
        }
    }
}

/// `true` when chrono can render `fmt` without erroring.
pub fn is_valid_time_format(fmt: &str) -> bool {
    !StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error))
}

pub fn format_time(at: DateTime<Utc>, zone: &Zone, fmt: &str) -> String {
    let fmt = if is_valid_time_format(fmt) {
        fmt
    } else {
        DEFAULT_TIME_FORMAT
    };
    at.with_timezone(&zone.0).format(fmt).to_string()
}

pub struct TimezoneService {
    coordinates: Arc<dyn CoordinatesProvider>,
    locator: Arc<dyn TimezoneLocator>,
    cfg: TimezoneConfig,
}

impl TimezoneService {
    pub fn new(
        coordinates: Arc<dyn CoordinatesProvider>,
        locator: Arc<dyn TimezoneLocator>,
        cfg: TimezoneConfig,
    ) -> Self {
        Self {
            coordinates,
            locator,
            cfg,
        }
    }

    pub async fn get_timezone(&self, city: &CityName) -> Option<Zone> {
        let at = self.coordinates.coordinates(city).await?;
        self.locator.locate(at)
    }

    /// Local time in `city`; the configured default zone when it can't be located.
    pub async fn get_current_time(&self, city: &CityName, time_format: Option<&str>) -> String {
        let zone = self
            .get_timezone(city)
            .await
            .unwrap_or(self.cfg.default_zone);
        format_time(
            Utc::now(),
            &zone,
            time_format.unwrap_or(&self.cfg.time_format),
        )
    }

    pub async fn format_time_difference(&self, source: &CityName, target: &CityName) -> String {
        let (a, b) = tokio::join!(self.get_timezone(source), self.get_timezone(target));
        let (Some(a), Some(b)) = (a, b) else {
            return NO_TIME_DIFFERENCE_TEXT.to_string();
        };
        describe_difference(source, target, &a, &b, Utc::now())
    }
}

fn describe_difference(
    source: &CityName,
    target: &CityName,
    a: &Zone,
    b: &Zone,
    now: DateTime<Utc>,
) -> String {
    let diff = b.offset_hours_at(now) - a.offset_hours_at(now);
    if diff == 0.0 {
        return format!("{source} and {target} share the same time");
    }
    let direction = if diff > 0.0 { "ahead" } else { "behind" };
    format!(
        "Time difference between {source} and {target}: {:.1} hours {direction}",
        diff.abs()
    )
}
