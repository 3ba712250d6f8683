use std::sync::Arc;

use rand::Rng;
use serde::Deserialize;

use crate::{
    audit::ErrorLogger, domain::HistoricalEvent, errors::Error, failsafe::FailSafe,
    http::HttpApiClient, Result,
};

/// Random years are drawn from this range, ancient history through near-present.
pub const EARLIEST_YEAR: i32 = -351;
pub const LATEST_YEAR: i32 = 2023;

pub const NO_EVENT_TEXT: &str = "Nothing to show this time";

#[derive(Deserialize)]
struct EventEntry {
    #[serde(default)]
    event: String,
}

pub fn random_year() -> i32 {
    rand::thread_rng().gen_range(EARLIEST_YEAR..=LATEST_YEAR)
}

pub fn format_event(event: &HistoricalEvent) -> String {
    format!(
        "Did you know that in year: {} - {}",
        event.year, event.description
    )
}

/// Historical events adapter (`GET {base}/historicalevents?year=…`).
#[derive(Clone, Debug)]
pub struct HistoricalEventService {
    client: Arc<HttpApiClient>,
    errors: Arc<ErrorLogger>,
}

impl HistoricalEventService {
    pub fn new(client: Arc<HttpApiClient>, errors: Arc<ErrorLogger>) -> Self {
        Self { client, errors }
    }

    /// First event of `year`; an empty result is `EventNotFound`.
    pub async fn get_event(&self, year: i32) -> Result<HistoricalEvent> {
        let resp = self
            .client
            .request("historicalevents", &[("year", year.to_string())], &[])
            .await?;
        let entries: Vec<EventEntry> = resp.json()?;
        entries
            .into_iter()
            .map(|e| e.event.trim().to_string())
            .find(|e| !e.is_empty())
            .map(|description| HistoricalEvent { year, description })
            .ok_or(Error::EventNotFound(year))
    }

    /// A sentence about `year` (random when `None`), or `NO_EVENT_TEXT`.
    pub async fn get_random_event(&self, year: Option<i32>) -> String {
        let year = year.unwrap_or_else(random_year);
        let input = year.to_string();
        FailSafe::new("get_random_event")
            .input(&input)
            .logged(&self.errors)
            .run(
                async { Ok::<_, Error>(format_event(&self.get_event(year).await?)) },
                NO_EVENT_TEXT.to_string(),
            )
            .await
    }
}
