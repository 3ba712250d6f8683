use std::sync::Arc;

use crate::{
    audit::ErrorLogger,
    domain::{CityName, CityRecord, Coordinates},
    errors::Error,
    failsafe::FailSafe,
    http::HttpApiClient,
    Result,
};

pub const CITY_NOT_FOUND_TEXT: &str =
    "Something is wrong. Are you sure there is such a city? Can you check the map please?";

/// City lookup adapter (`GET {base}/city?name=…`).
#[derive(Clone, Debug)]
pub struct CityLookupService {
    client: Arc<HttpApiClient>,
    errors: Arc<ErrorLogger>,
}

impl CityLookupService {
    pub fn new(client: Arc<HttpApiClient>, errors: Arc<ErrorLogger>) -> Self {
        Self { client, errors }
    }

    /// First matching city. Failures are logged here and returned to the caller.
    ///
    /// Only an empty result is `CityNotFound`. Transport and parse failures stay
    /// `Upstream`; `get_population_summary` renders both as the not-found text.
    pub async fn get_city_record(&self, city: &CityName) -> Result<CityRecord> {
        let result = self.fetch_city_record(city).await;
        if let Err(e) = &result {
            self.errors.log(e, "get_city_record", Some(city.as_str()));
        }
        result
    }

    async fn fetch_city_record(&self, city: &CityName) -> Result<CityRecord> {
        let resp = self
            .client
            .request("city", &[("name", city.to_string())], &[])
            .await?;
        let records: Vec<CityRecord> = resp.json()?;
        records
            .into_iter()
            .next()
            .ok_or_else(|| Error::CityNotFound(city.to_string()))
    }

    /// `None` on any failure; the record lookup has already logged it.
    pub async fn get_coordinates(&self, city: &CityName) -> Option<Coordinates> {
        FailSafe::new("get_coordinates")
            .input(city.as_str())
            .run(
                async { Ok::<_, Error>(self.get_city_record(city).await?.coordinates()) },
                None,
            )
            .await
    }

    pub async fn get_population_summary(&self, city: &CityName) -> String {
        FailSafe::new("get_population_summary")
            .input(city.as_str())
            .run(
                async { Ok::<_, Error>(format_population(&self.get_city_record(city).await?)) },
                CITY_NOT_FOUND_TEXT.to_string(),
            )
            .await
    }
}

pub fn format_population(city: &CityRecord) -> String {
    let capital = if city.is_capital {
        "capital"
    } else {
        "not capital"
    };
    let population = city
        .population
        .map(|p| p.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let location = match city.region.as_deref().filter(|r| !r.trim().is_empty()) {
        Some(region) => format!(" and on the map can be found in {region}"),
        None => String::new(),
    };

    format!(
        "Just some cold facts: {} is {capital} of {} with the population of {population} \
(but that's not for sure, because we're using free API :D) people{location}!",
        city.name, city.country
    )
}
