//! Aggregation façade over the API Ninjas adapters.
//!
//! Built once per process. Every method here is total: failures are logged by
//! the adapter that saw them and come back as a fallback value.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    audit::ErrorLogger,
    domain::{CityName, Coordinates, ImagePayload},
    http::HttpApiClient,
    services::{
        CityLookupService, CoordinatesProvider, HistoricalEventService, RandomImageService,
    },
};

#[derive(Clone, Debug)]
pub struct ApiService {
    city: CityLookupService,
    history: HistoricalEventService,
    image: RandomImageService,
}

impl ApiService {
    pub fn new(
        city: CityLookupService,
        history: HistoricalEventService,
        image: RandomImageService,
    ) -> Self {
        Self {
            city,
            history,
            image,
        }
    }

    /// All three adapters on one shared client.
    pub fn from_parts(client: Arc<HttpApiClient>, errors: Arc<ErrorLogger>) -> Self {
        Self::new(
            CityLookupService::new(client.clone(), errors.clone()),
            HistoricalEventService::new(client.clone(), errors.clone()),
            RandomImageService::new(client, errors),
        )
    }

    pub async fn city_coordinates(&self, city: &CityName) -> Option<Coordinates> {
        self.city.get_coordinates(city).await
    }

    pub async fn population_summary(&self, city: &CityName) -> String {
        self.city.get_population_summary(city).await
    }

    pub async fn random_event(&self, year: Option<i32>) -> String {
        self.history.get_random_event(year).await
    }

    pub async fn random_image(&self, category: Option<&str>) -> Option<ImagePayload> {
        self.image.get_random_image(category).await
    }
}

#[async_trait]
impl CoordinatesProvider for ApiService {
    async fn coordinates(&self, city: &CityName) -> Option<Coordinates> {
        self.city_coordinates(city).await
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;
    use crate::{
        http::{ApiAuth, DEFAULT_TIMEOUT},
        keys::Secret,
        services::{city::CITY_NOT_FOUND_TEXT, history::NO_EVENT_TEXT},
    };

    fn facade(base: &str) -> ApiService {
        let client = HttpApiClient::new(
            base,
            ApiAuth::api_key_header(Secret::new("ninja-key")),
            DEFAULT_TIMEOUT,
        )
        .unwrap();
        ApiService::from_parts(Arc::new(client), Arc::new(ErrorLogger::tracing_only()))
    }

    fn city(name: &str) -> CityName {
        CityName::parse(name).unwrap()
    }

    #[tokio::test]
    async fn every_method_falls_back_when_upstream_is_down() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", Matcher::Any)
            .match_query(Matcher::Any)
            .with_status(503)
            .expect_at_least(1)
            .create_async()
            .await;

        let api = facade(&server.url());
        let london = city("London");
        let (coords, population, event, image) = tokio::join!(
            api.city_coordinates(&london),
            api.population_summary(&london),
            api.random_event(Some(1900)),
            api.random_image(None),
        );

        assert!(coords.is_none());
        assert_eq!(population, CITY_NOT_FOUND_TEXT);
        assert_eq!(event, NO_EVENT_TEXT);
        assert!(image.is_none());
    }

    #[tokio::test]
    async fn one_failing_upstream_does_not_affect_the_others() {
        let mut server = mockito::Server::new_async().await;
        let _city = server
            .mock("GET", "/city")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"name":"Paris","latitude":48.85,"longitude":2.35,"country":"FR","population":2165423,"is_capital":true}]"#)
            .create_async()
            .await;
        let _events = server
            .mock("GET", "/historicalevents")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;
        let _image = server
            .mock("GET", "/randomimage")
            .with_status(200)
            .with_header("content-type", "image/jpeg")
            .with_body([1_u8, 2, 3])
            .create_async()
            .await;

        let api = facade(&server.url());
        let paris = city("Paris");

        assert!(api
            .population_summary(&paris)
            .await
            .starts_with("Just some cold facts: Paris is capital of FR"));
        assert_eq!(api.random_event(Some(1789)).await, NO_EVENT_TEXT);
        assert_eq!(api.random_image(None).await.unwrap().len(), 3);

        let c = api.coordinates(&paris).await.unwrap();
        assert!((c.lng - 2.35).abs() < 1e-9);
    }
}
