use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::{
    audit::ErrorLogger,
    domain::{CityName, Temperature, WeatherSnapshot},
    errors::Error,
    failsafe::FailSafe,
    http::HttpApiClient,
    services::timezone::TimezoneService,
    Result,
};

pub const WEATHER_CITY_NOT_FOUND_TEXT: &str = "City not found. Please, try again.";
pub const WEATHER_ERROR_TEXT: &str =
    "Sorry, I couldn't get the weather right now. Please try again later.";

#[derive(Clone, Debug)]
pub struct WeatherConfig {
    pub temp_precision: usize,
    pub celsius_symbol: String,
    pub fahrenheit_symbol: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            temp_precision: 1,
            celsius_symbol: "°C".to_string(),
            fahrenheit_symbol: "°F".to_string(),
        }
    }
}

// OpenWeatherMap `/weather` body. Only the fields we render.
#[derive(Deserialize)]
struct OwmBody {
    #[serde(default)]
    cod: Option<Value>,
    #[serde(default)]
    name: Option<String>,
    main: Option<OwmMain>,
    #[serde(default)]
    weather: Vec<OwmCondition>,
    #[serde(default)]
    wind: Option<OwmWind>,
}

#[derive(Deserialize)]
struct OwmMain {
    temp: f64,
    feels_like: f64,
    #[serde(default)]
    humidity: Option<f64>,
    #[serde(default)]
    pressure: Option<f64>,
}

#[derive(Deserialize)]
struct OwmCondition {
    main: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct OwmWind {
    #[serde(default)]
    speed: Option<f64>,
}

/// `cod` arrives as `200` or `"404"` depending on the endpoint; normalize both.
fn cod_code(cod: &Value) -> Option<i64> {
    match cod {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_weather(body: &[u8], city: &CityName) -> Result<WeatherSnapshot> {
    let body: OwmBody = serde_json::from_slice(body)
        .map_err(|e| Error::upstream(Some(200), format!("weather: malformed json body: {e}")))?;

    if body.cod.as_ref().and_then(cod_code) == Some(404) {
        return Err(Error::CityNotFound(city.to_string()));
    }

    let main = body
        .main
        .ok_or_else(|| Error::upstream(Some(200), "weather: missing `main` section"))?;
    let condition = body
        .weather
        .into_iter()
        .next()
        .ok_or_else(|| Error::upstream(Some(200), "weather: missing `weather` entries"))?;

    Ok(WeatherSnapshot {
        city_name: body
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| city.to_string()),
        temperature: Temperature::from_kelvin(main.temp),
        feels_like: Temperature::from_kelvin(main.feels_like),
        condition: condition.main,
        description: condition.description,
        humidity: main.humidity.map(|h| h.round() as u32),
        pressure: main.pressure.map(|p| p.round() as u32),
        wind_speed: body.wind.and_then(|w| w.speed),
    })
}

/// Current weather adapter (`GET {base}/weather?q=…&appid=…`).
pub struct WeatherService {
    client: Arc<HttpApiClient>,
    timezone: Arc<TimezoneService>,
    errors: Arc<ErrorLogger>,
    cfg: WeatherConfig,
}

impl WeatherService {
    pub fn new(
        client: Arc<HttpApiClient>,
        timezone: Arc<TimezoneService>,
        errors: Arc<ErrorLogger>,
        cfg: WeatherConfig,
    ) -> Self {
        Self {
            client,
            timezone,
            errors,
            cfg,
        }
    }

    /// `CityNotFound` on a 404 (status or `cod`); other failures propagate.
    pub async fn get_current_weather(&self, city: &CityName) -> Result<WeatherSnapshot> {
        let resp = self
            .client
            .request("weather", &[("q", city.to_string())], &[])
            .await
            .map_err(|e| match e.status() {
                Some(404) => Error::CityNotFound(city.to_string()),
                _ => e,
            })?;
        parse_weather(&resp.body, city)
    }

    pub fn format_weather_response(&self, weather: &WeatherSnapshot, local_time: &str) -> String {
        let p = self.cfg.temp_precision;
        let (c, f) = weather.temperature.format(p);
        let (feels_c, feels_f) = weather.feels_like.format(p);
        let cs = &self.cfg.celsius_symbol;
        let fs = &self.cfg.fahrenheit_symbol;

        format!(
            "At {local_time} in {} current temperature is {c}{cs} / {f}{fs} \
(feels like {feels_c}{cs} / {feels_f}{fs}). The weather is {} ({})",
            weather.city_name, weather.condition, weather.description
        )
    }

    /// Always a sentence: the report, a not-found hint, or a generic apology.
    pub async fn get_formatted_weather(&self, city: &CityName) -> String {
        let (weather, local_time) = tokio::join!(
            self.get_current_weather(city),
            self.timezone.get_current_time(city, None)
        );

        FailSafe::new("get_formatted_weather")
            .input(city.as_str())
            .logged(&self.errors)
            .apply_with(
                weather.map(|w| self.format_weather_response(&w, &local_time)),
                |e| {
                    if e.is_not_found() {
                        WEATHER_CITY_NOT_FOUND_TEXT.to_string()
                    } else {
                        WEATHER_ERROR_TEXT.to_string()
                    }
                },
            )
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use mockito::Matcher;

    use super::*;
    use crate::{
        domain::Coordinates,
        http::{ApiAuth, DEFAULT_TIMEOUT},
        keys::Secret,
        services::timezone::{CoordinatesProvider, NauticalLocator, TimezoneConfig},
    };

    const LONDON_FIXTURE: &str = r#"{"main":{"temp":282.0,"feels_like":280.0},"weather":[{"main":"Clouds","description":"overcast clouds"}],"cod":200}"#;

    struct NoCoordinates;

    #[async_trait]
    impl CoordinatesProvider for NoCoordinates {
        async fn coordinates(&self, _city: &CityName) -> Option<Coordinates> {
            None
        }
    }

    fn service(base: &str, cfg: WeatherConfig) -> WeatherService {
        let client = HttpApiClient::new(
            base,
            ApiAuth::query("appid", Secret::new("owm-key")),
            DEFAULT_TIMEOUT,
        )
        .unwrap();
        let tz = TimezoneService::new(
            Arc::new(NoCoordinates),
            Arc::new(NauticalLocator),
            TimezoneConfig::default(),
        );
        WeatherService::new(
            Arc::new(client),
            Arc::new(tz),
            Arc::new(ErrorLogger::tracing_only()),
            cfg,
        )
    }

    fn city(name: &str) -> CityName {
        CityName::parse(name).unwrap()
    }

    async fn mock_weather(
        server: &mut mockito::ServerGuard,
        status: usize,
        body: &str,
    ) -> mockito::Mock {
        server
            .mock("GET", "/weather")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "London".into()),
                Matcher::UrlEncoded("appid".into(), "owm-key".into()),
            ]))
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn snapshot_is_parsed() {
        let mut server = mockito::Server::new_async().await;
        let m = mock_weather(
            &mut server,
            200,
            r#"{"name":"London","main":{"temp":300.0,"feels_like":301.5,"humidity":81,"pressure":1012},"weather":[{"main":"Clear","description":"clear sky"}],"wind":{"speed":4.1},"cod":200}"#,
        )
        .await;

        let w = service(&server.url(), WeatherConfig::default())
            .get_current_weather(&city("London"))
            .await
            .unwrap();

        m.assert_async().await;
        assert_eq!(w.city_name, "London");
        assert!((w.temperature.celsius() - 26.85).abs() < 1e-9);
        assert!((w.temperature.fahrenheit() - 80.33).abs() < 1e-9);
        assert_eq!(w.condition, "Clear");
        assert_eq!(w.humidity, Some(81));
        assert_eq!(w.pressure, Some(1012));
        assert_eq!(w.wind_speed, Some(4.1));
    }

    #[tokio::test]
    async fn formatted_weather_for_london_fixture() {
        let mut server = mockito::Server::new_async().await;
        let _m = mock_weather(&mut server, 200, LONDON_FIXTURE).await;

        let s = service(&server.url(), WeatherConfig::default())
            .get_formatted_weather(&city("London"))
            .await;

        // 282.0 K is 8.85 °C, which renders as 8.9 at one decimal.
        assert!(s.contains("in London current temperature is 8.9°C / 47.9°F"), "{s}");
        assert!(s.contains("feels like 6.9°C / 44.3°F"), "{s}");
        assert!(s.contains("The weather is Clouds (overcast clouds)"), "{s}");
    }

    #[tokio::test]
    async fn precision_is_configurable() {
        let mut server = mockito::Server::new_async().await;
        let _m = mock_weather(&mut server, 200, LONDON_FIXTURE).await;

        let s = service(
            &server.url(),
            WeatherConfig {
                temp_precision: 2,
                ..WeatherConfig::default()
            },
        )
        .get_formatted_weather(&city("London"))
        .await;

        assert!(s.contains("8.85°C"), "{s}");
        assert!(s.contains("Clouds"), "{s}");
    }

    #[tokio::test]
    async fn http_404_is_city_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _m = mock_weather(
            &mut server,
            404,
            r#"{"cod":"404","message":"city not found"}"#,
        )
        .await;

        let svc = service(&server.url(), WeatherConfig::default());
        assert!(matches!(
            svc.get_current_weather(&city("London")).await,
            Err(Error::CityNotFound(_))
        ));
        assert_eq!(
            svc.get_formatted_weather(&city("London")).await,
            WEATHER_CITY_NOT_FOUND_TEXT
        );
    }

    #[tokio::test]
    async fn cod_404_in_body_is_city_not_found_in_both_encodings() {
        for body in [
            r#"{"cod":"404","message":"city not found"}"#,
            r#"{"cod":404,"message":"city not found"}"#,
        ] {
            let mut server = mockito::Server::new_async().await;
            let _m = mock_weather(&mut server, 200, body).await;

            let err = service(&server.url(), WeatherConfig::default())
                .get_current_weather(&city("London"))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::CityNotFound(_)), "{body}");
        }
    }

    #[tokio::test]
    async fn other_failures_render_generic_error() {
        for (status, body) in [
            (500, "{}"),
            (401, r#"{"cod":401}"#),
            (200, "not json"),
            (200, r#"{"cod":200}"#),
        ] {
            let mut server = mockito::Server::new_async().await;
            let _m = mock_weather(&mut server, status, body).await;

            let svc = service(&server.url(), WeatherConfig::default());
            let s = svc.get_formatted_weather(&city("London")).await;
            assert_eq!(s, WEATHER_ERROR_TEXT, "status {status} body {body}");
            assert!(!s.contains("owm-key"));
        }
    }

    #[test]
    fn cod_code_accepts_numbers_and_strings() {
        assert_eq!(cod_code(&serde_json::json!(404)), Some(404));
        assert_eq!(cod_code(&serde_json::json!("404")), Some(404));
        assert_eq!(cod_code(&serde_json::json!(" 200 ")), Some(200));
        assert_eq!(cod_code(&serde_json::json!(null)), None);
    }
}
