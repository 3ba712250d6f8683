use std::sync::Arc;

use tracing::{info, warn};

use wab_core::{
    assistant::Assistant,
    audit::ErrorLogger,
    config::Config,
    facade::ApiService,
    http::{ApiAuth, HttpApiClient},
    keys::{KeyConfig, KeyStore, CITY_PROVIDER_KEY, TELEGRAM_BOT_TOKEN, WEATHER_PROVIDER_KEY},
    services::{
        timezone::TimezoneConfig, weather::WeatherConfig, BoundaryLocator, TimezoneService,
        WeatherService,
    },
};

#[tokio::main]
async fn main() -> Result<(), wab_core::Error> {
    wab_core::logging::init("wab")?;

    let cfg = Arc::new(Config::load()?);

    // Missing or empty secrets stop the bot here.
    let keys = KeyStore::new(KeyConfig::new(&cfg.keys_dir));
    let telegram_token = keys.get_secret(TELEGRAM_BOT_TOKEN)?;
    let weather_key = keys.get_secret(WEATHER_PROVIDER_KEY)?;
    let ninjas_key = keys.get_secret(CITY_PROVIDER_KEY)?;

    let errors = Arc::new(ErrorLogger::new(&cfg.error_log_path));
    match errors.rotate_if_larger(cfg.error_log_max_bytes) {
        Ok(Some(backup)) => info!(backup = %backup.display(), "rotated error log"),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "error log rotation failed"),
    }

    let ninjas = Arc::new(HttpApiClient::new(
        cfg.api_ninjas_base_url.clone(),
        ApiAuth::api_key_header(ninjas_key),
        cfg.http_timeout,
    )?);
    let openweather = Arc::new(HttpApiClient::new(
        cfg.openweather_base_url.clone(),
        ApiAuth::query("appid", weather_key),
        cfg.http_timeout,
    )?);

    let api = Arc::new(ApiService::from_parts(ninjas, errors.clone()));
    let timezone = Arc::new(TimezoneService::new(
        api.clone(),
        Arc::new(BoundaryLocator::new()),
        TimezoneConfig {
            time_format: cfg.time_format.clone(),
            default_zone: cfg.default_timezone.clone(),
        },
    ));
    let weather = Arc::new(WeatherService::new(
        openweather,
        timezone,
        errors.clone(),
        WeatherConfig {
            temp_precision: cfg.temp_precision,
            ..WeatherConfig::default()
        },
    ));
    let assistant = Arc::new(Assistant::new(
        api,
        weather,
        errors,
        cfg.image_category.clone(),
    ));

    wab_telegram::router::run_polling(cfg, telegram_token, assistant)
        .await
        .map_err(|e| wab_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
