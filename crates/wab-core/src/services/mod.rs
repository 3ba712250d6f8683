//! Upstream adapters.
//!
//! Each adapter offers a strict method that returns `Result` and logs failures
//! at its own boundary, plus total variants (plain `String` / `Option`) that
//! the presentation layer can use without special-casing errors.

pub mod city;
pub mod history;
pub mod image;
pub mod timezone;
pub mod weather;

pub use city::CityLookupService;
pub use history::HistoricalEventService;
pub use image::RandomImageService;
pub use timezone::{
    BoundaryLocator, CoordinatesProvider, NauticalLocator, TimezoneLocator, TimezoneService, Zone,
};
pub use weather::WeatherService;
