//! Core domain + application logic for the Weather Assistant Bot.
//!
//! This crate is framework-agnostic. Telegram lives behind the
//! messaging port implemented in the `wab-telegram` adapter crate; the upstream
//! HTTP APIs are wrapped by the fail-safe services in `services`.

pub mod assistant;
pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod failsafe;
pub mod facade;
pub mod http;
pub mod keys;
pub mod logging;
pub mod messaging;
pub mod services;

pub use errors::{Error, Result};
