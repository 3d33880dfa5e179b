//! Core library for the `weather` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - A retrying OpenWeather client, geo resolution and city disambiguation
//! - Fetch-and-record orchestration over pluggable data/event stores
//! - Shared domain models and errors
//!
//! It is used by `weather-cli`, but can also be reused by other binaries or services.

pub mod config;
pub mod error;
pub mod geo;
pub mod model;
pub mod provider;
pub mod retry;
pub mod service;
pub mod store;

pub use config::{Config, DataStoreConfig, EventStoreConfig, ProviderConfig, RetrySettings};
pub use error::WeatherError;
pub use geo::{GeoCodeProvider, OpenWeatherGeoResolver};
pub use model::{Event, Location, WeatherData, WeatherForecastEntry};
pub use provider::{ProviderId, WeatherProvider};
pub use retry::{RetryConfig, call_with_retry};
pub use service::{JoinPolicy, WeatherService};
pub use store::{DataStore, EventStore};
