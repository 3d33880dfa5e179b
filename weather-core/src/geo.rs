use async_trait::async_trait;
use std::fmt::Debug;

use crate::{Location, WeatherError, provider::openweather::OpenWeatherClient};

/// Turns a free-text city query into geocoded candidates.
#[async_trait]
pub trait GeoCodeProvider: Send + Sync + Debug {
    /// Returns zero, one or several locations; the caller decides what
    /// an empty or ambiguous result means.
    async fn resolve_locations(
        &self,
        city: &str,
        country_code: Option<&str>,
        state: Option<&str>,
    ) -> Result<Vec<Location>, WeatherError>;
}

/// Resolver backed by the OpenWeather direct geocoding endpoint.
#[derive(Debug, Clone)]
pub struct OpenWeatherGeoResolver {
    client: OpenWeatherClient,
}

impl OpenWeatherGeoResolver {
    pub fn new(client: OpenWeatherClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl GeoCodeProvider for OpenWeatherGeoResolver {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn resolve_locations(
        &self,
        city: &str,
        country_code: Option<&str>,
        state: Option<&str>,
    ) -> Result<Vec<Location>, WeatherError> {
        let city = normalize(city);
        let country_code = country_code.map(normalize).filter(|c| !c.is_empty());
        let state = state.map(normalize).filter(|s| !s.is_empty());

        let candidates: Vec<Location> = self
            .client
            .get_geo_locations(&city, country_code.as_deref(), state.as_deref())
            .await?
            .into_iter()
            .map(Location::from)
            .collect();

        let total = candidates.len();
        let locations = filter_candidates(candidates, &city, state.as_deref());

        tracing::debug!(
            candidates = total,
            matched = locations.len(),
            "Resolved geo candidates"
        );

        Ok(locations)
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Keep candidates whose name equals `city` under Unicode case folding; if
/// several remain and a `state` was given, keep only those in that state.
pub fn filter_candidates(candidates: Vec<Location>, city: &str, state: Option<&str>) -> Vec<Location> {
    let city = city.trim();

    let exact: Vec<Location> = candidates
        .into_iter()
        .filter(|loc| same_name(&loc.name, city))
        .collect();

    match state {
        Some(state) if exact.len() > 1 => exact
            .into_iter()
            .filter(|loc| loc.state.as_deref().is_some_and(|s| same_name(s, state)))
            .collect(),
        _ => exact,
    }
}

fn same_name(a: &str, b: &str) -> bool {
    caseless::default_caseless_match_str(a.trim(), b.trim())
}
