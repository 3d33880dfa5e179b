//! Fetch-and-record orchestration on top of the geo resolver, the weather
//! provider and the two storage sinks.

use chrono::{DateTime, Utc};
use futures::future::{join_all, try_join_all};
use serde::{Deserialize, Serialize};
use std::{future::Future, sync::Arc};

use crate::{
    Config, Event, Location, WeatherData, WeatherError, WeatherForecastEntry,
    geo::{GeoCodeProvider, OpenWeatherGeoResolver},
    provider::{WeatherProvider, client_from_config, provider_from_config},
    store::{DataStore, EventStore, data_store_from_config, event_store_from_config},
};

/// How a multi-location request treats a failure in one location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinPolicy {
    /// Any failure fails the whole request.
    #[default]
    Strict,
    /// Failed locations are dropped; fails only if every location failed.
    BestEffort,
}

#[derive(Debug, Clone)]
pub struct WeatherService {
    weather: Arc<dyn WeatherProvider>,
    geo: Arc<dyn GeoCodeProvider>,
    data_store: Arc<dyn DataStore>,
    event_store: Arc<dyn EventStore>,
    join_policy: JoinPolicy,
}

impl WeatherService {
    pub fn new(
        weather: Arc<dyn WeatherProvider>,
        geo: Arc<dyn GeoCodeProvider>,
        data_store: Arc<dyn DataStore>,
        event_store: Arc<dyn EventStore>,
    ) -> Self {
        Self {
            weather,
            geo,
            data_store,
            event_store,
            join_policy: JoinPolicy::default(),
        }
    }

    /// Wire the default provider and the configured stores.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let id = config.default_provider_id()?;

        let service = Self::new(
            provider_from_config(id, config)?,
            Arc::new(OpenWeatherGeoResolver::new(client_from_config(id, config)?)),
            data_store_from_config(&config.data_store)?,
            event_store_from_config(&config.event_store)?,
        );

        Ok(service.with_join_policy(config.join_policy))
    }

    pub fn with_join_policy(mut self, join_policy: JoinPolicy) -> Self {
        self.join_policy = join_policy;
        self
    }

    pub fn join_policy(&self) -> JoinPolicy {
        self.join_policy
    }

    /// Resolve `city`, fetch current weather for every match and record each fetch.
    ///
    /// Results keep the resolver's order. An empty list means nothing matched.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn get_weather_by_city(
        &self,
        city: &str,
        country_code: Option<&str>,
        state: Option<&str>,
    ) -> Result<Vec<(Location, WeatherData)>, WeatherError> {
        let locations = self.geo.resolve_locations(city, country_code, state).await?;
        if locations.is_empty() {
            tracing::info!("No matching locations");
            return Ok(Vec::new());
        }

        let fetched = self
            .join(locations.into_iter().map(|location| async move {
                let weather = self.weather.get_current_weather(&location).await?;
                Ok::<_, WeatherError>((location, weather))
            }))
            .await?;

        self.join(fetched.into_iter().enumerate().map(|(index, (location, weather))| async move {
            self.persist(index, &location, &weather).await?;
            Ok::<_, WeatherError>((location, weather))
        }))
        .await
    }

    /// Like [`Self::get_weather_by_city`] but for a `days`-day forecast; nothing is recorded.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn get_weather_forecast_by_city(
        &self,
        city: &str,
        country_code: Option<&str>,
        state: Option<&str>,
        days: u8,
    ) -> Result<Vec<(Location, Vec<WeatherForecastEntry>)>, WeatherError> {
        let locations = self.geo.resolve_locations(city, country_code, state).await?;
        if locations.is_empty() {
            tracing::info!("No matching locations");
            return Ok(Vec::new());
        }

        self.join(locations.into_iter().map(|location| async move {
            let forecast = self.weather.get_weather_forecast(&location, days).await?;
            Ok::<_, WeatherError>((location, forecast))
        }))
        .await
    }

    /// Write the payload, then the event pointing at it.
    ///
    /// `index` is the location's position in this request and keeps keys of
    /// same-named locations written in the same instant apart.
    async fn persist(
        &self,
        index: usize,
        location: &Location,
        weather: &WeatherData,
    ) -> Result<(), WeatherError> {
        let timestamp = Utc::now();
        let key = storage_key(location, timestamp, index);
        let payload = serde_json::to_vec(weather)?;

        let url = self.data_store.put_object(&key, payload).await?;

        let event = Event {
            timestamp,
            city: location.name.clone(),
            country_code: location.country.clone(),
            state: location.state.clone(),
            url,
        };
        self.event_store.put_event(&event).await?;

        tracing::info!(event_id = %event.id(), url = %event.url, "Recorded weather fetch");
        Ok(())
    }

    async fn join<T, Fut>(
        &self,
        tasks: impl IntoIterator<Item = Fut>,
    ) -> Result<Vec<T>, WeatherError>
    where
        Fut: Future<Output = Result<T, WeatherError>>,
    {
        match self.join_policy {
            JoinPolicy::Strict => try_join_all(tasks).await,
            JoinPolicy::BestEffort => {
                let mut values = Vec::new();
                let mut first_error = None;

                for result in join_all(tasks).await {
                    match result {
                        Ok(value) => values.push(value),
                        Err(e) => {
                            tracing::warn!(error = %e, "Dropping failed location");
                            if first_error.is_none() {
                                first_error = Some(e);
                            }
                        }
                    }
                }

                match first_error {
                    Some(e) if values.is_empty() => Err(e),
                    _ => Ok(values),
                }
            }
        }
    }
}

/// `{city}_{country}_{state}_{%Y%m%d_%H%M%S_%6f}_{index}.json`, absent state as `none`.
pub fn storage_key(location: &Location, timestamp: DateTime<Utc>, index: usize) -> String {
    format!(
        "{}_{}_{}_{}_{}.json",
        location.name,
        location.country,
        location.state.as_deref().unwrap_or("none"),
        timestamp.format("%Y%m%d_%H%M%S_%6f"),
        index,
    )
}
