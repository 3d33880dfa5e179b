use crate::{
    Config, Location, WeatherData, WeatherError, WeatherForecastEntry,
    provider::openweather::{OpenWeatherClient, OpenWeatherProvider},
};
use async_trait::async_trait;
use std::{convert::TryFrom, fmt::Debug, sync::Arc};

pub mod openweather;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenWeather,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenWeather => "openweather",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenWeather]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "openweather" | "openweathermap" => Ok(ProviderId::OpenWeather),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: openweather."
            )),
        }
    }
}

/// Source of weather observations and forecasts for a resolved location.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn get_current_weather(&self, location: &Location) -> Result<WeatherData, WeatherError>;

    /// Forecast in 3-hour slots covering `days` days.
    async fn get_weather_forecast(
        &self,
        location: &Location,
        days: u8,
    ) -> Result<Vec<WeatherForecastEntry>, WeatherError>;
}

/// Build the typed client for a provider from config.
pub fn client_from_config(id: ProviderId, config: &Config) -> anyhow::Result<OpenWeatherClient> {
    let provider = config.provider_config(id).ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured for provider '{id}'.\n\
                 Hint: run `weather configure {id}` and enter your API key."
        )
    })?;

    let retry = config.retry.to_retry_config()?;
    let mut client =
        OpenWeatherClient::with_timeout(provider.api_key.clone(), retry, config.retry.timeout())?;

    if provider.weather_base_url.is_some() || provider.geo_base_url.is_some() {
        client = client.with_base_urls(
            provider
                .weather_base_url
                .as_deref()
                .unwrap_or(openweather::DEFAULT_WEATHER_BASE_URL),
            provider
                .geo_base_url
                .as_deref()
                .unwrap_or(openweather::DEFAULT_GEO_BASE_URL),
        );
    }

    Ok(client)
}

/// Construct a provider from config and explicit ProviderId.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let provider: Arc<dyn WeatherProvider> = match id {
        ProviderId::OpenWeather => Arc::new(OpenWeatherProvider::new(client_from_config(id, config)?)),
    };

    Ok(provider)
}
