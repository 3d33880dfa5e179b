use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::WeatherError;
use crate::model::{Location, WeatherData, WeatherForecastEntry};
use crate::retry::{RetryConfig, call_with_retry};

use super::WeatherProvider;

pub const PROVIDER_NAME: &str = "OpenWeatherAPI";
pub const DEFAULT_WEATHER_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";
pub const DEFAULT_GEO_BASE_URL: &str = "https://api.openweathermap.org/geo/1.0";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Candidates requested from the geocoder per query.
const GEO_LIMIT: u8 = 5;
/// The forecast endpoint reports in 3-hour slots.
const SLOTS_PER_DAY: u16 = 8;

/// Typed client for the OpenWeather geocoding and weather endpoints.
///
/// Every call is a single GET wrapped in [`call_with_retry`].
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    api_key: String,
    weather_base_url: String,
    geo_base_url: String,
    retry: RetryConfig,
    http: Client,
}

impl OpenWeatherClient {
    pub fn new(api_key: String, retry: RetryConfig) -> Result<Self, WeatherError> {
        Self::with_timeout(api_key, retry, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        api_key: String,
        retry: RetryConfig,
        timeout: Duration,
    ) -> Result<Self, WeatherError> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            api_key,
            weather_base_url: DEFAULT_WEATHER_BASE_URL.to_string(),
            geo_base_url: DEFAULT_GEO_BASE_URL.to_string(),
            retry,
            http,
        })
    }

    /// Point the client at different endpoints (proxies, test servers).
    pub fn with_base_urls(mut self, weather_base_url: &str, geo_base_url: &str) -> Self {
        self.weather_base_url = weather_base_url.trim_end_matches('/').to_string();
        self.geo_base_url = geo_base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_geo_locations(
        &self,
        city: &str,
        country_code: Option<&str>,
        state: Option<&str>,
    ) -> Result<Vec<OwGeoLocation>, WeatherError> {
        let query = format_geo_query(city, country_code, state);
        let limit = GEO_LIMIT.to_string();

        let body = self
            .request(&self.geo_base_url, "direct", &[("q", query.as_str()), ("limit", limit.as_str())])
            .await?;

        tracing::debug!(response = %truncate_body(&body), "Geo response");
        parse(&body)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_current_weather_by_coords(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<OwCurrentResponse, WeatherError> {
        let lat = latitude.to_string();
        let lon = longitude.to_string();

        let body = self
            .request(
                &self.weather_base_url,
                "weather",
                &[("lat", lat.as_str()), ("lon", lon.as_str()), ("units", "metric")],
            )
            .await?;

        parse(&body)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_weather_forecast(
        &self,
        latitude: f64,
        longitude: f64,
        days: u8,
    ) -> Result<OwForecastResponse, WeatherError> {
        let lat = latitude.to_string();
        let lon = longitude.to_string();
        let cnt = (u16::from(days) * SLOTS_PER_DAY).to_string();

        let body = self
            .request(
                &self.weather_base_url,
                "forecast",
                &[
                    ("lat", lat.as_str()),
                    ("lon", lon.as_str()),
                    ("units", "metric"),
                    ("cnt", cnt.as_str()),
                ],
            )
            .await?;

        parse(&body)
    }

    async fn request(
        &self,
        base_url: &str,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<String, WeatherError> {
        let url = format!("{base_url}/{endpoint}");

        call_with_retry(&self.retry, PROVIDER_NAME, || self.get_once(&url, params)).await
    }

    async fn get_once(&self, url: &str, params: &[(&str, &str)]) -> Result<String, WeatherError> {
        let res = self
            .http
            .get(url)
            .query(params)
            .query(&[("appid", self.api_key.as_str())])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if status.is_success() {
            return Ok(body);
        }

        Err(map_status(status, &body))
    }
}

/// Translate a non-success status into a domain error.
///
/// 401/404/429 get descriptive provider errors; 429 stays retriable through
/// the retry status set and surfaces with this message once retries run out.
fn map_status(status: StatusCode, body: &str) -> WeatherError {
    let message = match status {
        StatusCode::UNAUTHORIZED => "Invalid API key",
        StatusCode::NOT_FOUND => "Location not found",
        StatusCode::TOO_MANY_REQUESTS => "API rate limit exceeded",
        _ => {
            return WeatherError::HttpStatus {
                status: status.as_u16(),
                body: truncate_body(body),
            };
        }
    };

    WeatherError::Provider {
        provider: PROVIDER_NAME.to_string(),
        message: message.to_string(),
        status: status.as_u16(),
    }
}

fn parse<T: DeserializeOwned>(body: &str) -> Result<T, WeatherError> {
    serde_json::from_str(body).map_err(|e| WeatherError::InvalidResponse {
        provider: PROVIDER_NAME.to_string(),
        message: e.to_string(),
    })
}

/// `city,state,country` / `city,country` / `city`.
pub fn format_geo_query(city: &str, country_code: Option<&str>, state: Option<&str>) -> String {
    match (state, country_code) {
        (Some(state), Some(country)) => format!("{city},{state},{country}"),
        (None, Some(country)) => format!("{city},{country}"),
        _ => city.to_string(),
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwMain {
    pub temp: f64,
    pub humidity: u8,
    pub pressure: f64,
    pub feels_like: Option<f64>,
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwWeather {
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwWind {
    pub speed: f64,
    pub deg: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwCurrentResponse {
    pub main: OwMain,
    pub weather: Vec<OwWeather>,
    pub wind: OwWind,
    pub visibility: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwForecastItem {
    pub main: OwMain,
    pub weather: Vec<OwWeather>,
    pub wind: OwWind,
    pub visibility: Option<u32>,
    pub dt_txt: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwForecastResponse {
    pub list: Vec<OwForecastItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwGeoLocation {
    pub name: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    pub state: Option<String>,
    pub local_names: Option<HashMap<String, String>>,
}

impl From<OwGeoLocation> for Location {
    fn from(geo: OwGeoLocation) -> Self {
        Location {
            latitude: geo.lat,
            longitude: geo.lon,
            name: geo.name,
            local_names: geo.local_names.unwrap_or_default(),
            country: geo.country,
            state: geo.state,
        }
    }
}

/// Weather provider backed by [`OpenWeatherClient`].
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    client: OpenWeatherClient,
}

impl OpenWeatherProvider {
    pub fn new(client: OpenWeatherClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn get_current_weather(&self, location: &Location) -> Result<WeatherData, WeatherError> {
        let res = self
            .client
            .get_current_weather_by_coords(location.latitude, location.longitude)
            .await?;

        to_weather_data(&res.main, &res.weather, &res.wind, res.visibility)
    }

    async fn get_weather_forecast(
        &self,
        location: &Location,
        days: u8,
    ) -> Result<Vec<WeatherForecastEntry>, WeatherError> {
        let res = self
            .client
            .get_weather_forecast(location.latitude, location.longitude, days)
            .await?;

        res.list
            .into_iter()
            .map(|item| {
                let weather = to_weather_data(&item.main, &item.weather, &item.wind, item.visibility)?;
                Ok(WeatherForecastEntry {
                    date: item.dt_txt,
                    weather,
                })
            })
            .collect()
    }
}

fn to_weather_data(
    main: &OwMain,
    weather: &[OwWeather],
    wind: &OwWind,
    visibility: Option<u32>,
) -> Result<WeatherData, WeatherError> {
    let description = weather
        .first()
        .map(|w| w.description.clone())
        .ok_or_else(|| WeatherError::InvalidResponse {
            provider: PROVIDER_NAME.to_string(),
            message: "response contained no weather description".to_string(),
        })?;

    Ok(WeatherData {
        temperature: main.temp,
        humidity: main.humidity,
        pressure: main.pressure,
        description,
        wind_speed: wind.speed,
        wind_direction: wind.deg.unwrap_or(0),
        visibility,
        uv_index: None,
        feels_like: main.feels_like,
        min_temp: main.temp_min,
        max_temp: main.temp_max,
    })
}
