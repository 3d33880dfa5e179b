use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Select};
use std::path::PathBuf;
use weather_core::{Config, Location, ProviderId, WeatherError, WeatherService};

use crate::output;

const MAX_CITY_LEN: usize = 100;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather CLI")]
pub struct Cli {
    /// Log debug output to stderr (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the configuration file (overrides the platform default).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "openweather". Prompts when omitted.
        provider: Option<String>,
    },

    /// Show current weather for a city.
    Show {
        #[command(flatten)]
        query: CityQuery,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Show a 3-hourly forecast for a city.
    Forecast {
        #[command(flatten)]
        query: CityQuery,

        /// Number of days to forecast.
        #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(1..=5))]
        days: u8,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Args)]
pub struct CityQuery {
    /// City name, e.g. "London".
    #[arg(value_parser = parse_city)]
    pub city: String,

    /// Two-letter country code, e.g. "GB".
    #[arg(long, value_parser = parse_country)]
    pub country: Option<String>,

    /// State or region, e.g. "Ohio".
    #[arg(long)]
    pub state: Option<String>,
}

impl Cli {
    /// `--config` if given, else the platform default.
    pub fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => Config::config_file_path(),
        }
    }

    /// Load the config file and apply environment overrides.
    ///
    /// The flag is `true` when the API key came from the environment.
    pub fn load_config(&self) -> anyhow::Result<(Config, bool)> {
        let mut config = Config::load_from_path(&self.config_path()?)?;
        let key_from_env = config.apply_env_overrides(|name| std::env::var(name).ok());
        Ok((config, key_from_env))
    }

    pub async fn run(self, mut config: Config) -> anyhow::Result<()> {
        let config_path = self.config_path()?;

        match self.command {
            Command::Configure { provider } => {
                let provider_id = match provider {
                    Some(p) => ProviderId::try_from(p.as_str())?,
                    None => Select::new("Provider:", ProviderId::all().to_vec())
                        .prompt()
                        .context("Provider selection cancelled")?,
                };

                let api_key = Password::new(&format!("API key for {provider_id}:"))
                    .without_confirmation()
                    .with_display_mode(PasswordDisplayMode::Masked)
                    .prompt()
                    .context("API key entry cancelled")?;

                let api_key = api_key.trim();
                if api_key.is_empty() {
                    anyhow::bail!("API key must not be empty");
                }

                config.upsert_provider_api_key(provider_id, api_key.to_string());
                config.save_to_path(&config_path)?;

                tracing::info!(provider = %provider_id, "Saved provider credentials");
                println!("Provider '{provider_id}' configured.");
            }
            Command::Show { query, json } => {
                let service = WeatherService::from_config(&config)?;
                let results = service
                    .get_weather_by_city(&query.city, query.country.as_deref(), query.state.as_deref())
                    .await?;

                let (location, weather) = single_match(&query, results, |(location, _)| location)?;

                if json {
                    println!("{}", output::current_json(&location, &weather)?);
                } else {
                    print!("{}", output::format_current(&location, &weather));
                }
            }
            Command::Forecast { query, days, json } => {
                let service = WeatherService::from_config(&config)?;
                let results = service
                    .get_weather_forecast_by_city(
                        &query.city,
                        query.country.as_deref(),
                        query.state.as_deref(),
                        days,
                    )
                    .await?;

                let (location, forecast) = single_match(&query, results, |(location, _)| location)?;

                if json {
                    println!("{}", output::forecast_json(&location, &forecast)?);
                } else {
                    print!("{}", output::format_forecast(&location, &forecast));
                }
            }
        }

        Ok(())
    }
}

/// Exactly one location must match; none is "not found", several is ambiguous.
fn single_match<T>(
    query: &CityQuery,
    mut results: Vec<T>,
    location_of: impl Fn(&T) -> &Location,
) -> Result<T, WeatherError> {
    match results.len() {
        0 => Err(WeatherError::CityNotFound {
            city: query.city.clone(),
        }),
        1 => Ok(results.remove(0)),
        _ => Err(WeatherError::AmbiguousLocation {
            city: query.city.clone(),
            country_code: query.country.clone(),
            candidates: results.iter().map(|r| location_of(r).clone()).collect(),
        }),
    }
}

fn parse_city(value: &str) -> Result<String, String> {
    let city = value.trim();
    let len = city.chars().count();

    if len == 0 || len > MAX_CITY_LEN {
        return Err(format!("city must be 1 to {MAX_CITY_LEN} characters"));
    }

    Ok(city.to_string())
}

fn parse_country(value: &str) -> Result<String, String> {
    let code = value.trim();

    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(format!("'{value}' is not a two-letter country code"));
    }

    Ok(code.to_ascii_uppercase())
}
