use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::provider::ProviderId;
use crate::retry::{self, RetryConfig};
use crate::service::JoinPolicy;
use crate::WeatherError;

/// Environment variable that overrides the OpenWeather API key.
pub const API_KEY_ENV: &str = "OPENWEATHERMAP_API_KEY";

/// Configuration for a single provider (e.g., API key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,

    /// Override for the weather endpoint base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_base_url: Option<String>,

    /// Override for the geocoding endpoint base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_base_url: Option<String>,
}

/// On-disk form of the retry schedule; validated into a [`RetryConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_secs: f64,
    pub max_delay_secs: f64,
    pub backoff_factor: f64,
    pub retriable_status_codes: Option<Vec<u16>>,
    /// Per-request HTTP timeout.
    pub timeout_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: retry::DEFAULT_MAX_RETRIES,
            base_delay_secs: retry::DEFAULT_BASE_DELAY.as_secs_f64(),
            max_delay_secs: retry::DEFAULT_MAX_DELAY.as_secs_f64(),
            backoff_factor: retry::DEFAULT_BACKOFF_FACTOR,
            retriable_status_codes: None,
            timeout_secs: 30,
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> Result<RetryConfig, WeatherError> {
        let base_delay = secs_to_duration("base_delay_secs", self.base_delay_secs)?;
        let max_delay = secs_to_duration("max_delay_secs", self.max_delay_secs)?;

        RetryConfig::new(
            self.max_retries,
            base_delay,
            max_delay,
            self.backoff_factor,
            self.retriable_status_codes
                .as_ref()
                .map(|codes| codes.iter().copied().collect::<HashSet<u16>>()),
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

fn secs_to_duration(field: &str, secs: f64) -> Result<Duration, WeatherError> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| WeatherError::config(format!("retry {field} must be a non-negative number, got {secs}")))
}

/// Where fetched weather payloads are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataStoreConfig {
    Local { directory: PathBuf },
    Memory,
}

impl Default for DataStoreConfig {
    fn default() -> Self {
        DataStoreConfig::Local {
            directory: default_data_dir().join("data"),
        }
    }
}

/// Where provenance events are appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventStoreConfig {
    Local { file_path: PathBuf },
    Memory,
}

impl Default for EventStoreConfig {
    fn default() -> Self {
        EventStoreConfig::Local {
            file_path: default_data_dir().join("events.log"),
        }
    }
}

fn default_data_dir() -> PathBuf {
    ProjectDirs::from("dev", "weather-task", "weather-cli")
        .map(|dirs| dirs.data_local_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Optional default provider id, e.g. "openweather".
    pub default_provider: Option<String>,

    /// Example TOML:
    /// [providers.openweather]
    /// api_key = "..."
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub data_store: DataStoreConfig,

    #[serde(default)]
    pub event_store: EventStoreConfig,

    /// How multi-location fetches treat a single failure.
    #[serde(default)]
    pub join_policy: JoinPolicy,

    /// Default tracing filter, e.g. "info" or "weather_core=debug".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Config {
    /// Return the default provider as a strongly-typed ProviderId.
    pub fn default_provider_id(&self) -> Result<ProviderId> {
        let s = self.default_provider.as_ref().ok_or_else(|| {
            anyhow::anyhow!(
                "No default provider configured.\n\
                 Hint: run `weather configure <provider>` (e.g. `weather configure openweather`) first."
            )
        })?;

        ProviderId::try_from(s.as_str())
    }

    pub fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(id.as_str())
    }

    /// Store default provider as string.
    pub fn set_default_provider(&mut self, id: ProviderId) {
        self.default_provider = Some(id.as_str().to_string());
    }

    /// Load config from `path`, or return an empty default if it doesn't exist yet.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Apply overrides looked up through `lookup` (normally the process environment).
    ///
    /// Returns `true` when the OpenWeather API key was taken from [`API_KEY_ENV`].
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            Some(key) => {
                self.upsert_provider_api_key(ProviderId::OpenWeather, key.trim().to_string());
                true
            }
            None => false,
        }
    }

    /// Save config to `path`, creating parent directories as needed.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-task", "weather-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Convenience helper: set/replace a provider API key and optionally set default provider.
    ///
    /// Endpoint overrides of an existing entry are kept.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers
            .entry(provider_id.as_str().to_string())
            .and_modify(|cfg| cfg.api_key = api_key.clone())
            .or_insert_with(|| ProviderConfig {
                api_key,
                weather_base_url: None,
                geo_base_url: None,
            });

        if self.default_provider.is_none() {
            self.default_provider = Some(provider_id.to_string());
        }
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.providers.get(provider_id.as_str()).map(|cfg| cfg.api_key.as_str())
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        self.provider_api_key(provider_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderId;

    #[test]
    fn default_provider_id_errors_when_not_set() {
        let cfg = Config::default();
        let err = cfg.default_provider_id().unwrap_err();

        assert!(err.to_string().contains("No default provider configured"));
    }

    #[test]
    fn set_api_key_and_default_for_provider() {
        let mut cfg = Config::default();

        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "OPEN_KEY".into());

        let default = cfg.default_provider_id().expect("default provider must exist");
        assert_eq!(default, ProviderId::OpenWeather);

        let key = cfg.provider_api_key(ProviderId::OpenWeather);
        assert_eq!(key, Some("OPEN_KEY"));
        assert!(cfg.is_provider_configured(ProviderId::OpenWeather));
    }

    #[test]
    fn upsert_replaces_key_and_keeps_endpoint_overrides() {
        let mut cfg = Config::default();
        cfg.providers.insert(
            "openweather".into(),
            ProviderConfig {
                api_key: "OLD".into(),
                weather_base_url: Some("http://localhost:9000".into()),
                geo_base_url: None,
            },
        );

        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "NEW".into());

        let provider = cfg.provider_config(ProviderId::OpenWeather).expect("provider exists");
        assert_eq!(provider.api_key, "NEW");
        assert_eq!(provider.weather_base_url.as_deref(), Some("http://localhost:9000"));
    }

    #[test]
    fn set_default_provider_overrides_default() {
        let mut cfg = Config {
            default_provider: Some("weatherapi".into()),
            ..Config::default()
        };
        cfg.set_default_provider(ProviderId::OpenWeather);

        let default = cfg.default_provider_id().expect("default provider must exist");
        assert_eq!(default, ProviderId::OpenWeather);
    }

    #[test]
    fn env_override_sets_api_key() {
        let mut cfg = Config::default();
        let applied =
            cfg.apply_env_overrides(|name| (name == API_KEY_ENV).then(|| " ENV_KEY ".to_string()));

        assert!(applied);

        assert_eq!(cfg.provider_api_key(ProviderId::OpenWeather), Some("ENV_KEY"));
        assert_eq!(cfg.default_provider.as_deref(), Some("openweather"));
    }

    #[test]
    fn blank_env_override_is_ignored() {
        let mut cfg = Config::default();
        assert!(!cfg.apply_env_overrides(|_| Some("   ".to_string())));
        assert!(!cfg.apply_env_overrides(|_| None));
        assert!(!cfg.is_provider_configured(ProviderId::OpenWeather));
    }

    #[test]
    fn parses_full_toml() {
        let toml = r#"
            default_provider = "openweather"
            join_policy = "best_effort"
            log_level = "debug"

            [providers.openweather]
            api_key = "KEY"
            geo_base_url = "http://localhost:8080/geo"

            [retry]
            max_retries = 5
            base_delay_secs = 0.5
            retriable_status_codes = [500, 503]

            [data_store]
            kind = "local"
            directory = "/tmp/weather-data"

            [event_store]
            kind = "memory"
        "#;

        let cfg: Config = toml::from_str(toml).expect("valid toml");

        assert_eq!(cfg.join_policy, JoinPolicy::BestEffort);
        assert_eq!(cfg.retry.max_retries, 5);
        assert_eq!(cfg.retry.max_delay_secs, 10.0);
        assert_eq!(
            cfg.data_store,
            DataStoreConfig::Local {
                directory: PathBuf::from("/tmp/weather-data")
            }
        );
        assert_eq!(cfg.event_store, EventStoreConfig::Memory);

        let retry = cfg.retry.to_retry_config().expect("valid retry settings");
        assert_eq!(retry.base_delay(), Duration::from_millis(500));
        assert_eq!(retry.retriable_status_codes(), &HashSet::from([500, 503]));
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let cfg: Config = toml::from_str("").expect("empty toml is valid");
        assert_eq!(cfg.join_policy, JoinPolicy::Strict);
        assert!(matches!(cfg.data_store, DataStoreConfig::Local { .. }));
        assert_eq!(cfg.retry.to_retry_config().expect("defaults valid"), RetryConfig::default());
    }

    #[test]
    fn negative_delay_is_rejected() {
        let settings = RetrySettings {
            base_delay_secs: -1.0,
            ..RetrySettings::default()
        };
        assert!(matches!(settings.to_retry_config(), Err(WeatherError::Config(_))));
    }

    #[test]
    fn save_and_load_roundtrip_through_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "KEY".into());
        cfg.save_to_path(&path).expect("save succeeds");

        let loaded = Config::load_from_path(&path).expect("load succeeds");
        assert_eq!(loaded.provider_api_key(ProviderId::OpenWeather), Some("KEY"));
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let cfg = Config::load_from_path(&dir.path().join("absent.toml")).expect("defaults");
        assert!(cfg.providers.is_empty());
    }
}
