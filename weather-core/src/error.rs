use thiserror::Error;

use crate::model::Location;

/// Errors surfaced by the weather core.
///
/// Every variant carries a message fit for an end user and maps to a
/// transport status via [`WeatherError::status_code`].
#[derive(Debug, Error)]
pub enum WeatherError {
    /// Transient failure that persisted through every retry.
    #[error("Third-party provider '{provider}' is currently unavailable: {source}")]
    ProviderUnavailable {
        provider: String,
        #[source]
        source: Box<WeatherError>,
    },

    /// Non-retriable, provider-side error with a provider-specified status.
    #[error("Error from third-party provider '{provider}': {message}")]
    Provider {
        provider: String,
        message: String,
        status: u16,
    },

    /// The provider answered, but not in the expected shape.
    #[error("Invalid response from provider '{provider}': {message}")]
    InvalidResponse { provider: String, message: String },

    /// Non-success HTTP status that has no dedicated mapping.
    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Persistence failed for '{target}': {source}")]
    Storage {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("City '{city}' not found")]
    CityNotFound { city: String },

    #[error("Ambiguous city name {city}{}. Candidates: {}", country_suffix(.country_code), candidate_list(.candidates))]
    AmbiguousLocation {
        city: String,
        country_code: Option<String>,
        candidates: Vec<Location>,
    },
}

impl WeatherError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    pub fn storage<S: Into<String>>(target: S, source: std::io::Error) -> Self {
        Self::Storage {
            target: target.into(),
            source,
        }
    }

    /// Status code the boundary layer should use for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::ProviderUnavailable { .. } => 503,
            Self::Provider { status, .. } => *status,
            Self::InvalidResponse { .. } | Self::HttpStatus { .. } | Self::Network(_) => 502,
            Self::CityNotFound { .. } => 404,
            Self::AmbiguousLocation { .. } => 400,
            Self::Storage { .. } | Self::Serialization(_) | Self::Config(_) => 500,
        }
    }

    /// HTTP status carried by this error, if it came from an HTTP response.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Provider { status, .. } | Self::HttpStatus { status, .. } => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

fn country_suffix(country_code: &Option<String>) -> String {
    country_code
        .as_deref()
        .map(|c| format!(", country code {c}"))
        .unwrap_or_default()
}

fn candidate_list(candidates: &[Location]) -> String {
    candidates.iter().map(Location::label).collect::<Vec<_>>().join("; ")
}
