use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A geocoded place. Identity is structural; there is no generated id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub name: String,
    #[serde(default)]
    pub local_names: HashMap<String, String>,
    /// Country code as reported by the geocoder.
    pub country: String,
    /// Not every country has states.
    pub state: Option<String>,
}

impl Location {
    /// Short human label, e.g. `London, England, GB`.
    pub fn label(&self) -> String {
        match &self.state {
            Some(state) => format!("{}, {}, {}", self.name, state, self.country),
            None => format!("{}, {}", self.name, self.country),
        }
    }
}

/// Weather observation in metric units, exactly as the provider reported it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherData {
    pub temperature: f64,
    pub humidity: u8,
    pub pressure: f64,
    pub description: String,
    pub wind_speed: f64,
    pub wind_direction: u16,
    pub visibility: Option<u32>,
    pub uv_index: Option<f64>,
    pub feels_like: Option<f64>,
    pub min_temp: Option<f64>,
    pub max_temp: Option<f64>,
}

/// One 3-hour slot of a forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherForecastEntry {
    /// Provider label for the slot, e.g. `2024-05-01 12:00:00`.
    pub date: String,
    pub weather: WeatherData,
}

/// Provenance record: weather for a location was stored at `url` at `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub city: String,
    pub country_code: String,
    pub state: Option<String>,
    pub url: String,
}

impl Event {
    pub fn id(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            self.city,
            self.country_code,
            self.state.as_deref().unwrap_or("none"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn london(state: Option<&str>) -> Location {
        Location {
            latitude: 51.5073,
            longitude: -0.1276,
            name: "London".into(),
            local_names: HashMap::new(),
            country: "GB".into(),
            state: state.map(str::to_string),
        }
    }

    #[test]
    fn label_includes_state_when_present() {
        assert_eq!(london(Some("England")).label(), "London, England, GB");
        assert_eq!(london(None).label(), "London, GB");
    }

    #[test]
    fn event_id_concatenates_timestamp_and_place() {
        let event = Event {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
            city: "London".into(),
            country_code: "GB".into(),
            state: None,
            url: "memory://x.json".into(),
        };

        assert_eq!(event.id(), "2024-05-01T12:30:00.000000Z_London_GB_none");
    }

    #[test]
    fn location_deserializes_without_local_names() {
        let json = r#"{"latitude":1.0,"longitude":2.0,"name":"X","country":"US","state":null}"#;
        let loc: Location = serde_json::from_str(json).expect("valid location json");
        assert!(loc.local_names.is_empty());
        assert_eq!(loc.state, None);
    }
}
