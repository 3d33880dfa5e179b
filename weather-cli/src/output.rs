use chrono::NaiveDateTime;
use std::fmt::Write;
use weather_core::{Location, WeatherData, WeatherForecastEntry};

pub fn current_json(location: &Location, weather: &WeatherData) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&serde_json::json!({
        "location": location,
        "weather": weather,
    }))?)
}

pub fn forecast_json(location: &Location, forecast: &[WeatherForecastEntry]) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&serde_json::json!({
        "location": location,
        "forecast": forecast,
    }))?)
}

pub fn format_current(location: &Location, weather: &WeatherData) -> String {
    let mut out = header(location);

    let _ = writeln!(out, "  Conditions:  {}", weather.description);
    let _ = write!(out, "  Temperature: {:.1} °C", weather.temperature);
    if let Some(feels_like) = weather.feels_like {
        let _ = write!(out, " (feels like {feels_like:.1} °C)");
    }
    out.push('\n');

    if let (Some(min), Some(max)) = (weather.min_temp, weather.max_temp) {
        let _ = writeln!(out, "  Min / max:   {min:.1} / {max:.1} °C");
    }
    let _ = writeln!(out, "  Humidity:    {} %", weather.humidity);
    let _ = writeln!(out, "  Pressure:    {:.0} hPa", weather.pressure);
    let _ = writeln!(
        out,
        "  Wind:        {:.1} m/s from {}°",
        weather.wind_speed, weather.wind_direction
    );
    if let Some(visibility) = weather.visibility {
        let _ = writeln!(out, "  Visibility:  {visibility} m");
    }
    if let Some(uv) = weather.uv_index {
        let _ = writeln!(out, "  UV index:    {uv:.1}");
    }

    out
}

pub fn format_forecast(location: &Location, forecast: &[WeatherForecastEntry]) -> String {
    let mut out = header(location);

    if forecast.is_empty() {
        out.push_str("  No forecast data.\n");
        return out;
    }

    for entry in forecast {
        let w = &entry.weather;
        let _ = writeln!(
            out,
            "  {:<16} {:>6.1} °C  {:>5.1} m/s  {}",
            slot_label(&entry.date),
            w.temperature,
            w.wind_speed,
            w.description
        );
    }

    out
}

fn header(location: &Location) -> String {
    format!(
        "{} ({:.4}, {:.4})\n",
        location.label(),
        location.latitude,
        location.longitude
    )
}

/// `2024-05-01 12:00:00` becomes `Wed 01 May 12:00`; unknown formats pass through.
fn slot_label(date: &str) -> String {
    NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.format("%a %d %b %H:%M").to_string())
        .unwrap_or_else(|_| date.to_string())
}
