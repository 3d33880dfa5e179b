//! OpenWeatherClient behavior against a mock HTTP server.

use std::time::Duration;

use weather_core::provider::openweather::OpenWeatherClient;
use weather_core::{RetryConfig, WeatherError};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig::new(
        max_retries,
        Duration::from_millis(1),
        Duration::from_millis(5),
        2.0,
        None,
    )
    .unwrap()
}

fn client_for(server: &MockServer, max_retries: u32) -> OpenWeatherClient {
    OpenWeatherClient::with_timeout("TEST_KEY".into(), fast_retry(max_retries), Duration::from_secs(5))
        .unwrap()
        .with_base_urls(
            &format!("{}/data/2.5", server.uri()),
            &format!("{}/geo/1.0", server.uri()),
        )
}

fn current_weather() -> serde_json::Value {
    serde_json::json!({
        "main": {"temp": 14.2, "humidity": 72, "pressure": 1015, "feels_like": 13.1, "temp_min": 12.0, "temp_max": 16.0},
        "weather": [{"description": "scattered clouds"}],
        "wind": {"speed": 5.1, "deg": 240},
        "visibility": 10000
    })
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map(|r| r.len()).unwrap_or(0)
}

#[tokio::test]
async fn test_geo_lookup_sends_query_limit_and_key() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .and(query_param("q", "london,england,gb"))
        .and(query_param("limit", "5"))
        .and(query_param("appid", "TEST_KEY"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"name": "London", "country": "GB", "lat": 51.5073, "lon": -0.1276, "state": "England"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let geo = client_for(&server, 0)
        .get_geo_locations("london", Some("gb"), Some("england"))
        .await
        .unwrap();

    assert_eq!(geo.len(), 1);
    assert_eq!(geo[0].name, "London");
    assert_eq!(geo[0].state.as_deref(), Some("England"));
}

#[tokio::test]
async fn test_current_weather_uses_metric_units() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("lat", "51.5"))
        .and(query_param("lon", "-0.12"))
        .and(query_param("units", "metric"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_weather()))
        .mount(&server)
        .await;

    let res = client_for(&server, 0)
        .get_current_weather_by_coords(51.5, -0.12)
        .await
        .unwrap();

    assert_eq!(res.main.temp, 14.2);
    assert_eq!(res.main.humidity, 72);
    assert_eq!(res.wind.deg, Some(240));
    assert_eq!(res.visibility, Some(10000));
}

#[tokio::test]
async fn test_forecast_requests_eight_slots_per_day() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .and(query_param("cnt", "16"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"list": []})))
        .expect(1)
        .mount(&server)
        .await;

    let res = client_for(&server, 0).get_weather_forecast(1.0, 2.0, 2).await.unwrap();
    assert!(res.list.is_empty());
}

#[tokio::test]
async fn test_transient_errors_are_retried_until_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_weather()))
        .mount(&server)
        .await;

    let res = client_for(&server, 2).get_current_weather_by_coords(1.0, 2.0).await;

    assert!(res.is_ok());
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn test_exhausted_retries_wrap_last_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = client_for(&server, 2)
        .get_current_weather_by_coords(1.0, 2.0)
        .await
        .unwrap_err();

    assert_eq!(request_count(&server).await, 3);
    assert_eq!(err.status_code(), 503);
    match err {
        WeatherError::ProviderUnavailable { provider, source } => {
            assert_eq!(provider, "OpenWeatherAPI");
            assert!(matches!(*source, WeatherError::HttpStatus { status: 503, ref body } if body == "maintenance"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_rate_limit_is_retried_and_described() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = client_for(&server, 1)
        .get_geo_locations("london", None, None)
        .await
        .unwrap_err();

    assert_eq!(request_count(&server).await, 2);
    assert!(err.to_string().contains("API rate limit exceeded"));
    assert!(matches!(err, WeatherError::ProviderUnavailable { .. }));
}

#[tokio::test]
async fn test_invalid_key_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"cod":401}"#))
        .mount(&server)
        .await;

    let err = client_for(&server, 3)
        .get_current_weather_by_coords(1.0, 2.0)
        .await
        .unwrap_err();

    assert_eq!(request_count(&server).await, 1);
    assert_eq!(err.status_code(), 401);
    assert_eq!(
        err.to_string(),
        "Error from third-party provider 'OpenWeatherAPI': Invalid API key"
    );
}

#[tokio::test]
async fn test_bad_request_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(400).set_body_string("wrong latitude"))
        .mount(&server)
        .await;

    let err = client_for(&server, 3)
        .get_current_weather_by_coords(1.0, 2.0)
        .await
        .unwrap_err();

    assert_eq!(request_count(&server).await, 1);
    assert!(matches!(err, WeatherError::HttpStatus { status: 400, .. }));
}

#[tokio::test]
async fn test_malformed_payload_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"unexpected": true}"#))
        .mount(&server)
        .await;

    let err = client_for(&server, 3)
        .get_current_weather_by_coords(1.0, 2.0)
        .await
        .unwrap_err();

    assert_eq!(request_count(&server).await, 1);
    assert!(matches!(err, WeatherError::InvalidResponse { .. }));
    assert_eq!(err.status_code(), 502);
}

#[tokio::test]
async fn test_connection_failures_are_retried() {
    // Bind and release a port so nothing is listening on it.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let uri = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = OpenWeatherClient::with_timeout("TEST_KEY".into(), fast_retry(1), Duration::from_secs(2))
        .unwrap()
        .with_base_urls(&format!("{uri}/data/2.5"), &format!("{uri}/geo/1.0"));

    let err = client.get_current_weather_by_coords(1.0, 2.0).await.unwrap_err();

    match err {
        WeatherError::ProviderUnavailable { source, .. } => {
            assert!(matches!(*source, WeatherError::Network(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
