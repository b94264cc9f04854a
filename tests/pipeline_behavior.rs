//! Behavior-driven tests for the ingestion pipelines
//!
//! These tests verify HOW the pipelines pick providers, fall back, normalize
//! and validate, using a scripted transport instead of the network.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use urbanpulse_core::{
    identify_high_traffic_zones, validate_collection, AirQualityRequest, AqiReading,
    AqiReadingSchema, AqiSource, CircuitState, CpcbQuery, IngestConfig, IngestionService,
    IngestionServiceBuilder, Location, RetryConfig, ScriptedHttpClient, ScriptedReply,
    SourceErrorKind, TrafficSegment, UtcDateTime, DEFAULT_HIGH_TRAFFIC_THRESHOLD,
};

const DELHI: Location = Location { lat: 28.6, lng: 77.2 };

fn test_config() -> IngestConfig {
    let mut config = IngestConfig::default();
    config.cpcb.base_url = String::from("https://cpcb.test/resource");
    config.cpcb.api_key = Some(String::from("cpcb-key"));
    config.openweather.base_url = String::from("https://owm.test/data/2.5");
    config.openweather.api_key = Some(String::from("owm-key"));
    config.google_routes.base_url = String::from("https://routes.test/compute");
    config.google_routes.api_key = Some(String::from("g-key"));
    config.tomtom.base_url = String::from("https://flow.test/flowSegmentData");
    config.tomtom.api_key = Some(String::from("tt-key"));

    for policy in [
        &mut config.cpcb.policy,
        &mut config.openweather.aqi_policy,
        &mut config.openweather.weather_policy,
        &mut config.google_routes.policy,
        &mut config.tomtom.policy,
    ] {
        policy.min_interval = Duration::ZERO;
    }
    config.retry = RetryConfig::no_retry();
    config
}

fn service(config: IngestConfig, client: &Arc<ScriptedHttpClient>) -> IngestionService {
    IngestionServiceBuilder::new()
        .with_config(config)
        .with_http_client(client.clone())
        .build()
}

fn cpcb_row(pollutant: &str, value: &str) -> serde_json::Value {
    json!({
        "country": "India",
        "state": "Delhi",
        "city": "Delhi",
        "station": "Anand Vihar, Delhi - DPCC",
        "last_update": "21-10-2024 10:00:00",
        "latitude": "28.65",
        "longitude": "77.3",
        "pollutant_id": pollutant,
        "avg_value": value
    })
}

const OWM_AIR: &str = r#"{"coord":{"lon":77.2,"lat":28.6},"list":[{"dt":1729485000,"main":{"aqi":5},"components":{"co":1602.21,"no2":61.69,"o3":0.1,"so2":24.32,"pm2_5":210.5,"pm10":290.1}}]}"#;

// =============================================================================
// Air Quality
// =============================================================================

#[tokio::test]
async fn when_cpcb_returns_split_rows_pipeline_merges_them_into_one_reading() {
    // Given: CPCB reports PM2.5 and PM10 for one station as two rows
    let body = json!({ "records": [cpcb_row("PM2.5", "120"), cpcb_row("PM10", "200")] });
    let client =
        Arc::new(ScriptedHttpClient::new().route("cpcb.test", ScriptedReply::json(body.to_string())));
    let service = service(test_config(), &client);

    // When: Air quality is requested
    let batch = service
        .fetch_air_quality(&AirQualityRequest {
            query: CpcbQuery::for_city("Delhi"),
            fallback_location: Some(DELHI),
        })
        .await
        .expect("CPCB succeeds");

    // Then: One merged CPCB reading is returned and OpenWeather is never called
    assert_eq!(batch.source, AqiSource::Cpcb);
    assert_eq!(batch.readings.len(), 1);
    let reading = &batch.readings[0];
    assert_eq!(reading.pm2_5, Some(120.0));
    assert_eq!(reading.pm10, Some(200.0));
    assert_eq!(reading.location, Location { lat: 28.65, lng: 77.3 });
    assert_eq!(client.request_count("owm.test"), 0);
    assert_eq!(client.request_count("filters[city]=Delhi"), 1);
}

#[tokio::test]
async fn when_cpcb_fails_pipeline_falls_back_to_openweather() {
    // Given: CPCB is down and OpenWeather is healthy
    let client = Arc::new(
        ScriptedHttpClient::new()
            .route("cpcb.test", ScriptedReply::status(503, "maintenance"))
            .route("air_pollution", ScriptedReply::json(OWM_AIR)),
    );
    let service = service(test_config(), &client);

    // When: Air quality is requested with a fallback location
    let batch = service
        .fetch_air_quality(&AirQualityRequest {
            query: CpcbQuery::default(),
            fallback_location: Some(DELHI),
        })
        .await
        .expect("fallback succeeds");

    // Then: The OpenWeather reading is returned for the fallback location
    assert_eq!(batch.source, AqiSource::OpenWeather);
    assert_eq!(batch.readings.len(), 1);
    assert_eq!(batch.readings[0].aqi, Some(5));
    assert_eq!(batch.readings[0].pm2_5, Some(210.5));
    assert_eq!(batch.readings[0].location, DELHI);

    // And: The CPCB failure is visible in the circuit snapshot
    let states = service.circuit_states();
    assert_eq!(states["cpcb"].consecutive_failures, 1);
    assert_eq!(states["cpcb"].state, CircuitState::Closed);
}

#[tokio::test]
async fn when_cpcb_fails_without_fallback_location_pipeline_rejects() {
    // Given: CPCB is down
    let client =
        Arc::new(ScriptedHttpClient::new().route("cpcb.test", ScriptedReply::status(500, "")));
    let service = service(test_config(), &client);

    // When: Air quality is requested without a fallback location
    let error = service
        .fetch_air_quality(&AirQualityRequest::default())
        .await
        .expect_err("no fallback possible");

    // Then: A configuration error is returned and OpenWeather is not attempted
    assert_eq!(error.kind(), SourceErrorKind::Configuration);
    assert_eq!(client.request_count("owm.test"), 0);
}

#[tokio::test]
async fn when_cpcb_key_is_missing_pipeline_goes_straight_to_fallback() {
    // Given: No CPCB credentials are configured
    let mut config = test_config();
    config.cpcb.api_key = None;
    let client =
        Arc::new(ScriptedHttpClient::new().route("air_pollution", ScriptedReply::json(OWM_AIR)));
    let service = service(config, &client);

    // When: Air quality is requested
    let batch = service
        .fetch_air_quality(&AirQualityRequest {
            query: CpcbQuery::default(),
            fallback_location: Some(DELHI),
        })
        .await
        .expect("fallback succeeds");

    // Then: CPCB was never contacted
    assert_eq!(batch.source, AqiSource::OpenWeather);
    assert_eq!(client.request_count("cpcb.test"), 0);
}

#[tokio::test]
async fn when_cpcb_circuit_is_open_fallback_serves_without_reaching_cpcb() {
    // Given: A CPCB breaker that trips after one failure
    let mut config = test_config();
    config.circuit_breaker.failure_threshold = 1;
    config.circuit_breaker.reset_timeout = Duration::from_secs(60);
    let client = Arc::new(
        ScriptedHttpClient::new()
            .route("cpcb.test", ScriptedReply::status(500, ""))
            .route("air_pollution", ScriptedReply::json(OWM_AIR)),
    );
    let service = service(config, &client);
    let request = AirQualityRequest {
        query: CpcbQuery::default(),
        fallback_location: Some(DELHI),
    };

    // When: Two requests are made back to back
    service.fetch_air_quality(&request).await.expect("first falls back");
    let batch = service.fetch_air_quality(&request).await.expect("second falls back");

    // Then: The second request is short-circuited before reaching CPCB
    assert_eq!(batch.source, AqiSource::OpenWeather);
    assert_eq!(client.request_count("cpcb.test"), 1);
    assert_eq!(service.circuit_states()["cpcb"].state, CircuitState::Open);
}

// =============================================================================
// Traffic
// =============================================================================

fn segment(id: &str, point: Option<Location>) -> TrafficSegment {
    TrafficSegment {
        segment_id: id.to_owned(),
        origin: Location { lat: 28.61, lng: 77.2 },
        destination: Location { lat: 28.63, lng: 77.22 },
        point,
    }
}

#[tokio::test]
async fn when_providers_fail_per_segment_only_that_segment_is_affected() {
    // Given: Google answers the first segment, then fails;
    // TomTom knows only the second segment's sample point
    let client = Arc::new(
        ScriptedHttpClient::new()
            .route_sequence(
                "routes.test",
                [
                    ScriptedReply::json(
                        r#"{"routes":[{"duration":"720s","staticDuration":"600s","distanceMeters":12000}]}"#,
                    ),
                    ScriptedReply::status(500, ""),
                ],
            )
            .route(
                "point=28.7%2C77.1",
                ScriptedReply::json(r#"{"flowSegmentData":{"currentSpeed":30,"freeFlowSpeed":60}}"#),
            ),
    );
    let service = service(test_config(), &client);
    let segments = [
        segment("ring-road", None),
        segment("nh-48", Some(Location { lat: 28.7, lng: 77.1 })),
        segment("unknown", Some(Location { lat: 10.0, lng: 10.0 })),
    ];

    // When: Traffic is fetched for all three segments
    let records = service.fetch_traffic_for_segments(&segments).await;

    // Then: Google supplied the first, TomTom the second, the third is omitted
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].segment_id, "ring-road");
    assert_eq!(records[0].speed, 60.0);
    assert_eq!(records[0].congestion_level, 20);
    assert_eq!(records[1].segment_id, "nh-48");
    assert_eq!(records[1].speed, 30.0);
    assert_eq!(records[1].congestion_level, 50);
    assert_eq!(client.request_count("routes.test"), 3);
}

#[tokio::test]
async fn when_google_reports_zero_duration_tomtom_midpoint_is_used() {
    // Given: Google returns a zero-duration route and TomTom knows the midpoint
    let client = Arc::new(
        ScriptedHttpClient::new()
            .route(
                "routes.test",
                ScriptedReply::json(r#"{"routes":[{"duration":"0s","distanceMeters":0}]}"#),
            )
            .route(
                "flow.test",
                ScriptedReply::json(r#"{"flowSegmentData":{"currentSpeed":12,"freeFlowSpeed":48}}"#),
            ),
    );
    let service = service(test_config(), &client);

    // When: Traffic is fetched for a segment without an explicit point
    let records = service
        .fetch_traffic_for_segments(&[TrafficSegment {
            segment_id: String::from("ring-road"),
            origin: Location { lat: 28.5, lng: 77.0 },
            destination: Location { lat: 28.75, lng: 77.5 },
            point: None,
        }])
        .await;

    // Then: The TomTom reading taken at the segment midpoint is used
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].congestion_level, 75);
    assert_eq!(records[0].speed, 12.0);
    let flow_request = client
        .requests()
        .into_iter()
        .find(|request| request.url.contains("flow.test"))
        .expect("TomTom was called");
    assert!(flow_request.url.contains("point=28.625%2C77.25"), "{}", flow_request.url);
}

#[tokio::test]
async fn when_filtering_high_traffic_zones_only_congested_segments_remain() {
    // Given: Two sampled segments, one above the default threshold
    let client = Arc::new(
        ScriptedHttpClient::new()
            .route_sequence(
                "routes.test",
                [
                    ScriptedReply::json(
                        r#"{"routes":[{"duration":"900s","staticDuration":"500s","distanceMeters":5000}]}"#,
                    ),
                    ScriptedReply::json(
                        r#"{"routes":[{"duration":"510s","staticDuration":"500s","distanceMeters":5000}]}"#,
                    ),
                ],
            ),
    );
    let service = service(test_config(), &client);
    let records = service
        .fetch_traffic_for_segments(&[segment("jammed", None), segment("clear", None)])
        .await;

    // When: High traffic zones are identified
    let zones = identify_high_traffic_zones(&records, DEFAULT_HIGH_TRAFFIC_THRESHOLD);

    // Then: Only the jammed segment is reported
    assert_eq!(records.len(), 2);
    assert_eq!(zones.len(), 1);
    assert_eq!(zones[0].segment_id, "jammed");
    assert_eq!(zones[0].congestion_level, 80);
}

// =============================================================================
// Weather
// =============================================================================

#[tokio::test]
async fn when_weather_provider_fails_validated_current_weather_is_empty() {
    // Given: OpenWeather is down
    let client =
        Arc::new(ScriptedHttpClient::new().route("owm.test", ScriptedReply::status(503, "")));
    let service = service(test_config(), &client);

    // When: Validated current weather is requested
    let observations = service.get_validated_current_weather(DELHI).await;

    // Then: The failure degrades to an empty result
    assert!(observations.is_empty());

    // And: The strict variant still reports the failure
    let error = service
        .fetch_current_weather(DELHI)
        .await
        .expect_err("provider is down");
    assert_eq!(error.kind(), SourceErrorKind::UpstreamStatus);
}

#[tokio::test]
async fn when_current_weather_is_out_of_range_it_is_rejected() {
    // Given: OpenWeather reports impossible humidity and no condition text
    let current = json!({
        "dt": 1729485000,
        "main": { "temp": 24.0, "humidity": 150 },
        "wind": { "speed": 2.0 },
        "weather": []
    });
    let client = Arc::new(
        ScriptedHttpClient::new().route("/weather?", ScriptedReply::json(current.to_string())),
    );
    let service = service(test_config(), &client);

    // When: Current weather is fetched
    let error = service
        .fetch_current_weather(DELHI)
        .await
        .expect_err("observation fails validation");

    // Then: The failure names every violated field
    assert_eq!(error.kind(), SourceErrorKind::InvalidResponse);
    assert!(error.message().contains("humidity"), "{}", error.message());
    assert!(error.message().contains("conditions"), "{}", error.message());

    // And: The validated variant degrades to an empty result
    assert!(service.get_validated_current_weather(DELHI).await.is_empty());
}

#[tokio::test]
async fn when_forecast_contains_invalid_slots_they_are_dropped() {
    // Given: A forecast with one impossible humidity value
    let forecast = json!({
        "list": [
            { "dt": 1729485000, "main": { "temp": 24.0, "humidity": 60 }, "wind": { "speed": 2.0 }, "weather": [{ "description": "smoke" }] },
            { "dt": 1729495800, "main": { "temp": 22.0, "humidity": 160 }, "wind": { "speed": 1.0 }, "weather": [{ "description": "haze" }] }
        ]
    });
    let client = Arc::new(
        ScriptedHttpClient::new().route("/forecast?", ScriptedReply::json(forecast.to_string())),
    );
    let service = service(test_config(), &client);

    // When: The forecast is fetched
    let slots = service.fetch_forecast(DELHI).await.expect("forecast succeeds");

    // Then: Only the valid slot remains
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].conditions, "smoke");
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn when_collection_has_one_invalid_item_only_the_valid_one_is_returned() {
    // Given: One reading with a value and one with none
    let timestamp = UtcDateTime::parse("2024-10-21T04:30:00Z").expect("timestamp");
    let valid = AqiReading {
        pm10: Some(200.0),
        ..AqiReading::empty(timestamp, DELHI)
    };
    let invalid = AqiReading::empty(timestamp, DELHI);

    // When: The collection is validated
    let kept = validate_collection(&AqiReadingSchema, vec![valid.clone(), invalid], "test");

    // Then: Only the valid reading survives
    assert_eq!(kept, vec![valid]);
}
