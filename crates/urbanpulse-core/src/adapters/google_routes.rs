use serde::Deserialize;
use serde_json::{json, Value};

use crate::adapters::require_key;
use crate::config::GoogleRoutesConfig;
use crate::http_client::{HttpAuth, HttpRequest};
use crate::transport::ProviderTransport;
use crate::{Location, SourceError, TrafficSegment, UtcDateTime};

const FIELD_MASK: &str = "routes.duration,routes.staticDuration,routes.distanceMeters";

/// Distance and travel times of the first computed route.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteMetrics {
    pub distance_meters: f64,
    /// Traffic-aware travel time.
    pub duration_seconds: f64,
    /// Travel time without traffic.
    pub static_duration_seconds: f64,
}

/// Google Routes `computeRoutes` adapter, the primary traffic provider.
#[derive(Clone)]
pub struct GoogleRoutesAdapter {
    config: GoogleRoutesConfig,
    transport: ProviderTransport,
}

impl GoogleRoutesAdapter {
    pub fn new(config: GoogleRoutesConfig, transport: ProviderTransport) -> Self {
        Self { config, transport }
    }

    pub fn transport(&self) -> &ProviderTransport {
        &self.transport
    }

    /// `POST {base}` with a traffic-aware driving route body.
    pub fn request(
        &self,
        segment: &TrafficSegment,
        departure: UtcDateTime,
    ) -> Result<HttpRequest, SourceError> {
        let api_key = require_key(
            self.config.api_key.as_deref(),
            "Google Routes",
            "URBANPULSE_GOOGLE_MAPS_API_KEY",
        )?;

        let body = json!({
            "origin": waypoint(segment.origin),
            "destination": waypoint(segment.destination),
            "travelMode": "DRIVE",
            "routingPreference": "TRAFFIC_AWARE_OPTIMAL",
            "trafficModel": self.config.traffic_model,
            "departureTime": departure.format_rfc3339(),
        });

        Ok(HttpRequest::post(self.config.base_url.as_str())
            .with_auth(&HttpAuth::Header {
                name: String::from("X-Goog-Api-Key"),
                value: api_key.to_owned(),
            })
            .with_header("X-Goog-FieldMask", FIELD_MASK)
            .with_json_body(&body))
    }

    pub async fn fetch_route(&self, segment: &TrafficSegment) -> Result<RouteMetrics, SourceError> {
        let request = self.request(segment, UtcDateTime::now())?;
        let body = self.transport.fetch_json(request).await?;
        parse_route(&body)
    }
}

fn waypoint(location: Location) -> Value {
    json!({
        "location": {
            "latLng": { "latitude": location.lat, "longitude": location.lng }
        }
    })
}

#[derive(Debug, Deserialize)]
struct RoutesPayload {
    #[serde(default)]
    routes: Vec<RoutePayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoutePayload {
    duration: Option<String>,
    static_duration: Option<String>,
    distance_meters: Option<f64>,
}

fn parse_route(body: &Value) -> Result<RouteMetrics, SourceError> {
    let payload = RoutesPayload::deserialize(body).map_err(|error| {
        SourceError::invalid_response(format!("unexpected Google Routes payload: {error}"))
    })?;
    let route = payload
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| SourceError::no_data("Google Routes returned no route"))?;

    let duration_seconds = route
        .duration
        .as_deref()
        .and_then(parse_duration_seconds)
        .ok_or_else(|| SourceError::invalid_response("Google Routes route has no duration"))?;
    let static_duration_seconds = route
        .static_duration
        .as_deref()
        .and_then(parse_duration_seconds)
        .unwrap_or(duration_seconds);

    Ok(RouteMetrics {
        distance_meters: route.distance_meters.unwrap_or(0.0),
        duration_seconds,
        static_duration_seconds,
    })
}

/// Parses protobuf-style durations such as `"165s"` or `"12.5s"`.
pub fn parse_duration_seconds(raw: &str) -> Option<f64> {
    let seconds = raw.trim().strip_suffix('s')?.parse::<f64>().ok()?;
    (seconds.is_finite() && seconds >= 0.0).then_some(seconds)
}
