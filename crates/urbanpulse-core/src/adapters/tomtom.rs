use serde::Deserialize;
use serde_json::Value;

use crate::adapters::require_key;
use crate::config::TomTomConfig;
use crate::http_client::{HttpAuth, HttpRequest};
use crate::transport::ProviderTransport;
use crate::{Location, SourceError};

/// Observed and free-flow speed at a probe point, in the configured unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowMetrics {
    pub current_speed: f64,
    pub free_flow_speed: f64,
}

/// TomTom flow-segment adapter, the traffic fallback provider.
#[derive(Clone)]
pub struct TomTomAdapter {
    config: TomTomConfig,
    transport: ProviderTransport,
}

impl TomTomAdapter {
    pub fn new(config: TomTomConfig, transport: ProviderTransport) -> Self {
        Self { config, transport }
    }

    pub fn transport(&self) -> &ProviderTransport {
        &self.transport
    }

    /// `GET {base}/{style}/{zoom}/json?point=lat,lng&unit=..&key=..`
    pub fn request(&self, point: Location) -> Result<HttpRequest, SourceError> {
        let api_key = require_key(
            self.config.api_key.as_deref(),
            "TomTom",
            "URBANPULSE_TOMTOM_API_KEY",
        )?;

        Ok(HttpRequest::get(format!(
            "{}/{}/{}/json",
            self.config.base_url.trim_end_matches('/'),
            self.config.style,
            self.config.zoom
        ))
        .with_query("point", &format!("{},{}", point.lat, point.lng))
        .with_query("unit", &self.config.unit)
        .with_auth(&HttpAuth::QueryParam {
            name: String::from("key"),
            value: api_key.to_owned(),
        }))
    }

    pub async fn fetch_flow(&self, point: Location) -> Result<FlowMetrics, SourceError> {
        let request = self.request(point)?;
        let body = self.transport.fetch_json(request).await?;
        parse_flow(&body)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlowPayload {
    flow_segment_data: Option<FlowSegmentData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlowSegmentData {
    current_speed: f64,
    free_flow_speed: f64,
}

fn parse_flow(body: &Value) -> Result<FlowMetrics, SourceError> {
    let payload = FlowPayload::deserialize(body).map_err(|error| {
        SourceError::invalid_response(format!("unexpected TomTom flow payload: {error}"))
    })?;
    let data = payload
        .flow_segment_data
        .ok_or_else(|| SourceError::no_data("TomTom returned no flowSegmentData"))?;

    Ok(FlowMetrics {
        current_speed: data.current_speed,
        free_flow_speed: data.free_flow_speed,
    })
}
