use std::collections::HashMap;

use serde_json::Value;

use crate::adapters::{first_number, parse_number, require_key};
use crate::config::CpcbConfig;
use crate::http_client::{HttpAuth, HttpRequest};
use crate::transport::ProviderTransport;
use crate::{AqiReading, Location, Pollutant, SourceError, UtcDateTime};

/// Filters for the CPCB real-time station feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpcbQuery {
    pub state: Option<String>,
    pub city: Option<String>,
    pub station: Option<String>,
    /// Page size; the adapter default applies when unset.
    pub limit: Option<u32>,
}

impl CpcbQuery {
    pub fn for_city(city: impl Into<String>) -> Self {
        Self {
            city: Some(city.into()),
            ..Self::default()
        }
    }
}

/// Government air-quality feed published through data.gov.in.
#[derive(Clone)]
pub struct CpcbAdapter {
    config: CpcbConfig,
    transport: ProviderTransport,
}

impl CpcbAdapter {
    pub fn new(config: CpcbConfig, transport: ProviderTransport) -> Self {
        Self { config, transport }
    }

    pub fn transport(&self) -> &ProviderTransport {
        &self.transport
    }

    /// `GET {base}/{resource_id}?api-key=..&format=json&limit=..&filters[..]=..`
    pub fn request(&self, query: &CpcbQuery) -> Result<HttpRequest, SourceError> {
        let api_key = require_key(
            self.config.api_key.as_deref(),
            "CPCB",
            "URBANPULSE_CPCB_API_KEY",
        )?;
        if self.config.resource_id.trim().is_empty() {
            return Err(SourceError::configuration(
                "CPCB resource id is not configured (set URBANPULSE_CPCB_RESOURCE_ID)",
            ));
        }

        let limit = query.limit.unwrap_or(self.config.limit).to_string();
        let mut request = HttpRequest::get(format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.resource_id
        ))
        .with_auth(&HttpAuth::QueryParam {
            name: String::from("api-key"),
            value: api_key.to_owned(),
        })
        .with_query("format", "json")
        .with_query("limit", &limit);

        let filters = [
            ("filters[state]", &query.state),
            ("filters[city]", &query.city),
            ("filters[station]", &query.station),
        ];
        for (name, value) in filters {
            if let Some(value) = value.as_deref().filter(|value| !value.trim().is_empty()) {
                request = request.with_query(name, value);
            }
        }
        Ok(request)
    }

    /// Raw rows of the `records` array.
    pub async fn fetch_records(&self, query: &CpcbQuery) -> Result<Vec<Value>, SourceError> {
        let request = self.request(query)?;
        let body = self.transport.fetch_json(request).await?;

        match body.get("records") {
            Some(Value::Array(records)) => Ok(records.clone()),
            _ => Err(SourceError::invalid_response(
                "CPCB response has no 'records' array",
            )),
        }
    }
}

/// Merges CPCB rows into one reading per `station|timestamp|lat,lng`.
///
/// CPCB publishes one row per pollutant, so a single station observation is
/// spread over several rows. Rows without a parseable `last_update` or
/// coordinate pair are skipped. Output keeps first-seen order.
pub fn normalize_cpcb_records(rows: &[Value]) -> Vec<AqiReading> {
    let mut readings: Vec<AqiReading> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();

    for (row_index, row) in rows.iter().enumerate() {
        let station = row
            .get("station")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();

        let Some(timestamp) = row
            .get("last_update")
            .and_then(Value::as_str)
            .and_then(|raw| UtcDateTime::parse_cpcb(raw).ok())
        else {
            tracing::warn!(row = row_index, station, "skipping CPCB row without parseable timestamp");
            continue;
        };

        let (Some(lat), Some(lng)) = (parse_number(&row["latitude"]), parse_number(&row["longitude"]))
        else {
            tracing::warn!(row = row_index, station, "skipping CPCB row without parseable location");
            continue;
        };
        let location = Location { lat, lng };

        let key = format!("{station}|{timestamp}|{lat},{lng}");
        let slot = *by_key.entry(key).or_insert_with(|| {
            readings.push(AqiReading::empty(timestamp, location));
            readings.len() - 1
        });
        let reading = &mut readings[slot];

        let pollutant = row
            .get("pollutant_id")
            .and_then(Value::as_str)
            .and_then(Pollutant::from_label);
        if let Some(pollutant) = pollutant {
            if let Some(value) = first_number(row, &["avg_value", "pollutant_avg", "value"]) {
                reading.set_pollutant(pollutant, value);
            }
        }

        if let Some(aqi) = first_number(row, &["aqi", "aqi_value"]) {
            reading.aqi = Some(aqi.round() as i32);
        }
    }

    readings
}
