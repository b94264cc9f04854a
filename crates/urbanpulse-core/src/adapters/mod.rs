//! Provider adapters and their payload normalizers.
//!
//! Every adapter sends its requests through a
//! [`ProviderTransport`](crate::transport::ProviderTransport) and returns
//! either raw provider JSON or a small typed summary of it. Normalizers are
//! free functions so they can be exercised without any transport.

mod cpcb;
mod google_routes;
mod openweather;
mod tomtom;

pub use cpcb::{normalize_cpcb_records, CpcbAdapter, CpcbQuery};
pub use google_routes::{parse_duration_seconds, GoogleRoutesAdapter, RouteMetrics};
pub use openweather::{
    normalize_current_weather, normalize_forecast, normalize_openweather_response,
    OpenWeatherAqiAdapter, OpenWeatherWeatherAdapter,
};
pub use tomtom::{FlowMetrics, TomTomAdapter};

use serde_json::Value;

use crate::SourceError;

/// Reads a finite number from a JSON number or numeric string.
///
/// Blank strings and placeholders such as `"NA"` yield `None`; a genuine `0`
/// is returned as `Some(0.0)`.
pub fn parse_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// First parseable number among `fields` of a JSON object.
pub(crate) fn first_number(row: &Value, fields: &[&str]) -> Option<f64> {
    fields.iter().find_map(|field| parse_number(&row[*field]))
}

pub(crate) fn require_key<'a>(
    key: Option<&'a str>,
    provider: &str,
    env_var: &str,
) -> Result<&'a str, SourceError> {
    key.filter(|key| !key.trim().is_empty()).ok_or_else(|| {
        SourceError::configuration(format!("{provider} API key is not configured (set {env_var})"))
    })
}
