use serde::Deserialize;
use serde_json::Value;

use crate::adapters::require_key;
use crate::config::OpenWeatherConfig;
use crate::http_client::{HttpAuth, HttpRequest};
use crate::transport::ProviderTransport;
use crate::{AqiReading, Location, SourceError, UtcDateTime, WeatherObservation};

const KEY_ENV: &str = "URBANPULSE_OPENWEATHER_API_KEY";

fn located_request(
    config: &OpenWeatherConfig,
    path: &str,
    location: Location,
) -> Result<HttpRequest, SourceError> {
    let api_key = require_key(config.api_key.as_deref(), "OpenWeather", KEY_ENV)?;
    Ok(HttpRequest::get(format!(
        "{}/{path}",
        config.base_url.trim_end_matches('/')
    ))
    .with_query("lat", &location.lat.to_string())
    .with_query("lon", &location.lng.to_string())
    .with_auth(&HttpAuth::QueryParam {
        name: String::from("appid"),
        value: api_key.to_owned(),
    }))
}

/// OpenWeather air-pollution endpoint, used as the AQI fallback provider.
#[derive(Clone)]
pub struct OpenWeatherAqiAdapter {
    config: OpenWeatherConfig,
    transport: ProviderTransport,
}

impl OpenWeatherAqiAdapter {
    pub fn new(config: OpenWeatherConfig, transport: ProviderTransport) -> Self {
        Self { config, transport }
    }

    pub fn transport(&self) -> &ProviderTransport {
        &self.transport
    }

    /// `GET {base}/air_pollution?lat=..&lon=..&appid=..`
    pub fn request(&self, location: Location) -> Result<HttpRequest, SourceError> {
        located_request(&self.config, "air_pollution", location)
    }

    pub async fn fetch(&self, location: Location) -> Result<Value, SourceError> {
        let request = self.request(location)?;
        self.transport.fetch_json(request).await
    }
}

/// OpenWeather current-conditions and forecast endpoints.
#[derive(Clone)]
pub struct OpenWeatherWeatherAdapter {
    config: OpenWeatherConfig,
    transport: ProviderTransport,
}

impl OpenWeatherWeatherAdapter {
    pub fn new(config: OpenWeatherConfig, transport: ProviderTransport) -> Self {
        Self { config, transport }
    }

    pub fn transport(&self) -> &ProviderTransport {
        &self.transport
    }

    /// `GET {base}/weather?lat=..&lon=..&appid=..&units=..`
    pub fn current_request(&self, location: Location) -> Result<HttpRequest, SourceError> {
        Ok(located_request(&self.config, "weather", location)?
            .with_query("units", &self.config.units))
    }

    /// `GET {base}/forecast?lat=..&lon=..&appid=..&units=..`
    pub fn forecast_request(&self, location: Location) -> Result<HttpRequest, SourceError> {
        Ok(located_request(&self.config, "forecast", location)?
            .with_query("units", &self.config.units))
    }

    pub async fn fetch_current(&self, location: Location) -> Result<Value, SourceError> {
        let request = self.current_request(location)?;
        self.transport.fetch_json(request).await
    }

    pub async fn fetch_forecast(&self, location: Location) -> Result<Value, SourceError> {
        let request = self.forecast_request(location)?;
        self.transport.fetch_json(request).await
    }
}

#[derive(Debug, Deserialize)]
struct AirPollutionPayload {
    #[serde(default)]
    list: Vec<AirPollutionEntry>,
}

#[derive(Debug, Deserialize)]
struct AirPollutionEntry {
    dt: Option<i64>,
    main: Option<AirPollutionIndex>,
    #[serde(default)]
    components: AirComponents,
}

#[derive(Debug, Deserialize)]
struct AirPollutionIndex {
    aqi: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct AirComponents {
    pm2_5: Option<f64>,
    pm10: Option<f64>,
    o3: Option<f64>,
    no2: Option<f64>,
    so2: Option<f64>,
    co: Option<f64>,
}

/// Maps the first `list` entry of an air-pollution response to a reading.
///
/// Later entries are ignored. The OpenWeather index (`main.aqi`) is carried
/// as-is; a missing `dt` falls back to the current time.
pub fn normalize_openweather_response(data: &Value, location: Location) -> Vec<AqiReading> {
    let payload = match AirPollutionPayload::deserialize(data) {
        Ok(payload) => payload,
        Err(error) => {
            tracing::warn!(error = %error, "unexpected OpenWeather air-pollution payload");
            return Vec::new();
        }
    };
    let Some(entry) = payload.list.into_iter().next() else {
        return Vec::new();
    };

    let timestamp = entry
        .dt
        .and_then(|dt| UtcDateTime::from_unix_seconds(dt).ok())
        .unwrap_or_else(UtcDateTime::now);
    let components = entry.components;

    vec![AqiReading {
        aqi: entry
            .main
            .and_then(|main| main.aqi)
            .map(|aqi| aqi.round() as i32),
        pm2_5: components.pm2_5,
        pm10: components.pm10,
        o3: components.o3,
        no2: components.no2,
        so2: components.so2,
        co: components.co,
        ..AqiReading::empty(timestamp, location)
    }]
}

#[derive(Debug, Deserialize)]
struct WeatherEntry {
    dt: Option<i64>,
    main: WeatherMain,
    #[serde(default)]
    wind: Option<WeatherWind>,
    #[serde(default)]
    weather: Vec<WeatherCondition>,
}

#[derive(Debug, Deserialize)]
struct WeatherMain {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct WeatherWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct WeatherCondition {
    main: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastPayload {
    #[serde(default)]
    list: Vec<Value>,
}

impl WeatherEntry {
    fn into_observation(self, location: Location) -> WeatherObservation {
        let conditions = self
            .weather
            .into_iter()
            .next()
            .and_then(|condition| condition.description.or(condition.main))
            .unwrap_or_default();

        WeatherObservation {
            timestamp: self
                .dt
                .and_then(|dt| UtcDateTime::from_unix_seconds(dt).ok())
                .unwrap_or_else(UtcDateTime::now),
            location,
            temperature: self.main.temp,
            humidity: self.main.humidity,
            wind_speed: self.wind.map_or(0.0, |wind| wind.speed),
            conditions,
        }
    }
}

/// Maps a current-weather response to an observation at `location`.
pub fn normalize_current_weather(
    data: &Value,
    location: Location,
) -> Result<WeatherObservation, SourceError> {
    WeatherEntry::deserialize(data)
        .map(|entry| entry.into_observation(location))
        .map_err(|error| {
            SourceError::invalid_response(format!("unexpected OpenWeather weather payload: {error}"))
        })
}

/// Maps every usable `list` entry of a forecast response.
///
/// Entries that do not carry `main.temp` and `main.humidity` are skipped.
pub fn normalize_forecast(data: &Value, location: Location) -> Vec<WeatherObservation> {
    let payload = match ForecastPayload::deserialize(data) {
        Ok(payload) => payload,
        Err(error) => {
            tracing::warn!(error = %error, "unexpected OpenWeather forecast payload");
            return Vec::new();
        }
    };

    payload
        .list
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| match WeatherEntry::deserialize(entry) {
            Ok(entry) => Some(entry.into_observation(location)),
            Err(error) => {
                tracing::warn!(index, error = %error, "skipping forecast entry");
                None
            }
        })
        .collect()
}
