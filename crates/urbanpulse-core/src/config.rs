//! Provider endpoints, credentials and resilience settings.
//!
//! # Environment Variables
//!
//! | Setting | Primary Env Var | Fallback Env Var |
//! |---------|-----------------|------------------|
//! | CPCB key | `URBANPULSE_CPCB_API_KEY` | `CPCB_API_KEY` |
//! | CPCB resource | `URBANPULSE_CPCB_RESOURCE_ID` | - |
//! | OpenWeather key | `URBANPULSE_OPENWEATHER_API_KEY` | `OPENWEATHER_API_KEY` |
//! | Google Routes key | `URBANPULSE_GOOGLE_MAPS_API_KEY` | `GOOGLE_MAPS_API_KEY` |
//! | TomTom key | `URBANPULSE_TOMTOM_API_KEY` | `TOMTOM_API_KEY` |
//! | Base URLs | `URBANPULSE_<PROVIDER>_BASE_URL` | - |
//! | Timeouts | `URBANPULSE_<PROVIDER>_TIMEOUT_MS` | - |
//! | Pacing | `URBANPULSE_<PROVIDER>_MIN_INTERVAL_MS` | - |
//! | OpenWeather units | `URBANPULSE_OPENWEATHER_UNITS` | - |
//! | Retries | `URBANPULSE_RETRY_ATTEMPTS`, `URBANPULSE_RETRY_BASE_DELAY_MS`, `URBANPULSE_RETRY_MAX_DELAY_MS` | - |
//! | Breaker | `URBANPULSE_CIRCUIT_FAILURE_THRESHOLD`, `URBANPULSE_CIRCUIT_RESET_TIMEOUT_MS` | - |
//!
//! `<PROVIDER>` is one of `CPCB`, `OPENWEATHER`, `GOOGLE_ROUTES`, `TOMTOM`.
//! Empty values are treated as unset.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::provider_policy::ProviderPolicy;
use crate::retry::RetryConfig;
use crate::ConfigError;

/// Data.gov.in resource publishing real-time CPCB station readings.
pub const DEFAULT_CPCB_RESOURCE_ID: &str = "3b01bcb8-0b14-4abf-b6f2-c1bfd384ba69";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpcbConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub resource_id: String,
    /// Default page size when a query does not set one.
    pub limit: u32,
    pub policy: ProviderPolicy,
}

impl Default for CpcbConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("https://api.data.gov.in/resource"),
            api_key: None,
            resource_id: String::from(DEFAULT_CPCB_RESOURCE_ID),
            limit: 100,
            policy: ProviderPolicy::cpcb_default(),
        }
    }
}

/// Shared by the air-pollution and weather endpoints, which keep separate
/// breakers and limiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenWeatherConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub units: String,
    pub aqi_policy: ProviderPolicy,
    pub weather_policy: ProviderPolicy,
}

impl Default for OpenWeatherConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("https://api.openweathermap.org/data/2.5"),
            api_key: None,
            units: String::from("metric"),
            aqi_policy: ProviderPolicy::openweather_aqi_default(),
            weather_policy: ProviderPolicy::openweather_weather_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleRoutesConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub traffic_model: String,
    pub policy: ProviderPolicy,
}

impl Default for GoogleRoutesConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("https://routes.googleapis.com/directions/v2:computeRoutes"),
            api_key: None,
            traffic_model: String::from("BEST_GUESS"),
            policy: ProviderPolicy::google_routes_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TomTomConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub style: String,
    pub zoom: u8,
    pub unit: String,
    pub policy: ProviderPolicy,
}

impl Default for TomTomConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("https://api.tomtom.com/traffic/services/4/flowSegmentData"),
            api_key: None,
            style: String::from("absolute"),
            zoom: 10,
            unit: String::from("KMPH"),
            policy: ProviderPolicy::tomtom_default(),
        }
    }
}

/// Complete ingestion configuration.
///
/// `Default` carries production endpoints and no credentials; adapters whose
/// key is missing fail with a configuration error when called.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestConfig {
    pub cpcb: CpcbConfig,
    pub openweather: OpenWeatherConfig,
    pub google_routes: GoogleRoutesConfig,
    pub tomtom: TomTomConfig,
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl IngestConfig {
    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads overrides through `lookup`, starting from [`IngestConfig::default`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = EnvReader { lookup };
        let mut config = Self::default();

        config.cpcb.api_key = vars.key("URBANPULSE_CPCB_API_KEY", "CPCB_API_KEY");
        if let Some(resource_id) = vars.get("URBANPULSE_CPCB_RESOURCE_ID") {
            config.cpcb.resource_id = resource_id;
        }
        if let Some(base_url) = vars.get("URBANPULSE_CPCB_BASE_URL") {
            config.cpcb.base_url = base_url;
        }
        vars.policy("CPCB", &mut config.cpcb.policy)?;

        config.openweather.api_key =
            vars.key("URBANPULSE_OPENWEATHER_API_KEY", "OPENWEATHER_API_KEY");
        if let Some(base_url) = vars.get("URBANPULSE_OPENWEATHER_BASE_URL") {
            config.openweather.base_url = base_url;
        }
        if let Some(units) = vars.get("URBANPULSE_OPENWEATHER_UNITS") {
            config.openweather.units = units;
        }
        vars.policy("OPENWEATHER", &mut config.openweather.aqi_policy)?;
        vars.policy("OPENWEATHER", &mut config.openweather.weather_policy)?;

        config.google_routes.api_key =
            vars.key("URBANPULSE_GOOGLE_MAPS_API_KEY", "GOOGLE_MAPS_API_KEY");
        if let Some(base_url) = vars.get("URBANPULSE_GOOGLE_ROUTES_BASE_URL") {
            config.google_routes.base_url = base_url;
        }
        vars.policy("GOOGLE_ROUTES", &mut config.google_routes.policy)?;

        config.tomtom.api_key = vars.key("URBANPULSE_TOMTOM_API_KEY", "TOMTOM_API_KEY");
        if let Some(base_url) = vars.get("URBANPULSE_TOMTOM_BASE_URL") {
            config.tomtom.base_url = base_url;
        }
        vars.policy("TOMTOM", &mut config.tomtom.policy)?;

        if let Some(attempts) = vars.parse::<u32>("URBANPULSE_RETRY_ATTEMPTS", "an integer")? {
            config.retry.attempts = attempts;
        }
        if let Some(base) = vars.millis("URBANPULSE_RETRY_BASE_DELAY_MS")? {
            config.retry.backoff.base = base;
        }
        if let Some(max) = vars.millis("URBANPULSE_RETRY_MAX_DELAY_MS")? {
            config.retry.backoff.max = max;
        }

        if let Some(threshold) = vars.parse::<u32>(
            "URBANPULSE_CIRCUIT_FAILURE_THRESHOLD",
            "a positive integer",
        )? {
            if threshold == 0 {
                return Err(ConfigError::InvalidValue {
                    name: String::from("URBANPULSE_CIRCUIT_FAILURE_THRESHOLD"),
                    value: threshold.to_string(),
                    expected: "a positive integer",
                });
            }
            config.circuit_breaker.failure_threshold = threshold;
        }
        if let Some(reset) = vars.millis("URBANPULSE_CIRCUIT_RESET_TIMEOUT_MS")? {
            config.circuit_breaker.reset_timeout = reset;
        }

        Ok(config)
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }

    fn key(&self, primary: &str, fallback: &str) -> Option<String> {
        self.get(primary).or_else(|| self.get(fallback))
    }

    fn parse<T: FromStr>(&self, name: &str, expected: &'static str) -> Result<Option<T>, ConfigError> {
        self.get(name)
            .map(|value| {
                value.parse::<T>().map_err(|_| ConfigError::InvalidValue {
                    name: name.to_owned(),
                    value,
                    expected,
                })
            })
            .transpose()
    }

    fn millis(&self, name: &str) -> Result<Option<Duration>, ConfigError> {
        Ok(self
            .parse::<u64>(name, "a duration in milliseconds")?
            .map(Duration::from_millis))
    }

    fn policy(&self, provider: &str, policy: &mut ProviderPolicy) -> Result<(), ConfigError> {
        if let Some(timeout) = self.millis(&format!("URBANPULSE_{provider}_TIMEOUT_MS"))? {
            policy.timeout = timeout;
        }
        if let Some(interval) = self.millis(&format!("URBANPULSE_{provider}_MIN_INTERVAL_MS"))? {
            policy.min_interval = interval;
        }
        Ok(())
    }
}
