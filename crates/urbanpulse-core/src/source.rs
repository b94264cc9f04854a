use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical identifiers for the upstream telemetry providers.
///
/// Each identifier owns exactly one circuit breaker and one rate limiter for
/// the lifetime of an [`IngestionService`](crate::IngestionService).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    Cpcb,
    OpenweatherAqi,
    OpenweatherWeather,
    GoogleRoutes,
    Tomtom,
}

impl ProviderId {
    pub const ALL: [Self; 5] = [
        Self::Cpcb,
        Self::OpenweatherAqi,
        Self::OpenweatherWeather,
        Self::GoogleRoutes,
        Self::Tomtom,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cpcb => "cpcb",
            Self::OpenweatherAqi => "openweather_aqi",
            Self::OpenweatherWeather => "openweather_weather",
            Self::GoogleRoutes => "google_routes",
            Self::Tomtom => "tomtom",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = SourceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cpcb" => Ok(Self::Cpcb),
            "openweather_aqi" => Ok(Self::OpenweatherAqi),
            "openweather_weather" => Ok(Self::OpenweatherWeather),
            "google_routes" => Ok(Self::GoogleRoutes),
            "tomtom" => Ok(Self::Tomtom),
            other => Err(SourceError::configuration(format!(
                "unknown provider '{other}'"
            ))),
        }
    }
}

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// Missing credentials or other setup problems. Never retried.
    Configuration,
    /// Timeout, connect failure or other transport problem.
    Unavailable,
    /// Upstream answered with a non-success HTTP status.
    UpstreamStatus,
    /// The provider's circuit breaker rejected the call without invoking it.
    CircuitOpen,
    /// The payload could not be decoded into the expected shape.
    InvalidResponse,
    /// The call succeeded but produced no usable records.
    NoData,
    Internal,
}

/// Structured error surfaced by adapters, the resilience stack and pipelines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
    status: Option<u16>,
}

impl SourceError {
    fn new(kind: SourceErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
            status: None,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Configuration, message, false)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Unavailable, message, true)
    }

    pub fn upstream_status(status: u16, retryable: bool, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            ..Self::new(SourceErrorKind::UpstreamStatus, message, retryable)
        }
    }

    pub fn circuit_open(name: &str) -> Self {
        Self::new(
            SourceErrorKind::CircuitOpen,
            format!("circuit '{name}' is open"),
            false,
        )
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::InvalidResponse, message, false)
    }

    pub fn no_data(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::NoData, message, false)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Internal, message, false)
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn status(&self) -> Option<u16> {
        self.status
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Configuration => "source.configuration",
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::UpstreamStatus => "source.upstream_status",
            SourceErrorKind::CircuitOpen => "source.circuit_open",
            SourceErrorKind::InvalidResponse => "source.invalid_response",
            SourceErrorKind::NoData => "source.no_data",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}
