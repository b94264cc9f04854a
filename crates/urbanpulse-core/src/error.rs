use thiserror::Error;

/// Validation errors raised by domain constructors and record schemas.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("latitude {value} is outside [-90, 90]")]
    LatitudeOutOfRange { value: String },
    #[error("longitude {value} is outside [-180, 180]")]
    LongitudeOutOfRange { value: String },

    #[error("invalid timestamp: '{value}'")]
    InvalidTimestamp { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
    #[error("field '{field}' must be within [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
    },

    #[error("at least one of aqi, pm2_5, pm10, o3, no2, so2, co must be present")]
    NoPollutantValues,
    #[error("segment_id cannot be empty")]
    EmptySegmentId,
    #[error("conditions cannot be empty")]
    EmptyConditions,
}

/// Errors raised while assembling configuration from the environment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable '{name}' has invalid value '{value}': expected {expected}")]
    InvalidValue {
        name: String,
        value: String,
        expected: &'static str,
    },
}
