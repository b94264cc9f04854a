//! Record schemas and collection-level validation.
//!
//! Normalized records are checked one by one. Invalid records are dropped and
//! logged; a collection is never rejected as a whole.

use crate::{AqiReading, TrafficRecord, ValidationError, WeatherObservation};

/// Structural checks for one canonical record type.
pub trait Schema<T> {
    /// Name used in log output.
    fn name(&self) -> &'static str;

    /// Returns every violation found; empty means valid.
    fn check(&self, item: &T) -> Vec<ValidationError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AqiReadingSchema;

impl Schema<AqiReading> for AqiReadingSchema {
    fn name(&self) -> &'static str {
        "aqi_reading"
    }

    fn check(&self, item: &AqiReading) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if let Err(error) = item.location.check() {
            errors.push(error);
        }
        if let Some(aqi) = item.aqi {
            if !(0..=999).contains(&aqi) {
                errors.push(ValidationError::OutOfRange {
                    field: "aqi",
                    min: 0,
                    max: 999,
                });
            }
        }

        let columns = [
            ("pm2_5", item.pm2_5),
            ("pm10", item.pm10),
            ("o3", item.o3),
            ("no2", item.no2),
            ("so2", item.so2),
            ("co", item.co),
        ];
        for (field, value) in columns {
            if let Some(value) = value {
                check_non_negative(field, value, &mut errors);
            }
        }

        if !item.has_any_value() {
            errors.push(ValidationError::NoPollutantValues);
        }
        errors
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TrafficRecordSchema;

impl Schema<TrafficRecord> for TrafficRecordSchema {
    fn name(&self) -> &'static str {
        "traffic_record"
    }

    fn check(&self, item: &TrafficRecord) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if item.segment_id.trim().is_empty() {
            errors.push(ValidationError::EmptySegmentId);
        }
        if !(0..=100).contains(&item.congestion_level) {
            errors.push(ValidationError::OutOfRange {
                field: "congestion_level",
                min: 0,
                max: 100,
            });
        }
        check_non_negative("speed", item.speed, &mut errors);
        errors
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WeatherObservationSchema;

impl Schema<WeatherObservation> for WeatherObservationSchema {
    fn name(&self) -> &'static str {
        "weather_observation"
    }

    fn check(&self, item: &WeatherObservation) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if let Err(error) = item.location.check() {
            errors.push(error);
        }
        if !item.temperature.is_finite() {
            errors.push(ValidationError::NonFiniteValue {
                field: "temperature",
            });
        }
        if !item.humidity.is_finite() || !(0.0..=100.0).contains(&item.humidity) {
            errors.push(ValidationError::OutOfRange {
                field: "humidity",
                min: 0,
                max: 100,
            });
        }
        check_non_negative("wind_speed", item.wind_speed, &mut errors);
        if item.conditions.trim().is_empty() {
            errors.push(ValidationError::EmptyConditions);
        }
        errors
    }
}

fn check_non_negative(field: &'static str, value: f64, errors: &mut Vec<ValidationError>) {
    if !value.is_finite() {
        errors.push(ValidationError::NonFiniteValue { field });
    } else if value < 0.0 {
        errors.push(ValidationError::NegativeValue { field });
    }
}

/// Keeps the items that pass `schema`, logging each rejected item with its
/// violations under `context`. Input order is preserved.
pub fn validate_collection<T, S>(schema: &S, items: Vec<T>, context: &str) -> Vec<T>
where
    S: Schema<T> + ?Sized,
{
    let total = items.len();
    let valid: Vec<T> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let errors = schema.check(&item);
            if errors.is_empty() {
                return Some(item);
            }
            let details = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            tracing::warn!(
                context,
                schema = schema.name(),
                index,
                errors = %details,
                "dropping invalid record"
            );
            None
        })
        .collect();

    if valid.len() < total {
        tracing::info!(
            context,
            schema = schema.name(),
            kept = valid.len(),
            dropped = total - valid.len(),
            "validated collection"
        );
    }
    valid
}
