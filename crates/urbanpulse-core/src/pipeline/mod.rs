//! Ingestion pipelines: provider ordering, normalization and validation.
//!
//! | Pipeline | Providers | Fallback granularity |
//! |----------|-----------|----------------------|
//! | [`AirQualityPipeline`] | CPCB, then OpenWeather | whole batch |
//! | [`TrafficPipeline`] | Google Routes, then TomTom | per segment |
//! | [`WeatherPipeline`] | OpenWeather | none |

mod air_quality;
mod traffic;
mod weather;

pub use air_quality::{AirQualityBatch, AirQualityPipeline, AirQualityRequest, AqiSource};
pub use traffic::{
    calculate_congestion_from_durations, calculate_congestion_from_speeds,
    calculate_speed_from_distance, identify_high_traffic_zones, TrafficPipeline,
    DEFAULT_HIGH_TRAFFIC_THRESHOLD,
};
pub use weather::{estimate_pollution_risk, WeatherPipeline};
