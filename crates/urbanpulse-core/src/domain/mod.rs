//! # Domain Models
//!
//! Canonical shapes every provider payload is normalized into.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`AqiReading`] | Merged pollutant columns for one station/instant |
//! | [`TrafficRecord`] | Congestion and speed for one road segment |
//! | [`TrafficSegment`] | Segment endpoints requested by callers |
//! | [`WeatherObservation`] | Current or forecast weather slot |
//! | [`Location`] | Latitude/longitude pair |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! Models carry public fields and are checked by the schemas in
//! [`validation`](crate::validation) after normalization, so a malformed
//! provider row is dropped instead of aborting the batch.

mod location;
mod models;
mod timestamp;

pub use location::Location;
pub use models::{
    AqiReading, Pollutant, PollutionRisk, TrafficRecord, TrafficSegment, WeatherObservation,
};
pub use timestamp::UtcDateTime;
