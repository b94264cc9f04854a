use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{Location, UtcDateTime};

/// Canonical air-quality observation at one location and instant.
///
/// Every pollutant column is optional because providers report different
/// subsets; [`AqiReadingSchema`](crate::validation::AqiReadingSchema) requires
/// at least one of them to be present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AqiReading {
    pub timestamp: UtcDateTime,
    pub location: Location,
    pub aqi: Option<i32>,
    pub pm2_5: Option<f64>,
    pub pm10: Option<f64>,
    pub o3: Option<f64>,
    pub no2: Option<f64>,
    pub so2: Option<f64>,
    pub co: Option<f64>,
}

impl AqiReading {
    /// Empty reading that normalizers fill column by column.
    pub fn empty(timestamp: UtcDateTime, location: Location) -> Self {
        Self {
            timestamp,
            location,
            aqi: None,
            pm2_5: None,
            pm10: None,
            o3: None,
            no2: None,
            so2: None,
            co: None,
        }
    }

    pub fn has_any_value(&self) -> bool {
        self.aqi.is_some()
            || [self.pm2_5, self.pm10, self.o3, self.no2, self.so2, self.co]
                .iter()
                .any(Option::is_some)
    }

    pub fn set_pollutant(&mut self, pollutant: Pollutant, value: f64) {
        let slot = match pollutant {
            Pollutant::Pm25 => &mut self.pm2_5,
            Pollutant::Pm10 => &mut self.pm10,
            Pollutant::O3 => &mut self.o3,
            Pollutant::No2 => &mut self.no2,
            Pollutant::So2 => &mut self.so2,
            Pollutant::Co => &mut self.co,
        };
        *slot = Some(value);
    }
}

/// Pollutant columns of [`AqiReading`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pollutant {
    Pm25,
    Pm10,
    O3,
    No2,
    So2,
    Co,
}

impl Pollutant {
    /// Resolves a provider pollutant label (`PM2.5`, `OZONE`, ...) to a column.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "PM2_5" | "PM2.5" => Some(Self::Pm25),
            "PM10" => Some(Self::Pm10),
            "O3" | "OZONE" => Some(Self::O3),
            "NO2" => Some(Self::No2),
            "SO2" => Some(Self::So2),
            "CO" => Some(Self::Co),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pm25 => "pm2_5",
            Self::Pm10 => "pm10",
            Self::O3 => "o3",
            Self::No2 => "no2",
            Self::So2 => "so2",
            Self::Co => "co",
        }
    }
}

/// Road segment to sample, described by its endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficSegment {
    pub segment_id: String,
    pub origin: Location,
    pub destination: Location,
    /// Point used for flow-segment lookups; defaults to the segment midpoint.
    #[serde(default)]
    pub point: Option<Location>,
}

impl TrafficSegment {
    pub fn probe_point(&self) -> Location {
        self.point
            .unwrap_or_else(|| self.origin.midpoint(self.destination))
    }
}

/// Canonical congestion sample for one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficRecord {
    pub segment_id: String,
    pub congestion_level: i64,
    pub speed: f64,
    pub timestamp: UtcDateTime,
}

/// Canonical weather observation (current or forecast slot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherObservation {
    pub timestamp: UtcDateTime,
    pub location: Location,
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub conditions: String,
}

/// Coarse pollution-dispersion risk derived from weather.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollutionRisk {
    Low,
    Moderate,
    High,
}

impl PollutionRisk {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
        }
    }
}

impl Display for PollutionRisk {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
