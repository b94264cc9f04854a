use serde::{Deserialize, Serialize};

use crate::adapters::{
    normalize_cpcb_records, normalize_openweather_response, CpcbAdapter, CpcbQuery,
    OpenWeatherAqiAdapter,
};
use crate::validation::{validate_collection, AqiReadingSchema};
use crate::{AqiReading, Location, SourceError};

/// Provider that produced an [`AirQualityBatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AqiSource {
    Cpcb,
    OpenWeather,
}

impl AqiSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cpcb => "cpcb",
            Self::OpenWeather => "openweather",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AirQualityRequest {
    pub query: CpcbQuery,
    /// Coordinate for the OpenWeather fallback. Without it a CPCB failure is
    /// reported as a configuration error.
    pub fallback_location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualityBatch {
    pub source: AqiSource,
    pub readings: Vec<AqiReading>,
}

/// CPCB first, OpenWeather as an all-or-nothing fallback.
#[derive(Clone)]
pub struct AirQualityPipeline {
    cpcb: CpcbAdapter,
    openweather: OpenWeatherAqiAdapter,
}

impl AirQualityPipeline {
    pub fn new(cpcb: CpcbAdapter, openweather: OpenWeatherAqiAdapter) -> Self {
        Self { cpcb, openweather }
    }

    /// Returns validated CPCB readings, or validated OpenWeather readings
    /// when CPCB fails for any reason or yields nothing valid.
    ///
    /// Fails only when the fallback cannot run or itself fails.
    pub async fn fetch_air_quality(
        &self,
        request: &AirQualityRequest,
    ) -> Result<AirQualityBatch, SourceError> {
        match self.fetch_from_cpcb(&request.query).await {
            Ok(readings) if !readings.is_empty() => {
                tracing::info!(provider = "cpcb", readings = readings.len(), "air quality fetched");
                return Ok(AirQualityBatch {
                    source: AqiSource::Cpcb,
                    readings,
                });
            }
            Ok(_) => tracing::warn!(provider = "cpcb", "no valid CPCB readings, falling back"),
            Err(error) => {
                tracing::warn!(provider = "cpcb", error = %error, "CPCB fetch failed, falling back")
            }
        }

        let location = request.fallback_location.ok_or_else(|| {
            SourceError::configuration(
                "CPCB produced no data and no fallback location was supplied for OpenWeather",
            )
        })?;

        let data = self.openweather.fetch(location).await?;
        let readings = validate_collection(
            &AqiReadingSchema,
            normalize_openweather_response(&data, location),
            "openweather_aqi",
        );
        tracing::info!(
            provider = "openweather_aqi",
            readings = readings.len(),
            "air quality fetched from fallback"
        );

        Ok(AirQualityBatch {
            source: AqiSource::OpenWeather,
            readings,
        })
    }

    async fn fetch_from_cpcb(&self, query: &CpcbQuery) -> Result<Vec<AqiReading>, SourceError> {
        let rows = self.cpcb.fetch_records(query).await?;
        Ok(validate_collection(
            &AqiReadingSchema,
            normalize_cpcb_records(&rows),
            "cpcb",
        ))
    }
}
