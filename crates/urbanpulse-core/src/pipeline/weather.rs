use crate::adapters::{normalize_current_weather, normalize_forecast, OpenWeatherWeatherAdapter};
use crate::validation::{validate_collection, Schema, WeatherObservationSchema};
use crate::{Location, PollutionRisk, SourceError, WeatherObservation};

#[derive(Clone)]
pub struct WeatherPipeline {
    adapter: OpenWeatherWeatherAdapter,
}

impl WeatherPipeline {
    pub fn new(adapter: OpenWeatherWeatherAdapter) -> Self {
        Self { adapter }
    }

    pub async fn fetch_current_weather(
        &self,
        location: Location,
    ) -> Result<WeatherObservation, SourceError> {
        let data = self.adapter.fetch_current(location).await?;
        let observation = normalize_current_weather(&data, location)?;

        let errors = WeatherObservationSchema.check(&observation);
        if errors.is_empty() {
            return Ok(observation);
        }
        let details = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Err(SourceError::invalid_response(format!(
            "current weather failed validation: {details}"
        )))
    }

    pub async fn fetch_forecast(
        &self,
        location: Location,
    ) -> Result<Vec<WeatherObservation>, SourceError> {
        let data = self.adapter.fetch_forecast(location).await?;
        Ok(validate_collection(
            &WeatherObservationSchema,
            normalize_forecast(&data, location),
            "weather_forecast",
        ))
    }

    /// Current weather as a collection of at most one item.
    ///
    /// Fetch and validation errors are logged and turned into an empty result.
    pub async fn get_validated_current_weather(&self, location: Location) -> Vec<WeatherObservation> {
        match self.fetch_current_weather(location).await {
            Ok(observation) => vec![observation],
            Err(error) => {
                tracing::warn!(
                    provider = "openweather_weather",
                    %location,
                    error = %error,
                    "current weather unavailable"
                );
                Vec::new()
            }
        }
    }
}

/// Stagnant, humid air traps pollutants near the ground.
pub fn estimate_pollution_risk(observation: &WeatherObservation) -> PollutionRisk {
    if observation.wind_speed < 1.5 && observation.humidity > 70.0 {
        PollutionRisk::High
    } else if observation.wind_speed < 3.0 && observation.humidity > 50.0 {
        PollutionRisk::Moderate
    } else {
        PollutionRisk::Low
    }
}
