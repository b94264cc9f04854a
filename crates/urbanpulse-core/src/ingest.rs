use std::collections::BTreeMap;
use std::sync::Arc;

use crate::adapters::{
    CpcbAdapter, GoogleRoutesAdapter, OpenWeatherAqiAdapter, OpenWeatherWeatherAdapter,
    TomTomAdapter,
};
use crate::circuit_breaker::{CircuitBreakerRegistry, CircuitSnapshot};
use crate::config::IngestConfig;
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::pipeline::{
    AirQualityBatch, AirQualityPipeline, AirQualityRequest, TrafficPipeline, WeatherPipeline,
};
use crate::provider_policy::ProviderPolicy;
use crate::transport::ProviderTransport;
use crate::{
    ConfigError, Location, SourceError, TrafficRecord, TrafficSegment, WeatherObservation,
};

/// Composition root wiring one breaker and one rate limiter per provider into
/// the three pipelines.
///
/// # Example
///
/// ```rust,ignore
/// use urbanpulse_core::{IngestionServiceBuilder, IngestConfig, AirQualityRequest, CpcbQuery};
///
/// let service = IngestionServiceBuilder::new()
///     .with_config(IngestConfig::from_env()?)
///     .build();
///
/// let batch = service
///     .fetch_air_quality(&AirQualityRequest {
///         query: CpcbQuery::for_city("Delhi"),
///         fallback_location: None,
///     })
///     .await?;
/// println!("{} readings from {:?}", batch.readings.len(), batch.source);
/// ```
#[derive(Clone)]
pub struct IngestionService {
    circuits: Arc<CircuitBreakerRegistry>,
    air_quality: AirQualityPipeline,
    traffic: TrafficPipeline,
    weather: WeatherPipeline,
}

impl IngestionService {
    /// Builds a service from environment configuration with the reqwest
    /// transport. Must be called inside a Tokio runtime.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(IngestionServiceBuilder::new()
            .with_config(IngestConfig::from_env()?)
            .build())
    }

    pub async fn fetch_air_quality(
        &self,
        request: &AirQualityRequest,
    ) -> Result<AirQualityBatch, SourceError> {
        self.air_quality.fetch_air_quality(request).await
    }

    pub async fn fetch_traffic_for_segments(&self, segments: &[TrafficSegment]) -> Vec<TrafficRecord> {
        self.traffic.fetch_traffic_for_segments(segments).await
    }

    pub async fn fetch_current_weather(
        &self,
        location: Location,
    ) -> Result<WeatherObservation, SourceError> {
        self.weather.fetch_current_weather(location).await
    }

    pub async fn fetch_forecast(
        &self,
        location: Location,
    ) -> Result<Vec<WeatherObservation>, SourceError> {
        self.weather.fetch_forecast(location).await
    }

    pub async fn get_validated_current_weather(&self, location: Location) -> Vec<WeatherObservation> {
        self.weather.get_validated_current_weather(location).await
    }

    /// Snapshot of every provider breaker, keyed by provider name.
    pub fn circuit_states(&self) -> BTreeMap<String, CircuitSnapshot> {
        self.circuits.snapshots()
    }

    pub fn circuits(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.circuits
    }
}

/// Builder for [`IngestionService`].
///
/// Defaults to [`IngestConfig::default`], a fresh breaker registry and
/// [`ReqwestHttpClient`].
#[derive(Default)]
pub struct IngestionServiceBuilder {
    config: IngestConfig,
    http_client: Option<Arc<dyn HttpClient>>,
    circuits: Option<Arc<CircuitBreakerRegistry>>,
}

impl IngestionServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: IngestConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// Shares breakers with another service instance.
    pub fn with_circuit_registry(mut self, circuits: Arc<CircuitBreakerRegistry>) -> Self {
        self.circuits = Some(circuits);
        self
    }

    /// Wires the pipelines. Spawns one rate-limiter dispatcher per provider,
    /// so it must run inside a Tokio runtime.
    pub fn build(self) -> IngestionService {
        let config = self.config;
        let http_client: Arc<dyn HttpClient> = match self.http_client {
            Some(http_client) => http_client,
            None => Arc::new(ReqwestHttpClient::new()),
        };
        let circuits = self.circuits.unwrap_or_default();

        let transport = |policy: &ProviderPolicy| {
            let breaker =
                circuits.get_or_create(policy.provider_id.as_str(), config.circuit_breaker);
            ProviderTransport::new(
                policy.clone(),
                Arc::clone(&http_client),
                breaker,
                config.retry.clone(),
            )
        };

        let cpcb = CpcbAdapter::new(config.cpcb.clone(), transport(&config.cpcb.policy));
        let openweather_aqi = OpenWeatherAqiAdapter::new(
            config.openweather.clone(),
            transport(&config.openweather.aqi_policy),
        );
        let openweather_weather = OpenWeatherWeatherAdapter::new(
            config.openweather.clone(),
            transport(&config.openweather.weather_policy),
        );
        let google = GoogleRoutesAdapter::new(
            config.google_routes.clone(),
            transport(&config.google_routes.policy),
        );
        let tomtom = TomTomAdapter::new(config.tomtom.clone(), transport(&config.tomtom.policy));

        tracing::debug!(providers = circuits.snapshots().len(), "ingestion service built");

        IngestionService {
            circuits,
            air_quality: AirQualityPipeline::new(cpcb, openweather_aqi),
            traffic: TrafficPipeline::new(google, tomtom),
            weather: WeatherPipeline::new(openweather_weather),
        }
    }
}
