//! # UrbanPulse Core
//!
//! Resilient ingestion of environmental and traffic telemetry from unreliable
//! third-party providers.
//!
//! ## Overview
//!
//! This crate turns heterogeneous provider payloads into a small set of
//! canonical, validated records:
//!
//! - **Canonical domain models** for air-quality readings, traffic records and
//!   weather observations
//! - **Per-provider resilience**: circuit breaker, rate limiter and retrying
//!   fetcher composed into one transport per provider
//! - **Provider adapters** for CPCB, OpenWeather (air pollution and weather),
//!   Google Routes and TomTom, with payload normalizers
//! - **Pipelines** applying provider fallback ordering and collection validation
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Provider adapters and normalizers |
//! | [`circuit_breaker`] | Circuit breaker and breaker registry |
//! | [`config`] | Endpoints, credentials and resilience settings |
//! | [`domain`] | Domain models (AqiReading, TrafficRecord, WeatherObservation) |
//! | [`error`] | Validation, configuration and core errors |
//! | [`http_client`] | HTTP client abstraction |
//! | [`ingest`] | Composition root |
//! | [`pipeline`] | Air-quality, traffic and weather pipelines |
//! | [`provider_policy`] | Per-provider pacing and timeout limits |
//! | [`retry`] | Timeout and retry with backoff |
//! | [`source`] | Provider identifiers and adapter errors |
//! | [`storage`] | Persistence hand-off contract |
//! | [`throttling`] | Rate limiting |
//! | [`transport`] | Rate limiter, breaker and retry composition |
//! | [`validation`] | Record schemas |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ Pipeline        │  fallback ordering, normalize, validate
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Adapter         │────▶│ Rate Limiter     │
//! └─────────────────┘     └────────┬─────────┘
//!                                  ▼
//!                         ┌──────────────────┐
//!                         │ Circuit Breaker  │
//!                         └────────┬─────────┘
//!                                  ▼
//!                         ┌──────────────────┐
//!                         │ Retrying Fetcher │──▶ HTTP Client
//!                         └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use urbanpulse_core::{SourceError, SourceErrorKind};
//!
//! fn describe(error: &SourceError) -> &'static str {
//!     match error.kind() {
//!         SourceErrorKind::CircuitOpen => "provider is cooling down",
//!         SourceErrorKind::Configuration => "credentials missing",
//!         _ => "upstream problem",
//!     }
//! }
//!
//! assert_eq!(describe(&SourceError::circuit_open("cpcb")), "provider is cooling down");
//! ```
//!
//! ## Security
//!
//! - API keys are read from the environment and never logged
//! - Logged URLs have their query strings removed

pub mod adapters;
pub mod circuit_breaker;
pub mod config;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod ingest;
pub mod pipeline;
pub mod provider_policy;
pub mod retry;
pub mod source;
pub mod storage;
pub mod throttling;
pub mod transport;
pub mod validation;

// Adapter implementations
pub use adapters::{
    normalize_cpcb_records, normalize_openweather_response, parse_number, CpcbAdapter, CpcbQuery,
    GoogleRoutesAdapter, OpenWeatherAqiAdapter, OpenWeatherWeatherAdapter, TomTomAdapter,
};

// Circuit breaker
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitSnapshot, CircuitState,
};

// Configuration
pub use config::IngestConfig;

// Domain models
pub use domain::{
    AqiReading, Location, Pollutant, PollutionRisk, TrafficRecord, TrafficSegment, UtcDateTime,
    WeatherObservation,
};

// Error types
pub use error::{ConfigError, ValidationError};

// HTTP client types
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient,
    ScriptedHttpClient, ScriptedReply,
};

// Composition root
pub use ingest::{IngestionService, IngestionServiceBuilder};

// Pipelines
pub use pipeline::{
    calculate_congestion_from_durations, calculate_congestion_from_speeds,
    calculate_speed_from_distance, estimate_pollution_risk, identify_high_traffic_zones,
    AirQualityBatch, AirQualityPipeline, AirQualityRequest, AqiSource, TrafficPipeline,
    WeatherPipeline, DEFAULT_HIGH_TRAFFIC_THRESHOLD,
};

// Provider policies
pub use provider_policy::ProviderPolicy;

// Retry logic
pub use retry::{fetch_json_with_retry, redact_url, Backoff, RetryConfig};

// Source identifiers and errors
pub use source::{ProviderId, SourceError, SourceErrorKind};

// Storage
pub use storage::{store_aqi_readings, store_traffic_records, ReadingStore, StoreError, StoreReport};

// Throttling
pub use throttling::{RateLimiter, RateLimiterConfig};

// Transport
pub use transport::ProviderTransport;

// Validation
pub use validation::{
    validate_collection, AqiReadingSchema, Schema, TrafficRecordSchema, WeatherObservationSchema,
};
