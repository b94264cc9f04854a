//! CLI argument definitions for UrbanPulse.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `air-quality` | Fetch validated AQI readings (CPCB, OpenWeather fallback) |
//! | `traffic` | Sample congestion for road segments listed in a JSON file |
//! | `weather` | Fetch current weather or the forecast for a coordinate |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--show-circuits` | `false` | Include circuit breaker snapshots in the output |
//!
//! # Examples
//!
//! ```bash
//! urbanpulse air-quality --city Delhi --lat 28.61 --lng 77.21 --pretty
//! urbanpulse traffic --segments segments.json --threshold 60
//! urbanpulse weather --lat 28.61 --lng 77.21 --forecast
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// UrbanPulse - resilient air-quality, traffic and weather ingestion
///
/// Credentials are read from the environment (`URBANPULSE_*_API_KEY`).
/// Logs go to stderr and honor `RUST_LOG`.
#[derive(Debug, Parser)]
#[command(
    name = "urbanpulse",
    author,
    version,
    about = "Resilient air-quality, traffic and weather ingestion"
)]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Append per-provider circuit breaker snapshots to the output.
    #[arg(long, global = true, default_value_t = false)]
    pub show_circuits: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch air-quality readings.
    AirQuality(AirQualityArgs),
    /// Sample traffic congestion for road segments.
    Traffic(TrafficArgs),
    /// Fetch weather for a coordinate.
    Weather(WeatherArgs),
}

#[derive(Debug, Args)]
pub struct AirQualityArgs {
    /// CPCB state filter.
    #[arg(long)]
    pub state: Option<String>,

    /// CPCB city filter.
    #[arg(long)]
    pub city: Option<String>,

    /// CPCB station filter.
    #[arg(long)]
    pub station: Option<String>,

    /// CPCB page size.
    #[arg(long)]
    pub limit: Option<u32>,

    /// Fallback latitude for OpenWeather.
    #[arg(long, requires = "lng", allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// Fallback longitude for OpenWeather.
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lng: Option<f64>,
}

#[derive(Debug, Args)]
pub struct TrafficArgs {
    /// JSON file holding an array of segments
    /// (`segment_id`, `origin`, `destination`, optional `point`).
    #[arg(long)]
    pub segments: PathBuf,

    /// Congestion level at or above which a segment is reported as a high
    /// traffic zone.
    #[arg(long, default_value_t = 70)]
    pub threshold: i64,
}

#[derive(Debug, Args)]
pub struct WeatherArgs {
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    #[arg(long, allow_hyphen_values = true)]
    pub lng: f64,

    /// Fetch the forecast instead of current conditions.
    #[arg(long, default_value_t = false)]
    pub forecast: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_air_quality_with_fallback() {
        let cli = Cli::parse_from([
            "urbanpulse",
            "air-quality",
            "--city",
            "Delhi",
            "--lat",
            "28.61",
            "--lng",
            "77.21",
            "--pretty",
        ]);

        assert!(cli.pretty);
        let Command::AirQuality(args) = cli.command else {
            panic!("expected air-quality");
        };
        assert_eq!(args.city.as_deref(), Some("Delhi"));
        assert_eq!(args.lat, Some(28.61));
    }

    #[test]
    fn latitude_requires_longitude() {
        let result = Cli::try_parse_from(["urbanpulse", "air-quality", "--lat", "28.61"]);
        assert!(result.is_err());
    }

    #[test]
    fn accepts_negative_coordinates() {
        let cli = Cli::parse_from(["urbanpulse", "weather", "--lat", "-33.9", "--lng", "-70.6"]);
        let Command::Weather(args) = cli.command else {
            panic!("expected weather");
        };
        assert_eq!(args.lat, -33.9);
        assert!(!args.forecast);
    }
}
