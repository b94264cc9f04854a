mod air_quality;
mod traffic;
mod weather;

use std::time::Instant;

use serde_json::Value;
use urbanpulse_core::{IngestConfig, IngestionService, IngestionServiceBuilder};

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::output::{Report, ReportMeta};

pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

pub async fn run(cli: &Cli) -> Result<Report, CliError> {
    let service = IngestionServiceBuilder::new()
        .with_config(IngestConfig::from_env()?)
        .build();

    let started = Instant::now();
    let outcome = dispatch(cli, &service).await;
    let latency_ms = started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64;
    let circuits = cli.show_circuits.then(|| service.circuit_states());

    let CommandResult { data, warnings } = outcome?;
    Ok(Report {
        data,
        meta: ReportMeta::new(latency_ms, warnings, circuits),
    })
}

async fn dispatch(cli: &Cli, service: &IngestionService) -> Result<CommandResult, CliError> {
    match &cli.command {
        Command::AirQuality(args) => air_quality::run(args, service).await,
        Command::Traffic(args) => traffic::run(args, service).await,
        Command::Weather(args) => weather::run(args, service).await,
    }
}
