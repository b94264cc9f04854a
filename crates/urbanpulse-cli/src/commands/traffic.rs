use serde::Serialize;
use urbanpulse_core::{identify_high_traffic_zones, IngestionService, TrafficRecord, TrafficSegment};

use crate::cli::TrafficArgs;
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct TrafficResponseData {
    records: Vec<TrafficRecord>,
    high_traffic_zones: Vec<TrafficRecord>,
}

pub async fn run(args: &TrafficArgs, service: &IngestionService) -> Result<CommandResult, CliError> {
    let raw = std::fs::read_to_string(&args.segments)?;
    let segments: Vec<TrafficSegment> = serde_json::from_str(&raw).map_err(|error| {
        CliError::Command(format!(
            "{} is not a JSON array of segments: {error}",
            args.segments.display()
        ))
    })?;
    for segment in &segments {
        segment.origin.check()?;
        segment.destination.check()?;
    }

    let records = service.fetch_traffic_for_segments(&segments).await;
    let high_traffic_zones = identify_high_traffic_zones(&records, args.threshold);
    let missing = segments.len() - records.len().min(segments.len());

    let result = CommandResult::ok(serde_json::to_value(TrafficResponseData {
        records,
        high_traffic_zones,
    })?);
    Ok(if missing > 0 {
        result.with_warning(format!("{missing} segment(s) produced no traffic record"))
    } else {
        result
    })
}
