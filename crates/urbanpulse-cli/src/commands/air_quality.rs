use urbanpulse_core::{AirQualityRequest, CpcbQuery, IngestionService, Location};

use crate::cli::AirQualityArgs;
use crate::error::CliError;

use super::CommandResult;

pub async fn run(args: &AirQualityArgs, service: &IngestionService) -> Result<CommandResult, CliError> {
    let fallback_location = match (args.lat, args.lng) {
        (Some(lat), Some(lng)) => Some(Location::new(lat, lng)?),
        _ => None,
    };

    let request = AirQualityRequest {
        query: CpcbQuery {
            state: args.state.clone(),
            city: args.city.clone(),
            station: args.station.clone(),
            limit: args.limit,
        },
        fallback_location,
    };

    let batch = service.fetch_air_quality(&request).await?;
    let empty = batch.readings.is_empty();
    let source = batch.source;
    let result = CommandResult::ok(serde_json::to_value(batch)?);

    Ok(if empty {
        result.with_warning(format!("{} returned no valid readings", source.as_str()))
    } else {
        result
    })
}
