use serde::Serialize;
use urbanpulse_core::{
    estimate_pollution_risk, IngestionService, Location, PollutionRisk, WeatherObservation,
};

use crate::cli::WeatherArgs;
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct CurrentWeatherData {
    observations: Vec<WeatherObservation>,
    pollution_risk: Option<PollutionRisk>,
}

#[derive(Debug, Serialize)]
struct ForecastData {
    forecast: Vec<WeatherObservation>,
}

pub async fn run(args: &WeatherArgs, service: &IngestionService) -> Result<CommandResult, CliError> {
    let location = Location::new(args.lat, args.lng)?;

    if args.forecast {
        let forecast = service.fetch_forecast(location).await?;
        return Ok(CommandResult::ok(serde_json::to_value(ForecastData {
            forecast,
        })?));
    }

    let observations = service.get_validated_current_weather(location).await;
    let pollution_risk = observations.first().map(estimate_pollution_risk);
    let result = CommandResult::ok(serde_json::to_value(CurrentWeatherData {
        observations,
        pollution_risk,
    })?);

    Ok(if pollution_risk.is_none() {
        result.with_warning("current weather unavailable")
    } else {
        result
    })
}
