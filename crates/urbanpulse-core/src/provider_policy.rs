use std::time::Duration;

use crate::ProviderId;

/// Pacing, concurrency and timeout limits applied to one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderPolicy {
    pub provider_id: ProviderId,
    /// Minimum spacing between two consecutive dispatch starts.
    pub min_interval: Duration,
    pub max_concurrent: usize,
    /// Per-attempt request timeout.
    pub timeout: Duration,
}

impl ProviderPolicy {
    pub fn cpcb_default() -> Self {
        Self {
            provider_id: ProviderId::Cpcb,
            min_interval: Duration::from_millis(1_000),
            max_concurrent: 1,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn openweather_aqi_default() -> Self {
        Self {
            provider_id: ProviderId::OpenweatherAqi,
            min_interval: Duration::from_millis(1_000),
            max_concurrent: 2,
            timeout: Duration::from_secs(8),
        }
    }

    pub fn openweather_weather_default() -> Self {
        Self {
            provider_id: ProviderId::OpenweatherWeather,
            ..Self::openweather_aqi_default()
        }
    }

    pub fn google_routes_default() -> Self {
        Self {
            provider_id: ProviderId::GoogleRoutes,
            min_interval: Duration::from_millis(200),
            max_concurrent: 4,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn tomtom_default() -> Self {
        Self {
            provider_id: ProviderId::Tomtom,
            min_interval: Duration::from_millis(250),
            max_concurrent: 4,
            timeout: Duration::from_secs(8),
        }
    }

    pub fn default_for(provider_id: ProviderId) -> Self {
        match provider_id {
            ProviderId::Cpcb => Self::cpcb_default(),
            ProviderId::OpenweatherAqi => Self::openweather_aqi_default(),
            ProviderId::OpenweatherWeather => Self::openweather_weather_default(),
            ProviderId::GoogleRoutes => Self::google_routes_default(),
            ProviderId::Tomtom => Self::tomtom_default(),
        }
    }

    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpcb_policy_is_serialized() {
        let policy = ProviderPolicy::cpcb_default();

        assert_eq!(policy.provider_id, ProviderId::Cpcb);
        assert_eq!(policy.max_concurrent, 1);
        assert_eq!(policy.min_interval, Duration::from_secs(1));
    }

    #[test]
    fn every_provider_has_a_policy_for_itself() {
        for provider in ProviderId::ALL {
            let policy = ProviderPolicy::default_for(provider);
            assert_eq!(policy.provider_id, provider);
            assert!(policy.max_concurrent >= 1);
            assert!(policy.timeout > Duration::ZERO);
        }
    }
}
