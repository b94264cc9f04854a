use crate::adapters::{GoogleRoutesAdapter, TomTomAdapter};
use crate::validation::{validate_collection, TrafficRecordSchema};
use crate::{SourceError, TrafficRecord, TrafficSegment, UtcDateTime};

pub const DEFAULT_HIGH_TRAFFIC_THRESHOLD: i64 = 70;

/// Google Routes first, TomTom per segment when Google fails.
#[derive(Clone)]
pub struct TrafficPipeline {
    google: GoogleRoutesAdapter,
    tomtom: TomTomAdapter,
}

impl TrafficPipeline {
    pub fn new(google: GoogleRoutesAdapter, tomtom: TomTomAdapter) -> Self {
        Self { google, tomtom }
    }

    /// Samples every segment and returns the validated records.
    ///
    /// Segments are processed in order. A segment that fails on both
    /// providers is left out; it never aborts the batch.
    pub async fn fetch_traffic_for_segments(&self, segments: &[TrafficSegment]) -> Vec<TrafficRecord> {
        let mut records = Vec::with_capacity(segments.len());
        for segment in segments {
            if let Some(record) = self.sample_segment(segment).await {
                records.push(record);
            }
        }

        let sampled = records.len();
        let records = validate_collection(&TrafficRecordSchema, records, "traffic");
        tracing::info!(
            segments = segments.len(),
            sampled,
            valid = records.len(),
            "traffic fetched"
        );
        records
    }

    async fn sample_segment(&self, segment: &TrafficSegment) -> Option<TrafficRecord> {
        let segment_id = segment.segment_id.as_str();

        match self.from_google_routes(segment).await {
            Ok(record) => return Some(record),
            Err(error) => tracing::warn!(
                segment_id,
                provider = "google_routes",
                error = %error,
                "route lookup failed, trying flow segment"
            ),
        }

        match self.from_tomtom(segment).await {
            Ok(record) => Some(record),
            Err(error) => {
                tracing::warn!(
                    segment_id,
                    provider = "tomtom",
                    error = %error,
                    "segment skipped, no traffic provider succeeded"
                );
                None
            }
        }
    }

    async fn from_google_routes(&self, segment: &TrafficSegment) -> Result<TrafficRecord, SourceError> {
        let route = self.google.fetch_route(segment).await?;
        let speed = calculate_speed_from_distance(route.distance_meters, route.duration_seconds)
            .ok_or_else(|| SourceError::no_data("route has no positive duration"))?;

        Ok(TrafficRecord {
            segment_id: segment.segment_id.clone(),
            congestion_level: calculate_congestion_from_durations(
                route.duration_seconds,
                route.static_duration_seconds,
            ),
            speed,
            timestamp: UtcDateTime::now(),
        })
    }

    async fn from_tomtom(&self, segment: &TrafficSegment) -> Result<TrafficRecord, SourceError> {
        let flow = self.tomtom.fetch_flow(segment.probe_point()).await?;

        Ok(TrafficRecord {
            segment_id: segment.segment_id.clone(),
            congestion_level: calculate_congestion_from_speeds(
                flow.current_speed,
                flow.free_flow_speed,
            ),
            speed: flow.current_speed,
            timestamp: UtcDateTime::now(),
        })
    }
}

/// Average speed in km/h rounded to one decimal; `None` for non-positive
/// durations.
pub fn calculate_speed_from_distance(distance_meters: f64, duration_seconds: f64) -> Option<f64> {
    if !distance_meters.is_finite() || !duration_seconds.is_finite() || duration_seconds <= 0.0 {
        return None;
    }
    let kmh = distance_meters / duration_seconds * 3.6;
    Some((kmh * 10.0).round() / 10.0)
}

/// Extra travel time over the no-traffic time, as a 0-100 percentage.
pub fn calculate_congestion_from_durations(duration_seconds: f64, static_duration_seconds: f64) -> i64 {
    if static_duration_seconds <= 0.0 || !static_duration_seconds.is_finite() {
        return 0;
    }
    clamp_percent((duration_seconds / static_duration_seconds - 1.0) * 100.0)
}

/// Speed deficit against free flow, as a 0-100 percentage.
pub fn calculate_congestion_from_speeds(current_speed: f64, free_flow_speed: f64) -> i64 {
    if free_flow_speed <= 0.0 || !free_flow_speed.is_finite() {
        return 0;
    }
    clamp_percent((1.0 - current_speed / free_flow_speed) * 100.0)
}

fn clamp_percent(raw: f64) -> i64 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as i64
}

/// Records whose congestion is at or above `threshold`.
pub fn identify_high_traffic_zones(records: &[TrafficRecord], threshold: i64) -> Vec<TrafficRecord> {
    records
        .iter()
        .filter(|record| record.congestion_level >= threshold)
        .cloned()
        .collect()
}
