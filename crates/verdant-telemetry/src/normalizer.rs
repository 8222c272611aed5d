//! Telemetry normalization.
//!
//! Converts a raw reading into a canonical identity (site, device,
//! sensor, type, topic, time bucket) and performs an idempotent upsert
//! keyed on that identity. Replaying the same message within one bucket
//! never creates duplicates; a later corrected reading supersedes an
//! earlier one.

use chrono::{DateTime, Timelike, Utc};
use serde_json::Value;

use verdant_core::config::EngineConfig;
use verdant_core::event::EngineEvent;
use verdant_core::eventbus::SharedEventBus;
use verdant_core::storage::SharedStorage;
use verdant_core::telemetry::{RawReading, SampleId, SensorType, TelemetrySample};

use crate::error::{Result, TelemetryError};

/// Floor a timestamp to its bucket: seconds and nanoseconds zeroed,
/// minute floored to the nearest multiple of the interval.
pub fn floor_to_bucket(ts: DateTime<Utc>, bucket_minutes: u32) -> DateTime<Utc> {
    let interval = bucket_minutes.max(1);
    let floored_minute = ts.minute() - ts.minute() % interval;
    ts.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .and_then(|t| t.with_minute(floored_minute))
        .unwrap_or(ts)
}

/// Parse a raw JSON value into a finite f64. Numeric strings are
/// accepted; anything else is rejected.
fn parse_finite(value: &Value) -> Result<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(TelemetryError::InvalidValue(value.to_string())),
    }
}

/// Normalizes raw readings into canonical interval samples.
pub struct TelemetryNormalizer {
    storage: SharedStorage,
    config: EngineConfig,
    event_bus: Option<SharedEventBus>,
}

impl TelemetryNormalizer {
    pub fn new(storage: SharedStorage, config: EngineConfig) -> Self {
        Self {
            storage,
            config,
            event_bus: None,
        }
    }

    /// Attach an event bus; recorded samples are announced on it.
    pub fn with_event_bus(mut self, event_bus: SharedEventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Record one raw reading received at `received_at`.
    ///
    /// Fails with `InvalidValue` (and writes nothing) when the raw value
    /// does not parse to a finite number. Otherwise performs the
    /// identity-keyed upsert and returns the stored sample; its
    /// `bucket_start` is the computed interval start.
    pub async fn record(
        &self,
        raw: RawReading,
        received_at: DateTime<Utc>,
    ) -> Result<TelemetrySample> {
        let value = parse_finite(&raw.value)?;
        let bucket_start = floor_to_bucket(received_at, self.config.bucket_minutes);

        let sample = TelemetrySample {
            id: SampleId::new(),
            site_id: raw
                .site_id
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| self.config.default_site.clone()),
            device_id: raw.device_id,
            sensor_key: raw.sensor_key,
            sensor_type: raw
                .sensor_type
                .as_deref()
                .map(SensorType::from_string)
                .unwrap_or_default(),
            value,
            unit: raw.unit,
            topic: raw.topic,
            event_type: raw.event_type,
            timestamp: received_at,
            bucket_start,
        };

        let stored = self.storage.upsert_sample(sample).await?;
        tracing::debug!(
            site = %stored.site_id,
            sensor = %stored.sensor_type,
            value = stored.value,
            bucket = %stored.bucket_start,
            "Telemetry sample recorded"
        );

        if let Some(bus) = &self.event_bus {
            bus.publish(EngineEvent::TelemetryRecorded {
                site_id: stored.site_id.clone(),
                sensor_type: stored.sensor_type.as_str().to_string(),
                value: stored.value,
                bucket_start: stored.bucket_start.timestamp(),
                timestamp: stored.timestamp.timestamp(),
            });
        }

        Ok(stored)
    }

    /// Delete every sample older than `retention_hours`. Idempotent:
    /// a second back-to-back run deletes nothing.
    pub async fn cleanup(&self, retention_hours: i64) -> Result<usize> {
        let cutoff = Utc::now() - chrono::Duration::hours(retention_hours);
        let deleted = self.storage.delete_samples_before(cutoff).await?;
        if deleted > 0 {
            tracing::info!(deleted, retention_hours, "Retention sweep removed samples");
        }
        if let Some(bus) = &self.event_bus {
            bus.publish(EngineEvent::RetentionSwept {
                deleted,
                timestamp: Utc::now().timestamp(),
            });
        }
        Ok(deleted)
    }

    /// Sweep using the configured retention horizon.
    pub async fn run_retention_sweep(&self) -> Result<usize> {
        self.cleanup(self.config.retention_hours).await
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
