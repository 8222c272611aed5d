//! Periodic retention sweep.
//!
//! Runs the normalizer's cleanup on a fixed timer, once per bucket
//! interval by default. Sweep failures are logged, never fatal.

use std::sync::Arc;
use std::sync::RwLock as StdRwLock;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::error::{Result, TelemetryError};
use crate::normalizer::TelemetryNormalizer;

/// Handle for the background sweep task.
type SweeperHandle = Arc<StdRwLock<Option<JoinHandle<()>>>>;

/// Scheduler that periodically deletes telemetry past the retention
/// horizon.
pub struct RetentionSweeper {
    normalizer: Arc<TelemetryNormalizer>,
    interval: Duration,
    handle: SweeperHandle,
    running: Arc<StdRwLock<bool>>,
}

impl RetentionSweeper {
    /// Create a sweeper ticking once per telemetry bucket interval.
    pub fn new(normalizer: Arc<TelemetryNormalizer>) -> Self {
        let minutes = normalizer.config().bucket_minutes.max(1) as u64;
        Self::with_interval(normalizer, Duration::from_secs(minutes * 60))
    }

    pub fn with_interval(normalizer: Arc<TelemetryNormalizer>, interval: Duration) -> Self {
        Self {
            normalizer,
            interval,
            handle: Arc::new(StdRwLock::new(None)),
            running: Arc::new(StdRwLock::new(false)),
        }
    }

    /// Start the background sweep loop. Errors if already running.
    pub fn start(&self) -> Result<()> {
        {
            let mut running = self.running.write().unwrap();
            if *running {
                return Err(TelemetryError::Scheduler(
                    "Retention sweeper is already running".to_string(),
                ));
            }
            *running = true;
        }

        let normalizer = self.normalizer.clone();
        let running = self.running.clone();
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it so a fresh start
            // does not sweep before any data exists.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                {
                    let running = running.read().unwrap();
                    if !*running {
                        break;
                    }
                }
                if let Err(e) = normalizer.run_retention_sweep().await {
                    tracing::warn!(error = %e, "Retention sweep failed");
                }
            }
        });

        let mut handle_guard = self.handle.write().unwrap();
        *handle_guard = Some(handle);

        tracing::info!(interval_sec = self.interval.as_secs(), "Retention sweeper started");
        Ok(())
    }

    /// Stop the background sweep loop. Errors if not running.
    pub fn stop(&self) -> Result<()> {
        {
            let mut running = self.running.write().unwrap();
            if !*running {
                return Err(TelemetryError::Scheduler(
                    "Retention sweeper is not running".to_string(),
                ));
            }
            *running = false;
        }

        let mut handle_guard = self.handle.write().unwrap();
        if let Some(handle) = handle_guard.take() {
            handle.abort();
        }

        tracing::info!("Retention sweeper stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        *self.running.read().unwrap()
    }
}

impl Drop for RetentionSweeper {
    fn drop(&mut self) {
        if let Ok(mut handle_guard) = self.handle.write() {
            if let Some(handle) = handle_guard.take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use verdant_core::config::EngineConfig;
    use verdant_core::storage::{MemoryStorage, Storage};
    use verdant_core::telemetry::{SampleId, SensorType, TelemetrySample};

    #[tokio::test]
    async fn test_start_stop() {
        let storage = Arc::new(MemoryStorage::new());
        let normalizer = Arc::new(TelemetryNormalizer::new(storage, EngineConfig::default()));
        let sweeper = RetentionSweeper::new(normalizer);

        assert!(!sweeper.is_running());
        sweeper.start().unwrap();
        assert!(sweeper.is_running());
        assert!(sweeper.start().is_err());

        sweeper.stop().unwrap();
        assert!(!sweeper.is_running());
        assert!(sweeper.stop().is_err());
    }

    #[tokio::test]
    async fn test_sweep_deletes_expired() {
        let storage = Arc::new(MemoryStorage::new());
        let old_ts = Utc::now() - chrono::Duration::hours(200);
        storage
            .upsert_sample(TelemetrySample {
                id: SampleId::new(),
                site_id: "z1".to_string(),
                device_id: None,
                sensor_key: None,
                sensor_type: SensorType::Temperature,
                value: 20.0,
                unit: None,
                topic: None,
                event_type: None,
                timestamp: old_ts,
                bucket_start: old_ts,
            })
            .await
            .unwrap();

        let normalizer = Arc::new(TelemetryNormalizer::new(
            storage.clone(),
            EngineConfig::default(),
        ));
        let sweeper =
            RetentionSweeper::with_interval(normalizer.clone(), Duration::from_millis(20));
        sweeper.start().unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        sweeper.stop().unwrap();

        assert_eq!(storage.sample_count().await, 0);
    }
}
