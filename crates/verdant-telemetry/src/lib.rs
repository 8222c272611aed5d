//! Telemetry ingestion for the Verdant engine.
//!
//! - **Normalizer**: canonical identity + idempotent bucket upsert
//! - **Retention sweeper**: periodic deletion past the retention horizon

pub mod error;
pub mod normalizer;
pub mod retention;

pub use error::{Result, TelemetryError};
pub use normalizer::{TelemetryNormalizer, floor_to_bucket};
pub use retention::RetentionSweeper;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
