//! Engine configuration.
//!
//! Defaults can be overridden through `VERDANT_*` environment variables.

/// Environment variable names recognized by [`EngineConfig::from_env`].
pub mod env_vars {
    pub const NAMESPACE: &str = "VERDANT_NAMESPACE";
    pub const BUCKET_MINUTES: &str = "VERDANT_BUCKET_MINUTES";
    pub const RETENTION_HOURS: &str = "VERDANT_RETENTION_HOURS";
    pub const DEFAULT_SITE: &str = "VERDANT_DEFAULT_SITE";
}

/// Configuration for the automation & telemetry engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Topic namespace prefix for all outbound publishes.
    pub namespace: String,
    /// Site id assumed when a raw reading carries none.
    pub default_site: String,
    /// Width of the telemetry deduplication bucket, in minutes.
    pub bucket_minutes: u32,
    /// How long telemetry samples are kept before the retention sweep
    /// deletes them, in hours.
    pub retention_hours: i64,
    /// How long dispatch-tracking entries are kept in memory, in hours.
    pub dispatch_tracking_hours: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            namespace: "greenhouse".to_string(),
            default_site: "default".to_string(),
            bucket_minutes: 10,
            retention_hours: 72,
            dispatch_tracking_hours: 24,
        }
    }
}

impl EngineConfig {
    /// Build a configuration from defaults plus environment overrides.
    ///
    /// Unparseable numeric overrides are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(ns) = std::env::var(env_vars::NAMESPACE) {
            if !ns.trim().is_empty() {
                config.namespace = ns;
            }
        }
        if let Ok(site) = std::env::var(env_vars::DEFAULT_SITE) {
            if !site.trim().is_empty() {
                config.default_site = site;
            }
        }
        if let Ok(raw) = std::env::var(env_vars::BUCKET_MINUTES) {
            match raw.parse::<u32>() {
                Ok(minutes) if minutes > 0 && minutes <= 60 => {
                    config.bucket_minutes = minutes;
                }
                _ => tracing::warn!(value = %raw, "Ignoring invalid bucket interval override"),
            }
        }
        if let Ok(raw) = std::env::var(env_vars::RETENTION_HOURS) {
            match raw.parse::<i64>() {
                Ok(hours) if hours > 0 => config.retention_hours = hours,
                _ => tracing::warn!(value = %raw, "Ignoring invalid retention override"),
            }
        }

        config
    }
}
