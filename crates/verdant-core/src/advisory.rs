//! Advisory text generator seam.
//!
//! An optional natural-language service used only to enrich notifications
//! for matched rules. It is opaque to the engine and may fail; callers
//! log and swallow errors.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::rule::{Decision, RuleId};
use crate::telemetry::TelemetrySample;

/// Context handed to the generator for one rule evaluation.
#[derive(Debug, Clone)]
pub struct AdvisoryRequest {
    pub prompt: String,
    pub rule_id: RuleId,
    pub rule_name: String,
    pub sample: TelemetrySample,
    pub decision: Decision,
}

/// Black-box text generator.
#[async_trait]
pub trait AdvisoryGenerator: Send + Sync {
    async fn generate(&self, request: &AdvisoryRequest) -> Result<String>;
}

/// Shared handle to an advisory generator.
pub type SharedAdvisory = Arc<dyn AdvisoryGenerator>;

/// Generator returning a fixed text. Useful in tests and demos.
pub struct StaticAdvisory {
    text: String,
}

impl StaticAdvisory {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl AdvisoryGenerator for StaticAdvisory {
    async fn generate(&self, _request: &AdvisoryRequest) -> Result<String> {
        Ok(self.text.clone())
    }
}

/// Generator that always fails. Used to test the swallow-on-error path.
pub struct FailingAdvisory;

#[async_trait]
impl AdvisoryGenerator for FailingAdvisory {
    async fn generate(&self, _request: &AdvisoryRequest) -> Result<String> {
        Err(Error::Advisory("generator unavailable".to_string()))
    }
}
