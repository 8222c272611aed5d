//! Outbound command channel seam and topic conventions.
//!
//! The wire transport to field devices is external; the engine treats it
//! as a generic publish/subscribe channel: topic strings in,
//! fire-and-forget delivery out.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;

/// Best-effort publish channel. No delivery confirmation.
#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Channel name for identification.
    fn name(&self) -> &str;

    /// Publish a UTF-8 JSON payload on a topic.
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<()>;
}

/// Shared handle to a command channel.
pub type SharedChannel = Arc<dyn CommandChannel>;

/// Topic naming conventions for outbound publishes.
pub mod topics {
    /// Command topic: `<namespace>/actions/<site>/<type>`.
    pub fn actions(namespace: &str, site_id: &str, action_type: &str) -> String {
        format!("{}/actions/{}/{}", namespace, site_id, action_type)
    }

    /// Telemetry topic: `<namespace>/telemetry/<site>`.
    pub fn telemetry(namespace: &str, site_id: &str) -> String {
        format!("{}/telemetry/{}", namespace, site_id)
    }

    /// Issue notification topic, used for suspected problems and
    /// advisory texts: `<namespace>/issues/<site>`.
    pub fn issues(namespace: &str, site_id: &str) -> String {
        format!("{}/issues/{}", namespace, site_id)
    }

    /// Mobile notification topic: `<namespace>/notifications/<site>`.
    pub fn notifications(namespace: &str, site_id: &str) -> String {
        format!("{}/notifications/{}", namespace, site_id)
    }
}

/// In-memory channel that records every publish. Used by tests and as a
/// sink when no transport is wired up.
#[derive(Default)]
pub struct MemoryChannel {
    published: RwLock<Vec<(String, Vec<u8>)>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, in order.
    pub async fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.read().await.clone()
    }

    /// Published payloads on one topic, parsed as JSON.
    pub async fn published_json(&self, topic: &str) -> Vec<serde_json::Value> {
        self.published
            .read()
            .await
            .iter()
            .filter(|(t, _)| t == topic)
            .filter_map(|(_, p)| serde_json::from_slice(p).ok())
            .collect()
    }
}

#[async_trait]
impl CommandChannel for MemoryChannel {
    fn name(&self) -> &str {
        "memory"
    }

    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
        self.published
            .write()
            .await
            .push((topic.to_string(), payload.to_vec()));
        Ok(())
    }
}
