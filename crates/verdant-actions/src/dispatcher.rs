//! Action dispatch.
//!
//! Turns an action record into an outbound command message, tracks
//! in-flight dispatches in memory, and exposes dispatch-status lookup.
//! Delivery is best effort: with no channel configured the dispatch is
//! a no-op and the action stays pending.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use verdant_core::action::{Action, ActionId, ActionStatus};
use verdant_core::channel::{SharedChannel, topics};
use verdant_core::config::EngineConfig;
use verdant_core::event::EngineEvent;
use verdant_core::eventbus::SharedEventBus;
use verdant_core::storage::SharedStorage;

use crate::error::{DispatchError, Result};

/// Outcome of one dispatch attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResult {
    pub dispatched: bool,
    pub topic: String,
}

/// In-memory tracking entry for one dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRecord {
    pub action_id: ActionId,
    pub topic: String,
    pub dispatched_at: DateTime<Utc>,
}

/// Dispatch-status lookup result: the persisted action joined with the
/// in-memory tracking entry, when one still exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchStatus {
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking: Option<DispatchRecord>,
}

/// Outbound command payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CommandPayload<'a> {
    action_id: String,
    #[serde(rename = "type")]
    action_type: &'a str,
    parameters: &'a serde_json::Map<String, serde_json::Value>,
    timestamp: i64,
}

/// Dispatches actions on the command channel and tracks them.
pub struct ActionDispatcher {
    storage: SharedStorage,
    channel: Option<SharedChannel>,
    event_bus: Option<SharedEventBus>,
    /// The only mutable shared structure local to this core; safe for
    /// concurrent readers/writers.
    tracking: Arc<RwLock<HashMap<ActionId, DispatchRecord>>>,
    namespace: String,
    tracking_hours: i64,
}

impl ActionDispatcher {
    pub fn new(storage: SharedStorage, config: &EngineConfig) -> Self {
        Self {
            storage,
            channel: None,
            event_bus: None,
            tracking: Arc::new(RwLock::new(HashMap::new())),
            namespace: config.namespace.clone(),
            tracking_hours: config.dispatch_tracking_hours,
        }
    }

    /// Attach the outbound command channel.
    pub fn with_channel(mut self, channel: SharedChannel) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Attach an event bus; successful publishes are announced on it.
    pub fn with_event_bus(mut self, event_bus: SharedEventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Dispatch one action.
    ///
    /// The action moves `pending → executing` before the publish and to
    /// `completed`/`failed` after it. With no channel configured nothing
    /// is published and the action stays `pending`
    /// (`dispatched: false`). Every attempt records a tracking entry.
    pub async fn dispatch(&self, action: &Action) -> Result<DispatchResult> {
        let topic = topics::actions(&self.namespace, &action.site_id, action.action_type.as_str());

        let record = DispatchRecord {
            action_id: action.id.clone(),
            topic: topic.clone(),
            dispatched_at: Utc::now(),
        };
        self.tracking
            .write()
            .await
            .insert(action.id.clone(), record);

        let Some(channel) = &self.channel else {
            tracing::warn!(
                action = %action.id,
                topic = %topic,
                "Command channel unavailable, dispatch skipped"
            );
            return Ok(DispatchResult {
                dispatched: false,
                topic,
            });
        };

        let payload = CommandPayload {
            action_id: action.id.to_string(),
            action_type: action.action_type.as_str(),
            parameters: &action.parameters,
            timestamp: Utc::now().timestamp(),
        };
        let bytes = serde_json::to_vec(&payload)
            .map_err(|e| DispatchError::Serialization(e.to_string()))?;

        self.storage
            .update_action_status(&action.id, ActionStatus::Executing, None)
            .await?;

        match channel.publish(&topic, &bytes).await {
            Ok(()) => {
                self.storage
                    .update_action_status(
                        &action.id,
                        ActionStatus::Completed,
                        Some(serde_json::json!({ "published": true, "topic": topic })),
                    )
                    .await?;
                tracing::info!(action = %action.id, topic = %topic, "Action dispatched");
                if let Some(bus) = &self.event_bus {
                    bus.publish(EngineEvent::ActionDispatched {
                        action_id: action.id.to_string(),
                        topic: topic.clone(),
                        timestamp: Utc::now().timestamp(),
                    });
                }
                Ok(DispatchResult {
                    dispatched: true,
                    topic,
                })
            }
            Err(e) => {
                tracing::warn!(action = %action.id, topic = %topic, error = %e, "Publish failed");
                self.storage
                    .update_action_status(
                        &action.id,
                        ActionStatus::Failed,
                        Some(serde_json::json!({ "error": e.to_string() })),
                    )
                    .await?;
                Ok(DispatchResult {
                    dispatched: false,
                    topic,
                })
            }
        }
    }

    /// Join the persisted action with its tracking entry.
    pub async fn dispatch_status(&self, action_id: &ActionId) -> Result<DispatchStatus> {
        let action = self
            .storage
            .action(action_id)
            .await?
            .ok_or_else(|| DispatchError::NotFound(action_id.to_string()))?;
        let tracking = self.tracking.read().await.get(action_id).cloned();
        Ok(DispatchStatus { action, tracking })
    }

    /// Evict tracking entries older than the configured horizon.
    /// Housekeeping only; persisted actions are untouched.
    pub async fn cleanup(&self) -> usize {
        let cutoff = Utc::now() - chrono::Duration::hours(self.tracking_hours);
        let mut tracking = self.tracking.write().await;
        let before = tracking.len();
        tracking.retain(|_, record| record.dispatched_at >= cutoff);
        let evicted = before - tracking.len();
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted stale dispatch-tracking entries");
        }
        evicted
    }

    /// Number of tracked in-flight dispatches.
    pub async fn tracked_count(&self) -> usize {
        self.tracking.read().await.len()
    }
}
