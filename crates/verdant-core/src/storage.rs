//! Storage collaborator seam.
//!
//! Persistence technology lives outside this core. The engine only
//! depends on the [`Storage`] trait, which is expected to provide atomic
//! single-document upsert/update semantics. [`MemoryStorage`] is the
//! in-process implementation used by tests and single-node deployments.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::action::{Action, ActionId, ActionStatus, AnomalyAlert, ImportantAction};
use crate::error::{Error, Result};
use crate::rule::{DecisionLogEntry, Rule, RuleId};
use crate::telemetry::{SampleIdentity, TelemetrySample};

/// Storage operations consumed by the engine.
///
/// Samples are keyed by their deduplication identity; actions, decisions
/// and alerts are append-only apart from the monotonic action-status
/// update.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Idempotent sample upsert. An existing sample with the same
    /// identity keeps its id but takes the new value/unit/timestamp;
    /// otherwise the sample is inserted as given. Returns the stored row.
    async fn upsert_sample(&self, sample: TelemetrySample) -> Result<TelemetrySample>;

    /// Samples for one site, unordered.
    async fn samples_for_site(&self, site_id: &str) -> Result<Vec<TelemetrySample>>;

    /// Delete every sample whose timestamp is older than `cutoff`.
    /// Returns the number of rows deleted.
    async fn delete_samples_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    /// Active rules for one site. Rules are owned by an external CRUD
    /// collaborator; this core only reads them.
    async fn active_rules_for_site(&self, site_id: &str) -> Result<Vec<Rule>>;

    /// Append a new action record.
    async fn insert_action(&self, action: Action) -> Result<()>;

    /// Fetch an action by id.
    async fn action(&self, id: &ActionId) -> Result<Option<Action>>;

    /// Move an action to `status`, recording an optional result payload.
    /// Rejects non-monotonic transitions.
    async fn update_action_status(
        &self,
        id: &ActionId,
        status: ActionStatus,
        result: Option<Value>,
    ) -> Result<()>;

    /// Append a decision log entry. Entries are never mutated or deleted.
    async fn insert_decision(&self, entry: DecisionLogEntry) -> Result<()>;

    /// Decision trail for one rule, oldest first.
    async fn decisions_for_rule(&self, rule_id: &RuleId) -> Result<Vec<DecisionLogEntry>>;

    /// Append an anomaly alert.
    async fn insert_alert(&self, alert: AnomalyAlert) -> Result<()>;

    /// Append an important-action record.
    async fn insert_important_action(&self, action: ImportantAction) -> Result<()>;

    /// Anomaly alerts for one site, oldest first.
    async fn alerts_for_site(&self, site_id: &str) -> Result<Vec<AnomalyAlert>>;
}

/// Shared handle to a storage implementation.
pub type SharedStorage = Arc<dyn Storage>;

#[derive(Default)]
struct MemoryState {
    samples: HashMap<SampleIdentity, TelemetrySample>,
    rules: HashMap<RuleId, Rule>,
    actions: HashMap<ActionId, Action>,
    decisions: Vec<DecisionLogEntry>,
    alerts: Vec<AnomalyAlert>,
    important_actions: Vec<ImportantAction>,
}

/// In-memory storage backend.
#[derive(Default)]
pub struct MemoryStorage {
    state: RwLock<MemoryState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a rule. Rule CRUD is external to the engine, so this only
    /// exists on the in-memory backend.
    pub async fn put_rule(&self, rule: Rule) {
        self.state.write().await.rules.insert(rule.id.clone(), rule);
    }

    /// Number of stored samples, across all sites.
    pub async fn sample_count(&self) -> usize {
        self.state.read().await.samples.len()
    }

    /// All important-action records for one site.
    pub async fn important_actions_for_site(&self, site_id: &str) -> Vec<ImportantAction> {
        self.state
            .read()
            .await
            .important_actions
            .iter()
            .filter(|a| a.site_id == site_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn upsert_sample(&self, sample: TelemetrySample) -> Result<TelemetrySample> {
        let mut state = self.state.write().await;
        let identity = sample.identity();
        let stored = match state.samples.get_mut(&identity) {
            Some(existing) => {
                existing.value = sample.value;
                existing.unit = sample.unit;
                existing.timestamp = sample.timestamp;
                existing.event_type = sample.event_type;
                existing.clone()
            }
            None => {
                state.samples.insert(identity, sample.clone());
                sample
            }
        };
        Ok(stored)
    }

    async fn samples_for_site(&self, site_id: &str) -> Result<Vec<TelemetrySample>> {
        let state = self.state.read().await;
        Ok(state
            .samples
            .values()
            .filter(|s| s.site_id == site_id)
            .cloned()
            .collect())
    }

    async fn delete_samples_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut state = self.state.write().await;
        let before = state.samples.len();
        state.samples.retain(|_, s| s.timestamp >= cutoff);
        Ok(before - state.samples.len())
    }

    async fn active_rules_for_site(&self, site_id: &str) -> Result<Vec<Rule>> {
        let state = self.state.read().await;
        Ok(state
            .rules
            .values()
            .filter(|r| r.active && r.site_id == site_id)
            .cloned()
            .collect())
    }

    async fn insert_action(&self, action: Action) -> Result<()> {
        let mut state = self.state.write().await;
        state.actions.insert(action.id.clone(), action);
        Ok(())
    }

    async fn action(&self, id: &ActionId) -> Result<Option<Action>> {
        let state = self.state.read().await;
        Ok(state.actions.get(id).cloned())
    }

    async fn update_action_status(
        &self,
        id: &ActionId,
        status: ActionStatus,
        result: Option<Value>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let action = state
            .actions
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("action {}", id)))?;
        if !action.status.can_transition_to(status) {
            return Err(Error::Storage(format!(
                "illegal action status transition: {} -> {}",
                action.status, status
            )));
        }
        action.status = status;
        if status.is_terminal() {
            action.executed_at = Some(Utc::now());
        }
        if result.is_some() {
            action.result = result;
        }
        Ok(())
    }

    async fn insert_decision(&self, entry: DecisionLogEntry) -> Result<()> {
        self.state.write().await.decisions.push(entry);
        Ok(())
    }

    async fn decisions_for_rule(&self, rule_id: &RuleId) -> Result<Vec<DecisionLogEntry>> {
        let state = self.state.read().await;
        Ok(state
            .decisions
            .iter()
            .filter(|d| &d.rule_id == rule_id)
            .cloned()
            .collect())
    }

    async fn insert_alert(&self, alert: AnomalyAlert) -> Result<()> {
        self.state.write().await.alerts.push(alert);
        Ok(())
    }

    async fn insert_important_action(&self, action: ImportantAction) -> Result<()> {
        self.state.write().await.important_actions.push(action);
        Ok(())
    }

    async fn alerts_for_site(&self, site_id: &str) -> Result<Vec<AnomalyAlert>> {
        let state = self.state.read().await;
        Ok(state
            .alerts
            .iter()
            .filter(|a| a.site_id == site_id)
            .cloned()
            .collect())
    }
}
