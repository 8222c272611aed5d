//! Rule orchestration.
//!
//! The entry point for every normalized telemetry sample: runs the
//! anomaly heuristics, pre-filters rules by trigger, evaluates the
//! survivors, logs every decision, and executes then/else branches
//! through the action dispatcher.

use std::sync::Arc;

use chrono::{Timelike, Utc};
use serde_json::Map;

use verdant_actions::ActionDispatcher;
use verdant_core::action::{branch_parameters, Action, ActionSpec};
use verdant_core::advisory::{AdvisoryRequest, SharedAdvisory};
use verdant_core::channel::{SharedChannel, topics};
use verdant_core::config::EngineConfig;
use verdant_core::event::EngineEvent;
use verdant_core::eventbus::SharedEventBus;
use verdant_core::rule::{Decision, DecisionLogEntry, Rule, TriggerType};
use verdant_core::storage::SharedStorage;
use verdant_core::telemetry::TelemetrySample;

use crate::anomaly::AnomalyDetector;
use crate::condition;

/// What one telemetry event caused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventOutcome {
    /// Rules whose then-branch ran.
    pub executed_rules: usize,
    /// Anomalies raised by the heuristics.
    pub suspected_problems: usize,
}

/// Coordinates rule evaluation and branch execution for one site's
/// telemetry stream.
pub struct Orchestrator {
    storage: SharedStorage,
    dispatcher: Arc<ActionDispatcher>,
    anomaly: AnomalyDetector,
    channel: Option<SharedChannel>,
    advisory: Option<SharedAdvisory>,
    event_bus: Option<SharedEventBus>,
    namespace: String,
}

impl Orchestrator {
    pub fn new(
        storage: SharedStorage,
        dispatcher: Arc<ActionDispatcher>,
        config: &EngineConfig,
    ) -> Self {
        let anomaly = AnomalyDetector::new(storage.clone(), config.namespace.clone());
        Self {
            storage,
            dispatcher,
            anomaly,
            channel: None,
            advisory: None,
            event_bus: None,
            namespace: config.namespace.clone(),
        }
    }

    /// Attach the outbound channel, used for advisory texts, mobile
    /// notifications, and suspected-problem payloads.
    pub fn with_channel(mut self, channel: SharedChannel) -> Self {
        self.anomaly = self.anomaly.with_channel(channel.clone());
        self.channel = Some(channel);
        self
    }

    /// Attach an advisory text generator.
    pub fn with_advisory(mut self, advisory: SharedAdvisory) -> Self {
        self.advisory = Some(advisory);
        self
    }

    /// Attach an event bus for engine-event observers.
    pub fn with_event_bus(mut self, event_bus: SharedEventBus) -> Self {
        self.anomaly = self.anomaly.with_event_bus(event_bus.clone());
        self.event_bus = Some(event_bus);
        self
    }

    /// Process one normalized sample end to end.
    ///
    /// Samples without a site id are ignored. Rule fetching and the
    /// anomaly heuristics have no data dependency and run concurrently.
    pub async fn handle_telemetry_event(&self, sample: &TelemetrySample) -> EventOutcome {
        if sample.site_id.is_empty() {
            tracing::warn!("Sample without site id, skipping rule evaluation");
            return EventOutcome::default();
        }

        let (rules, suspected_problems) = tokio::join!(
            self.storage.active_rules_for_site(&sample.site_id),
            self.anomaly.check(sample),
        );

        let rules = match rules {
            Ok(rules) => rules,
            Err(e) => {
                tracing::error!(site = %sample.site_id, error = %e, "Failed to load rules");
                return EventOutcome {
                    executed_rules: 0,
                    suspected_problems,
                };
            }
        };

        let context = Map::new();
        let mut executed_rules = 0;

        for rule in &rules {
            if !trigger_matches(rule, sample) {
                continue;
            }

            let decision = condition::evaluate(rule, sample, &context);
            tracing::debug!(
                rule = %rule.id,
                matched = decision.matched,
                confidence = decision.confidence,
                reasoning = %decision.reasoning,
                "Rule evaluated"
            );

            let entry = DecisionLogEntry::from_decision(rule.id.clone(), &decision);
            if let Err(e) = self.storage.insert_decision(entry).await {
                tracing::error!(rule = %rule.id, error = %e, "Failed to log decision");
            }

            if let Some(bus) = &self.event_bus {
                bus.publish(EngineEvent::RuleEvaluated {
                    rule_id: rule.id.to_string(),
                    rule_name: rule.name.clone(),
                    matched: decision.matched,
                    confidence: decision.confidence,
                    timestamp: Utc::now().timestamp(),
                });
            }

            if decision.matched {
                if self.execute_branch(rule, "then", &rule.action, sample).await {
                    executed_rules += 1;
                }
            } else if let Some(else_action) = &rule.else_action {
                // Else-branch actions are created and dispatched but do
                // not count as an executed rule.
                self.execute_branch(rule, "else", else_action, sample).await;
            }

            // Enrichment depends only on the prompt and a configured
            // generator; the decision travels along either way.
            self.publish_advisory(rule, sample, &decision).await;
        }

        EventOutcome {
            executed_rules,
            suspected_problems,
        }
    }

    /// Execute one rule branch: create a pending action, persist it, and
    /// hand it to the dispatcher. Returns whether the action was created.
    async fn execute_branch(
        &self,
        rule: &Rule,
        branch: &str,
        action_text: &str,
        sample: &TelemetrySample,
    ) -> bool {
        let spec = ActionSpec::parse(action_text);
        let action_type = spec.action_type();

        let mut params = match spec {
            ActionSpec::Structured { params, .. } => params,
            ActionSpec::Literal(_) => Map::new(),
        };
        // Branch parameters win over structured ones on key collision.
        for (key, value) in branch_parameters(action_text, &rule.id, branch, sample) {
            params.insert(key, value);
        }

        let action = Action::new(rule.name.clone(), action_type, sample.site_id.clone(), params);
        let action_id = action.id.clone();

        if let Err(e) = self.storage.insert_action(action.clone()).await {
            tracing::error!(rule = %rule.id, error = %e, "Failed to store action");
            return false;
        }

        if let Err(e) = self.dispatcher.dispatch(&action).await {
            tracing::error!(action = %action_id, error = %e, "Dispatch failed");
        }

        if rule.notifications {
            self.publish_notification(rule, branch, action_text, sample).await;
        }

        tracing::info!(rule = %rule.id, branch, action = %action_id, "Rule branch executed");
        if let Some(bus) = &self.event_bus {
            bus.publish(EngineEvent::RuleExecuted {
                rule_id: rule.id.to_string(),
                branch: branch.to_string(),
                action_id: action_id.to_string(),
                timestamp: Utc::now().timestamp(),
            });
        }

        true
    }

    /// Publish the mobile-notification payload for a notifying rule.
    async fn publish_notification(
        &self,
        rule: &Rule,
        branch: &str,
        action_text: &str,
        sample: &TelemetrySample,
    ) {
        let Some(channel) = &self.channel else {
            return;
        };
        let topic = topics::notifications(&self.namespace, &sample.site_id);
        let payload = serde_json::json!({
            "siteId": sample.site_id,
            "ruleId": rule.id.to_string(),
            "ruleName": rule.name,
            "action": action_text,
            "branch": branch,
            "telemetry": {
                "sensorType": sample.sensor_type.as_str(),
                "value": sample.value,
                "timestamp": sample.timestamp.timestamp(),
            },
        });
        if let Err(e) = channel
            .publish(&topic, payload.to_string().as_bytes())
            .await
        {
            tracing::warn!(rule = %rule.id, topic = %topic, error = %e, "Notification publish failed");
        }
    }

    /// Generate and publish advisory text for an evaluated rule with a
    /// non-empty prompt. Failures are logged and swallowed; other rules
    /// keep running.
    async fn publish_advisory(&self, rule: &Rule, sample: &TelemetrySample, decision: &Decision) {
        let prompt = rule
            .trigger
            .as_ref()
            .and_then(|t| t.custom_prompt.as_deref())
            .unwrap_or("");
        if prompt.is_empty() {
            return;
        }
        let (Some(advisory), Some(channel)) = (&self.advisory, &self.channel) else {
            return;
        };

        let request = AdvisoryRequest {
            prompt: prompt.to_string(),
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            sample: sample.clone(),
            decision: decision.clone(),
        };
        let text = match advisory.generate(&request).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(rule = %rule.id, error = %e, "Advisory generation failed");
                return;
            }
        };

        let topic = topics::issues(&self.namespace, &sample.site_id);
        let payload = serde_json::json!({
            "event": "advisory",
            "ruleId": rule.id.to_string(),
            "ruleName": rule.name,
            "siteId": sample.site_id,
            "text": text,
        });
        if let Err(e) = channel
            .publish(&topic, payload.to_string().as_bytes())
            .await
        {
            tracing::warn!(rule = %rule.id, topic = %topic, error = %e, "Advisory publish failed");
        }
    }
}

/// Trigger pre-filter, applied before any condition evaluation.
///
/// `manual` rules never match telemetry. `timer` rules match only on
/// interval-aligned minutes. Everything else matches when the populated
/// sensor-type, topic, and sensor-key criteria equal the sample's.
pub fn trigger_matches(rule: &Rule, sample: &TelemetrySample) -> bool {
    let Some(trigger) = &rule.trigger else {
        return true;
    };

    match trigger.trigger_type {
        TriggerType::Manual => false,
        TriggerType::Timer => {
            let interval = trigger
                .timer
                .as_ref()
                .map(|t| t.interval_minutes)
                .unwrap_or(0);
            interval > 0 && i64::from(sample.timestamp.minute()) % interval == 0
        }
        TriggerType::Telemetry | TriggerType::Event => {
            let Some(criteria) = &trigger.criteria else {
                return true;
            };
            if let Some(sensor_type) = &criteria.sensor_type {
                if !sensor_type.eq_ignore_ascii_case(sample.sensor_type.as_str()) {
                    return false;
                }
            }
            if let Some(topic) = &criteria.topic {
                if sample.topic.as_deref() != Some(topic.as_str()) {
                    return false;
                }
            }
            if let Some(sensor_key) = &criteria.sensor_key {
                if sample.sensor_key.as_deref() != Some(sensor_key.as_str()) {
                    return false;
                }
            }
            // Event type and site id are the event evaluator's concern:
            // a mismatch there must still reach evaluation and log its
            // near-miss decision.
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use verdant_core::channel::MemoryChannel;
    use verdant_core::rule::{
        ConditionKind, RuleCondition, RuleId, TimerSpec, TriggerMatch, TriggerSpec,
    };
    use verdant_core::storage::{MemoryStorage, Storage};
    use verdant_core::telemetry::{SampleId, SensorType};

    fn sample(sensor_type: SensorType, value: f64) -> TelemetrySample {
        let ts = Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();
        TelemetrySample {
            id: SampleId::new(),
            site_id: "z1".to_string(),
            device_id: None,
            sensor_key: Some("t-probe".to_string()),
            sensor_type,
            value,
            unit: None,
            topic: Some("field/z1/temp".to_string()),
            event_type: None,
            timestamp: ts,
            bucket_start: ts,
        }
    }

    fn rule(kind: ConditionKind, value: &str, description: &str) -> Rule {
        Rule {
            id: RuleId::new(),
            site_id: "z1".to_string(),
            name: "test rule".to_string(),
            condition: RuleCondition {
                kind,
                value: value.to_string(),
                description: description.to_string(),
            },
            action: "open vent".to_string(),
            else_action: None,
            active: true,
            notifications: false,
            trigger: None,
            variables: Vec::new(),
            expression: None,
            timer: None,
            event_type: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_trigger_manual_never_matches() {
        let mut r = rule(ConditionKind::Threshold, "25", "above");
        r.trigger = Some(TriggerSpec {
            trigger_type: TriggerType::Manual,
            ..Default::default()
        });
        assert!(!trigger_matches(&r, &sample(SensorType::Temperature, 27.0)));
    }

    #[test]
    fn test_trigger_timer_interval_alignment() {
        let mut r = rule(ConditionKind::Threshold, "25", "above");
        r.trigger = Some(TriggerSpec {
            trigger_type: TriggerType::Timer,
            timer: Some(TimerSpec {
                interval_minutes: 15,
            }),
            ..Default::default()
        });
        // Sample minute is 30.
        assert!(trigger_matches(&r, &sample(SensorType::Temperature, 27.0)));

        r.trigger.as_mut().unwrap().timer = Some(TimerSpec {
            interval_minutes: 7,
        });
        assert!(!trigger_matches(&r, &sample(SensorType::Temperature, 27.0)));

        // No timer spec: never matches.
        r.trigger.as_mut().unwrap().timer = None;
        assert!(!trigger_matches(&r, &sample(SensorType::Temperature, 27.0)));
    }

    #[test]
    fn test_trigger_criteria_fields() {
        let mut r = rule(ConditionKind::Threshold, "25", "above");
        assert!(trigger_matches(&r, &sample(SensorType::Temperature, 27.0)));

        r.trigger = Some(TriggerSpec {
            criteria: Some(TriggerMatch {
                sensor_type: Some("TEMPERATURE".to_string()),
                topic: Some("field/z1/temp".to_string()),
                sensor_key: Some("t-probe".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        });
        assert!(trigger_matches(&r, &sample(SensorType::Temperature, 27.0)));
        assert!(!trigger_matches(&r, &sample(SensorType::Humidity, 50.0)));

        r.trigger.as_mut().unwrap().criteria.as_mut().unwrap().topic =
            Some("field/z2/temp".to_string());
        assert!(!trigger_matches(&r, &sample(SensorType::Temperature, 27.0)));

        // An event-type criterion does not pre-filter; the event
        // evaluator decides (and logs) that mismatch.
        r.trigger = Some(TriggerSpec {
            criteria: Some(TriggerMatch {
                event_type: Some("door_open".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        });
        assert!(trigger_matches(&r, &sample(SensorType::Temperature, 27.0)));
    }

    async fn orchestrator(
        storage: Arc<MemoryStorage>,
        channel: Arc<MemoryChannel>,
    ) -> Orchestrator {
        let config = EngineConfig::default();
        let dispatcher = Arc::new(
            ActionDispatcher::new(storage.clone(), &config).with_channel(channel.clone()),
        );
        Orchestrator::new(storage, dispatcher, &config).with_channel(channel)
    }

    #[tokio::test]
    async fn test_matched_rule_executes_and_logs() {
        let storage = Arc::new(MemoryStorage::new());
        let channel = Arc::new(MemoryChannel::new());
        let orch = orchestrator(storage.clone(), channel.clone()).await;

        let r = rule(ConditionKind::Threshold, "25", "temperature > 25");
        let rule_id = r.id.clone();
        storage.put_rule(r).await;

        let outcome = orch
            .handle_telemetry_event(&sample(SensorType::Temperature, 27.0))
            .await;
        assert_eq!(outcome.executed_rules, 1);
        assert_eq!(outcome.suspected_problems, 0);

        let decisions = storage.decisions_for_rule(&rule_id).await.unwrap();
        assert_eq!(decisions.len(), 1);
        assert!(decisions[0].matched);

        let commands = channel.published_json("greenhouse/actions/z1/rule").await;
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0]["parameters"]["command"], "open vent");
        assert_eq!(commands[0]["parameters"]["branch"], "then");
    }

    #[tokio::test]
    async fn test_unmatched_rule_runs_else_branch() {
        let storage = Arc::new(MemoryStorage::new());
        let channel = Arc::new(MemoryChannel::new());
        let orch = orchestrator(storage.clone(), channel.clone()).await;

        let mut r = rule(ConditionKind::Threshold, "25", "temperature > 25");
        r.else_action = Some("close vent".to_string());
        let rule_id = r.id.clone();
        storage.put_rule(r).await;

        let outcome = orch
            .handle_telemetry_event(&sample(SensorType::Temperature, 20.0))
            .await;
        // Else branch runs but does not count as an executed rule.
        assert_eq!(outcome.executed_rules, 0);

        let decisions = storage.decisions_for_rule(&rule_id).await.unwrap();
        assert_eq!(decisions.len(), 1);
        assert!(!decisions[0].matched);

        let commands = channel.published_json("greenhouse/actions/z1/rule").await;
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0]["parameters"]["command"], "close vent");
        assert_eq!(commands[0]["parameters"]["branch"], "else");
    }

    #[tokio::test]
    async fn test_sample_without_site_is_noop() {
        let storage = Arc::new(MemoryStorage::new());
        let channel = Arc::new(MemoryChannel::new());
        let orch = orchestrator(storage.clone(), channel.clone()).await;

        let mut s = sample(SensorType::Temperature, 27.0);
        s.site_id = String::new();
        let outcome = orch.handle_telemetry_event(&s).await;
        assert_eq!(outcome, EventOutcome::default());
    }

    #[tokio::test]
    async fn test_notification_published_when_enabled() {
        let storage = Arc::new(MemoryStorage::new());
        let channel = Arc::new(MemoryChannel::new());
        let orch = orchestrator(storage.clone(), channel.clone()).await;

        let mut r = rule(ConditionKind::Threshold, "25", "temperature > 25");
        r.notifications = true;
        storage.put_rule(r).await;

        orch.handle_telemetry_event(&sample(SensorType::Temperature, 27.0))
            .await;

        let notes = channel.published_json("greenhouse/notifications/z1").await;
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0]["branch"], "then");
        assert_eq!(notes[0]["telemetry"]["value"], 27.0);
    }

    #[tokio::test]
    async fn test_structured_action_keeps_its_type() {
        let storage = Arc::new(MemoryStorage::new());
        let channel = Arc::new(MemoryChannel::new());
        let orch = orchestrator(storage.clone(), channel.clone()).await;

        let mut r = rule(ConditionKind::Threshold, "25", "temperature > 25");
        r.action = r#"{"type":"actuator_command","device":"fan-1","state":"on"}"#.to_string();
        storage.put_rule(r).await;

        orch.handle_telemetry_event(&sample(SensorType::Temperature, 27.0))
            .await;

        let commands = channel
            .published_json("greenhouse/actions/z1/actuator_command")
            .await;
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0]["parameters"]["device"], "fan-1");
        // Branch parameters are merged alongside the structured ones.
        assert_eq!(commands[0]["parameters"]["ruleId"].as_str().is_some(), true);
    }
}
