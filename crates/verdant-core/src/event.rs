//! Engine events published on the in-process event bus.

use serde::{Deserialize, Serialize};

/// Events emitted by the engine for observers (dashboards, loggers,
/// test harnesses). Timestamps are unix seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    /// A normalized sample was written (new row or bucket overwrite).
    TelemetryRecorded {
        site_id: String,
        sensor_type: String,
        value: f64,
        bucket_start: i64,
        timestamp: i64,
    },

    /// A rule condition was evaluated.
    RuleEvaluated {
        rule_id: String,
        rule_name: String,
        matched: bool,
        confidence: f64,
        timestamp: i64,
    },

    /// A rule branch produced an action.
    RuleExecuted {
        rule_id: String,
        branch: String,
        action_id: String,
        timestamp: i64,
    },

    /// An anomaly heuristic fired.
    SuspectedProblem {
        alert_id: String,
        site_id: String,
        sensor_type: String,
        severity: String,
        value: f64,
        timestamp: i64,
    },

    /// An action was published on the command channel.
    ActionDispatched {
        action_id: String,
        topic: String,
        timestamp: i64,
    },

    /// The retention sweep removed expired samples.
    RetentionSwept {
        deleted: usize,
        timestamp: i64,
    },
}

impl EngineEvent {
    /// Short name used for filtering and logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TelemetryRecorded { .. } => "telemetry_recorded",
            Self::RuleEvaluated { .. } => "rule_evaluated",
            Self::RuleExecuted { .. } => "rule_executed",
            Self::SuspectedProblem { .. } => "suspected_problem",
            Self::ActionDispatched { .. } => "action_dispatched",
            Self::RetentionSwept { .. } => "retention_swept",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_tagged() {
        let event = EngineEvent::SuspectedProblem {
            alert_id: "a".to_string(),
            site_id: "z1".to_string(),
            sensor_type: "co2".to_string(),
            severity: "critical".to_string(),
            value: 2500.0,
            timestamp: 0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "SuspectedProblem");
        assert_eq!(event.kind(), "suspected_problem");
    }
}
