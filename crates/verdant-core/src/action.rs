//! Action, alert, and important-action types.
//!
//! Actions are created by the orchestrator (or by manual trigger) and
//! move through a monotonic state machine:
//! `pending → executing → {completed, failed}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::rule::RuleId;
use crate::telemetry::{SensorType, TelemetrySample};

/// Unique identifier for an action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionId(pub Uuid);

impl ActionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Action type dispatched on the command channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionType {
    /// A command addressed to a field actuator.
    ActuatorCommand,
    /// A user-facing notification.
    Notification,
    /// Generic rule output; anything that is neither of the above.
    #[default]
    Rule,
}

impl ActionType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ActuatorCommand => "actuator_command",
            Self::Notification => "notification",
            Self::Rule => "rule",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "actuator_command" => Some(Self::ActuatorCommand),
            "notification" => Some(Self::Notification),
            "rule" => Some(Self::Rule),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for ActionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActionType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_string(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid action type: {}", s)))
    }
}

/// Action lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionStatus {
    /// The only initial state.
    #[default]
    Pending,
    Executing,
    Completed,
    Failed,
}

impl ActionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "executing" => Some(Self::Executing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether this status accepts no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether moving to `next` is a legal (monotonic) transition.
    pub fn can_transition_to(&self, next: ActionStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Executing)
                | (Self::Executing, Self::Completed)
                | (Self::Executing, Self::Failed)
        )
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for ActionStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActionStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_string(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid action status: {}", s)))
    }
}

/// One instance of "do something".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub id: ActionId,
    pub name: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub site_id: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    pub status: ActionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl Action {
    /// Create a new pending action.
    pub fn new(
        name: impl Into<String>,
        action_type: ActionType,
        site_id: impl Into<String>,
        parameters: Map<String, Value>,
    ) -> Self {
        Self {
            id: ActionId::new(),
            name: name.into(),
            action_type,
            site_id: site_id.into(),
            parameters,
            status: ActionStatus::Pending,
            created_at: Utc::now(),
            executed_at: None,
            result: None,
        }
    }
}

/// Best-effort parse of a rule's action text.
///
/// Rule actions are stored as free text. Text that parses as a JSON
/// object becomes [`ActionSpec::Structured`]; anything else stays a
/// literal command string.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionSpec {
    /// Plain command text.
    Literal(String),
    /// A parsed JSON object; `type` was honored only for
    /// `actuator_command`/`notification`, anything else downgraded to
    /// the generic `rule` type.
    Structured {
        action_type: ActionType,
        params: Map<String, Value>,
    },
}

impl ActionSpec {
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => {
                let action_type = map
                    .get("type")
                    .and_then(Value::as_str)
                    .and_then(ActionType::from_string)
                    .filter(|t| !matches!(t, ActionType::Rule))
                    .unwrap_or(ActionType::Rule);
                Self::Structured {
                    action_type,
                    params: map,
                }
            }
            _ => Self::Literal(text.to_string()),
        }
    }

    pub fn action_type(&self) -> ActionType {
        match self {
            Self::Literal(_) => ActionType::Rule,
            Self::Structured { action_type, .. } => *action_type,
        }
    }
}

/// Severity of an anomaly alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum AlertSeverity {
    #[default]
    Low = 0,
    Medium = 1,
    High = 2,
    Critical = 3,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for AlertSeverity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AlertSeverity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_string(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid severity: {}", s)))
    }
}

/// Unique identifier for an anomaly alert.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlertId(pub Uuid);

impl AlertId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AlertId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AlertId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Alert created by the anomaly heuristics, independent of user rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyAlert {
    pub id: AlertId,
    pub site_id: String,
    pub sensor_type: SensorType,
    pub value: f64,
    pub severity: AlertSeverity,
    pub message: String,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}

/// Operator-facing follow-up record cross-referencing an anomaly alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportantAction {
    pub id: Uuid,
    pub site_id: String,
    pub title: String,
    pub severity: AlertSeverity,
    pub alert_id: AlertId,
    pub acknowledged: bool,
    pub created_at: DateTime<Utc>,
}

/// Parameter bag shared by then/else branch executions: command text,
/// rule id, branch name, and the triggering telemetry snapshot.
pub fn branch_parameters(
    command: &str,
    rule_id: &RuleId,
    branch: &str,
    sample: &TelemetrySample,
) -> Map<String, Value> {
    let mut params = Map::new();
    params.insert("command".to_string(), Value::String(command.to_string()));
    params.insert("ruleId".to_string(), Value::String(rule_id.to_string()));
    params.insert("branch".to_string(), Value::String(branch.to_string()));
    params.insert(
        "sensorType".to_string(),
        Value::String(sample.sensor_type.as_str().to_string()),
    );
    params.insert("value".to_string(), serde_json::json!(sample.value));
    if let Some(topic) = &sample.topic {
        params.insert("topic".to_string(), Value::String(topic.clone()));
    }
    params.insert("siteId".to_string(), Value::String(sample.site_id.clone()));
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_monotonic() {
        use ActionStatus::*;
        assert!(Pending.can_transition_to(Executing));
        assert!(Executing.can_transition_to(Completed));
        assert!(Executing.can_transition_to(Failed));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Executing));
        assert!(!Completed.can_transition_to(Failed));

        assert!(Completed.is_terminal());
        assert!(Failed.is_terminal());
        assert!(!Executing.is_terminal());
    }

    #[test]
    fn test_action_spec_plain_text() {
        let spec = ActionSpec::parse("open the roof vent");
        assert_eq!(spec, ActionSpec::Literal("open the roof vent".to_string()));
        assert_eq!(spec.action_type(), ActionType::Rule);
    }

    #[test]
    fn test_action_spec_structured() {
        let spec = ActionSpec::parse(r#"{"type":"actuator_command","device":"fan-1","state":"on"}"#);
        match spec {
            ActionSpec::Structured { action_type, params } => {
                assert_eq!(action_type, ActionType::ActuatorCommand);
                assert_eq!(params.get("device"), Some(&serde_json::json!("fan-1")));
            }
            other => panic!("expected structured spec, got {:?}", other),
        }
    }

    #[test]
    fn test_action_spec_unknown_type_downgrades() {
        let spec = ActionSpec::parse(r#"{"type":"reboot_everything"}"#);
        assert_eq!(spec.action_type(), ActionType::Rule);

        // Non-object JSON stays literal.
        let spec = ActionSpec::parse("[1, 2, 3]");
        assert_eq!(spec, ActionSpec::Literal("[1, 2, 3]".to_string()));
    }
}
