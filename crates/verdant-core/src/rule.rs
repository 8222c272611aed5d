//! Automation rule types.
//!
//! Rules are created and edited by an external CRUD collaborator; this
//! core only reads them. Exactly one condition kind governs evaluation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

/// Unique identifier for a rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleId(pub Uuid);

impl RuleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for RuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The five condition kinds a rule can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionKind {
    Threshold,
    Time,
    Timer,
    Event,
    Logic,
}

impl ConditionKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Threshold => "threshold",
            Self::Time => "time",
            Self::Timer => "timer",
            Self::Event => "event",
            Self::Logic => "logic",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "threshold" => Some(Self::Threshold),
            "time" => Some(Self::Time),
            "timer" => Some(Self::Timer),
            "event" => Some(Self::Event),
            "logic" => Some(Self::Logic),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for ConditionKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ConditionKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_string(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid condition kind: {}", s)))
    }
}

/// A rule's condition: one kind, a value, and a free-text description.
///
/// The value's meaning depends on the kind: a numeric threshold, a time
/// range such as `"06:00-12:00"` (or `morning`/`afternoon`/`evening`),
/// or unused for timer/event/logic kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleCondition {
    pub kind: ConditionKind,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub description: String,
}

/// How a rule is triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerType {
    /// Evaluated against incoming telemetry samples (the default).
    #[default]
    Telemetry,
    /// Only fired explicitly by an operator; never matches telemetry.
    Manual,
    /// Evaluated only on timer-interval boundaries.
    Timer,
    /// Evaluated against named events.
    Event,
}

impl TriggerType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Telemetry => "telemetry",
            Self::Manual => "manual",
            Self::Timer => "timer",
            Self::Event => "event",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "telemetry" => Some(Self::Telemetry),
            "manual" => Some(Self::Manual),
            "timer" => Some(Self::Timer),
            "event" => Some(Self::Event),
            _ => None,
        }
    }
}

impl Serialize for TriggerType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TriggerType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_string(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid trigger type: {}", s)))
    }
}

/// Match criteria applied before a rule is even considered for a sample.
/// Only populated fields are checked.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
}

/// Timer descriptor for timer-triggered rules and timer conditions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSpec {
    pub interval_minutes: i64,
}

/// Trigger descriptor: how and when a rule is considered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerSpec {
    #[serde(rename = "type", default)]
    pub trigger_type: TriggerType,
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<TriggerMatch>,
    /// Free-text prompt for advisory enrichment of matched rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer: Option<TimerSpec>,
}

/// Where a logic variable's value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableSource {
    Constant,
    Device,
    Context,
    Telemetry,
    /// Unrecognized sources resolve like telemetry.
    Other(String),
}

impl VariableSource {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Constant => "constant",
            Self::Device => "device",
            Self::Context => "context",
            Self::Telemetry => "telemetry",
            Self::Other(s) => s,
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "constant" => Self::Constant,
            "device" => Self::Device,
            "context" => Self::Context,
            "telemetry" => Self::Telemetry,
            other => Self::Other(other.to_string()),
        }
    }
}

impl Serialize for VariableSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for VariableSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_string(&s))
    }
}

/// A named variable resolved into the logic-evaluation scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleVariable {
    pub name: String,
    pub source: VariableSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Literal value; used verbatim for `constant` and as a fallback
    /// for `telemetry`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// One node of a boolean logic-expression tree.
///
/// `and`/`or` use `children`; `not` evaluates `left` as a nested node;
/// comparison operators resolve `left`/`right` as scalars, where a string
/// beginning with `$` is a scope lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogicNode {
    #[serde(default)]
    pub op: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<LogicNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<Value>,
}

/// A named automation definition scoped to one site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: RuleId,
    pub site_id: String,
    pub name: String,
    pub condition: RuleCondition,
    /// Then-branch action: free text or a JSON action descriptor.
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub else_action: Option<String>,
    pub active: bool,
    /// Whether matched branches also publish a mobile notification.
    #[serde(default)]
    pub notifications: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<TriggerSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<RuleVariable>,
    /// Required when the condition kind is `logic`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<LogicNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer: Option<TimerSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Rule {
    /// Event type this rule listens for, falling back to the trigger
    /// match criteria and finally to plain telemetry.
    pub fn event_type_or_default(&self) -> &str {
        if let Some(et) = self.event_type.as_deref() {
            return et;
        }
        self.trigger
            .as_ref()
            .and_then(|t| t.criteria.as_ref())
            .and_then(|m| m.event_type.as_deref())
            .unwrap_or("telemetry")
    }
}

/// The structured output of one condition evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub matched: bool,
    /// 0.0–1.0.
    pub confidence: f64,
    pub reasoning: String,
}

impl Decision {
    pub fn new(matched: bool, confidence: f64, reasoning: impl Into<String>) -> Self {
        Self {
            matched,
            confidence,
            reasoning: reasoning.into(),
        }
    }
}

/// Unique identifier for a decision log entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecisionId(pub Uuid);

impl DecisionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DecisionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DecisionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable audit row written once per rule evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionLogEntry {
    pub id: DecisionId,
    pub rule_id: RuleId,
    pub reasoning: String,
    pub matched: bool,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

impl DecisionLogEntry {
    pub fn from_decision(rule_id: RuleId, decision: &Decision) -> Self {
        Self {
            id: DecisionId::new(),
            rule_id,
            reasoning: decision.reasoning.clone(),
            matched: decision.matched,
            confidence: decision.confidence,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_kind_parse() {
        assert_eq!(ConditionKind::from_string("THRESHOLD"), Some(ConditionKind::Threshold));
        assert_eq!(ConditionKind::from_string("logic"), Some(ConditionKind::Logic));
        assert_eq!(ConditionKind::from_string("maybe"), None);
    }

    #[test]
    fn test_trigger_spec_wire_format() {
        let json = serde_json::json!({
            "type": "timer",
            "match": { "sensorType": "temperature" },
            "timer": { "intervalMinutes": 15 }
        });
        let spec: TriggerSpec = serde_json::from_value(json).unwrap();
        assert_eq!(spec.trigger_type, TriggerType::Timer);
        assert_eq!(spec.timer.unwrap().interval_minutes, 15);
        assert_eq!(
            spec.criteria.unwrap().sensor_type.as_deref(),
            Some("temperature")
        );
    }

    #[test]
    fn test_rule_event_type_fallbacks() {
        let mut rule = Rule {
            id: RuleId::new(),
            site_id: "z1".to_string(),
            name: "r".to_string(),
            condition: RuleCondition {
                kind: ConditionKind::Event,
                value: String::new(),
                description: String::new(),
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
        };
        assert_eq!(rule.event_type_or_default(), "telemetry");

        rule.trigger = Some(TriggerSpec {
            criteria: Some(TriggerMatch {
                event_type: Some("door_open".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        });
        assert_eq!(rule.event_type_or_default(), "door_open");

        rule.event_type = Some("frost_warning".to_string());
        assert_eq!(rule.event_type_or_default(), "frost_warning");
    }

    #[test]
    fn test_logic_node_deserialize() {
        let json = serde_json::json!({
            "op": "and",
            "children": [
                { "op": "gt", "left": "$value", "right": 30 },
                { "op": "eq", "left": "$sensorType", "right": "temperature" }
            ]
        });
        let node: LogicNode = serde_json::from_value(json).unwrap();
        assert_eq!(node.op, "and");
        assert_eq!(node.children.len(), 2);
        assert_eq!(node.children[0].left, Some(serde_json::json!("$value")));
    }
}
