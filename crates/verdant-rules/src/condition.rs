//! Condition evaluation.
//!
//! Pure functions that, given a rule and a telemetry sample, produce a
//! [`Decision`] for one of the five condition kinds. No error ever
//! escapes this module: internal failures fold into a non-matching
//! decision with confidence 0 so the audit trail keeps a row for every
//! evaluation.

use chrono::{DateTime, Timelike, Utc};
use serde_json::Map;

use verdant_core::rule::{ConditionKind, Decision, Rule};
use verdant_core::telemetry::TelemetrySample;

use crate::error::RuleError;
use crate::logic;

/// Comparison operator for threshold conditions.
///
/// Parsed from the condition description by substring, with documented
/// precedence: `>=`, `<=`, then bare `>`, bare `<`, then `==`/`=`. An
/// empty description defaults to `>`; a non-empty description with no
/// recognized operator is an evaluation error rather than a silent
/// default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Gte,
    Lte,
    Gt,
    Lt,
    Eq,
}

/// Tolerance applied to threshold equality comparisons.
pub const EQUALITY_TOLERANCE: f64 = 0.01;

impl ComparisonOperator {
    pub fn parse(description: &str) -> Result<Self, RuleError> {
        let description = description.trim();
        if description.contains(">=") {
            Ok(Self::Gte)
        } else if description.contains("<=") {
            Ok(Self::Lte)
        } else if description.contains('>') {
            Ok(Self::Gt)
        } else if description.contains('<') {
            Ok(Self::Lt)
        } else if description.contains('=') {
            Ok(Self::Eq)
        } else if description.is_empty() {
            Ok(Self::Gt)
        } else {
            Err(RuleError::Evaluation(format!(
                "no comparison operator in description: {:?}",
                description
            )))
        }
    }

    pub fn evaluate(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Gte => value >= threshold,
            Self::Lte => value <= threshold,
            Self::Gt => value > threshold,
            Self::Lt => value < threshold,
            Self::Eq => (value - threshold).abs() < EQUALITY_TOLERANCE,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Eq => "==",
        }
    }
}

/// Evaluate a rule's condition against a sample, using the current
/// wall clock for time conditions.
pub fn evaluate(rule: &Rule, sample: &TelemetrySample, context: &Map<String, serde_json::Value>) -> Decision {
    evaluate_at(rule, sample, context, Utc::now())
}

/// Evaluate with an explicit clock. Never panics and never returns an
/// error: internal failures become `{matched: false, confidence: 0,
/// reasoning: "<kind> evaluation error"}`.
pub fn evaluate_at(
    rule: &Rule,
    sample: &TelemetrySample,
    context: &Map<String, serde_json::Value>,
    now: DateTime<Utc>,
) -> Decision {
    let kind = rule.condition.kind;
    let result = match kind {
        ConditionKind::Threshold => evaluate_threshold(rule, sample),
        ConditionKind::Time => evaluate_time(rule, now),
        ConditionKind::Timer => evaluate_timer(rule, sample),
        ConditionKind::Event => evaluate_event(rule, sample),
        ConditionKind::Logic => evaluate_logic(rule, sample, context),
    };

    match result {
        Ok(decision) => decision,
        Err(e) => {
            tracing::warn!(rule = %rule.id, kind = %kind, error = %e, "Condition evaluation failed");
            Decision::new(false, 0.0, format!("{} evaluation error", kind))
        }
    }
}

fn evaluate_threshold(rule: &Rule, sample: &TelemetrySample) -> Result<Decision, RuleError> {
    let threshold: f64 = rule
        .condition
        .value
        .trim()
        .parse()
        .map_err(|_| RuleError::Evaluation(format!("non-numeric threshold: {:?}", rule.condition.value)))?;
    let operator = ComparisonOperator::parse(&rule.condition.description)?;
    let matched = operator.evaluate(sample.value, threshold);
    Ok(Decision::new(
        matched,
        0.95,
        format!(
            "threshold: {} {} {} is {}",
            sample.value,
            operator.as_str(),
            threshold,
            matched
        ),
    ))
}

fn evaluate_time(rule: &Rule, now: DateTime<Utc>) -> Result<Decision, RuleError> {
    let spec = rule.condition.value.trim().to_lowercase();
    let hour = now.hour();

    let (start, end) = match spec.as_str() {
        "morning" => (6, 12),
        "afternoon" => (12, 18),
        "evening" => (18, 6),
        range => parse_hour_range(range)?,
    };

    // Inclusive start hour, exclusive end hour; wraps midnight when
    // start > end.
    let matched = if start < end {
        hour >= start && hour < end
    } else if start > end {
        hour >= start || hour < end
    } else {
        false
    };

    Ok(Decision::new(
        matched,
        1.0,
        format!("time window {}: hour {} is {}", spec, hour, matched),
    ))
}

/// Parse `"HH:MM-HH:MM"` into start/end hours. Minutes are accepted but
/// only the hour is significant.
fn parse_hour_range(range: &str) -> Result<(u32, u32), RuleError> {
    let err = || RuleError::Evaluation(format!("unrecognized time window: {:?}", range));
    let (start, end) = range.split_once('-').ok_or_else(err)?;
    let hour_of = |part: &str| -> Result<u32, RuleError> {
        let hour_str = part.trim().split(':').next().ok_or_else(err)?;
        let hour: u32 = hour_str.parse().map_err(|_| err())?;
        if hour > 23 {
            return Err(err());
        }
        Ok(hour)
    };
    Ok((hour_of(start)?, hour_of(end)?))
}

fn evaluate_timer(rule: &Rule, sample: &TelemetrySample) -> Result<Decision, RuleError> {
    // Fails closed when the interval is missing or non-positive.
    let interval = rule.timer.as_ref().map(|t| t.interval_minutes).unwrap_or(0);
    if interval <= 0 {
        return Ok(Decision::new(
            false,
            1.0,
            "timer interval missing or non-positive",
        ));
    }
    let minute = sample.timestamp.minute() as i64;
    let matched = minute % interval == 0;
    Ok(Decision::new(
        matched,
        1.0,
        format!("timer: minute {} mod {} is {}", minute, interval, matched),
    ))
}

fn evaluate_event(rule: &Rule, sample: &TelemetrySample) -> Result<Decision, RuleError> {
    let expected = rule.event_type_or_default();
    let actual = sample.event_type_or_default();
    let mut matched = expected == actual;

    if matched {
        if let Some(criteria) = rule.trigger.as_ref().and_then(|t| t.criteria.as_ref()) {
            if let Some(sensor_type) = &criteria.sensor_type {
                matched &= sensor_type.eq_ignore_ascii_case(sample.sensor_type.as_str());
            }
            if let Some(topic) = &criteria.topic {
                matched &= Some(topic.as_str()) == sample.topic.as_deref();
            }
            if let Some(site_id) = &criteria.site_id {
                matched &= site_id == &sample.site_id;
            }
        }
    }

    // Non-matches report 0.4 rather than 0: a deliberate "near miss"
    // signal kept for audit-trail compatibility with the source system.
    let confidence = if matched { 0.98 } else { 0.4 };
    Ok(Decision::new(
        matched,
        confidence,
        format!("event: expected {:?}, got {:?}, filters {}", expected, actual, matched),
    ))
}

fn evaluate_logic(
    rule: &Rule,
    sample: &TelemetrySample,
    context: &Map<String, serde_json::Value>,
) -> Result<Decision, RuleError> {
    let expression = rule
        .expression
        .as_ref()
        .ok_or_else(|| RuleError::Evaluation("logic condition without expression tree".to_string()))?;
    let scope = logic::build_scope(sample, &rule.variables, context);
    let matched = logic::eval_node(Some(expression), &scope);
    let confidence = if matched { 0.9 } else { 0.6 };
    Ok(Decision::new(
        matched,
        confidence,
        format!("logic expression evaluated to {}", matched),
    ))
}
