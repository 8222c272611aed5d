//! Logic expression evaluation.
//!
//! Recursive evaluator for the boolean expression tree used by the
//! `logic` condition kind, with a variable-resolution sub-protocol.
//! Operand strings beginning with `$` are scope lookups; everything
//! else is a literal.

use serde_json::{Map, Value};

use verdant_core::rule::{LogicNode, RuleVariable, VariableSource};
use verdant_core::telemetry::TelemetrySample;

/// Name-to-value bindings visible to an expression tree.
pub type Scope = Map<String, Value>;

/// Resolve one declared rule variable against the sample and the
/// evaluation context.
///
/// Resolution order by source:
/// 1. `constant` — the literal value, verbatim;
/// 2. `device` — the sample field, else `context.device[key]`;
/// 3. `context` — `context[key]`, else the sample field;
/// 4. anything else (including `telemetry`) — the sample field, else
///    the literal value as fallback.
pub fn resolve_variable(
    variable: &RuleVariable,
    sample: &TelemetrySample,
    context: &Map<String, Value>,
) -> Value {
    let key = variable.key.as_deref().unwrap_or(&variable.name);
    match &variable.source {
        VariableSource::Constant => variable.value.clone().unwrap_or(Value::Null),
        VariableSource::Device => sample.field(key).unwrap_or_else(|| {
            context
                .get("device")
                .and_then(|d| d.get(key))
                .cloned()
                .unwrap_or(Value::Null)
        }),
        VariableSource::Context => context
            .get(key)
            .cloned()
            .or_else(|| sample.field(key))
            .unwrap_or(Value::Null),
        VariableSource::Telemetry | VariableSource::Other(_) => sample
            .field(key)
            .or_else(|| variable.value.clone())
            .unwrap_or(Value::Null),
    }
}

/// Build the evaluation scope for one sample: seeded with `value`,
/// `sensorType` and `siteId`, then each declared variable in order.
pub fn build_scope(
    sample: &TelemetrySample,
    variables: &[RuleVariable],
    context: &Map<String, Value>,
) -> Scope {
    let mut scope = Scope::new();
    scope.insert("value".to_string(), serde_json::json!(sample.value));
    scope.insert(
        "sensorType".to_string(),
        Value::String(sample.sensor_type.as_str().to_string()),
    );
    scope.insert("siteId".to_string(), Value::String(sample.site_id.clone()));
    for variable in variables {
        let value = resolve_variable(variable, sample, context);
        scope.insert(variable.name.clone(), value);
    }
    scope
}

/// Resolve a comparison operand: `"$name"` looks up `name` in the
/// scope, anything else is the literal itself.
fn resolve_operand(operand: Option<&Value>, scope: &Scope) -> Value {
    match operand {
        Some(Value::String(s)) if s.starts_with('$') => {
            scope.get(&s[1..]).cloned().unwrap_or(Value::Null)
        }
        Some(v) => v.clone(),
        None => Value::Null,
    }
}

/// Coerce a resolved operand to a number; non-numeric becomes NaN,
/// which makes every ordered comparison false.
fn to_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
        Value::Bool(true) => 1.0,
        Value::Bool(false) => 0.0,
        _ => f64::NAN,
    }
}

/// Evaluate one expression node against a scope. A null/absent node
/// evaluates to false; an unrecognized operator evaluates to false.
pub fn eval_node(node: Option<&LogicNode>, scope: &Scope) -> bool {
    let Some(node) = node else {
        return false;
    };

    match node.op.to_lowercase().as_str() {
        // Empty children: vacuously true.
        "and" => node.children.iter().all(|c| eval_node(Some(c), scope)),
        // Empty children: false.
        "or" => node.children.iter().any(|c| eval_node(Some(c), scope)),
        "not" => {
            let inner = node
                .left
                .as_ref()
                .and_then(|v| serde_json::from_value::<LogicNode>(v.clone()).ok());
            !eval_node(inner.as_ref(), scope)
        }
        op @ ("gt" | "gte" | "lt" | "lte") => {
            let left = to_number(&resolve_operand(node.left.as_ref(), scope));
            let right = to_number(&resolve_operand(node.right.as_ref(), scope));
            match op {
                "gt" => left > right,
                "gte" => left >= right,
                "lt" => left < right,
                _ => left <= right,
            }
        }
        // Strict, non-coercing equality.
        "eq" => resolve_operand(node.left.as_ref(), scope) == resolve_operand(node.right.as_ref(), scope),
        "neq" => resolve_operand(node.left.as_ref(), scope) != resolve_operand(node.right.as_ref(), scope),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use verdant_core::telemetry::{SampleId, SensorType};

    fn sample() -> TelemetrySample {
        let now = Utc::now();
        TelemetrySample {
            id: SampleId::new(),
            site_id: "z1".to_string(),
            device_id: Some("dev-7".to_string()),
            sensor_key: None,
            sensor_type: SensorType::Temperature,
            value: 27.0,
            unit: None,
            topic: None,
            event_type: None,
            timestamp: now,
            bucket_start: now,
        }
    }

    fn node(op: &str) -> LogicNode {
        LogicNode {
            op: op.to_string(),
            ..Default::default()
        }
    }

    fn cmp(op: &str, left: Value, right: Value) -> LogicNode {
        LogicNode {
            op: op.to_string(),
            left: Some(left),
            right: Some(right),
            ..Default::default()
        }
    }

    #[test]
    fn test_and_or_not() {
        let scope = Scope::new();
        let true_node = cmp("eq", serde_json::json!(1), serde_json::json!(1));
        let false_node = cmp("eq", serde_json::json!(1), serde_json::json!(2));

        let mut and = node("AND");
        and.children = vec![true_node.clone(), true_node.clone()];
        assert!(eval_node(Some(&and), &scope));

        and.children.push(false_node.clone());
        assert!(!eval_node(Some(&and), &scope));

        // Empty AND is vacuously true; empty OR is false.
        assert!(eval_node(Some(&node("and")), &scope));
        assert!(!eval_node(Some(&node("or")), &scope));

        let mut or = node("or");
        or.children = vec![false_node.clone(), true_node.clone()];
        assert!(eval_node(Some(&or), &scope));

        let not = LogicNode {
            op: "not".to_string(),
            left: Some(serde_json::to_value(&true_node).unwrap()),
            ..Default::default()
        };
        assert!(!eval_node(Some(&not), &scope));

        // Absent node is false; NOT of an absent node is true.
        assert!(!eval_node(None, &scope));
        assert!(eval_node(Some(&node("not")), &scope));
    }

    #[test]
    fn test_scope_lookup_and_coercion() {
        let scope = build_scope(&sample(), &[], &Map::new());

        let gt = cmp("gt", serde_json::json!("$value"), serde_json::json!(25));
        assert!(eval_node(Some(&gt), &scope));

        let lt = cmp("lt", serde_json::json!("$value"), serde_json::json!("25"));
        assert!(!eval_node(Some(&lt), &scope));

        // Unknown scope name resolves to null, which is NaN numerically.
        let nan = cmp("gt", serde_json::json!("$missing"), serde_json::json!(0));
        assert!(!eval_node(Some(&nan), &scope));

        // eq is strict: number 27 is not the string "27".
        let eq = cmp("eq", serde_json::json!("$value"), serde_json::json!("27"));
        assert!(!eval_node(Some(&eq), &scope));
        let eq = cmp("eq", serde_json::json!("$sensorType"), serde_json::json!("temperature"));
        assert!(eval_node(Some(&eq), &scope));

        let unknown = cmp("xor", serde_json::json!(1), serde_json::json!(1));
        assert!(!eval_node(Some(&unknown), &scope));
    }

    #[test]
    fn test_variable_resolution_order() {
        let sample = sample();
        let mut context = Map::new();
        context.insert("stage".to_string(), serde_json::json!("flowering"));
        context.insert(
            "device".to_string(),
            serde_json::json!({ "calibration": 0.5 }),
        );

        // constant: literal verbatim.
        let var = RuleVariable {
            name: "limit".to_string(),
            source: VariableSource::Constant,
            key: None,
            value: Some(serde_json::json!(30)),
        };
        assert_eq!(resolve_variable(&var, &sample, &context), serde_json::json!(30));

        // device: sample field wins, context.device is the fallback.
        let var = RuleVariable {
            name: "v".to_string(),
            source: VariableSource::Device,
            key: Some("value".to_string()),
            value: None,
        };
        assert_eq!(resolve_variable(&var, &sample, &context), serde_json::json!(27.0));
        let var = RuleVariable {
            name: "cal".to_string(),
            source: VariableSource::Device,
            key: Some("calibration".to_string()),
            value: None,
        };
        assert_eq!(resolve_variable(&var, &sample, &context), serde_json::json!(0.5));

        // context: context wins over the sample.
        let var = RuleVariable {
            name: "stage".to_string(),
            source: VariableSource::Context,
            key: Some("stage".to_string()),
            value: None,
        };
        assert_eq!(
            resolve_variable(&var, &sample, &context),
            serde_json::json!("flowering")
        );

        // telemetry: sample field, literal as fallback.
        let var = RuleVariable {
            name: "t".to_string(),
            source: VariableSource::Telemetry,
            key: Some("unknown_field".to_string()),
            value: Some(serde_json::json!(42)),
        };
        assert_eq!(resolve_variable(&var, &sample, &context), serde_json::json!(42));
    }

    #[test]
    fn test_declared_variables_enter_scope() {
        let variables = vec![RuleVariable {
            name: "limit".to_string(),
            source: VariableSource::Constant,
            key: None,
            value: Some(serde_json::json!(25)),
        }];
        let scope = build_scope(&sample(), &variables, &Map::new());

        let gt = cmp("gt", serde_json::json!("$value"), serde_json::json!("$limit"));
        assert!(eval_node(Some(&gt), &scope));
    }
}
