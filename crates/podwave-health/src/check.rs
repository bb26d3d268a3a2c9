//! Evaluation of a workload's `check` clause against a probe response.
//!
//! The body is decoded as JSON and the clause's field is looked up by a
//! dot-separated path (`status.ready`, `checks.0.state`). Numbers compare
//! numerically; strings, booleans and null only compare for (in)equality
//! with a value of the same JSON type. Anything else (missing field,
//! undecodable body, mismatched types) fails the check.

use serde_json::Value;
use tracing::trace;

use podwave_core::{CheckClause, Condition};

/// Whether `body` satisfies `check`.
pub fn evaluate(check: &CheckClause, body: &[u8]) -> bool {
    let decoded: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            trace!(error = %e, field = %check.field, "response body is not JSON");
            return false;
        }
    };

    let Some(actual) = lookup(&decoded, &check.field) else {
        trace!(field = %check.field, "check field missing from response");
        return false;
    };

    compare(check.condition, actual, &check.value)
}

/// Resolve a dot-separated path. Numeric segments index into arrays.
fn lookup<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(root, |value, segment| match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn compare(condition: Condition, actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => {
            let (Some(a), Some(b)) = (a.as_f64(), b.as_f64()) else {
                return false;
            };
            match condition {
                Condition::Equals => a == b,
                Condition::NotEquals => a != b,
                Condition::GreaterThan => a > b,
                Condition::LessThan => a < b,
            }
        }
        (Value::String(_), Value::String(_))
        | (Value::Bool(_), Value::Bool(_))
        | (Value::Null, Value::Null)
        | (Value::Array(_), Value::Array(_))
        | (Value::Object(_), Value::Object(_)) => match condition {
            Condition::Equals => actual == expected,
            Condition::NotEquals => actual != expected,
            Condition::GreaterThan | Condition::LessThan => false,
        },
        _ => false,
    }
}
