use std::cmp::Ordering;

use serde_json::Value;
use valdore_common::backend::{Direction, Document, Query};

/// Cross-type ordering: missing < null < bool < number < string < array < object.
fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None => 0,
        Some(Value::Null) => 1,
        Some(Value::Bool(_)) => 2,
        Some(Value::Number(_)) => 3,
        Some(Value::String(_)) => 4,
        Some(Value::Array(_)) => 5,
        Some(Value::Object(_)) => 6,
    }
}

pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        },
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Run `query` over `docs`, which must be in insertion order. The sort is
/// stable, so ties keep insertion order.
pub fn evaluate(query: &Query, docs: &[Document]) -> Vec<Document> {
    let mut matched: Vec<&Document> = docs.iter().filter(|d| query.matches(d)).collect();

    if !query.order_by.is_empty() {
        matched.sort_by(|a, b| {
            for key in &query.order_by {
                let ord = compare_values(a.get(&key.field), b.get(&key.field));
                let ord = match key.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }

    let limit = query.limit.unwrap_or(usize::MAX);
    matched.into_iter().take(limit).cloned().collect()
}
