//! Aggregator stream normalization.
//!
//! Turns the loosely-typed `recurring_data` payload returned by the gateway
//! into an ordered list of [`RecurringItem`]s. Never fails: anything that does
//! not look like a stream list is treated as zero streams.

use std::cmp::Ordering;

use serde_json::Value;

use crate::types::{Amount, FinanceCategory, RecurringItem, StreamScope};

const INFLOW_KEY: &str = "inflow_streams";
const OUTFLOW_KEY: &str = "outflow_streams";

/// Normalize a raw stream payload into display-ready items.
///
/// Only active streams are kept. The result is sorted ascending by
/// `predicted_next_date`; undated items follow all dated ones in input order.
pub fn normalize_streams(payload: Option<&Value>, scope: StreamScope) -> Vec<RecurringItem> {
    let Some(obj) = payload.and_then(Value::as_object) else {
        return Vec::new();
    };

    let lists: &[&str] = match scope {
        StreamScope::All => &[INFLOW_KEY, OUTFLOW_KEY],
        StreamScope::Outflow => &[OUTFLOW_KEY],
    };

    let mut items: Vec<RecurringItem> = lists
        .iter()
        .filter_map(|key| obj.get(*key).and_then(Value::as_array))
        .flatten()
        .filter(|stream| is_truthy(stream.get("is_active")))
        .map(normalize_stream)
        .collect();

    // sort_by is stable, which keeps undated items in input order.
    items.sort_by(|a, b| compare_next_date(&a.predicted_next_date, &b.predicted_next_date));
    items
}

fn normalize_stream(stream: &Value) -> RecurringItem {
    let amount = nested(stream, "average_amount", "amount")
        .or_else(|| nested(stream, "last_amount", "amount"))
        .map(coerce_number)
        .unwrap_or(0.0);

    let description = stream
        .get("merchant_name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .or_else(|| stream.get("description").and_then(Value::as_str))
        .unwrap_or_default()
        .to_string();

    RecurringItem {
        account_id: account_id(stream.get("account_id")),
        description,
        average_amount: Amount { amount },
        frequency: string_field(stream, "frequency"),
        personal_finance_category: nested(stream, "personal_finance_category", "detailed")
            .and_then(Value::as_str)
            .map(|detailed| FinanceCategory {
                detailed: detailed.to_string(),
            }),
        predicted_next_date: string_field(stream, "predicted_next_date"),
        last_date: string_field(stream, "last_date"),
    }
}

fn compare_next_date(a: &Option<String>, b: &Option<String>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Look up `value[outer][inner]`, treating JSON `null` as absent.
fn nested<'a>(value: &'a Value, outer: &str, inner: &str) -> Option<&'a Value> {
    value
        .get(outer)
        .and_then(|o| o.get(inner))
        .filter(|v| !v.is_null())
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn account_id(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Numbers pass through, numeric strings are parsed, everything else is zero.
fn coerce_number(value: &Value) -> f64 {
    let n = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Value::Bool(true) => 1.0,
        _ => 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
        Some(Value::Null) | None => false,
    }
}
