use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One page of the Jira search API (`/rest/api/*/search`).
///
/// Issues stay opaque JSON; only `fields.updated` is ever read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    #[serde(default)]
    pub issues: Vec<Value>,
    /// Remote-reported size of the result set. Informational: it can move
    /// between requests while the project is being edited.
    #[serde(default)]
    pub total: Option<u64>,
}

pub fn record_updated(record: &Value) -> Option<&str> {
    record
        .get("fields")
        .and_then(|f| f.get("updated"))
        .and_then(Value::as_str)
}

/// Largest `fields.updated` on the page. Jira timestamps are zero-padded
/// ISO-8601, so plain string ordering is chronological.
pub fn max_updated(records: &[Value]) -> Option<&str> {
    records.iter().filter_map(record_updated).max()
}
