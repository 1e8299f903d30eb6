use chrono::Utc;
use serde_json::{json, Value};
use tracing::{error, info, warn};

const SERVICE: &str = "elearning-backend";
const SLOW_QUERY_MS: u128 = 500;

/// JSON-line event log layered over `tracing`.
#[derive(Debug)]
pub struct StructuredLogger;

impl StructuredLogger {
    pub fn log_request(&self, method: &str, path: &str, user_id: Option<i32>, status: u16) {
        let entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event_type": "http_request",
            "method": method,
            "path": path,
            "user_id": user_id,
            "status_code": status,
            "service": SERVICE
        });

        if status >= 500 {
            error!("{}", entry);
        } else if status >= 400 {
            warn!("{}", entry);
        } else {
            info!("{}", entry);
        }
    }

    pub fn log_database_query(&self, query: &str, duration_ms: u128, result_count: Option<usize>) {
        let entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event_type": "database_query",
            "query_hash": format!("{:x}", md5::compute(query)),
            "query_preview": preview(query, 100),
            "duration_ms": duration_ms,
            "result_count": result_count,
            "service": SERVICE
        });

        if duration_ms > SLOW_QUERY_MS {
            warn!("Slow query detected: {}", entry);
        } else {
            info!("{}", entry);
        }
    }

    pub fn log_error(&self, message: &str, context: Value) {
        let mut entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event_type": "error",
            "error_message": message,
            "service": SERVICE
        });
        merge(&mut entry, context);

        error!("{}", entry);
    }

    pub fn log_business_event(&self, event_name: &str, user_id: Option<i32>, metadata: Value) {
        let mut entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event_type": "business_event",
            "event_name": event_name,
            "user_id": user_id,
            "service": SERVICE
        });
        merge(&mut entry, metadata);

        info!("{}", entry);
    }
}

fn merge(entry: &mut Value, extra: Value) {
    if let (Value::Object(target), Value::Object(source)) = (entry, extra) {
        for (key, value) in source {
            target.insert(key, value);
        }
    }
}

fn preview(query: &str, max_chars: usize) -> String {
    let compact = query.split_whitespace().collect::<Vec<_>>().join(" ");
    match compact.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &compact[..idx]),
        None => compact,
    }
}

pub static LOGGER: StructuredLogger = StructuredLogger;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_adds_metadata_fields() {
        let mut entry = json!({"event_name": "x"});
        merge(&mut entry, json!({"course_id": 3, "paid": true}));
        assert_eq!(entry["course_id"], 3);
        assert_eq!(entry["paid"], true);
        assert_eq!(entry["event_name"], "x");
    }

    #[test]
    fn test_merge_ignores_non_objects() {
        let mut entry = json!({"a": 1});
        merge(&mut entry, Value::Null);
        assert_eq!(entry, json!({"a": 1}));
    }

    #[test]
    fn test_preview_compacts_and_truncates() {
        assert_eq!(preview("SELECT *\n   FROM users", 100), "SELECT * FROM users");
        assert_eq!(preview("SELECT * FROM users", 6), "SELECT...");
    }
}
