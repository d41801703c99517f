//! Small shared utilities

/// Current Unix timestamp in milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a new v4 UUID string
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
