use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// --- Raw input ---

/// A row of the `login_events` table as the event source returns it.
/// Both columns may be null upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoginRow {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub login_timestamp: Option<serde_json::Value>,
}

impl LoginRow {
    pub fn new(username: &str, login_timestamp: &str) -> Self {
        Self {
            username: Some(username.to_string()),
            login_timestamp: Some(serde_json::Value::String(login_timestamp.to_string())),
        }
    }
}

/// Timestamp carried by a login event before normalisation to UTC.
#[derive(Debug, Clone, PartialEq)]
pub enum Timestamp {
    /// ISO-8601-like text, parsed lazily by the aggregator.
    Text(String),
    /// Already a structured instant.
    Instant(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoginEvent {
    pub username: Option<String>,
    pub timestamp: Option<Timestamp>,
}

impl LoginEvent {
    pub fn new(username: &str, timestamp: &str) -> Self {
        Self {
            username: Some(username.to_string()),
            timestamp: Some(Timestamp::Text(timestamp.to_string())),
        }
    }

    pub fn at(username: &str, instant: DateTime<Utc>) -> Self {
        Self {
            username: Some(username.to_string()),
            timestamp: Some(Timestamp::Instant(instant)),
        }
    }
}

impl From<LoginRow> for LoginEvent {
    fn from(row: LoginRow) -> Self {
        // Only strings are a recognised representation on the wire.
        let timestamp = match row.login_timestamp {
            Some(serde_json::Value::String(s)) => Some(Timestamp::Text(s)),
            _ => None,
        };
        Self {
            username: row.username,
            timestamp,
        }
    }
}

// --- Report ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveDaysItem {
    pub username: String,
    pub display_name: String,
    pub active_days: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastLoginItem {
    pub username: String,
    pub display_name: String,
    /// Serialized as `YYYY-MM-DD`.
    pub last_login_date: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginSummary {
    pub distinct_user_count: i64,
    pub today_users: Vec<String>,
    pub active_days: Vec<ActiveDaysItem>,
    pub last_logins: Vec<LastLoginItem>,
}
