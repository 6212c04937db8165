use async_trait::async_trait;
use logindash_models::LoginRow;
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::db_ops;
use crate::storage::*;

/// SQLite-backed event source for local runs and tests.
/// Wraps a `Mutex<Connection>` and delegates to `db_ops`.
pub struct SqliteSource {
    pub conn: Arc<Mutex<Connection>>,
}

impl SqliteSource {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub fn open(path: &str) -> Result<Self, SourceError> {
        let conn = crate::db::init_db(path)?;
        Ok(Self::new(Arc::new(Mutex::new(conn))))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SourceError> {
        self.conn
            .lock()
            .map_err(|_| SourceError::Unavailable("sqlite connection lock poisoned".to_string()))
    }

    pub fn record_login(&self, username: &str, login_timestamp: &str) -> Result<i64, SourceError> {
        let conn = self.lock()?;
        Ok(db_ops::insert_login(&conn, Some(username), Some(login_timestamp))?)
    }
}

#[async_trait]
impl EventSource for SqliteSource {
    async fn fetch(&self, excluded: &BTreeSet<String>) -> Result<Vec<LoginRow>, SourceError> {
        let conn = self.lock()?;
        let rows = db_ops::list_login_rows(&conn, excluded)?;
        tracing::debug!(rows = rows.len(), excluded = excluded.len(), "fetched login rows from sqlite");
        Ok(rows)
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_temp() -> (SqliteSource, TempDir) {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let path = tmp.path().join("logins.db");
        let source = SqliteSource::open(path.to_str().unwrap()).unwrap();
        (source, tmp)
    }

    #[tokio::test]
    async fn fetch_returns_recorded_rows_in_insert_order() {
        let (source, _tmp) = open_temp();
        source.record_login("a@x.com", "2024-01-01T10:00:00Z").unwrap();
        source.record_login("b@x.com", "2024-01-02T08:00:00Z").unwrap();

        let rows = source.fetch(&BTreeSet::new()).await.unwrap();
        assert_eq!(
            rows,
            vec![
                LoginRow::new("a@x.com", "2024-01-01T10:00:00Z"),
                LoginRow::new("b@x.com", "2024-01-02T08:00:00Z"),
            ]
        );
    }

    #[tokio::test]
    async fn fetch_leaves_out_excluded_users_but_keeps_null_usernames() {
        let (source, _tmp) = open_temp();
        source.record_login("a@x.com", "2024-01-01T10:00:00Z").unwrap();
        source.record_login("svc@x.com", "2024-01-01T11:00:00Z").unwrap();
        source.record_login("test@x.com", "2024-01-01T12:00:00Z").unwrap();
        {
            let conn = source.conn.lock().unwrap();
            db_ops::insert_login(&conn, None, Some("2024-01-01T13:00:00Z")).unwrap();
            db_ops::insert_login(&conn, Some("c@x.com"), None).unwrap();
        }

        let excluded: BTreeSet<String> = ["svc@x.com".to_string(), "test@x.com".to_string()].into();
        let rows = source.fetch(&excluded).await.unwrap();

        let names: Vec<Option<&str>> = rows.iter().map(|r| r.username.as_deref()).collect();
        assert_eq!(names, vec![Some("a@x.com"), None, Some("c@x.com")]);
        assert_eq!(rows[2].login_timestamp, None);
    }

    #[tokio::test]
    async fn numeric_timestamps_are_stored_as_text() {
        let (source, _tmp) = open_temp();
        {
            let conn = source.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO login_events (username, login_timestamp) VALUES ('a@x.com', 1704103200)",
                [],
            )
            .unwrap();
        }
        let rows = source.fetch(&BTreeSet::new()).await.unwrap();
        // TEXT affinity converts the integer on insert.
        assert_eq!(rows[0].login_timestamp, Some(serde_json::json!("1704103200")));
    }
}
