use rusqlite::{params, params_from_iter, types::Value, Connection};
use std::collections::BTreeSet;

use logindash_models::LoginRow;

pub fn insert_login(
    conn: &Connection,
    username: Option<&str>,
    login_timestamp: Option<&str>,
) -> Result<i64, rusqlite::Error> {
    conn.execute(
        "INSERT INTO login_events (username, login_timestamp) VALUES (?1, ?2)",
        params![username, login_timestamp],
    )?;
    Ok(conn.last_insert_rowid())
}

/// All login rows except those of `excluded` users. Rows with a NULL username
/// are returned as-is.
pub fn list_login_rows(
    conn: &Connection,
    excluded: &BTreeSet<String>,
) -> Result<Vec<LoginRow>, rusqlite::Error> {
    let mut sql = String::from("SELECT username, login_timestamp FROM login_events");
    if !excluded.is_empty() {
        let placeholders: Vec<String> = (1..=excluded.len()).map(|i| format!("?{i}")).collect();
        sql.push_str(&format!(
            " WHERE username IS NULL OR username NOT IN ({})",
            placeholders.join(", ")
        ));
    }
    sql.push_str(" ORDER BY id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(excluded.iter()), |row| {
        Ok(LoginRow {
            username: row.get(0)?,
            login_timestamp: json_value(row.get(1)?),
        })
    })?;
    rows.collect()
}

fn json_value(value: Value) -> Option<serde_json::Value> {
    match value {
        Value::Null | Value::Blob(_) => None,
        Value::Text(s) => Some(serde_json::Value::String(s)),
        Value::Integer(i) => Some(i.into()),
        Value::Real(f) => serde_json::Number::from_f64(f).map(serde_json::Value::Number),
    }
}
