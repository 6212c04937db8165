use rusqlite::Connection;

pub fn init_db(path: &str) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open(path)?;

    // Enable WAL mode for concurrent reads
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS login_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT,
            login_timestamp TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_login_events_username ON login_events(username);
        ",
    )?;

    Ok(conn)
}
