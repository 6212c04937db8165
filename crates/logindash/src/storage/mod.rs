pub mod sqlite;
pub mod supabase;

use async_trait::async_trait;
use std::collections::BTreeSet;
use thiserror::Error;

use logindash_models::LoginRow;

/// Failure to obtain login rows. Every variant means the upstream store is
/// unavailable for this request.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("login events request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("login events request returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected upstream response: {0}")]
    UnexpectedShape(String),
    #[error("login events query failed: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("login event store unavailable: {0}")]
    Unavailable(String),
}

// --- Event Source ---
// Supplies raw `login_events` rows. Implementations must leave out rows whose
// username is in `excluded`; the aggregator rejects any that slip through.

#[async_trait]
pub trait EventSource: Send + Sync {
    async fn fetch(&self, excluded: &BTreeSet<String>) -> Result<Vec<LoginRow>, SourceError>;

    /// Short label used in logs.
    fn name(&self) -> &'static str;
}
