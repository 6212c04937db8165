use async_trait::async_trait;
use logindash_models::LoginRow;
use std::collections::BTreeSet;
use std::time::Duration;

use crate::storage::*;

/// Connection settings for the hosted `login_events` table.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
    pub service_role_key: Option<String>,
    /// Use the service-role key when one is configured.
    pub service_mode: bool,
    pub table: String,
    pub page_size: usize,
    pub timeout: Duration,
}

impl SupabaseConfig {
    pub fn new(url: &str, anon_key: &str) -> Self {
        Self {
            url: url.to_string(),
            anon_key: anon_key.to_string(),
            service_role_key: None,
            service_mode: true,
            table: "login_events".to_string(),
            page_size: 1000,
            timeout: Duration::from_secs(10),
        }
    }

    /// Service-role key in service mode, anon key otherwise or when no
    /// service-role key is set.
    pub fn api_key(&self) -> &str {
        match &self.service_role_key {
            Some(key) if self.service_mode && !key.is_empty() => key,
            _ => &self.anon_key,
        }
    }
}

/// Reads login rows through the PostgREST API of a Supabase project.
pub struct SupabaseSource {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    page_size: usize,
}

/// Order that makes limit/offset paging stable. Rows with equal keys are
/// interchangeable for aggregation.
const PAGE_ORDER: &str = "username.asc.nullslast,login_timestamp.asc.nullslast";

struct Page {
    rows: Vec<LoginRow>,
    len: usize,
    /// Total matching rows, from `Content-Range` when the server reports it.
    total: Option<usize>,
}

impl SupabaseSource {
    pub fn new(config: &SupabaseConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}/rest/v1/{}",
                config.url.trim_end_matches('/'),
                config.table
            ),
            api_key: config.api_key().to_string(),
            page_size: config.page_size.max(1),
        })
    }

    async fn fetch_page(
        &self,
        excluded: &BTreeSet<String>,
        offset: usize,
    ) -> Result<Page, SourceError> {
        let mut query: Vec<(&str, String)> =
            vec![("select", "username,login_timestamp".to_string())];
        for user in excluded {
            query.push(("username", format!("neq.{user}")));
        }
        query.push(("order", PAGE_ORDER.to_string()));
        query.push(("limit", self.page_size.to_string()));
        query.push(("offset", offset.to_string()));

        let resp = self
            .client
            .get(&self.endpoint)
            .query(&query)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .header("Prefer", "count=exact")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let total = resp
            .headers()
            .get(reqwest::header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(content_range_total);

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| SourceError::UnexpectedShape(e.to_string()))?;
        let items = match body {
            serde_json::Value::Array(items) => items,
            other => {
                return Err(SourceError::UnexpectedShape(format!(
                    "expected a JSON array of rows, got {}",
                    kind(&other)
                )))
            }
        };

        let len = items.len();
        let mut rows = Vec::with_capacity(len);
        let mut skipped = 0;
        for item in items {
            match serde_json::from_value::<LoginRow>(item) {
                Ok(row) => rows.push(row),
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::warn!(skipped, offset, "skipped login rows that are not objects of the expected shape");
        }
        Ok(Page { rows, len, total })
    }
}

/// Total from a PostgREST `Content-Range` header such as `0-999/2345` or
/// `*/0`. `None` when the total is unknown (`*`).
fn content_range_total(value: &str) -> Option<usize> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

fn kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[async_trait]
impl EventSource for SupabaseSource {
    async fn fetch(&self, excluded: &BTreeSet<String>) -> Result<Vec<LoginRow>, SourceError> {
        let mut rows = Vec::new();
        let mut offset = 0;
        // The server may cap each response below `page_size`, so a short page
        // does not mean the end of the table.
        loop {
            let page = self.fetch_page(excluded, offset).await?;
            let exhausted = page.len == 0;
            rows.extend(page.rows);
            offset += page.len;
            if exhausted || page.total.is_some_and(|total| offset >= total) {
                break;
            }
        }
        tracing::debug!(rows = rows.len(), excluded = excluded.len(), "fetched login rows from supabase");
        Ok(rows)
    }

    fn name(&self) -> &'static str {
        "supabase"
    }
}
