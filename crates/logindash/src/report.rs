use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use crate::aggregator;
use crate::storage::{EventSource, SourceError};
use logindash_models::{LoginEvent, LoginSummary};

/// Fetches one snapshot of login rows and aggregates it as of `now`.
pub async fn login_summary(
    source: &dyn EventSource,
    excluded_users: &BTreeSet<String>,
    now: DateTime<Utc>,
) -> Result<LoginSummary, SourceError> {
    let rows = source.fetch(excluded_users).await?;
    let (summary, stats) = aggregator::summarize_with_stats(
        rows.into_iter().map(LoginEvent::from),
        now,
        excluded_users,
    );

    if stats.dropped > 0 || stats.excluded > 0 {
        tracing::info!(
            source = source.name(),
            total = stats.total,
            dropped = stats.dropped,
            excluded = stats.excluded,
            users = summary.distinct_user_count,
            "login summary skipped rows"
        );
    } else {
        tracing::debug!(
            source = source.name(),
            total = stats.total,
            users = summary.distinct_user_count,
            "login summary built"
        );
    }
    Ok(summary)
}
