use clap::{ArgAction, Args, ValueEnum};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::storage::sqlite::SqliteSource;
use crate::storage::supabase::{SupabaseConfig, SupabaseSource};
use crate::storage::{EventSource, SourceError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("failed to set up event source: {0}")]
    Source(#[from] SourceError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Hosted table behind the Supabase REST API
    Supabase,
    /// Local SQLite file
    Sqlite,
}

/// Where login events come from, and whose events to leave out.
#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    #[arg(long, env = "LOGINDASH_SOURCE", value_enum, default_value_t = SourceKind::Supabase)]
    pub source: SourceKind,
    /// SQLite database path (sqlite source)
    #[arg(long, env = "LOGINDASH_DB", default_value = "logindash.db")]
    pub db: String,
    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: Option<String>,
    #[arg(long, env = "SUPABASE_ANON_KEY", hide_env_values = true)]
    pub supabase_anon_key: Option<String>,
    #[arg(long, env = "SUPABASE_SERVICE_ROLE_KEY", hide_env_values = true)]
    pub supabase_service_role_key: Option<String>,
    /// Query with the service-role key when one is configured
    #[arg(long, env = "LOGINDASH_SERVICE_MODE", default_value_t = true, action = ArgAction::Set)]
    pub service_mode: bool,
    #[arg(long, env = "LOGINDASH_TABLE", default_value = "login_events")]
    pub table: String,
    /// Rows requested per upstream page
    #[arg(long, env = "LOGINDASH_PAGE_SIZE", default_value_t = 1000)]
    pub page_size: usize,
    #[arg(long, env = "LOGINDASH_UPSTREAM_TIMEOUT_SECS", default_value_t = 10)]
    pub upstream_timeout_secs: u64,
    /// Account to leave out of every report (repeatable, or comma-separated in the env var)
    #[arg(
        long = "exclude-user",
        env = "LOGINDASH_EXCLUDED_USERS",
        value_delimiter = ','
    )]
    pub excluded_users: Vec<String>,
}

impl SourceArgs {
    pub fn excluded_users(&self) -> BTreeSet<String> {
        self.excluded_users
            .iter()
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn supabase_config(&self) -> Result<SupabaseConfig, ConfigError> {
        let url = non_empty(&self.supabase_url).ok_or(ConfigError::Missing("SUPABASE_URL"))?;
        let anon_key =
            non_empty(&self.supabase_anon_key).ok_or(ConfigError::Missing("SUPABASE_ANON_KEY"))?;

        let mut config = SupabaseConfig::new(url, anon_key);
        config.service_role_key = non_empty(&self.supabase_service_role_key).map(str::to_string);
        config.service_mode = self.service_mode;
        config.table = self.table.clone();
        config.page_size = self.page_size;
        config.timeout = Duration::from_secs(self.upstream_timeout_secs);
        Ok(config)
    }

    pub fn build_source(&self) -> Result<Arc<dyn EventSource>, ConfigError> {
        let source: Arc<dyn EventSource> = match self.source {
            SourceKind::Supabase => Arc::new(SupabaseSource::new(&self.supabase_config()?)?),
            SourceKind::Sqlite => Arc::new(SqliteSource::open(&self.db)?),
        };
        Ok(source)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        source: SourceArgs,
    }

    fn parse(args: &[&str]) -> SourceArgs {
        let mut argv = vec!["logindash"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).unwrap().source
    }

    #[test]
    fn exclude_user_accepts_repeats_and_commas() {
        let args = parse(&[
            "--exclude-user",
            "svc@x.com",
            "--exclude-user",
            "a@x.com, b@x.com,,",
        ]);
        let excluded: Vec<String> = args.excluded_users().into_iter().collect();
        assert_eq!(excluded, vec!["a@x.com", "b@x.com", "svc@x.com"]);
    }

    #[test]
    fn supabase_config_carries_flags() {
        let args = parse(&[
            "--supabase-url",
            "https://proj.supabase.co",
            "--supabase-anon-key",
            "anon",
            "--supabase-service-role-key",
            "service",
            "--service-mode",
            "false",
            "--page-size",
            "250",
            "--upstream-timeout-secs",
            "3",
        ]);
        let config = args.supabase_config().unwrap();
        assert_eq!(config.url, "https://proj.supabase.co");
        assert_eq!(config.api_key(), "anon");
        assert_eq!(config.service_role_key.as_deref(), Some("service"));
        assert_eq!(config.table, "login_events");
        assert_eq!(config.page_size, 250);
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[test]
    fn supabase_config_requires_url_and_key() {
        let mut args = parse(&["--supabase-url", "https://proj.supabase.co", "--supabase-anon-key", "anon"]);
        args.supabase_anon_key = Some("   ".to_string());
        assert!(matches!(
            args.supabase_config(),
            Err(ConfigError::Missing("SUPABASE_ANON_KEY"))
        ));

        args.supabase_url = None;
        assert!(matches!(
            args.supabase_config(),
            Err(ConfigError::Missing("SUPABASE_URL"))
        ));
    }

    #[test]
    fn sqlite_source_opens_database_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("logins.db");
        let args = parse(&["--source", "sqlite", "--db", path.to_str().unwrap()]);

        let source = args.build_source().unwrap();
        assert_eq!(source.name(), "sqlite");
        assert!(path.exists());
    }
}
