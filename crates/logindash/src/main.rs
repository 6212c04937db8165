use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};

use logindash::aggregator;
use logindash::app::{self, AppState};
use logindash::config::SourceArgs;
use logindash::models::Timestamp;
use logindash::report;
use logindash::storage::sqlite::SqliteSource;

#[derive(Parser)]
#[command(
    name = "logindash",
    about = "Login-activity metrics over a login-events table"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the metrics server
    Serve {
        #[arg(long, env = "LOGINDASH_PORT", default_value = "8080")]
        port: u16,
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Initialize the local SQLite login_events table
    Init {
        #[arg(long, env = "LOGINDASH_DB", default_value = "logindash.db")]
        db: String,
    },
    /// Append a login event to the local SQLite table
    Record {
        #[arg(long, env = "LOGINDASH_DB", default_value = "logindash.db")]
        db: String,
        #[arg(long)]
        username: String,
        /// Login time (ISO-8601); defaults to now
        #[arg(long)]
        at: Option<String>,
    },
    /// Fetch once and print the login summary as JSON
    Summary {
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, source } => {
            let state = AppState::new(source.build_source()?, source.excluded_users());
            app::run_server(port, state).await.context("server error")?;
        }
        Commands::Init { db } => {
            logindash::db::init_db(&db)
                .with_context(|| format!("failed to initialize database at {db}"))?;
            tracing::info!("Database initialized at {}", db);
        }
        Commands::Record { db, username, at } => {
            let at = at.unwrap_or_else(|| Utc::now().to_rfc3339());
            if aggregator::parse_timestamp(&Timestamp::Text(at.clone())).is_none() {
                tracing::warn!(at = %at, "timestamp does not parse; the row will be ignored by summaries");
            }
            let source = SqliteSource::open(&db)?;
            let id = source.record_login(&username, &at)?;
            tracing::info!(id, username = %username, at = %at, "recorded login");
        }
        Commands::Summary { source } => {
            let events = source.build_source()?;
            let summary =
                report::login_summary(events.as_ref(), &source.excluded_users(), Utc::now()).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
