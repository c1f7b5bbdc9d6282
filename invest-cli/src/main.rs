//! Terminal front end for the story refinement bot.
//!
//! Reads stories and button commands line by line from stdin:
//!
//! ```bash
//! ANTHROPIC_API_KEY=... INVEST_DB_PATH=corpus.db cargo run -p invest-cli -- --session me
//! ```

mod headless;

use claude::Claude;
use invest_core::{spawn_maintenance, BotConfig, ClaudeJudge, MemoryStore, SqliteStore, Store, StoryBot};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// How often expired cache entries and idle sessions are dropped.
const MAINTENANCE_PERIOD: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    if std::env::var("ANTHROPIC_API_KEY").is_err() {
        eprintln!("Error: ANTHROPIC_API_KEY environment variable not set.");
        eprintln!("Please set it in .env file or with: export ANTHROPIC_API_KEY=your_key_here");
        std::process::exit(1);
    }

    let config = BotConfig::from_env()?;

    let store: Arc<dyn Store> = match std::env::var("INVEST_DB_PATH") {
        Ok(path) if !path.trim().is_empty() => {
            info!(path = path.trim(), "using SQLite corpus");
            Arc::new(SqliteStore::open(path.trim()).await?)
        }
        _ => {
            info!("INVEST_DB_PATH not set, corpus lives in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let judge = match std::env::var("INVEST_MODEL") {
        Ok(model) => ClaudeJudge::new(Claude::from_env()?.with_model(model)),
        Err(_) => ClaudeJudge::from_env()?,
    };
    let judge = Arc::new(judge);

    let bot = Arc::new(StoryBot::new(store, judge, config));
    if !bot.judge_health().await {
        warn!("Claude API did not answer the health check, analyses may fail");
    }
    let maintenance = spawn_maintenance(Arc::clone(&bot), MAINTENANCE_PERIOD);

    let options = headless::HeadlessOptions::from_args(&args);
    let result = headless::run(bot, options).await;

    maintenance.abort();
    result.map_err(Into::into)
}

fn print_help() {
    println!("invest - INVEST user story assistant");
    println!();
    println!("USAGE:");
    println!("    invest [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --session <ID>       Session id to talk as (default: local)");
    println!("    --export-dir <DIR>   Where exported files are written (default: .)");
    println!("    -h, --help           Print this help");
    println!();
    println!("ENVIRONMENT:");
    println!("    ANTHROPIC_API_KEY    Required");
    println!("    INVEST_MODEL         Claude model to use");
    println!("    INVEST_DB_PATH       SQLite corpus file (in-memory when unset)");
    println!("    INVEST_*             Thresholds, limits and timeouts, see BotConfig");
    println!("    RUST_LOG             Log filter (default: info)");
}
