//! Command line entry point for bracket-rating
//!
//! Replays match feeds into a rating store and prints the resulting
//! standings, histories and records.

use anyhow::{Context, Result};
use bracket_rating::config::{AppConfig, StorageBackend};
use bracket_rating::feed::{DeltaPublisher, InMemoryDeltaPublisher, JsonLinesDeltaPublisher};
use bracket_rating::ingest::MatchFeed;
use bracket_rating::rating::TimeRange;
use bracket_rating::runner::BatchReport;
use bracket_rating::service::AppState;
use bracket_rating::standings::{HeadToHeadClass, Leaderboard, LeaderboardOptions, MatchRecords};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Bracket Rating - strength-of-field adjusted skill ratings
#[derive(Parser)]
#[command(
    name = "bracket-rating",
    version,
    about = "Skill ratings for tournament results",
    long_about = "Bracket Rating replays decided tournament matches into a rating history. \
                 Rating changes come from an Elo or Glicko-style update scaled by the \
                 strength of each round's field."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        global = true,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        global = true,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Enable debug mode
    #[arg(short, long, global = true, help = "Enable debug mode with verbose logging")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rate every match of a feed
    Replay {
        /// Match feed (JSON)
        #[arg(long, value_name = "FILE")]
        feed: PathBuf,

        /// SQLite database to write to (in-memory when omitted)
        #[arg(long, value_name = "FILE")]
        db: Option<PathBuf>,

        /// Write every committed delta to this file as JSON lines
        #[arg(long, value_name = "FILE")]
        deltas_out: Option<PathBuf>,

        /// Rate independent player groups concurrently
        #[arg(long)]
        parallel: bool,

        /// Print Prometheus metrics after the run
        #[arg(long)]
        metrics: bool,
    },

    /// Show the current ranking
    Leaderboard {
        #[arg(long, value_name = "FILE")]
        db: PathBuf,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long, default_value_t = 0)]
        min_matches: u64,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show a player's rating history
    History {
        #[arg(long, value_name = "FILE")]
        db: PathBuf,

        #[arg(long)]
        player: String,

        /// Inclusive start (RFC 3339)
        #[arg(long, value_parser = parse_timestamp)]
        from: Option<DateTime<Utc>>,

        /// Exclusive end (RFC 3339)
        #[arg(long, value_parser = parse_timestamp)]
        to: Option<DateTime<Utc>>,
    },

    /// Show win/loss and head-to-head records
    Records {
        #[arg(long, value_name = "FILE")]
        db: PathBuf,

        #[arg(long)]
        player: Option<String>,
    },
}

fn parse_timestamp(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 timestamp '{}': {}", value, e))
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Load and merge configuration from environment, file and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    let db = match &args.command {
        Command::Replay { db, parallel, .. } => {
            if *parallel {
                config.runner.parallel = true;
            }
            db.clone()
        }
        Command::Leaderboard { db, .. }
        | Command::History { db, .. }
        | Command::Records { db, .. } => Some(db.clone()),
    };
    if let Some(db) = db {
        config.storage.backend = StorageBackend::Sqlite;
        config.storage.database_path = Some(db);
    }

    bracket_rating::config::validate_config(&config)?;
    Ok(config)
}

/// Flip the cancellation flag on Ctrl+C
fn cancel_on_ctrl_c() -> watch::Receiver<bool> {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                warn!("Received SIGINT (Ctrl+C), stopping after the current matches");
                let _ = cancel_tx.send(true);
            }
            Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
        }
    });
    cancel_rx
}

async fn replay(
    state: AppState,
    feed: PathBuf,
    deltas_out: Option<PathBuf>,
    print_metrics: bool,
) -> Result<()> {
    let feed = MatchFeed::from_path(&feed)?;
    let publisher: Arc<dyn DeltaPublisher> = match deltas_out {
        Some(path) => Arc::new(
            JsonLinesDeltaPublisher::create(&path)
                .await
                .with_context(|| format!("Failed to open delta output {}", path.display()))?,
        ),
        None => Arc::new(InMemoryDeltaPublisher::new()),
    };

    let report = state
        .runner(publisher)
        .run(feed, cancel_on_ctrl_c())
        .await
        .context("Batch run failed")?;
    print_report(&report);

    if print_metrics {
        print!("{}", state.metrics().encode_text()?);
    }
    Ok(())
}

fn print_report(report: &BatchReport) {
    println!("Run {}", report.run_id);
    println!("  Groups:    {}", report.groups);
    println!("  Processed: {}", report.processed);
    println!("  Rejected:  {}", report.rejected.len());
    println!("  Skipped:   {}", report.skipped);
    println!("  Published: {}", report.published);
    println!("  Elapsed:   {:.3}s", report.elapsed.as_secs_f64());
    if report.cancelled {
        println!("  Cancelled before completion");
    }
    if let Some(error) = &report.publish_error {
        println!("  Delta feed failed: {}", error);
    }
    for rejection in &report.rejected {
        println!(
            "  ! {} at {}: {}",
            rejection.match_id, rejection.timestamp, rejection.error
        );
    }
}

fn leaderboard(state: &AppState, options: LeaderboardOptions, json: bool) -> Result<()> {
    let board = Leaderboard::from_store(state.store().as_ref(), &options)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&board)?);
        return Ok(());
    }

    println!(
        "{:>4}  {:<24} {:>8} {:>7} {:>8} {:>7}",
        "Rank", "Player", "Rating", "Dev", "Floor", "Played"
    );
    for entry in &board.entries {
        println!(
            "{:>4}  {:<24} {:>8.1} {:>7.1} {:>8.1} {:>7}",
            entry.rank,
            entry.player_id,
            entry.rating,
            entry.deviation,
            entry.conservative_rating,
            entry.matches_played
        );
    }
    Ok(())
}

fn history(
    state: &AppState,
    player: &str,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<()> {
    let range = TimeRange {
        start: from,
        end: to,
    };
    let history = state.store().history(player, range)?;
    if history.is_empty() {
        println!("No history for {}", player);
        return Ok(());
    }

    for snapshot in &history {
        let when = if snapshot.is_initial() {
            "initial".to_string()
        } else {
            snapshot.timestamp.to_rfc3339()
        };
        println!(
            "{:<26} {:>8.1} {:>7.1}  {}",
            when,
            snapshot.rating,
            snapshot.deviation,
            snapshot.match_id.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn records(state: &AppState, player: Option<&str>) -> Result<()> {
    let records = MatchRecords::from_store(state.store().as_ref())?;

    let selected: Vec<_> = match player {
        Some(id) => records.get(id).into_iter().collect(),
        None => records.players.iter().collect(),
    };
    if selected.is_empty() {
        println!("No records found");
    }

    for record in selected {
        println!(
            "{}: {}-{} ({} sets, games {}-{}, {} events, {} rounds)",
            record.player_id,
            record.wins,
            record.losses,
            record.total_sets(),
            record.games_won,
            record.games_lost,
            record.events_attended,
            record.rounds_attended
        );
        for (label, class) in [
            ("positive", HeadToHeadClass::Positive),
            ("even", HeadToHeadClass::Even),
            ("negative", HeadToHeadClass::Negative),
        ] {
            let opponents: Vec<String> = record
                .opponents(class)
                .into_iter()
                .map(|(opponent, h2h)| {
                    if h2h.games_won + h2h.games_lost > 0 {
                        format!("{} {} ({}-{})", opponent, h2h, h2h.games_won, h2h.games_lost)
                    } else {
                        format!("{} {}", opponent, h2h)
                    }
                })
                .collect();
            if !opponents.is_empty() {
                println!("  {:<9} {}", label, opponents.join(", "));
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {:#}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    let state = AppState::new(config)?;

    let result = match args.command {
        Command::Replay {
            feed,
            deltas_out,
            metrics,
            ..
        } => replay(state, feed, deltas_out, metrics).await,
        Command::Leaderboard {
            limit,
            min_matches,
            json,
            ..
        } => leaderboard(&state, LeaderboardOptions { min_matches, limit }, json),
        Command::History {
            player, from, to, ..
        } => history(&state, &player, from, to),
        Command::Records { player, .. } => records(&state, player.as_deref()),
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    } else {
        info!("Done");
    }
    result
}
