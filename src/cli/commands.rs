//! CLI commands implementation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::{load_settings, Settings};
use crate::extract;
use crate::models::{FlightRecord, TierStatus};
use crate::normalize;
use crate::orchestrator::Orchestrator;
use crate::request::{Cabin, SearchRequest};

#[derive(Parser)]
#[command(name = "scout")]
#[command(about = "Award availability extraction for airline fare searches")]
#[command(version)]
pub struct Cli {
    /// Data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file (defaults to {data_dir}/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Search a route and extract availability
    Search {
        /// Origin airport code (e.g. SFO)
        #[arg(short, long)]
        origin: String,
        /// Destination airport code (e.g. NRT)
        #[arg(short, long)]
        destination: String,
        /// Departure date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        /// Search award availability instead of cash fares
        #[arg(short, long)]
        award: bool,
        /// Cabin class (economy, business, first)
        #[arg(long, default_value = "economy")]
        cabin: String,
        /// Number of passengers
        #[arg(short, long, default_value = "1")]
        passengers: u8,
        /// Print records as pretty JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Run the extraction tiers over a saved HTML page
    Extract {
        /// Path to the saved page
        file: PathBuf,
        /// Treat the page as an award search
        #[arg(short, long)]
        award: bool,
        /// Origin used to fill gaps in normalization
        #[arg(short, long, default_value = "ORD")]
        origin: String,
        /// Destination used to fill gaps in normalization
        #[arg(short, long, default_value = "LAX")]
        destination: String,
        /// Date used to fill gaps in normalization (defaults to today)
        #[arg(long)]
        date: Option<String>,
        /// Print records as pretty JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Show resolved configuration
    Config,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.data_dir, cli.config);

    match cli.command {
        Commands::Search {
            origin,
            destination,
            date,
            award,
            cabin,
            passengers,
            json,
        } => {
            cmd_search(
                &settings,
                &origin,
                &destination,
                &date,
                award,
                &cabin,
                passengers,
                json,
            )
            .await
        }
        Commands::Extract {
            file,
            award,
            origin,
            destination,
            date,
            json,
        } => cmd_extract(&file, award, &origin, &destination, date, json),
        Commands::Config => cmd_config(&settings),
    }
}

#[allow(clippy::too_many_arguments)]
async fn cmd_search(
    settings: &Settings,
    origin: &str,
    destination: &str,
    date: &str,
    award: bool,
    cabin: &str,
    passengers: u8,
    json: bool,
) -> anyhow::Result<()> {
    let cabin: Cabin = cabin.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let request = SearchRequest::new(origin, destination, date, award)?
        .with_cabin(cabin)
        .with_passengers(passengers);

    if !json {
        println!(
            "{} {} -> {} on {} ({}, {} passenger(s), {})",
            style("Searching").cyan().bold(),
            request.origin(),
            request.destination(),
            request.date(),
            if award { "award" } else { "cash" },
            request.passengers(),
            cabin.display_name(),
        );
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("Working through acquisition strategies...");

    let orchestrator = Orchestrator::new(settings.clone());
    let result = orchestrator.run(&request).await;
    pb.finish_and_clear();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("{} {}", style("Search failed:").red().bold(), e);
            return Err(e.into());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.records)?);
    } else {
        print_summary(&outcome.records);
        println!(
            "{} {} flight(s) via {} after {} attempt(s)",
            style("Done:").green().bold(),
            outcome.records.len(),
            outcome.strategy,
            outcome.attempts,
        );
        if let Some(path) = outcome.results_path {
            println!("Results saved to {}", path.display());
        }
    }
    Ok(())
}

fn cmd_extract(
    file: &Path,
    award: bool,
    origin: &str,
    destination: &str,
    date: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let html = std::fs::read_to_string(file)?;
    let date = date.unwrap_or_else(|| chrono::Utc::now().format("%Y-%m-%d").to_string());
    let request = SearchRequest::new(origin, destination, &date, award)?;

    let (candidates, report) = extract::extract(&html, award);
    let candidate_count = candidates.len();
    let records = normalize::normalize_batch(&candidates, &request);

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    for attempt in &report.attempts {
        let status = match &attempt.status {
            TierStatus::Hit { candidates } => format!("hit ({} candidates)", candidates),
            TierStatus::Empty => "empty".to_string(),
            TierStatus::Failed { reason } => format!("failed: {}", reason),
        };
        println!("  tier {:<8} {}", attempt.tier.name(), status);
    }
    match report.winning_tier {
        Some(tier) => println!("{} {}", style("Winning tier:").green().bold(), tier.name()),
        None => println!("{}", style("No tier produced candidates").yellow()),
    }
    println!(
        "{} candidate(s), {} record(s) after normalization",
        candidate_count,
        records.len()
    );
    print_summary(&records);
    Ok(())
}

fn cmd_config(settings: &Settings) -> anyhow::Result<()> {
    println!("{}", settings.redacted_display());
    Ok(())
}

fn print_summary(records: &[FlightRecord]) {
    if records.is_empty() {
        println!("{}", style("No flights extracted").yellow());
        return;
    }
    for (i, record) in records.iter().take(3).enumerate() {
        println!("  {}. {}", i + 1, record.summary_line());
    }
    if records.len() > 3 {
        println!("  ... and {} more flights", records.len() - 3);
    }
}
