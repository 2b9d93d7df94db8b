// src/main.rs

//! eventscout CLI.
//!
//! `scrape` runs the full aggregation pipeline and prints the collected
//! events; `validate` checks the configuration without touching the
//! network.

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};

use eventscout::error::Result;
use eventscout::models::{Config, DateWindow, RunState};
use eventscout::pipeline::Orchestrator;

#[derive(Parser, Debug)]
#[command(
    name = "eventscout",
    version,
    about = "Multi-source event listing aggregator"
)]
struct Cli {
    #[arg(short, long, default_value = "data/config.toml")]
    config: String,

    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, normalize, and print events from all configured sources
    Scrape {
        /// First day of the window (YYYY-MM-DD); today when omitted
        #[arg(long)]
        start_date: Option<NaiveDate>,

        /// Days to cover, starting at the window start
        #[arg(long, default_value_t = 31)]
        days: u32,

        /// Only run the named sources (repeatable)
        #[arg(long)]
        source: Vec<String>,

        /// Emit the collection as JSON instead of text lines
        #[arg(long)]
        json: bool,
    },
    /// Validate configuration and source descriptors
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.quiet { "error" } else { "info" };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_level),
    )
    .init();

    match cli.command {
        Command::Scrape {
            start_date,
            days,
            source,
            json,
        } => run_scrape(&cli.config, start_date, days, &source, json).await,
        Command::Validate => run_validate(&cli.config),
    }
}

async fn run_scrape(
    config_path: &str,
    start_date: Option<NaiveDate>,
    days: u32,
    sources: &[String],
    json: bool,
) -> Result<()> {
    let config = Config::load_or_default(config_path);
    let orchestrator = Orchestrator::new(&config)?;

    let tz = config.resolve_timezone()?;
    let start = start_date.unwrap_or_else(|| Utc::now().with_timezone(&tz).date_naive());
    let window = DateWindow::new(start, days);

    let filter = (!sources.is_empty()).then_some(sources);
    let (run, events) = orchestrator.run(window, filter).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&events)?);
    } else {
        for event in &events {
            println!(
                "{} | {} {} | {} | {} | {}",
                event.source,
                event.start.local_date(),
                event.display_time,
                event.title,
                event.location,
                event.link
            );
        }
    }

    eprintln!(
        "{} events from {} sources ({:?})",
        events.len(),
        run.sources.len(),
        run.state()
    );
    for (source, reason) in run.failures() {
        eprintln!("  {source} failed: {reason}");
    }
    if run.state() == RunState::Failed && run.all_sources_failed() {
        eprintln!("  every source failed; the empty result is not a quiet window");
    }

    Ok(())
}

fn run_validate(config_path: &str) -> Result<()> {
    let config = Config::load(config_path)?;
    config.validate()?;

    let mut problems = 0usize;
    for descriptor in &config.sources {
        match descriptor.validate() {
            Ok(()) => println!("ok      {}", descriptor.name),
            Err(e) => {
                problems += 1;
                println!("error   {}: {e}", descriptor.name);
            }
        }
    }

    println!(
        "{} sources checked, {} problem(s), timezone {}",
        config.sources.len(),
        problems,
        config.timezone
    );
    Ok(())
}
