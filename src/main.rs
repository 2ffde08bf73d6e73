mod catalog;
mod error;
mod metrics;
mod models;
mod pipeline;
mod settings;
mod sink;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use catalog::SpotifyClient;
use metrics::{format_duration, RunSummary};
use pipeline::PipelineOptions;
use settings::{Overrides, Settings};

#[derive(Parser)]
#[command(name = "track_features", about = "Fetch tracks and their audio features into one CSV")]
struct Cli {
    /// Settings file (TOML/JSON/YAML); defaults to ./catalog_fetch.* if present
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search, dedup, look up audio features, merge and write the CSV
    Run {
        /// Total search results to request
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Output CSV path; `{date}` expands to DDMMYYYY
        #[arg(short, long)]
        output: Option<String>,
        /// Search query predicate (e.g. "year:2018")
        #[arg(short, long)]
        query: Option<String>,
        /// Stop paging at the first empty page instead of spending the whole budget
        #[arg(long)]
        stop_on_empty: bool,
    },
    /// Print the resolved settings with secrets redacted
    ShowConfig,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .try_init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            limit,
            output,
            query,
            stop_on_empty,
        } => {
            let overrides = Overrides {
                config_file: cli.config,
                total_results: limit,
                output_path: output,
                query,
                stop_on_empty_page: stop_on_empty,
            };
            let settings = Settings::load(&overrides).context("Failed to load settings")?;
            run(&settings)
        }
        Commands::ShowConfig => {
            let overrides = Overrides {
                config_file: cli.config,
                ..Default::default()
            };
            let settings = Settings::load(&overrides).context("Failed to load settings")?;
            println!("{:#?}", settings);
            println!("Output file: {}", settings.resolved_output_path().display());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn run(settings: &Settings) -> anyhow::Result<()> {
    info!(settings_loaded = ?settings, "Starting track feature fetch");

    let client = SpotifyClient::from_settings(settings).context("Failed to build catalog client")?;
    let opts = PipelineOptions::from_settings(settings);
    let output = settings.resolved_output_path();

    println!(
        "Fetching up to {} results for {:?} ({} per page, lookups of {})...",
        opts.plan.total, opts.query.predicate, opts.plan.page_size, opts.batch_size
    );

    let mut summary = RunSummary::default();
    let built = pipeline::build_dataset(&client, &opts, &mut summary);
    let dataset = match built {
        Ok(dataset) => dataset,
        Err(e) => {
            summary.print();
            return Err(e).context("Pipeline aborted");
        }
    };

    if dataset.is_empty() {
        println!("No tracks had audio features; writing header only.");
    }
    sink::write_csv(&dataset, &output)?;
    summary.output = Some(output);
    summary.print();
    Ok(())
}
