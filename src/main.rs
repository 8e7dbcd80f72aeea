//! CLI entry point for the rental rater.
//!
//! Loads the neighbourhood reference list and listing rows, then reports
//! per-neighbourhood averages and revenue-optimal prices. Also provides a
//! cleaning pass that reduces a raw listings export to the columns used here.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rental_rater::clean::clean_listings;
use rental_rater::config::EstimatorConfig;
use rental_rater::output::{log_summary, print_json, print_pretty, write_json, write_records};
use rental_rater::parser::open_source;
use rental_rater::registry::{ListingsRegistry, UnknownNeighbourhoodPolicy};
use rental_rater::stats::{NeighbourhoodStats, RegistryReport};
use std::ffi::OsStr;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "rental_rater")]
#[command(about = "Neighbourhood statistics and optimal nightly prices for short-term rentals", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// CSV of reference neighbourhood names (may be .gz)
    #[arg(short, long, default_value = "data/neighbourhoods.csv")]
    neighbourhoods: PathBuf,

    /// CSV of listings (may be .gz)
    #[arg(short, long, default_value = "data/important-airbnb-data.csv")]
    listings: PathBuf,

    /// Estimator config JSON (falls back to RATER_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip listings whose neighbourhood is not in the reference list
    #[arg(long, default_value_t = false)]
    skip_unknown: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load all listings and report statistics for every neighbourhood
    Report {
        #[command(flatten)]
        sources: SourceArgs,

        /// Print the full report as JSON on stdout
        #[arg(long, default_value_t = false)]
        json: bool,

        /// CSV file to write one summary row per neighbourhood to
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// JSON file to write the full report to
        #[arg(long)]
        json_output: Option<PathBuf>,
    },
    /// Show the revenue-optimal nightly price for one neighbourhood
    Optimal {
        #[command(flatten)]
        sources: SourceArgs,

        /// Neighbourhood name, or a geocoder place name with a configured alias
        #[arg(value_name = "NEIGHBOURHOOD")]
        name: String,
    },
    /// List reference neighbourhoods with their listing counts
    Neighbourhoods {
        #[command(flatten)]
        sources: SourceArgs,
    },
    /// Reduce a raw listings export to the columns the estimator reads
    Clean {
        /// Raw listings CSV (may be .gz)
        #[arg(short, long, default_value = "data/listings.csv")]
        input: PathBuf,

        /// Cleaned CSV to write
        #[arg(short, long, default_value = "data/important-airbnb-data.csv")]
        output: PathBuf,

        /// Minimum available days per year (defaults to the config value)
        #[arg(short, long)]
        min_availability: Option<u32>,

        /// Estimator config JSON (falls back to RATER_CONFIG)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/rental_rater.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("rental_rater.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Report {
            sources,
            json,
            output,
            json_output,
        } => {
            let registry = load_registry(&sources)?;
            let report = RegistryReport::from_registry(&registry);

            for stats in &report.neighbourhoods {
                print_pretty(stats);
                if !json {
                    log_summary(stats);
                }
            }

            if json {
                print_json(&report)?;
            }
            if let Some(path) = output {
                write_records(&path, &report.neighbourhoods)?;
                info!(path = %path.display(), "CSV report written");
            }
            if let Some(path) = json_output {
                write_json(&path, &report)?;
                info!(path = %path.display(), "JSON report written");
            }
        }
        Commands::Optimal { sources, name } => {
            let registry = load_registry(&sources)?;
            let Some(neighbourhood) = registry.resolve(&name) else {
                anyhow::bail!("no reference neighbourhood matches {name:?}");
            };

            let agg = registry.get(neighbourhood)?;
            let optimal = agg.optimal_price();
            if !optimal.is_estimate() {
                warn!(
                    neighbourhood,
                    listings = agg.listing_count(),
                    "Not enough listings per price point for an estimate"
                );
            }

            info!(
                neighbourhood,
                listings = agg.listing_count(),
                avg_price = ?agg.average_price_per_night().ok(),
                avg_weekly_income = ?agg.average_weekly_income().ok(),
                optimal_price = optimal.price,
                weekly_revenue = optimal.weekly_revenue,
                weekly_bookings = optimal.weekly_bookings,
                "Optimal price"
            );
        }
        Commands::Neighbourhoods { sources } => {
            let registry = load_registry(&sources)?;
            let total = registry.total_listings();

            for agg in registry.aggregates() {
                let stats = NeighbourhoodStats::from_aggregate(agg);
                info!(
                    neighbourhood = %stats.neighbourhood,
                    listings = stats.listings,
                    share_pct = stats.listing_share_pct(total),
                    exempt = stats.exempt,
                    "Neighbourhood"
                );
            }
            info!(
                neighbourhoods = registry.neighbourhoods().len(),
                total_listings = total,
                "Neighbourhood list summary"
            );
        }
        Commands::Clean {
            input,
            output,
            min_availability,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let min_availability = min_availability.unwrap_or(config.min_availability_days);

            let reader = open_source(&input)
                .with_context(|| format!("opening {}", input.display()))?;
            let writer = BufWriter::new(
                File::create(&output).with_context(|| format!("creating {}", output.display()))?,
            );

            let summary = clean_listings(reader, writer, min_availability)?;
            info!(
                input = %input.display(),
                output = %output.display(),
                rows_read = summary.rows_read,
                rows_written = summary.rows_written,
                "Clean complete"
            );
        }
    }

    Ok(())
}

/// Reads the estimator config from `path`, then `RATER_CONFIG`, falling
/// back to defaults when neither is set.
fn load_config(path: Option<&Path>) -> Result<EstimatorConfig> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("RATER_CONFIG").map(PathBuf::from));

    match path {
        Some(path) => {
            let config = EstimatorConfig::load(&path)
                .with_context(|| format!("loading config {}", path.display()))?;
            info!(
                path = %path.display(),
                exempt = config.exempt_neighbourhoods.len(),
                aliases = config.aliases.len(),
                "Config loaded"
            );
            Ok(config)
        }
        None => {
            info!("No config given, using defaults");
            Ok(EstimatorConfig::default())
        }
    }
}

#[tracing::instrument(skip(sources), fields(listings = %sources.listings.display()))]
fn load_registry(sources: &SourceArgs) -> Result<ListingsRegistry> {
    let config = load_config(sources.config.as_deref())?;
    let on_unknown = if sources.skip_unknown {
        UnknownNeighbourhoodPolicy::Skip
    } else {
        UnknownNeighbourhoodPolicy::Fail
    };

    let (registry, summary) =
        ListingsRegistry::load_csv(config, &sources.neighbourhoods, &sources.listings, on_unknown)?;

    if summary.skipped_malformed > 0 {
        warn!(
            skipped = summary.skipped_malformed,
            "Some listing rows were malformed and skipped"
        );
    }
    Ok(registry)
}
