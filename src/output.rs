//! Output formatting and persistence for neighbourhood statistics.
//!
//! Supports logging, JSON serialization, and CSV export.

use crate::error::Result;
use serde::Serialize;
use tracing::{debug, info};

use crate::stats::NeighbourhoodStats;
use csv::WriterBuilder;
use std::fs::File;
use std::path::Path;

/// Logs neighbourhood statistics using Rust's debug pretty-print format.
pub fn print_pretty(stats: &NeighbourhoodStats) {
    debug!("{:#?}", stats);
}

/// Logs one summary line for a neighbourhood.
pub fn log_summary(stats: &NeighbourhoodStats) {
    info!(
        neighbourhood = %stats.neighbourhood,
        listings = stats.listings,
        avg_price = ?stats.avg_price,
        avg_review_score = ?stats.avg_review_score,
        avg_weekly_income = ?stats.avg_weekly_income,
        optimal_price = stats.optimal_price,
        optimal_weekly_revenue = stats.optimal_weekly_revenue,
        "Neighbourhood"
    );
}

/// Prints a value as pretty JSON on stdout.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Writes a value as pretty JSON to `path`, replacing any existing file.
pub fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, value)?;
    debug!(path = %path.display(), "JSON written");
    Ok(())
}

/// Writes one CSV row per neighbourhood to `path`, with a header,
/// replacing any existing file.
pub fn write_records(path: &Path, rows: &[NeighbourhoodStats]) -> Result<()> {
    debug!(path = %path.display(), rows = rows.len(), "Writing CSV records");

    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .from_path(path)?;

    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}
