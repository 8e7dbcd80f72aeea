//! CSV parsing for the neighbourhood reference list and listing rows.
//!
//! Listing fields arrive as text and are validated here before they reach
//! an aggregate. Sources whose path ends in `.gz` are decompressed on the fly.

use crate::error::{RaterError, Result};
use crate::neighbourhood::ListingObservation;
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

/// A row of the neighbourhood reference source.
#[derive(Debug, Clone, Deserialize)]
pub struct NeighbourhoodRow {
    pub neighbourhood: String,
}

/// A raw listing row. Every field is optional so that rows with gaps can
/// be detected and skipped instead of failing the whole read.
///
/// Accepts both the raw dataset column names (`neighbourhood_cleansed`,
/// `review_scores_rating`, `availability_365`) and the short names.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingRow {
    pub id: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub price: Option<String>,
    pub neighbourhood_cleansed: Option<String>,
    pub neighbourhood: Option<String>,
    #[serde(alias = "review_scores_rating")]
    pub review_score: Option<String>,
    #[serde(alias = "availability_365")]
    pub available_days_in_year: Option<String>,
}

fn required<'a>(row: u64, name: &str, value: &'a Option<String>) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(RaterError::malformed(row, format!("missing {name}"))),
    }
}

fn number(row: u64, name: &str, value: &str) -> Result<f64> {
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(RaterError::malformed(row, format!("invalid {name}: {value:?}"))),
    }
}

impl ListingRow {
    /// The neighbourhood this row belongs to. The cleansed column wins when
    /// both are present, since raw datasets also carry a free-text
    /// `neighbourhood` column.
    pub fn neighbourhood_name(&self) -> Option<&str> {
        [&self.neighbourhood_cleansed, &self.neighbourhood]
            .into_iter()
            .filter_map(|v| v.as_deref().map(str::trim))
            .find(|v| !v.is_empty())
    }

    /// Validates the row and splits it into its neighbourhood name and the
    /// observation to record. `row` is the 1-based data row index used in
    /// error messages.
    pub fn into_observation(self, row: u64, days_in_year: u32) -> Result<(String, ListingObservation)> {
        let neighbourhood = self
            .neighbourhood_name()
            .ok_or_else(|| RaterError::malformed(row, "missing neighbourhood"))?
            .to_string();

        let id = required(row, "id", &self.id)?.to_string();
        let latitude = number(row, "latitude", required(row, "latitude", &self.latitude)?)?;
        let longitude = number(row, "longitude", required(row, "longitude", &self.longitude)?)?;

        let raw_price = required(row, "price", &self.price)?;
        let price = parse_price(raw_price)
            .ok_or_else(|| RaterError::malformed(row, format!("invalid price: {raw_price:?}")))?;

        let review_score = number(
            row,
            "review_score",
            required(row, "review_score", &self.review_score)?,
        )?;

        let raw_available = required(row, "available_days_in_year", &self.available_days_in_year)?;
        let available_days = parse_available_days(raw_available)
            .filter(|days| *days <= days_in_year)
            .ok_or_else(|| {
                RaterError::malformed(row, format!("invalid available_days_in_year: {raw_available:?}"))
            })?;

        Ok((
            neighbourhood,
            ListingObservation {
                id,
                latitude,
                longitude,
                price,
                review_score,
                available_days,
            },
        ))
    }
}

/// Parses a nightly price such as `"$1,250.00"`, dropping currency symbols,
/// thousands separators, and surrounding whitespace.
///
/// Returns `None` for anything that is not a finite, non-negative amount.
pub fn parse_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | ',' | ' '))
        .collect();

    match cleaned.parse::<f64>() {
        Ok(price) if price.is_finite() && price >= 0.0 => Some(price),
        _ => None,
    }
}

/// Accepts integer text, and integral decimals such as `"12.0"` that some
/// exports produce.
fn parse_available_days(raw: &str) -> Option<u32> {
    if let Ok(days) = raw.parse::<u32>() {
        return Some(days);
    }
    let days = raw.parse::<f64>().ok()?;
    (days.fract() == 0.0 && days >= 0.0 && days <= f64::from(u32::MAX)).then_some(days as u32)
}

/// Opens `path` for reading, decompressing it when the name ends in `.gz`.
pub fn open_source(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path)?;
    let gzipped = path.extension().and_then(|e| e.to_str()) == Some("gz");
    debug!(path = %path.display(), gzipped, "Opening source");

    if gzipped {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Builds a CSV reader over `path`. Rows may be shorter than the header;
/// the missing fields come through as `None`.
pub fn csv_reader(path: &Path) -> Result<csv::Reader<Box<dyn Read>>> {
    Ok(csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(open_source(path)?))
}

/// Reads every reference neighbourhood name from `path`, skipping blank names.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn read_neighbourhoods(path: &Path) -> Result<Vec<NeighbourhoodRow>> {
    let mut rdr = csv_reader(path)?;
    let mut rows = Vec::new();

    for result in rdr.deserialize() {
        let row: NeighbourhoodRow = result?;
        if row.neighbourhood.trim().is_empty() {
            continue;
        }
        rows.push(NeighbourhoodRow {
            neighbourhood: row.neighbourhood.trim().to_string(),
        });
    }

    debug!(count = rows.len(), "Neighbourhoods read");
    Ok(rows)
}
