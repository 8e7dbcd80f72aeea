//! Reduces a raw listings export to the columns the estimator reads.
//!
//! Rows missing any required column, with a kept column that is not valid
//! UTF-8, or with fewer available days than the configured minimum, are
//! dropped. Other columns are never decoded.

use crate::error::{RaterError, Result};
use csv::ByteRecord;
use std::io::{Read, Write};
use tracing::{debug, info};

/// Columns kept by the cleaning pass, in output order.
pub const CLEAN_COLUMNS: [&str; 7] = [
    "id",
    "latitude",
    "longitude",
    "price",
    "neighbourhood_cleansed",
    "review_scores_rating",
    "availability_365",
];

const AVAILABILITY: usize = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanSummary {
    pub rows_read: u64,
    pub rows_written: u64,
}

/// Copies the [`CLEAN_COLUMNS`] of every complete row with at least
/// `min_availability` available days from `input` to `output`.
#[tracing::instrument(skip(input, output))]
pub fn clean_listings<R: Read, W: Write>(
    input: R,
    output: W,
    min_availability: u32,
) -> Result<CleanSummary> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(input);
    let headers = rdr.byte_headers()?.clone();

    let indices = CLEAN_COLUMNS
        .iter()
        .map(|column| {
            headers
                .iter()
                .position(|h| h == column.as_bytes())
                .ok_or_else(|| RaterError::malformed(0, format!("missing column {column}")))
        })
        .collect::<Result<Vec<usize>>>()?;

    let mut writer = csv::Writer::from_writer(output);
    writer.write_record(CLEAN_COLUMNS)?;

    let mut summary = CleanSummary::default();
    let mut record = ByteRecord::new();

    while rdr.read_byte_record(&mut record)? {
        summary.rows_read += 1;

        let fields: Option<Vec<&str>> = indices
            .iter()
            .map(|&i| {
                record
                    .get(i)
                    .and_then(|bytes| std::str::from_utf8(bytes).ok())
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
            })
            .collect();
        let Some(fields) = fields else {
            continue;
        };

        match fields[AVAILABILITY].parse::<u32>() {
            Ok(days) if days >= min_availability => {}
            _ => continue,
        }

        writer.write_record(&fields)?;
        summary.rows_written += 1;
    }

    writer.flush()?;
    debug!(rows_read = summary.rows_read, "Listings scanned");
    info!(
        rows_read = summary.rows_read,
        rows_written = summary.rows_written,
        "Listings cleaned"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "\
id,name,latitude,longitude,price,neighbourhood,neighbourhood_cleansed,review_scores_rating,availability_365
1,Sunny flat,37.76,-122.43,\"$1,170.00\",SF,Western Addition,97,77
2,No reviews,37.75,-122.41,$85.00,SF,Mission,,200
3,Always booked,37.74,-122.44,$150.00,SF,Noe Valley,92,0
4,Almost booked,37.74,-122.44,$150.00,SF,Noe Valley,92,3
5,Bad availability,37.74,-122.44,$150.00,SF,Noe Valley,92,n/a
";

    fn run(min_availability: u32) -> (CleanSummary, String) {
        let mut out = Vec::new();
        let summary = clean_listings(RAW.as_bytes(), &mut out, min_availability).unwrap();
        (summary, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_keeps_complete_available_rows() {
        let (summary, out) = run(3);

        assert_eq!(
            summary,
            CleanSummary {
                rows_read: 5,
                rows_written: 2,
            }
        );
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(
            lines[0],
            "id,latitude,longitude,price,neighbourhood_cleansed,review_scores_rating,availability_365"
        );
        assert_eq!(
            lines[1],
            "1,37.76,-122.43,\"$1,170.00\",Western Addition,97,77"
        );
        assert!(lines[2].starts_with("4,"));
    }

    #[test]
    fn test_zero_minimum_keeps_fully_booked() {
        let (summary, _) = run(0);
        assert_eq!(summary.rows_written, 3);
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let raw = "id,latitude,longitude,price\n1,37.7,-122.4,$10\n";
        let result = clean_listings(raw.as_bytes(), Vec::new(), 3);

        assert!(matches!(result, Err(RaterError::MalformedRow { row: 0, .. })));
    }

    #[test]
    fn test_invalid_utf8_only_matters_in_kept_columns() {
        let mut raw = b"id,name,latitude,longitude,price,neighbourhood_cleansed,review_scores_rating,availability_365\n".to_vec();
        raw.extend_from_slice(b"1,Caf\xe9 flat,37.76,-122.43,$90.00,Mission,95,40\n");
        raw.extend_from_slice(b"2,Loft,37.76,-122.43,$90.00,Missi\xf3n,95,40\n");
        raw.extend_from_slice(b"3,Studio,37.75,-122.42,$80.00,Mission,91,12\n");

        let mut out = Vec::new();
        let summary = clean_listings(raw.as_slice(), &mut out, 3).unwrap();

        assert_eq!(
            summary,
            CleanSummary {
                rows_read: 3,
                rows_written: 2,
            }
        );
        let out = String::from_utf8(out).unwrap();
        let ids: Vec<_> = out.lines().skip(1).map(|l| &l[..1]).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }
}
