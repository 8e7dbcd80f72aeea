//! Neighbourhood registry: the load sweep and the read-only query surface.
//!
//! [`RegistryBuilder`] owns write access while listing rows are routed into
//! their aggregates. [`RegistryBuilder::finish`] hands back an immutable
//! [`ListingsRegistry`] that only answers queries.

use crate::config::EstimatorConfig;
use crate::error::{RaterError, Result};
use crate::neighbourhood::{NeighbourhoodAggregate, OptimalPrice};
use crate::parser::{self, ListingRow, NeighbourhoodRow};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// What to do with a listing whose neighbourhood is not in the reference list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownNeighbourhoodPolicy {
    /// Abort the load with [`RaterError::UnknownNeighbourhood`].
    #[default]
    Fail,
    /// Log the row and keep going.
    Skip,
}

/// Row counts from one load sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub rows_read: u64,
    pub observed: u64,
    pub skipped_malformed: u64,
    pub skipped_unknown: u64,
}

/// Write side of the registry, used for one load sweep.
#[derive(Debug)]
pub struct RegistryBuilder {
    config: EstimatorConfig,
    aggregates: BTreeMap<String, NeighbourhoodAggregate>,
    on_unknown: UnknownNeighbourhoodPolicy,
    summary: LoadSummary,
}

impl RegistryBuilder {
    pub fn new(config: EstimatorConfig, on_unknown: UnknownNeighbourhoodPolicy) -> Self {
        Self {
            config,
            aggregates: BTreeMap::new(),
            on_unknown,
            summary: LoadSummary::default(),
        }
    }

    /// Creates an empty aggregate for a reference name. Repeated names keep
    /// the first aggregate.
    pub fn add_neighbourhood(&mut self, name: &str) {
        if self.aggregates.contains_key(name) {
            debug!(neighbourhood = name, "Duplicate reference neighbourhood");
            return;
        }
        let exempt = self.config.is_exempt(name);
        self.aggregates.insert(
            name.to_string(),
            NeighbourhoodAggregate::new(name, exempt, self.config.policy),
        );
    }

    /// Validates one listing row and routes it to its aggregate.
    ///
    /// Malformed rows are counted and skipped. A row for an unknown
    /// neighbourhood fails or is skipped according to the builder's policy.
    pub fn add_listing(&mut self, row: ListingRow) -> Result<()> {
        self.summary.rows_read += 1;
        let row_number = self.summary.rows_read;

        let (name, observation) = match row.into_observation(row_number, self.config.policy.days_in_year) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.record_malformed(row_number, &e);
                return Ok(());
            }
        };

        let Some(aggregate) = self.aggregates.get_mut(&name) else {
            match self.on_unknown {
                UnknownNeighbourhoodPolicy::Fail => {
                    return Err(RaterError::UnknownNeighbourhood(name));
                }
                UnknownNeighbourhoodPolicy::Skip => {
                    warn!(row = row_number, neighbourhood = %name, "Skipping listing for unknown neighbourhood");
                    self.summary.skipped_unknown += 1;
                    return Ok(());
                }
            }
        };

        aggregate.observe(observation);
        self.summary.observed += 1;
        Ok(())
    }

    /// Counts a listing record that could not be decoded into a row at all.
    pub fn skip_undecodable(&mut self, error: &RaterError) {
        self.summary.rows_read += 1;
        self.record_malformed(self.summary.rows_read, error);
    }

    fn record_malformed(&mut self, row: u64, error: &RaterError) {
        debug!(row, error = %error, "Skipping malformed listing row");
        self.summary.skipped_malformed += 1;
    }

    /// Ends the load sweep.
    pub fn finish(self) -> (ListingsRegistry, LoadSummary) {
        let summary = self.summary;
        info!(
            neighbourhoods = self.aggregates.len(),
            rows_read = summary.rows_read,
            observed = summary.observed,
            skipped_malformed = summary.skipped_malformed,
            skipped_unknown = summary.skipped_unknown,
            "Listings loaded"
        );
        (
            ListingsRegistry {
                config: self.config,
                aggregates: self.aggregates,
            },
            summary,
        )
    }
}

/// Read-only statistics for every reference neighbourhood, keyed by name.
#[derive(Debug, Clone)]
pub struct ListingsRegistry {
    config: EstimatorConfig,
    aggregates: BTreeMap<String, NeighbourhoodAggregate>,
}

impl ListingsRegistry {
    /// Loads the reference names first, then routes every listing row.
    pub fn load(
        config: EstimatorConfig,
        neighbourhoods: impl IntoIterator<Item = NeighbourhoodRow>,
        listings: impl IntoIterator<Item = ListingRow>,
        on_unknown: UnknownNeighbourhoodPolicy,
    ) -> Result<(Self, LoadSummary)> {
        let mut builder = RegistryBuilder::new(config, on_unknown);
        for row in neighbourhoods {
            builder.add_neighbourhood(&row.neighbourhood);
        }
        for row in listings {
            builder.add_listing(row)?;
        }
        Ok(builder.finish())
    }

    /// Same as [`ListingsRegistry::load`], streaming both sources from CSV
    /// files (optionally gzip-compressed).
    #[tracing::instrument(skip_all, fields(neighbourhoods = %neighbourhoods.display(), listings = %listings.display()))]
    pub fn load_csv(
        config: EstimatorConfig,
        neighbourhoods: &Path,
        listings: &Path,
        on_unknown: UnknownNeighbourhoodPolicy,
    ) -> Result<(Self, LoadSummary)> {
        let mut builder = RegistryBuilder::new(config, on_unknown);
        for row in parser::read_neighbourhoods(neighbourhoods)? {
            builder.add_neighbourhood(&row.neighbourhood);
        }

        // Records are read as bytes so a bad encoding only costs its own row.
        let mut rdr = parser::csv_reader(listings)?;
        let headers = rdr.byte_headers()?.clone();
        for result in rdr.byte_records() {
            let decoded = result.and_then(|record| record.deserialize::<ListingRow>(Some(&headers)));
            match decoded {
                Ok(row) => builder.add_listing(row)?,
                Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => return Err(e.into()),
                Err(e) => builder.skip_undecodable(&e.into()),
            }
        }

        Ok(builder.finish())
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Neighbourhood names in alphabetical order.
    pub fn neighbourhoods(&self) -> Vec<&str> {
        self.aggregates.keys().map(String::as_str).collect()
    }

    pub fn aggregates(&self) -> impl Iterator<Item = &NeighbourhoodAggregate> {
        self.aggregates.values()
    }

    pub fn get(&self, neighbourhood: &str) -> Result<&NeighbourhoodAggregate> {
        self.aggregates
            .get(neighbourhood)
            .ok_or_else(|| RaterError::UnknownNeighbourhood(neighbourhood.to_string()))
    }

    /// Maps a place name to a reference neighbourhood: directly when it is
    /// one, otherwise through the configured aliases.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        let name = name.trim();
        if let Some((key, _)) = self.aggregates.get_key_value(name) {
            return Some(key.as_str());
        }
        let target = self.config.alias_target(name)?;
        self.aggregates.get_key_value(target).map(|(key, _)| key.as_str())
    }

    fn map_all<T>(&self, f: impl Fn(&NeighbourhoodAggregate) -> T) -> BTreeMap<&str, T> {
        self.aggregates
            .iter()
            .map(|(name, agg)| (name.as_str(), f(agg)))
            .collect()
    }

    pub fn average_price(&self, neighbourhood: &str) -> Result<f64> {
        self.get(neighbourhood)?.average_price_per_night()
    }

    pub fn average_prices(&self) -> BTreeMap<&str, Result<f64>> {
        self.map_all(NeighbourhoodAggregate::average_price_per_night)
    }

    pub fn average_review_score(&self, neighbourhood: &str) -> Result<f64> {
        self.get(neighbourhood)?.average_review_score()
    }

    pub fn average_review_scores(&self) -> BTreeMap<&str, Result<f64>> {
        self.map_all(NeighbourhoodAggregate::average_review_score)
    }

    pub fn average_weekly_income(&self, neighbourhood: &str) -> Result<f64> {
        self.get(neighbourhood)?.average_weekly_income()
    }

    pub fn average_weekly_incomes(&self) -> BTreeMap<&str, Result<f64>> {
        self.map_all(NeighbourhoodAggregate::average_weekly_income)
    }

    pub fn average_bookings_per_week(&self, neighbourhood: &str) -> Result<f64> {
        self.get(neighbourhood)?.average_bookings_per_week()
    }

    pub fn average_bookings_per_week_all(&self) -> BTreeMap<&str, Result<f64>> {
        self.map_all(NeighbourhoodAggregate::average_bookings_per_week)
    }

    pub fn listing_count(&self, neighbourhood: &str) -> Result<usize> {
        Ok(self.get(neighbourhood)?.listing_count())
    }

    pub fn listing_counts(&self) -> BTreeMap<&str, usize> {
        self.map_all(NeighbourhoodAggregate::listing_count)
    }

    pub fn total_listings(&self) -> usize {
        self.aggregates.values().map(NeighbourhoodAggregate::listing_count).sum()
    }

    pub fn optimal_price(&self, neighbourhood: &str) -> Result<OptimalPrice> {
        Ok(self.get(neighbourhood)?.optimal_price())
    }

    pub fn optimal_prices(&self) -> BTreeMap<&str, OptimalPrice> {
        self.map_all(NeighbourhoodAggregate::optimal_price)
    }

    pub fn ids(&self, neighbourhood: &str) -> Result<&[String]> {
        Ok(self.get(neighbourhood)?.ids())
    }

    pub fn latitudes(&self, neighbourhood: &str) -> Result<&[f64]> {
        Ok(self.get(neighbourhood)?.latitudes())
    }

    pub fn longitudes(&self, neighbourhood: &str) -> Result<&[f64]> {
        Ok(self.get(neighbourhood)?.longitudes())
    }

    /// Every listing id, neighbourhoods in alphabetical order and listings
    /// in the order they were loaded.
    pub fn all_ids(&self) -> impl Iterator<Item = &str> {
        self.aggregates
            .values()
            .flat_map(|agg| agg.ids().iter().map(String::as_str))
    }

    /// Every `(latitude, longitude)` pair, in the same order as [`Self::all_ids`].
    pub fn all_coordinates(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.aggregates.values().flat_map(|agg| {
            agg.latitudes()
                .iter()
                .copied()
                .zip(agg.longitudes().iter().copied())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(names: &[&str]) -> Vec<NeighbourhoodRow> {
        names
            .iter()
            .map(|n| NeighbourhoodRow {
                neighbourhood: n.to_string(),
            })
            .collect()
    }

    fn row(id: &str, neighbourhood: &str, price: &str, available: &str) -> ListingRow {
        ListingRow {
            id: Some(id.to_string()),
            latitude: Some("37.75".to_string()),
            longitude: Some("-122.43".to_string()),
            price: Some(price.to_string()),
            neighbourhood_cleansed: Some(neighbourhood.to_string()),
            neighbourhood: None,
            review_score: Some("95".to_string()),
            available_days_in_year: Some(available.to_string()),
        }
    }

    fn noe_valley() -> ListingsRegistry {
        let (registry, _) = ListingsRegistry::load(
            EstimatorConfig::default(),
            reference(&["Noe Valley"]),
            vec![
                row("1", "Noe Valley", "$100.00", "358"),
                row("2", "Noe Valley", "$120.00", "330"),
            ],
            UnknownNeighbourhoodPolicy::Fail,
        )
        .unwrap();
        registry
    }

    #[test]
    fn test_end_to_end_noe_valley() {
        let registry = noe_valley();

        assert_eq!(registry.average_price("Noe Valley").unwrap(), 110.0);
        let bookings = registry.average_bookings_per_week("Noe Valley").unwrap();
        assert!((bookings - (7.0 + 35.0) / 2.0 / 52.0).abs() < 1e-12);
        assert_eq!(registry.listing_count("Noe Valley").unwrap(), 2);
        assert_eq!(registry.ids("Noe Valley").unwrap(), ["1", "2"]);
    }

    #[test]
    fn test_unknown_neighbourhood_fails_load() {
        let result = ListingsRegistry::load(
            EstimatorConfig::default(),
            reference(&["Noe Valley"]),
            vec![row("1", "Atlantis", "$100", "10")],
            UnknownNeighbourhoodPolicy::Fail,
        );

        assert!(matches!(
            result,
            Err(RaterError::UnknownNeighbourhood(ref name)) if name == "Atlantis"
        ));
    }

    #[test]
    fn test_unknown_neighbourhood_can_be_skipped() {
        let (registry, summary) = ListingsRegistry::load(
            EstimatorConfig::default(),
            reference(&["Noe Valley"]),
            vec![
                row("1", "Atlantis", "$100", "10"),
                row("2", "Noe Valley", "$100", "10"),
            ],
            UnknownNeighbourhoodPolicy::Skip,
        )
        .unwrap();

        assert_eq!(summary.skipped_unknown, 1);
        assert_eq!(summary.observed, 1);
        assert_eq!(registry.neighbourhoods(), vec!["Noe Valley"]);
    }

    #[test]
    fn test_malformed_rows_are_skipped_without_mutation() {
        let mut missing_score = row("2", "Noe Valley", "$100", "10");
        missing_score.review_score = None;

        let (registry, summary) = ListingsRegistry::load(
            EstimatorConfig::default(),
            reference(&["Noe Valley"]),
            vec![
                row("1", "Noe Valley", "$100", "10"),
                missing_score,
                row("3", "Noe Valley", "not a price", "10"),
            ],
            UnknownNeighbourhoodPolicy::Fail,
        )
        .unwrap();

        assert_eq!(
            summary,
            LoadSummary {
                rows_read: 3,
                observed: 1,
                skipped_malformed: 2,
                skipped_unknown: 0,
            }
        );
        assert_eq!(registry.ids("Noe Valley").unwrap(), ["1"]);
    }

    #[test]
    fn test_names_are_alphabetical_and_empty_ones_undefined() {
        let (registry, _) = ListingsRegistry::load(
            EstimatorConfig::default(),
            reference(&["Twin Peaks", "Bayview", "Mission"]),
            vec![row("1", "Mission", "$90", "100")],
            UnknownNeighbourhoodPolicy::Fail,
        )
        .unwrap();

        assert_eq!(
            registry.neighbourhoods(),
            vec!["Bayview", "Mission", "Twin Peaks"]
        );

        let prices = registry.average_prices();
        assert_eq!(*prices["Mission"].as_ref().unwrap(), 90.0);
        assert!(matches!(
            prices["Bayview"],
            Err(RaterError::DivisionUndefined(_))
        ));
        assert_eq!(registry.listing_counts()["Twin Peaks"], 0);
        assert_eq!(registry.optimal_prices()["Bayview"], OptimalPrice::NONE);
    }

    #[test]
    fn test_query_unknown_name_is_lookup_error() {
        let registry = noe_valley();
        assert!(matches!(
            registry.average_price("Atlantis"),
            Err(RaterError::UnknownNeighbourhood(_))
        ));
        assert!(registry.latitudes("Atlantis").is_err());
    }

    #[test]
    fn test_exempt_set_reaches_aggregates() {
        let mut config = EstimatorConfig::default();
        config.exempt_neighbourhoods.insert("Presidio".to_string());

        let (registry, _) = ListingsRegistry::load(
            config,
            reference(&["Presidio", "Mission"]),
            vec![
                row("1", "Presidio", "$200", "0"),
                row("2", "Mission", "$200", "0"),
            ],
            UnknownNeighbourhoodPolicy::Fail,
        )
        .unwrap();

        let presidio = registry.optimal_price("Presidio").unwrap();
        assert_eq!(presidio.price, 200.0);
        assert!((presidio.weekly_bookings - 365.0 / 52.0).abs() < 1e-12);
        assert_eq!(registry.optimal_price("Mission").unwrap(), OptimalPrice::NONE);
    }

    #[test]
    fn test_resolve_through_aliases() {
        let mut config = EstimatorConfig::default();
        config
            .aliases
            .insert("Bayview District".to_string(), "Bayview".to_string());
        config
            .aliases
            .insert("Portola".to_string(), "Excelsior".to_string());

        let (registry, _) = ListingsRegistry::load(
            config,
            reference(&["Bayview"]),
            Vec::new(),
            UnknownNeighbourhoodPolicy::Fail,
        )
        .unwrap();

        assert_eq!(registry.resolve("Bayview"), Some("Bayview"));
        assert_eq!(registry.resolve("Bayview District"), Some("Bayview"));
        // Alias target is not a reference neighbourhood.
        assert_eq!(registry.resolve("Portola"), None);
        assert_eq!(registry.resolve("Atlantis"), None);
    }

    #[test]
    fn test_invalid_utf8_row_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let neighbourhoods = dir.path().join("neighbourhoods.csv");
        let listings = dir.path().join("listings.csv");
        std::fs::write(&neighbourhoods, "neighbourhood\nMission\n").unwrap();

        let mut raw = b"id,latitude,longitude,price,neighbourhood_cleansed,review_scores_rating,availability_365\n".to_vec();
        raw.extend_from_slice(b"1,37.75,-122.41,$100,Mission,90,100\n");
        raw.extend_from_slice(b"2,37.75,-122.41,$100,Mission,9\xff,100\n");
        raw.extend_from_slice(b"3,37.75,-122.41,$120,Mission,80,100\n");
        std::fs::write(&listings, raw).unwrap();

        let (registry, summary) = ListingsRegistry::load_csv(
            EstimatorConfig::default(),
            &neighbourhoods,
            &listings,
            UnknownNeighbourhoodPolicy::Fail,
        )
        .unwrap();

        assert_eq!(
            summary,
            LoadSummary {
                rows_read: 3,
                observed: 2,
                skipped_malformed: 1,
                skipped_unknown: 0,
            }
        );
        assert_eq!(registry.ids("Mission").unwrap(), ["1", "3"]);
    }

    #[test]
    fn test_city_wide_sequences() {
        let (registry, _) = ListingsRegistry::load(
            EstimatorConfig::default(),
            reference(&["Mission", "Bayview"]),
            vec![
                row("m1", "Mission", "$90", "100"),
                row("b1", "Bayview", "$80", "100"),
                row("m2", "Mission", "$95", "100"),
            ],
            UnknownNeighbourhoodPolicy::Fail,
        )
        .unwrap();

        let ids: Vec<_> = registry.all_ids().collect();
        assert_eq!(ids, vec!["b1", "m1", "m2"]);
        assert_eq!(registry.all_coordinates().count(), 3);
        assert_eq!(registry.total_listings(), 3);
    }
}
