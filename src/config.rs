//! Estimator configuration.
//!
//! Stored as a JSON object on disk; every field is optional:
//! ```json
//! {
//!   "exempt_neighbourhoods": ["Presidio"],
//!   "policy": { "saturation_nights_per_week": 7.0, "min_listings_per_price": 2 },
//!   "min_availability_days": 3,
//!   "aliases": { "Bayview District": "Bayview" }
//! }
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Numeric constants used when turning availability into booking estimates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimationPolicy {
    /// Weekly rate assumed for a listing with zero available days.
    pub saturation_nights_per_week: f64,
    /// A price point needs at least this many listings to be considered
    /// by the optimal-price search.
    pub min_listings_per_price: usize,
    /// Length of the availability window.
    pub days_in_year: u32,
    pub weeks_per_year: f64,
}

impl Default for EstimationPolicy {
    fn default() -> Self {
        Self {
            saturation_nights_per_week: 7.0,
            min_listings_per_price: 2,
            days_in_year: 365,
            weeks_per_year: 52.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Neighbourhoods with too few listings for the saturation heuristic
    /// and the per-price listing threshold to apply.
    pub exempt_neighbourhoods: BTreeSet<String>,
    pub policy: EstimationPolicy,
    /// Rows with fewer available days are dropped by the cleaning pass.
    pub min_availability_days: u32,
    /// Geocoder place name to reference neighbourhood name.
    pub aliases: BTreeMap<String, String>,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            exempt_neighbourhoods: BTreeSet::new(),
            policy: EstimationPolicy::default(),
            min_availability_days: 3,
            aliases: BTreeMap::new(),
        }
    }
}

impl EstimatorConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn is_exempt(&self, neighbourhood: &str) -> bool {
        self.exempt_neighbourhoods.contains(neighbourhood)
    }

    /// Returns the reference name an alias points at, if one is configured.
    pub fn alias_target(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(String::as_str)
    }
}
