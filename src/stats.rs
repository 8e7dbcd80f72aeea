use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::neighbourhood::NeighbourhoodAggregate;
use crate::registry::ListingsRegistry;

/// Flat summary of one neighbourhood, one row per neighbourhood in the
/// CSV report. Averages are `None` when the neighbourhood has no listings.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct NeighbourhoodStats {
    pub neighbourhood: String,
    pub listings: usize,
    pub exempt: bool,

    pub avg_price: Option<f64>,
    pub avg_review_score: Option<f64>,
    pub avg_bookings_per_week: Option<f64>,
    pub avg_weekly_income: Option<f64>,
    pub occupancy_pct: Option<f64>,

    // optimal price search
    pub optimal_price: f64,
    pub optimal_weekly_revenue: f64,
    pub optimal_bookings_per_week: f64,
}

impl NeighbourhoodStats {
    pub fn from_aggregate(agg: &NeighbourhoodAggregate) -> Self {
        let optimal = agg.optimal_price();

        NeighbourhoodStats {
            neighbourhood: agg.name().to_string(),
            listings: agg.listing_count(),
            exempt: agg.is_exempt(),
            avg_price: agg.average_price_per_night().ok(),
            avg_review_score: agg.average_review_score().ok(),
            avg_bookings_per_week: agg.average_bookings_per_week().ok(),
            avg_weekly_income: agg.average_weekly_income().ok(),
            occupancy_pct: agg.occupancy_pct().ok(),
            optimal_price: optimal.price,
            optimal_weekly_revenue: optimal.weekly_revenue,
            optimal_bookings_per_week: optimal.weekly_bookings,
        }
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    /// This neighbourhood's share of all listings in `total`, as a percentage.
    pub fn listing_share_pct(&self, total: usize) -> f64 {
        Self::pct(self.listings, total)
    }
}

/// Whole-registry report, written as JSON.
#[derive(Debug, Serialize)]
pub struct RegistryReport {
    pub generated_at: DateTime<Utc>,
    pub total_listings: usize,
    pub neighbourhoods: Vec<NeighbourhoodStats>,
}

impl RegistryReport {
    pub fn from_registry(registry: &ListingsRegistry) -> Self {
        RegistryReport {
            generated_at: Utc::now(),
            total_listings: registry.total_listings(),
            neighbourhoods: registry
                .aggregates()
                .map(NeighbourhoodStats::from_aggregate)
                .collect(),
        }
    }
}
