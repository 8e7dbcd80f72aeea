//! Data types used by the neighbourhood aggregation.

use serde::Serialize;

/// One validated listing row, handed to
/// [`NeighbourhoodAggregate::observe`](super::aggregate::NeighbourhoodAggregate::observe).
#[derive(Debug, Clone, PartialEq)]
pub struct ListingObservation {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Nightly price, already stripped of currency formatting.
    pub price: f64,
    pub review_score: f64,
    /// Days available out of the trailing year, 0 to `days_in_year`.
    pub available_days: u32,
}

/// A nightly price in whole cents, used as the per-price tally key.
///
/// Ordering is by amount, so a tally iterates from the lowest price up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PriceKey(u64);

impl PriceKey {
    /// Rounds `price` to the nearest cent. Negative and non-finite
    /// prices are rejected at parse time and never reach this point.
    pub fn from_price(price: f64) -> Self {
        Self((price * 100.0).round().max(0.0) as u64)
    }

    pub fn cents(self) -> u64 {
        self.0
    }

    pub fn price(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

/// Booking-rate bookkeeping for one price point.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PriceTally {
    /// Sum of the weekly booking rates of every listing at this price.
    pub cumulative_weekly_rate: f64,
    /// Number of listings observed at this price.
    pub listings: usize,
}

impl PriceTally {
    pub fn record(&mut self, weekly_rate: f64) {
        self.cumulative_weekly_rate += weekly_rate;
        self.listings += 1;
    }

    /// Mean weekly booking rate across the listings at this price.
    pub fn mean_weekly_rate(&self) -> f64 {
        if self.listings == 0 {
            return 0.0;
        }
        self.cumulative_weekly_rate / self.listings as f64
    }
}

/// Result of the revenue-maximizing price search.
///
/// [`OptimalPrice::NONE`] (all zeros) means no price point had enough
/// listings behind it to give an estimate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OptimalPrice {
    /// The winning price point, rounded to whole cents like the tally key
    /// it came from.
    pub price: f64,
    pub weekly_revenue: f64,
    pub weekly_bookings: f64,
}

impl OptimalPrice {
    pub const NONE: Self = Self {
        price: 0.0,
        weekly_revenue: 0.0,
        weekly_bookings: 0.0,
    };

    pub fn is_estimate(&self) -> bool {
        *self != Self::NONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_key_rounds_to_cents() {
        assert_eq!(PriceKey::from_price(100.0).cents(), 10_000);
        assert_eq!(PriceKey::from_price(99.996).cents(), 10_000);
        assert_eq!(PriceKey::from_price(0.1 + 0.2).cents(), 30);
        assert_eq!(PriceKey::from_price(149.5).price(), 149.5);
    }

    #[test]
    fn test_price_keys_order_by_amount() {
        let mut keys = vec![
            PriceKey::from_price(150.0),
            PriceKey::from_price(99.0),
            PriceKey::from_price(1200.0),
        ];
        keys.sort();
        let prices: Vec<f64> = keys.iter().map(|k| k.price()).collect();
        assert_eq!(prices, vec![99.0, 150.0, 1200.0]);
    }

    #[test]
    fn test_tally_mean_rate() {
        let mut tally = PriceTally::default();
        assert_eq!(tally.mean_weekly_rate(), 0.0);

        tally.record(2.0);
        tally.record(4.0);
        assert_eq!(tally.listings, 2);
        assert_eq!(tally.mean_weekly_rate(), 3.0);
    }

    #[test]
    fn test_none_is_not_an_estimate() {
        assert!(!OptimalPrice::NONE.is_estimate());
        assert!(!OptimalPrice::default().is_estimate());
        let estimate = OptimalPrice {
            price: 150.0,
            weekly_revenue: 375.0,
            weekly_bookings: 2.5,
        };
        assert!(estimate.is_estimate());
    }
}
