use crate::config::EstimationPolicy;
use crate::error::{RaterError, Result};
use crate::neighbourhood::types::{ListingObservation, OptimalPrice, PriceKey, PriceTally};
use std::collections::BTreeMap;

/// Running sums and per-price booking tallies for one neighbourhood.
///
/// Unavailable nights are assumed to have been booked. A listing with no
/// available days at all is treated as fully booked every week (the
/// saturation heuristic), unless the neighbourhood is exempt.
#[derive(Debug, Clone)]
pub struct NeighbourhoodAggregate {
    name: String,
    exempt: bool,
    policy: EstimationPolicy,

    ids: Vec<String>,
    latitudes: Vec<f64>,
    longitudes: Vec<f64>,

    price_sum: f64,
    review_score_sum: f64,
    nights_booked_sum: u64,

    price_tally: BTreeMap<PriceKey, PriceTally>,
}

impl NeighbourhoodAggregate {
    pub fn new(name: impl Into<String>, exempt: bool, policy: EstimationPolicy) -> Self {
        Self {
            name: name.into(),
            exempt,
            policy,
            ids: Vec::new(),
            latitudes: Vec::new(),
            longitudes: Vec::new(),
            price_sum: 0.0,
            review_score_sum: 0.0,
            nights_booked_sum: 0,
            price_tally: BTreeMap::new(),
        }
    }

    /// Folds one listing into the running sums and its price tally.
    pub fn observe(&mut self, listing: ListingObservation) {
        let nights_booked = self.nights_booked(listing.available_days);
        let weekly_rate = self.weekly_rate(listing.available_days);

        self.ids.push(listing.id);
        self.latitudes.push(listing.latitude);
        self.longitudes.push(listing.longitude);

        self.price_sum += listing.price;
        self.review_score_sum += listing.review_score;
        self.nights_booked_sum += nights_booked;

        self.price_tally
            .entry(PriceKey::from_price(listing.price))
            .or_default()
            .record(weekly_rate);
    }

    fn nights_booked(&self, available_days: u32) -> u64 {
        u64::from(self.policy.days_in_year.saturating_sub(available_days))
    }

    /// Estimated nights booked per week for a listing with the given
    /// availability.
    pub fn weekly_rate(&self, available_days: u32) -> f64 {
        if available_days == 0 && !self.exempt {
            self.policy.saturation_nights_per_week
        } else {
            self.nights_booked(available_days) as f64 / self.policy.weeks_per_year
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_exempt(&self) -> bool {
        self.exempt
    }

    pub fn policy(&self) -> &EstimationPolicy {
        &self.policy
    }

    pub fn listing_count(&self) -> usize {
        self.ids.len()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn latitudes(&self) -> &[f64] {
        &self.latitudes
    }

    pub fn longitudes(&self) -> &[f64] {
        &self.longitudes
    }

    pub fn price_sum(&self) -> f64 {
        self.price_sum
    }

    pub fn review_score_sum(&self) -> f64 {
        self.review_score_sum
    }

    pub fn nights_booked_sum(&self) -> u64 {
        self.nights_booked_sum
    }

    /// Per-price tallies, lowest price first.
    pub fn price_tally(&self) -> impl Iterator<Item = (PriceKey, &PriceTally)> {
        self.price_tally.iter().map(|(k, v)| (*k, v))
    }

    fn per_listing(&self, total: f64) -> Result<f64> {
        if self.ids.is_empty() {
            return Err(RaterError::DivisionUndefined(self.name.clone()));
        }
        Ok(total / self.ids.len() as f64)
    }

    pub fn average_price_per_night(&self) -> Result<f64> {
        self.per_listing(self.price_sum)
    }

    pub fn average_review_score(&self) -> Result<f64> {
        self.per_listing(self.review_score_sum)
    }

    pub fn average_bookings_per_week(&self) -> Result<f64> {
        Ok(self.per_listing(self.nights_booked_sum as f64)? / self.policy.weeks_per_year)
    }

    pub fn average_weekly_income(&self) -> Result<f64> {
        Ok(self.average_price_per_night()? * self.average_bookings_per_week()?)
    }

    /// Share of the availability window that was booked, as a percentage.
    pub fn occupancy_pct(&self) -> Result<f64> {
        let nights_per_listing = self.per_listing(self.nights_booked_sum as f64)?;
        Ok(nights_per_listing / f64::from(self.policy.days_in_year) * 100.0)
    }

    /// Searches the observed price points for the one with the greatest
    /// expected weekly revenue (price × mean weekly booking rate).
    ///
    /// Prices backed by fewer than `min_listings_per_price` listings are
    /// ignored unless the neighbourhood is exempt. Prices are visited in
    /// ascending order and only a strictly greater revenue replaces the
    /// current best, so ties resolve to the lowest price. Returns
    /// [`OptimalPrice::NONE`] when no price qualifies.
    pub fn optimal_price(&self) -> OptimalPrice {
        let mut best = OptimalPrice::NONE;

        for (key, tally) in &self.price_tally {
            if tally.listings < self.policy.min_listings_per_price && !self.exempt {
                continue;
            }

            let weekly_bookings = tally.mean_weekly_rate();
            let weekly_revenue = key.price() * weekly_bookings;

            if weekly_revenue > best.weekly_revenue {
                best = OptimalPrice {
                    price: key.price(),
                    weekly_revenue,
                    weekly_bookings,
                };
            }
        }

        best
    }
}
