//! Per-neighbourhood aggregation and price estimation.
//!
//! Each [`NeighbourhoodAggregate`] folds listing observations into running
//! sums and a per-price booking tally, and derives averages and a
//! revenue-maximizing price from them.

pub mod aggregate;
pub mod types;

pub use aggregate::NeighbourhoodAggregate;
pub use types::{ListingObservation, OptimalPrice, PriceKey, PriceTally};
