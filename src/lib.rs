//! Pricing and rate resolution for auction-shipping quotes.
//!
//! Given a package's dimensions, destination, carton and declared value the
//! crate works out the billable weight, the shipping rate from the account's
//! zone/bracket grid, the packaging price from the carton catalog and the
//! insurance premium, and keeps the quote total in step as inputs change.

pub mod aggregator;
pub mod domain;
pub mod engine;
pub mod infra;
pub mod util;

pub use aggregator::{QuoteTotalAggregator, SnapshotUpdate};
pub use engine::{Lookup, PricingEngine};
