//! Analysis modules.
//!
//! The aggregation engine turning a log source into histograms and rankings.

pub mod aggregator;

pub use aggregator::*;
