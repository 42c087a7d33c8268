//! Chart rows and time labels shared by the renderers.

use crate::models::{Histogram, TimeBucketWidth};
use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};

/// Parse a label offset such as "+02:00".
pub fn parse_offset(text: &str) -> Result<FixedOffset> {
    text.trim()
        .parse::<FixedOffset>()
        .with_context(|| format!("Invalid UTC offset '{}', expected e.g. +02:00", text))
}

/// Label of the bar starting at `timestamp`.
///
/// Bars narrower than a minute show seconds, wider ones hours and minutes.
pub fn time_label(timestamp: i64, period: TimeBucketWidth, offset: &FixedOffset) -> String {
    let format = if period.seconds() < 60 {
        "%H:%M:%S"
    } else {
        "%H:%M"
    };

    match DateTime::from_timestamp(timestamp, 0) {
        Some(dt) => dt.with_timezone(offset).format(format).to_string(),
        None => timestamp.to_string(),
    }
}

/// Labelled bars in timestamp order.
pub fn chart_rows(
    histogram: &Histogram,
    period: TimeBucketWidth,
    offset: &FixedOffset,
) -> Vec<(String, u64)> {
    histogram
        .iter()
        .map(|(timestamp, value)| (time_label(timestamp, period, offset), value))
        .collect()
}
