//! Data models for the log aggregator.
//!
//! This module contains the histogram and ranking structures produced by an
//! aggregation run, and the report bundle handed to the renderers.

use crate::error::AggregateError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Bytes per mebibyte.
pub const MIB: u64 = 1024 * 1024;

/// Convert a byte count to mebibytes, rounding half away from zero.
pub fn bytes_to_mib(bytes: u64) -> u64 {
    bytes / MIB + u64::from(bytes % MIB >= MIB / 2)
}

/// Width of one histogram bar, a positive number of seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct TimeBucketWidth(u64);

impl TimeBucketWidth {
    /// Validate a width in seconds.
    pub fn new(seconds: u64) -> Result<Self, AggregateError> {
        if seconds == 0 || seconds > i64::MAX as u64 {
            return Err(AggregateError::InvalidBucketWidth {
                value: seconds.to_string(),
            });
        }
        Ok(Self(seconds))
    }

    /// Coerce a textual width, e.g. a query parameter, into seconds.
    #[allow(dead_code)] // Entry point for string-typed callers
    pub fn parse(text: &str) -> Result<Self, AggregateError> {
        let invalid = || AggregateError::InvalidBucketWidth {
            value: text.to_string(),
        };
        let seconds: u64 = text.trim().parse().map_err(|_| invalid())?;
        Self::new(seconds).map_err(|_| invalid())
    }

    pub fn seconds(&self) -> u64 {
        self.0
    }

    /// Start of the bucket containing `timestamp`: `floor(timestamp / width) * width`.
    pub fn bucket_of(&self, timestamp: i64) -> i64 {
        let width = self.0 as i64;
        timestamp.div_euclid(width) * width
    }
}

impl TryFrom<u64> for TimeBucketWidth {
    type Error = AggregateError;

    fn try_from(seconds: u64) -> Result<Self, Self::Error> {
        Self::new(seconds)
    }
}

impl From<TimeBucketWidth> for u64 {
    fn from(width: TimeBucketWidth) -> u64 {
        width.0
    }
}

/// Mapping from bucket start (epoch seconds) to an accumulated value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Histogram {
    buckets: BTreeMap<i64, u64>,
}

impl Histogram {
    /// Add `value` to the bucket starting at `bucket`.
    pub fn add(&mut self, bucket: i64, value: u64) {
        let slot = self.buckets.entry(bucket).or_insert(0);
        *slot = slot.saturating_add(value);
    }

    /// Make every bucket of `[min, max]` at `width` stride present, zero if untouched.
    pub fn fill_gaps(&mut self, min: i64, max: i64, width: i64) {
        let mut bucket = min;
        while bucket <= max {
            self.buckets.entry(bucket).or_insert(0);
            match bucket.checked_add(width) {
                Some(next) => bucket = next,
                None => break,
            }
        }
    }

    /// Apply `f` to every bucket value.
    pub fn map_values(&mut self, f: impl Fn(u64) -> u64) {
        for value in self.buckets.values_mut() {
            *value = f(*value);
        }
    }

    /// Value of the bucket starting at `bucket`.
    pub fn get(&self, bucket: i64) -> Option<u64> {
        self.buckets.get(&bucket).copied()
    }

    /// Buckets in timestamp order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, u64)> + '_ {
        self.buckets.iter().map(|(k, v)| (*k, *v))
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Sum of all bucket values.
    pub fn sum(&self) -> u64 {
        self.buckets.values().sum()
    }
}

/// One ranked URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedUrl {
    pub url: String,
    pub value: u64,
}

/// Per-URL accumulator, kept in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct UrlRanking {
    entries: Vec<RankedUrl>,
    index: HashMap<String, usize>,
}

impl UrlRanking {
    /// Add `value` to `url`, registering it on first sight.
    pub fn add(&mut self, url: &str, value: u64) {
        match self.index.get(url) {
            Some(&i) => {
                let entry = &mut self.entries[i];
                entry.value = entry.value.saturating_add(value);
            }
            None => {
                self.index.insert(url.to_string(), self.entries.len());
                self.entries.push(RankedUrl {
                    url: url.to_string(),
                    value,
                });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(dead_code)] // Pairs with len()
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `n` largest entries by descending value; equal values keep first-seen order.
    pub fn into_top(self, n: usize) -> Vec<RankedUrl> {
        let mut entries = self.entries;
        // sort_by is stable, so ties stay in insertion order
        entries.sort_by(|a, b| b.value.cmp(&a.value));
        entries.truncate(n);
        entries
    }
}

/// One metric of a run: histogram, top list and total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSummary {
    histogram: Histogram,
    top: Vec<RankedUrl>,
    total: u64,
}

impl MetricSummary {
    pub fn new(histogram: Histogram, top: Vec<RankedUrl>, total: u64) -> Self {
        Self {
            histogram,
            top,
            total,
        }
    }

    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    /// Top URLs by descending value.
    pub fn top(&self) -> &[RankedUrl] {
        &self.top
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

/// Line counters of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Lines read from the source.
    pub lines_read: u64,
    /// Lines that matched the format and the URL filter.
    pub lines_accepted: u64,
}

impl RunStats {
    /// Lines rejected by the format or the URL filter.
    pub fn lines_skipped(&self) -> u64 {
        self.lines_read - self.lines_accepted
    }
}

/// Immutable output of one aggregation run.
///
/// Byte values are in mebibytes. Latency values are in the unit the log
/// records them in, and are all zero when the format has no latency field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationResult {
    period: TimeBucketWidth,
    requests: MetricSummary,
    bytes: MetricSummary,
    not_found: MetricSummary,
    latency: MetricSummary,
    stats: RunStats,
}

impl AggregationResult {
    pub fn new(
        period: TimeBucketWidth,
        requests: MetricSummary,
        bytes: MetricSummary,
        not_found: MetricSummary,
        latency: MetricSummary,
        stats: RunStats,
    ) -> Self {
        Self {
            period,
            requests,
            bytes,
            not_found,
            latency,
            stats,
        }
    }

    pub fn period(&self) -> TimeBucketWidth {
        self.period
    }

    pub fn requests(&self) -> &MetricSummary {
        &self.requests
    }

    /// Transferred bytes, in MiB.
    pub fn bytes(&self) -> &MetricSummary {
        &self.bytes
    }

    /// Requests answered with a 404.
    pub fn not_found(&self) -> &MetricSummary {
        &self.not_found
    }

    pub fn latency(&self) -> &MetricSummary {
        &self.latency
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    pub fn is_empty(&self) -> bool {
        self.requests.total == 0
    }
}

/// Metadata about a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Analyzed log file.
    pub log_path: String,
    /// URL filter in effect, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_filter: Option<String>,
    /// Date and time the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Duration of the aggregation in seconds.
    pub duration_seconds: f64,
}

/// A complete report: metadata plus the aggregation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub result: AggregationResult,
}
