//! Log-to-histogram aggregation.
//!
//! One sequential pass over a log source: every accepted line is bucketed by
//! timestamp and counted towards four metrics (requests, bytes, 404s,
//! latency), each kept as a histogram, a per-URL ranking and a total. After
//! the pass the histograms are gap-filled, bytes are converted to MiB and the
//! rankings are cut down to the top N.

use crate::error::AggregateError;
use crate::format::{
    leading_integer, LineMatcher, LogFields, LogFormatSpec, RegexLineMatcher, StrftimeParser,
    TimestampParser,
};
use crate::models::{
    bytes_to_mib, AggregationResult, Histogram, MetricSummary, RunStats, TimeBucketWidth,
    UrlRanking,
};
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

/// Progress is logged every this many lines.
const PROGRESS_EVERY: u64 = 100_000;

/// Parameters of one aggregation run.
#[derive(Debug, Clone)]
pub struct AggregateOptions {
    /// Histogram bar width.
    pub period: TimeBucketWidth,
    /// Number of URLs kept per ranking.
    pub top_n: usize,
    /// Maximum number of histogram bars.
    pub max_buckets: usize,
    /// Regex a URL must match to be counted. Used as given, not anchored.
    pub url_filter: Option<String>,
}

/// Build the filter admitting exactly `url`.
pub fn exact_url_filter(url: &str) -> String {
    format!("^{}$", regex::escape(url))
}

/// Aggregation engine for one log format.
///
/// An aggregator holds no state between runs; every call to
/// [`Aggregator::aggregate`] starts from empty accumulators.
#[derive(Debug)]
pub struct Aggregator<M = RegexLineMatcher, P = StrftimeParser> {
    format: LogFormatSpec<M, P>,
    url_filter: Option<Regex>,
    period: TimeBucketWidth,
    top_n: usize,
    max_buckets: usize,
}

/// Histogram, ranking and total of one metric during the pass.
#[derive(Debug, Default)]
struct Accumulator {
    histogram: Histogram,
    ranking: UrlRanking,
    total: u64,
}

impl Accumulator {
    fn add(&mut self, bucket: i64, url: &str, value: u64) {
        self.histogram.add(bucket, value);
        self.ranking.add(url, value);
        self.total = self.total.saturating_add(value);
    }

    /// Gap-fill, rank and convert units.
    fn finish(
        self,
        span: Option<(i64, i64)>,
        period: TimeBucketWidth,
        top_n: usize,
        convert: impl Fn(u64) -> u64,
    ) -> MetricSummary {
        let mut histogram = self.histogram;
        if let Some((min, max)) = span {
            histogram.fill_gaps(min, max, period.seconds() as i64);
        }
        histogram.map_values(&convert);

        let mut top = self.ranking.into_top(top_n);
        for entry in &mut top {
            entry.value = convert(entry.value);
        }

        MetricSummary::new(histogram, top, convert(self.total))
    }
}

/// Mutable state of a single pass.
#[derive(Debug, Default)]
struct Pass {
    requests: Accumulator,
    bytes: Accumulator,
    not_found: Accumulator,
    latency: Accumulator,
    span: Option<(i64, i64)>,
    stats: RunStats,
}

impl<M: LineMatcher, P: TimestampParser> Aggregator<M, P> {
    /// Create an aggregator, compiling the URL filter.
    pub fn new(format: LogFormatSpec<M, P>, options: AggregateOptions) -> Result<Self, AggregateError> {
        let url_filter = options
            .url_filter
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| AggregateError::InvalidUrlFilter {
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                })
            })
            .transpose()?;

        Ok(Self {
            format,
            url_filter,
            period: options.period,
            top_n: options.top_n,
            max_buckets: options.max_buckets,
        })
    }

    /// Aggregate the log file at `path`.
    pub fn aggregate_file(&self, path: &Path) -> Result<AggregationResult, AggregateError> {
        let file = File::open(path).map_err(|source| AggregateError::SourceUnreadable {
            name: path.display().to_string(),
            source,
        })?;

        self.aggregate_reader(file, &path.display().to_string())
    }

    /// Aggregate any byte stream; `name` identifies it in errors.
    pub fn aggregate_reader<R: Read>(
        &self,
        reader: R,
        name: &str,
    ) -> Result<AggregationResult, AggregateError> {
        self.aggregate(BufReader::new(reader), name)
    }

    /// Aggregate a buffered log source in a single pass.
    pub fn aggregate<R: BufRead>(
        &self,
        mut reader: R,
        name: &str,
    ) -> Result<AggregationResult, AggregateError> {
        debug!(
            "Aggregating {} (period {}s, top {}, max {} bars, filter {:?}, latency {})",
            name,
            self.period.seconds(),
            self.top_n,
            self.max_buckets,
            self.url_filter.as_ref().map(Regex::as_str),
            self.format.has_latency()
        );

        let mut pass = Pass::default();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|source| AggregateError::SourceUnreadable {
                    name: name.to_string(),
                    source,
                })?;
            if read == 0 {
                break;
            }

            pass.stats.lines_read += 1;
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\n', '\r']);
            self.consume(line, &mut pass)?;

            if pass.stats.lines_read % PROGRESS_EVERY == 0 {
                debug!(
                    "{} lines read, {} accepted",
                    pass.stats.lines_read, pass.stats.lines_accepted
                );
            }
        }

        let result = self.finish(pass)?;

        info!(
            "Read {} lines from {}: {} accepted, {} skipped, {} bars",
            result.stats().lines_read,
            name,
            result.stats().lines_accepted,
            result.stats().lines_skipped(),
            result.requests().histogram().len()
        );

        Ok(result)
    }

    /// Count one line towards every metric.
    fn consume(&self, line: &str, pass: &mut Pass) -> Result<(), AggregateError> {
        let Some(fields) = self.accept(line) else {
            return Ok(());
        };

        let timestamp = self.format.parse_timestamp(&fields).map_err(|message| {
            AggregateError::MalformedTimestamp {
                line: pass.stats.lines_read,
                text: fields.timestamp_text(),
                message,
            }
        })?;

        let bucket = self.period.bucket_of(timestamp);
        pass.span = Some(match pass.span {
            Some((min, max)) => (min.min(bucket), max.max(bucket)),
            None => (bucket, bucket),
        });
        pass.stats.lines_accepted += 1;

        let url = fields.url;
        pass.requests.add(bucket, url, 1);
        pass.bytes.add(bucket, url, leading_integer(fields.bytes));
        if fields.status == "404" {
            pass.not_found.add(bucket, url, 1);
        }
        if let Some(latency) = fields.latency {
            pass.latency.add(bucket, url, leading_integer(latency));
        }

        let bars = pass.requests.histogram.len();
        if bars > self.max_buckets {
            return Err(AggregateError::TooManyBuckets {
                count: bars,
                max: self.max_buckets,
            });
        }

        Ok(())
    }

    /// Extract the fields of a line the format and the URL filter both accept.
    fn accept<'l>(&self, line: &'l str) -> Option<LogFields<'l>> {
        let fields = self.format.extract(line)?;

        match self.url_filter {
            Some(ref filter) if !filter.is_match(fields.url) => None,
            _ => Some(fields),
        }
    }

    /// Post-process the accumulators into the result.
    fn finish(&self, pass: Pass) -> Result<AggregationResult, AggregateError> {
        // Gap-filling materializes every bar of the span, not only the
        // populated ones, so the span itself must respect the limit.
        if let Some((min, max)) = pass.span {
            let bars = (max - min) as u64 / self.period.seconds() + 1;
            if bars > self.max_buckets as u64 {
                return Err(AggregateError::TooManyBuckets {
                    count: usize::try_from(bars).unwrap_or(usize::MAX),
                    max: self.max_buckets,
                });
            }
        }

        let span = pass.span;
        let identity = |value: u64| value;

        Ok(AggregationResult::new(
            self.period,
            pass.requests.finish(span, self.period, self.top_n, identity),
            pass.bytes.finish(span, self.period, self.top_n, bytes_to_mib),
            pass.not_found.finish(span, self.period, self.top_n, identity),
            pass.latency.finish(span, self.period, self.top_n, identity),
            pass.stats,
        ))
    }
}
