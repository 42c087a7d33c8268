//! Log line format handling.
//!
//! A [`LogFormatSpec`] ties together a [`LineMatcher`] that splits a raw line
//! into capture groups, a [`TimestampParser`] that turns the date, time and
//! timezone groups into epoch seconds, and the group index of every field the
//! aggregator needs. The regex/strftime implementations cover the usual
//! Apache and nginx layouts; other layouts only need another matcher or
//! parser.

use crate::config::LogFormatConfig;
use crate::error::AggregateError;
use chrono::DateTime;
use regex::Regex;

/// Splits a raw log line into ordered capture groups.
pub trait LineMatcher {
    /// Number of groups a successful match yields, group 0 (whole match) included.
    fn group_count(&self) -> usize;

    /// Capture groups of `line`, or `None` if the line does not match.
    ///
    /// Groups that did not participate in the match are `None`.
    fn captures<'l>(&self, line: &'l str) -> Option<Vec<Option<&'l str>>>;
}

/// Converts the combined "date time timezone" text into epoch seconds.
pub trait TimestampParser {
    fn parse_timestamp(&self, text: &str) -> Result<i64, String>;
}

/// Regex-backed line matcher.
#[derive(Debug, Clone)]
pub struct RegexLineMatcher {
    regex: Regex,
}

impl RegexLineMatcher {
    /// Compile a line pattern.
    pub fn new(pattern: &str) -> Result<Self, AggregateError> {
        let regex = Regex::new(pattern).map_err(|e| {
            AggregateError::format_spec(format!("line pattern does not compile: {}", e))
        })?;
        Ok(Self { regex })
    }
}

impl LineMatcher for RegexLineMatcher {
    fn group_count(&self) -> usize {
        self.regex.captures_len()
    }

    fn captures<'l>(&self, line: &'l str) -> Option<Vec<Option<&'l str>>> {
        let caps = self.regex.captures(line)?;
        Some(caps.iter().map(|m| m.map(|m| m.as_str())).collect())
    }
}

/// strftime-style timestamp parser (chrono syntax, e.g. `%d/%b/%Y %H:%M:%S %z`).
#[derive(Debug, Clone)]
pub struct StrftimeParser {
    format: String,
}

impl StrftimeParser {
    /// Build the combined format from its date, time and timezone parts.
    pub fn new(date_format: &str, time_format: &str, tz_format: &str) -> Self {
        Self {
            format: format!("{} {} {}", date_format, time_format, tz_format),
        }
    }

    #[allow(dead_code)] // Exposed for diagnostics
    pub fn format(&self) -> &str {
        &self.format
    }
}

impl TimestampParser for StrftimeParser {
    fn parse_timestamp(&self, text: &str) -> Result<i64, String> {
        DateTime::parse_from_str(text, &self.format)
            .map(|dt| dt.timestamp())
            .map_err(|e| format!("{} (expected format '{}')", e, self.format))
    }
}

/// Capture group index of each field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldIndices {
    pub url: usize,
    pub date: usize,
    pub time: usize,
    pub timezone: usize,
    pub bytes: usize,
    pub status: usize,
    /// Optional request duration field.
    pub latency: Option<usize>,
}

impl FieldIndices {
    /// Highest group index referenced by any field.
    pub fn max_index(&self) -> usize {
        [
            self.url,
            self.date,
            self.time,
            self.timezone,
            self.bytes,
            self.status,
            self.latency.unwrap_or(0),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

/// Fields extracted from one matching line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFields<'l> {
    pub url: &'l str,
    pub date: &'l str,
    pub time: &'l str,
    pub timezone: &'l str,
    pub bytes: &'l str,
    pub status: &'l str,
    pub latency: Option<&'l str>,
}

impl LogFields<'_> {
    /// The text handed to the timestamp parser.
    pub fn timestamp_text(&self) -> String {
        format!("{} {} {}", self.date, self.time, self.timezone)
    }
}

/// Immutable description of how to read one log line.
#[derive(Debug, Clone)]
pub struct LogFormatSpec<M = RegexLineMatcher, P = StrftimeParser> {
    matcher: M,
    timestamp: P,
    fields: FieldIndices,
}

impl<M: LineMatcher, P: TimestampParser> LogFormatSpec<M, P> {
    /// Create a format, rejecting field indices the matcher can never produce.
    pub fn new(matcher: M, timestamp: P, fields: FieldIndices) -> Result<Self, AggregateError> {
        let groups = matcher.group_count();
        if fields.max_index() >= groups {
            return Err(AggregateError::format_spec(format!(
                "field index {} is out of range, the line pattern only has {} capture groups",
                fields.max_index(),
                groups.saturating_sub(1)
            )));
        }

        Ok(Self {
            matcher,
            timestamp,
            fields,
        })
    }

    /// Extract the fields of `line`.
    ///
    /// Returns `None` when the line does not match or a required group is absent.
    /// A missing latency group is not a rejection.
    pub fn extract<'l>(&self, line: &'l str) -> Option<LogFields<'l>> {
        let groups = self.matcher.captures(line)?;
        let group = |index: usize| groups.get(index).copied().flatten();

        Some(LogFields {
            url: group(self.fields.url)?,
            date: group(self.fields.date)?,
            time: group(self.fields.time)?,
            timezone: group(self.fields.timezone)?,
            bytes: group(self.fields.bytes)?,
            status: group(self.fields.status)?,
            latency: self.fields.latency.and_then(group),
        })
    }

    /// Parse the timestamp of extracted fields into epoch seconds.
    pub fn parse_timestamp(&self, fields: &LogFields<'_>) -> Result<i64, String> {
        self.timestamp.parse_timestamp(&fields.timestamp_text())
    }

    /// Whether the format carries a latency field.
    pub fn has_latency(&self) -> bool {
        self.fields.latency.is_some()
    }
}

impl TryFrom<&LogFormatConfig> for LogFormatSpec {
    type Error = AggregateError;

    fn try_from(config: &LogFormatConfig) -> Result<Self, Self::Error> {
        let matcher = RegexLineMatcher::new(&config.regexp)?;
        let timestamp =
            StrftimeParser::new(&config.date_format, &config.time_format, &config.tz_format);
        let fields = FieldIndices {
            url: config.url_index,
            date: config.date_index,
            time: config.time_index,
            timezone: config.tz_index,
            bytes: config.bytes_index,
            status: config.status_index,
            latency: config.latency_index,
        };

        LogFormatSpec::new(matcher, timestamp, fields)
    }
}

/// Parse the leading decimal digits of a numeric field.
///
/// `-`, empty or non-numeric text yields 0; overflow saturates.
pub fn leading_integer(text: &str) -> u64 {
    let text = text.trim_start();
    let end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());

    if end == 0 {
        return 0;
    }

    text[..end].parse().unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = r#"127.0.0.1 - frank [10/Oct/2000:13:55:36 -0700] "GET /apache_pb.gif HTTP/1.0" 200 2326 "http://www.example.com/start.html" "Mozilla/4.08""#;

    fn default_spec() -> LogFormatSpec {
        LogFormatSpec::try_from(&LogFormatConfig::default()).unwrap()
    }

    #[test]
    fn test_extract_combined_line() {
        let spec = default_spec();
        let fields = spec.extract(LINE).unwrap();

        assert_eq!(fields.url, "/apache_pb.gif");
        assert_eq!(fields.date, "10/Oct/2000");
        assert_eq!(fields.time, "13:55:36");
        assert_eq!(fields.timezone, "-0700");
        assert_eq!(fields.status, "200");
        assert_eq!(fields.bytes, "2326");
        assert_eq!(fields.latency, None);
    }

    #[test]
    fn test_parse_timestamp_with_offset() {
        let spec = default_spec();
        let fields = spec.extract(LINE).unwrap();

        // 2000-10-10T20:55:36Z
        assert_eq!(spec.parse_timestamp(&fields), Ok(971_211_336));
    }

    #[test]
    fn test_non_matching_line() {
        let spec = default_spec();
        assert!(spec.extract("garbage").is_none());
        assert!(spec.extract("").is_none());
    }

    #[test]
    fn test_index_out_of_range_is_rejected() {
        let matcher = RegexLineMatcher::new(r"^(\S+) (\S+)$").unwrap();
        let parser = StrftimeParser::new("%d/%b/%Y", "%H:%M:%S", "%z");
        let fields = FieldIndices {
            url: 1,
            date: 2,
            time: 2,
            timezone: 2,
            bytes: 2,
            status: 3,
            latency: None,
        };

        let err = LogFormatSpec::new(matcher, parser, fields).unwrap_err();
        assert!(matches!(err, AggregateError::InvalidFormatSpec { .. }));
    }

    #[test]
    fn test_bad_pattern_is_rejected() {
        let err = RegexLineMatcher::new(r"^(unclosed").unwrap_err();
        assert!(matches!(err, AggregateError::InvalidFormatSpec { .. }));
    }

    #[test]
    fn test_unmatched_optional_group_rejects_line() {
        let matcher = RegexLineMatcher::new(r"^(\S+) (\S+) (\S+) (\S+) (\d+)(?: (\d{3}))?$").unwrap();
        let parser = StrftimeParser::new("%Y-%m-%d", "%H:%M:%S", "%z");
        let fields = FieldIndices {
            url: 1,
            date: 2,
            time: 3,
            timezone: 4,
            bytes: 5,
            status: 6,
            latency: None,
        };
        let spec = LogFormatSpec::new(matcher, parser, fields).unwrap();

        assert!(spec.extract("/a 2024-01-01 00:00:00 +0000 10 200").is_some());
        assert!(spec.extract("/a 2024-01-01 00:00:00 +0000 10").is_none());
    }

    #[test]
    fn test_missing_latency_group_is_not_a_rejection() {
        let matcher = RegexLineMatcher::new(r"^(\S+) (\S+) (\S+) (\S+) (\d+) (\d{3})(?: (\d+))?$").unwrap();
        let parser = StrftimeParser::new("%Y-%m-%d", "%H:%M:%S", "%z");
        let fields = FieldIndices {
            url: 1,
            date: 2,
            time: 3,
            timezone: 4,
            bytes: 5,
            status: 6,
            latency: Some(7),
        };
        let spec = LogFormatSpec::new(matcher, parser, fields).unwrap();

        let with = spec.extract("/a 2024-01-01 00:00:00 +0000 10 200 35").unwrap();
        assert_eq!(with.latency, Some("35"));
        let without = spec.extract("/a 2024-01-01 00:00:00 +0000 10 200").unwrap();
        assert_eq!(without.latency, None);
        assert!(spec.has_latency());
    }

    #[test]
    fn test_leading_integer() {
        assert_eq!(leading_integer("2326"), 2326);
        assert_eq!(leading_integer("-"), 0);
        assert_eq!(leading_integer(""), 0);
        assert_eq!(leading_integer("12abc"), 12);
        assert_eq!(leading_integer("abc"), 0);
        assert_eq!(leading_integer("99999999999999999999999"), u64::MAX);
    }

    #[test]
    fn test_strftime_parser_reports_format() {
        let parser = StrftimeParser::new("%d/%b/%Y", "%H:%M:%S", "%z");
        assert_eq!(parser.format(), "%d/%b/%Y %H:%M:%S %z");

        let err = parser.parse_timestamp("not a date").unwrap_err();
        assert!(err.contains("%d/%b/%Y %H:%M:%S %z"));
    }
}
