//! Error types for the aggregation engine.
//!
//! Every variant is terminal for a run: the aggregator never returns a
//! partially built result.

use thiserror::Error;

/// Failure of a single aggregation run.
#[derive(Error, Debug)]
pub enum AggregateError {
    /// The log source could not be opened or read.
    #[error("Can not read {name}: {source} (does the file exist? is it readable by the current user?)")]
    SourceUnreadable {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The log format description is unusable.
    #[error("Invalid log format: {message}")]
    InvalidFormatSpec { message: String },

    /// The histogram period is not a positive number of seconds.
    #[error("Invalid histogram period '{value}': must be a positive number of seconds")]
    InvalidBucketWidth { value: String },

    /// The URL filter is not a valid regular expression.
    #[error("Invalid URL filter '{pattern}': {message}")]
    InvalidUrlFilter { pattern: String, message: String },

    /// An accepted line carried a timestamp the configured format can't parse.
    #[error("Malformed timestamp '{text}' on line {line}: {message}")]
    MalformedTimestamp {
        line: u64,
        text: String,
        message: String,
    },

    /// The bucket width is too small for the time range of the log.
    #[error("Too many columns in the graph ({count} > {max}), please increase the histogram period")]
    TooManyBuckets { count: usize, max: usize },
}

impl AggregateError {
    /// Shorthand for building an `InvalidFormatSpec` error.
    pub fn format_spec(message: impl Into<String>) -> Self {
        AggregateError::InvalidFormatSpec {
            message: message.into(),
        }
    }
}
