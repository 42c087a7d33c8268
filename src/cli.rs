//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::analysis::exact_url_filter;
use clap::Parser;
use std::path::PathBuf;

/// loghisto - access-log histograms and top URL rankings
///
/// Reads a web-server access log once and reports requests, transferred
/// volume, 404 errors and latency per time bucket, with the top URLs of
/// each metric. Histogram period, top-N size and log layout come from
/// .loghisto.toml and can be overridden here.
///
/// Examples:
///   loghisto --log /var/log/apache2/access.log
///   loghisto --log access.log --period 300 --format markdown
///   loghisto --log access.log --url-filter '^/api/'
///   loghisto --log access.log --exact-url /index.php --period 10
///   loghisto --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Access log file to analyze
    #[arg(short, long, value_name = "FILE", required_unless_present = "init_config")]
    pub log: Option<PathBuf>,

    /// Only count URLs matching this regular expression
    ///
    /// Used as given, e.g. '^/api/' for a prefix or '^/a$' for one URL.
    #[arg(short = 'f', long, value_name = "REGEX")]
    pub url_filter: Option<String>,

    /// Only count this exact URL (escaped and anchored for you)
    #[arg(long, value_name = "URL", conflicts_with = "url_filter")]
    pub exact_url: Option<String>,

    /// Seconds represented by one histogram bar
    #[arg(short, long, value_name = "SECS")]
    pub period: Option<u64>,

    /// Number of URLs kept in each ranking
    #[arg(short, long, value_name = "COUNT")]
    pub top: Option<usize>,

    /// Maximum number of histogram bars
    #[arg(long, value_name = "COUNT")]
    pub max_buckets: Option<usize>,

    /// Output format (html, markdown, json)
    #[arg(long, default_value = "html", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Output file path for the report
    ///
    /// Defaults to general.output from the config file, with the
    /// extension of the chosen format.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .loghisto.toml in the current directory
    #[arg(short, long, value_name = "FILE", env = "LOGHISTO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .loghisto.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// HTML dashboard with charts (default)
    #[default]
    Html,
    /// Markdown tables
    Markdown,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// File extension for reports in this format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.log.is_none() {
            return Err("A log file is required (--log)".to_string());
        }

        if self.period == Some(0) {
            return Err("Period must be at least 1 second".to_string());
        }

        if self.top == Some(0) {
            return Err("Top must be at least 1".to_string());
        }

        if self.max_buckets == Some(0) {
            return Err("Max buckets must be at least 1".to_string());
        }

        if let Some(ref url) = self.exact_url {
            if url.is_empty() {
                return Err("Exact URL must not be empty".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// The URL filter to apply, with --exact-url pinned to one URL.
    pub fn effective_url_filter(&self) -> Option<String> {
        match self.exact_url {
            Some(ref url) => Some(exact_url_filter(url)),
            None => self.url_filter.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            log: Some(PathBuf::from("access.log")),
            url_filter: None,
            exact_url: None,
            period: None,
            top: None,
            max_buckets: None,
            format: OutputFormat::Html,
            output: None,
            config: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = Args::try_parse_from([
            "loghisto",
            "--log",
            "/var/log/access.log",
            "--period",
            "300",
            "--format",
            "markdown",
            "-f",
            "^/api/",
        ])
        .unwrap();

        assert_eq!(args.log, Some(PathBuf::from("/var/log/access.log")));
        assert_eq!(args.period, Some(300));
        assert_eq!(args.format, OutputFormat::Markdown);
        assert_eq!(args.url_filter.as_deref(), Some("^/api/"));
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_log_required_without_init_config() {
        assert!(Args::try_parse_from(["loghisto"]).is_err());
        assert!(Args::try_parse_from(["loghisto", "--init-config"]).is_ok());
    }

    #[test]
    fn test_filter_options_conflict() {
        let result = Args::try_parse_from([
            "loghisto",
            "--log",
            "a.log",
            "--url-filter",
            "^/a",
            "--exact-url",
            "/a",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_zero_period() {
        let mut args = make_args();
        args.period = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_effective_url_filter() {
        let mut args = make_args();
        assert_eq!(args.effective_url_filter(), None);

        args.url_filter = Some("^/api/".to_string());
        assert_eq!(args.effective_url_filter().as_deref(), Some("^/api/"));

        args.url_filter = None;
        args.exact_url = Some("/a.php".to_string());
        assert_eq!(args.effective_url_filter().as_deref(), Some(r"^/a\.php$"));
    }

    #[test]
    fn test_format_extension() {
        assert_eq!(OutputFormat::Html.extension(), "html");
        assert_eq!(OutputFormat::Markdown.extension(), "md");
        assert_eq!(OutputFormat::Json.extension(), "json");
    }
}
