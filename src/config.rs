//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.loghisto.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".loghisto.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Log line layout.
    #[serde(default)]
    pub log_format: LogFormatConfig,

    /// Histogram and ranking limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "loghisto_report.html".to_string()
}

/// Layout of one access-log line.
///
/// Indices refer to capture groups of `regexp`; group 0 is the whole match.
/// The timestamp is parsed from "<date> <time> <tz>" with the format
/// "<date_format> <time_format> <tz_format>" (chrono strftime syntax).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFormatConfig {
    /// Line pattern.
    #[serde(default = "default_regexp")]
    pub regexp: String,

    #[serde(default = "default_date_format")]
    pub date_format: String,

    #[serde(default = "default_time_format")]
    pub time_format: String,

    #[serde(default = "default_tz_format")]
    pub tz_format: String,

    #[serde(default = "default_url_index")]
    pub url_index: usize,

    #[serde(default = "default_date_index")]
    pub date_index: usize,

    #[serde(default = "default_time_index")]
    pub time_index: usize,

    #[serde(default = "default_tz_index")]
    pub tz_index: usize,

    #[serde(default = "default_bytes_index")]
    pub bytes_index: usize,

    #[serde(default = "default_status_index")]
    pub status_index: usize,

    /// Request duration group (e.g. Apache `%D`), if the format logs one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_index: Option<usize>,
}

impl Default for LogFormatConfig {
    fn default() -> Self {
        Self {
            regexp: default_regexp(),
            date_format: default_date_format(),
            time_format: default_time_format(),
            tz_format: default_tz_format(),
            url_index: default_url_index(),
            date_index: default_date_index(),
            time_index: default_time_index(),
            tz_index: default_tz_index(),
            bytes_index: default_bytes_index(),
            status_index: default_status_index(),
            latency_index: None,
        }
    }
}

// Apache / nginx "combined" log format:
// 127.0.0.1 - frank [10/Oct/2000:13:55:36 -0700] "GET /a.gif HTTP/1.0" 200 2326 ...
fn default_regexp() -> String {
    r#"^(\S+) \S+ \S+ \[([^:\]]+):(\d{2}:\d{2}:\d{2}) ([^\]]+)\] "\S+ (\S+)[^"]*" (\d{3}) (\d+|-)"#
        .to_string()
}

fn default_date_format() -> String {
    "%d/%b/%Y".to_string()
}

fn default_time_format() -> String {
    "%H:%M:%S".to_string()
}

fn default_tz_format() -> String {
    "%z".to_string()
}

fn default_url_index() -> usize {
    5
}

fn default_date_index() -> usize {
    2
}

fn default_time_index() -> usize {
    3
}

fn default_tz_index() -> usize {
    4
}

fn default_bytes_index() -> usize {
    7
}

fn default_status_index() -> usize {
    6
}

/// Histogram and ranking limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Seconds represented by one histogram bar.
    #[serde(default = "default_histo_period")]
    pub histo_period: u64,

    /// Number of URLs kept in each ranking.
    #[serde(default = "default_nb_top_results")]
    pub nb_top_results: usize,

    /// Maximum number of histogram bars.
    #[serde(default = "default_nb_bars_max")]
    pub nb_bars_max: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            histo_period: default_histo_period(),
            nb_top_results: default_nb_top_results(),
            nb_bars_max: default_nb_bars_max(),
        }
    }
}

fn default_histo_period() -> u64 {
    60
}

fn default_nb_top_results() -> usize {
    20
}

fn default_nb_bars_max() -> usize {
    1000
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Offset used for chart time labels, e.g. "+02:00".
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,

    /// Prefix of drill-down links; empty gives relative "?logpath=..." links.
    #[serde(default)]
    pub drilldown_base: String,

    /// Chart colors, one per metric.
    #[serde(default)]
    pub colors: ColorConfig,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            utc_offset: default_utc_offset(),
            drilldown_base: String::new(),
            colors: ColorConfig::default(),
        }
    }
}

fn default_utc_offset() -> String {
    "+00:00".to_string()
}

/// Chart colors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorConfig {
    #[serde(default = "default_requests_color")]
    pub requests: String,
    #[serde(default = "default_bytes_color")]
    pub bytes: String,
    #[serde(default = "default_not_found_color")]
    pub not_found: String,
    #[serde(default = "default_latency_color")]
    pub latency: String,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            requests: default_requests_color(),
            bytes: default_bytes_color(),
            not_found: default_not_found_color(),
            latency: default_latency_color(),
        }
    }
}

fn default_requests_color() -> String {
    "#3366cc".to_string()
}

fn default_bytes_color() -> String {
    "#109618".to_string()
}

fn default_not_found_color() -> String {
    "#dc3912".to_string()
}

fn default_latency_color() -> String {
    "#ff9900".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(period) = args.period {
            self.limits.histo_period = period;
        }
        if let Some(top) = args.top {
            self.limits.nb_top_results = top;
        }
        if let Some(max_buckets) = args.max_buckets {
            self.limits.nb_bars_max = max_buckets;
        }
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
