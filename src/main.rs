//! loghisto - access-log histograms for ad-hoc operational reports
//!
//! A CLI tool that reads a web-server access log in a single pass and
//! reports requests, transferred volume, 404 errors and latency per time
//! bucket, together with the top URLs of each metric.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, unreadable log, malformed timestamp, too many bars, etc.)

mod analysis;
mod cli;
mod config;
mod error;
mod format;
mod models;
mod report;

use analysis::{AggregateOptions, Aggregator};
use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::Config;
use error::AggregateError;
use format::LogFormatSpec;
use indicatif::{ProgressBar, ProgressStyle};
use models::{AggregationResult, Report, ReportMetadata, TimeBucketWidth};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration, then initialize logging (config may ask for verbose)
    let loaded = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    init_logging(&args, &loaded.config);

    info!("loghisto v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    match loaded.problem {
        Some(ref problem) => warn!("Failed to load config, using defaults: {}", problem),
        None => info!("Configuration: {}", loaded.source),
    }

    match run_report(args, loaded.config) {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Report failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .loghisto.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE);
    println!("   Edit it to describe your log format, histogram period and limits.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = if config.general.verbose && !args.quiet {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete report workflow.
fn run_report(args: Args, config: Config) -> Result<()> {
    let start_time = Instant::now();

    let log_path = args.log.clone().context("A log file is required (--log)")?;
    let url_filter = args.effective_url_filter();

    // Step 1: Build the aggregator
    let format: LogFormatSpec = LogFormatSpec::try_from(&config.log_format)
        .context("Invalid [log_format] configuration")?;
    let period = TimeBucketWidth::new(config.limits.histo_period)?;
    let options = AggregateOptions {
        period,
        top_n: config.limits.nb_top_results,
        max_buckets: config.limits.nb_bars_max,
        url_filter: url_filter.clone(),
    };
    let aggregator = Aggregator::new(format, options)?;
    let offset = report::chart::parse_offset(&config.report.utc_offset)?;

    // Step 2: Aggregate the log
    if !args.quiet {
        println!("📥 Reading log: {}", log_path.display());
        println!("   Period: {}s", period.seconds());
        if let Some(ref filter) = url_filter {
            println!("   URL filter: {}", filter);
        }
    }

    let result = aggregate_with_progress(&aggregator, &log_path, !args.quiet)?;
    if result.is_empty() {
        warn!("No line of {} matched the log format and URL filter", log_path.display());
    }

    // Step 3: Build and render the report
    let report = Report {
        metadata: ReportMetadata {
            log_path: log_path.display().to_string(),
            url_filter,
            generated_at: Utc::now(),
            duration_seconds: start_time.elapsed().as_secs_f64(),
        },
        result,
    };

    let output = match args.format {
        OutputFormat::Html => {
            let context = report::DashboardContext {
                offset,
                drilldown_base: &config.report.drilldown_base,
                colors: &config.report.colors,
            };
            report::generate_html_report(&report, &context)
        }
        OutputFormat::Markdown => report::generate_markdown_report(&report, &offset),
        OutputFormat::Json => report::generate_json_report(&report)?,
    };

    let output_path = match args.output {
        Some(ref path) => path.clone(),
        None => PathBuf::from(&config.general.output).with_extension(args.format.extension()),
    };
    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    // Print summary
    if !args.quiet {
        let result = &report.result;
        println!("\n📊 Summary:");
        println!(
            "   Lines: {} read, {} accepted",
            result.stats().lines_read,
            result.stats().lines_accepted
        );
        println!("   Requests: {}", result.requests().total());
        println!("   Volume: {} MiB", result.bytes().total());
        println!("   404 errors: {}", result.not_found().total());
        println!("   Bars: {}", result.requests().histogram().len());
        println!("   Duration: {:.1}s", report.metadata.duration_seconds);
        println!("\n✅ Report saved to: {}", output_path.display());
    }

    Ok(())
}

/// Aggregate the log, showing a byte-based progress bar when requested.
fn aggregate_with_progress(
    aggregator: &Aggregator,
    path: &Path,
    show_progress: bool,
) -> Result<AggregationResult, AggregateError> {
    if !show_progress {
        return aggregator.aggregate_file(path);
    }

    let name = path.display().to_string();
    let file = File::open(path).map_err(|source| AggregateError::SourceUnreadable {
        name: name.clone(),
        source,
    })?;
    let len = file.metadata().map(|m| m.len()).unwrap_or(0);

    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    let result = aggregator.aggregate_reader(pb.wrap_read(file), &name);
    pb.finish_and_clear();

    result
}

/// Configuration with a description of where it came from.
struct LoadedConfig {
    config: Config,
    source: String,
    /// Why the default config file was ignored, if it was.
    problem: Option<String>,
}

/// Load configuration from file or use defaults, then apply CLI overrides.
fn load_config(args: &Args) -> Result<LoadedConfig> {
    let (mut config, source, problem) = if let Some(ref config_path) = args.config {
        // Explicit path: failures are fatal
        let found = Config::load(config_path)?;
        (found, config_path.display().to_string(), None)
    } else {
        // Default location: failures fall back to defaults
        match Config::load_default() {
            Ok(Some(found)) => (found, config::CONFIG_FILE.to_string(), None),
            Ok(None) => (Config::default(), "defaults".to_string(), None),
            Err(e) => (Config::default(), "defaults".to_string(), Some(format!("{:#}", e))),
        }
    };

    config.merge_with_args(args);

    Ok(LoadedConfig {
        config,
        source,
        problem,
    })
}
