//! Markdown and JSON report generation.
//!
//! This module renders an aggregation report as a Markdown document or
//! as pretty-printed JSON.

use super::chart::chart_rows;
use crate::models::{MetricSummary, Report, ReportMetadata, RunStats, TimeBucketWidth};
use anyhow::Result;
use chrono::FixedOffset;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, offset: &FixedOffset) -> String {
    let mut output = String::new();
    let result = &report.result;

    // Title
    output.push_str("# Access Log Report\n\n");

    // Metadata section
    output.push_str(&generate_metadata_section(
        &report.metadata,
        result.period(),
        result.stats(),
    ));

    // Totals
    output.push_str(&generate_summary_section(report));

    if result.is_empty() {
        output.push_str("No request matched the log format and URL filter.\n\n");
        output.push_str(&generate_footer());
        return output;
    }

    // One section per metric
    let metrics = [
        ("Requests", "Requests", result.requests()),
        ("Volume", "MiB", result.bytes()),
        ("404 Errors", "404", result.not_found()),
        ("Latency", "Time", result.latency()),
    ];
    for (title, unit, summary) in metrics {
        output.push_str(&generate_metric_section(
            title,
            unit,
            summary,
            result.period(),
            offset,
        ));
    }

    // Footer
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(
    metadata: &ReportMetadata,
    period: TimeBucketWidth,
    stats: RunStats,
) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Log File:** `{}`\n", metadata.log_path));
    if let Some(ref filter) = metadata.url_filter {
        section.push_str(&format!("- **URL Filter:** `{}`\n", filter));
    }
    section.push_str(&format!("- **Histogram Period:** {}s\n", period.seconds()));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Lines:** {} read, {} accepted, {} skipped\n",
        stats.lines_read,
        stats.lines_accepted,
        stats.lines_skipped()
    ));
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the totals table.
fn generate_summary_section(report: &Report) -> String {
    let result = &report.result;
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Requests | Volume (MiB) | 404 Errors | Latency |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} |\n\n",
        result.requests().total(),
        result.bytes().total(),
        result.not_found().total(),
        result.latency().total()
    ));

    section
}

/// Generate the histogram and ranking tables of one metric.
fn generate_metric_section(
    title: &str,
    unit: &str,
    summary: &MetricSummary,
    period: TimeBucketWidth,
    offset: &FixedOffset,
) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", title));

    section.push_str(&format!("| Time | {} |\n", unit));
    section.push_str("|:---|---:|\n");
    for (label, value) in chart_rows(summary.histogram(), period, offset) {
        section.push_str(&format!("| {} | {} |\n", label, value));
    }
    section.push('\n');

    if !summary.top().is_empty() {
        section.push_str(&format!("### Top URLs by {}\n\n", unit));
        section.push_str(&format!("| URL | {} |\n", unit));
        section.push_str("|:---|---:|\n");
        for entry in summary.top() {
            section.push_str(&format!(
                "| `{}` | {} |\n",
                entry.url.replace('|', "\\|"),
                entry.value
            ));
        }
        section.push_str(&format!("| **Total** | **{}** |\n", summary.total()));
        section.push('\n');
    }

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by loghisto v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AggregationResult, Histogram, RankedUrl};
    use chrono::Utc;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn create_test_report() -> Report {
        let period = TimeBucketWidth::new(60).unwrap();
        let mut histo = Histogram::default();
        histo.add(1_704_103_200, 2);
        histo.add(1_704_103_260, 0);

        let requests = MetricSummary::new(
            histo.clone(),
            vec![
                RankedUrl {
                    url: "/index.html".to_string(),
                    value: 1,
                },
                RankedUrl {
                    url: "/a|b".to_string(),
                    value: 1,
                },
            ],
            2,
        );

        Report {
            metadata: ReportMetadata {
                log_path: "/var/log/nginx/access.log".to_string(),
                url_filter: None,
                generated_at: Utc::now(),
                duration_seconds: 0.25,
            },
            result: AggregationResult::new(
                period,
                requests,
                MetricSummary::new(histo.clone(), Vec::new(), 0),
                MetricSummary::new(histo.clone(), Vec::new(), 0),
                MetricSummary::new(histo, Vec::new(), 0),
                RunStats {
                    lines_read: 3,
                    lines_accepted: 2,
                },
            ),
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = create_test_report();
        let markdown = generate_markdown_report(&report, &utc());

        assert!(markdown.contains("# Access Log Report"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("## Summary"));
        assert!(markdown.contains("## Requests"));
        assert!(markdown.contains("## 404 Errors"));
        assert!(markdown.contains("| 10:00 | 2 |"));
        assert!(markdown.contains("| 10:01 | 0 |"));
        assert!(markdown.contains("`/index.html`"));
        assert!(markdown.contains("`/a\\|b`"));
    }

    #[test]
    fn test_generate_metadata_section() {
        let mut report = create_test_report();
        report.metadata.url_filter = Some("^/api/".to_string());

        let section = generate_metadata_section(
            &report.metadata,
            report.result.period(),
            report.result.stats(),
        );

        assert!(section.contains("/var/log/nginx/access.log"));
        assert!(section.contains("URL Filter:** `^/api/`"));
        assert!(section.contains("60s"));
        assert!(section.contains("3 read, 2 accepted, 1 skipped"));
    }

    #[test]
    fn test_empty_report() {
        let period = TimeBucketWidth::new(60).unwrap();
        let report = Report {
            metadata: ReportMetadata {
                log_path: "empty.log".to_string(),
                url_filter: None,
                generated_at: Utc::now(),
                duration_seconds: 0.0,
            },
            result: AggregationResult::new(
                period,
                MetricSummary::default(),
                MetricSummary::default(),
                MetricSummary::default(),
                MetricSummary::default(),
                RunStats::default(),
            ),
        };

        let markdown = generate_markdown_report(&report, &utc());
        assert!(markdown.contains("No request matched"));
        assert!(!markdown.contains("## Requests"));
    }

    #[test]
    fn test_generate_json_report() {
        let report = create_test_report();
        let json = generate_json_report(&report).unwrap();

        assert!(json.contains("\"log_path\""));
        assert!(json.contains("\"requests\""));
        assert!(json.contains("\"not_found\""));
        assert!(json.contains("\"1704103200\": 2"));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["result"]["period"], 60);
        assert_eq!(value["result"]["requests"]["total"], 2);
    }
}
