//! HTML dashboard generation.
//!
//! Charts are drawn in the browser by Google Charts; this module only emits
//! the markup, the data arrays and the drill-down links.

use super::chart::chart_rows;
use crate::analysis::exact_url_filter;
use crate::config::ColorConfig;
use crate::models::{MetricSummary, RankedUrl, Report, TimeBucketWidth};
use chrono::FixedOffset;
use serde_json::json;

const CHARTS_LOADER: &str = "https://www.gstatic.com/charts/loader.js";

/// Builds links that re-run the report pinned to a single URL.
#[derive(Debug, Clone)]
pub struct DrillDown<'a> {
    /// Link prefix; empty for links relative to the current page.
    pub base: &'a str,
    pub log_path: &'a str,
    pub period: TimeBucketWidth,
}

impl DrillDown<'_> {
    /// Link showing only `url`.
    pub fn href(&self, url: &str) -> String {
        format!(
            "{}?logpath={}&urlfilter={}&histo_period={}",
            self.base,
            urlencoding::encode(self.log_path),
            urlencoding::encode(&exact_url_filter(url)),
            self.period.seconds()
        )
    }
}

/// Presentation settings for [`generate_html_report`].
#[derive(Debug, Clone)]
pub struct DashboardContext<'a> {
    pub offset: FixedOffset,
    pub drilldown_base: &'a str,
    pub colors: &'a ColorConfig,
}

/// Escape text for HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// JSON that can sit inside a `<script>` element.
fn script_json(value: &serde_json::Value) -> String {
    value.to_string().replace("</", "<\\/")
}

/// Render one column chart.
///
/// `chart_id` must be unique within the page; it names the draw callback.
pub fn render_chart(
    chart_id: usize,
    rows: &[(String, u64)],
    legend: &str,
    div_id: &str,
    color: &str,
) -> String {
    if rows.is_empty() {
        return "<p class=\"no-data\">No data</p>\n".to_string();
    }

    let mut data = vec![json!(["Time", legend])];
    data.extend(rows.iter().map(|(label, value)| json!([label, value])));
    let data = script_json(&json!(data));

    let mut chart = String::new();
    chart.push_str(&format!(
        "<div id=\"{}\" class=\"histo\"></div>\n",
        escape_html(div_id)
    ));
    chart.push_str("<script type=\"text/javascript\">\n");
    chart.push_str(&format!(
        "  google.charts.setOnLoadCallback(drawHisto{});\n",
        chart_id
    ));
    chart.push_str(&format!("  function drawHisto{}() {{\n", chart_id));
    chart.push_str(&format!(
        "    var data = google.visualization.arrayToDataTable({});\n",
        data
    ));
    chart.push_str(&format!(
        "    var chart = new google.visualization.ColumnChart(document.getElementById({}));\n",
        script_json(&json!(div_id))
    ));
    chart.push_str(&format!(
        "    chart.draw(data, {{colors: [{}], legend: {{position: \"none\"}}}});\n",
        script_json(&json!(color))
    ));
    chart.push_str("  }\n");
    chart.push_str("</script>\n");

    chart
}

/// Render a ranking table with drill-down links and a total row.
pub fn render_table(
    ranking: &[RankedUrl],
    total: u64,
    legend: &str,
    drilldown: &DrillDown<'_>,
) -> String {
    let mut table = String::new();

    table.push_str("<table class=\"table table-bordered table-striped table-condensed\">\n");
    table.push_str(&format!(
        "<thead><tr><th>URL</th><th>{}</th></tr></thead>\n<tbody>\n",
        escape_html(legend)
    ));

    for entry in ranking {
        table.push_str(&format!(
            "<tr><td><a title=\"drill down\" href=\"{}\">{}</a></td><td class=\"occurences\">{}</td></tr>\n",
            escape_html(&drilldown.href(&entry.url)),
            escape_html(&entry.url),
            entry.value
        ));
    }

    table.push_str(&format!(
        "<tr><th>Total</th><th class=\"occurences\">{}</th></tr>\n",
        total
    ));
    table.push_str("</tbody>\n</table>\n");

    table
}

/// Generate the complete dashboard page.
pub fn generate_html_report(report: &Report, context: &DashboardContext<'_>) -> String {
    let result = &report.result;
    let period = result.period();
    let drilldown = DrillDown {
        base: context.drilldown_base,
        log_path: &report.metadata.log_path,
        period,
    };

    let sections: [(&str, &str, &MetricSummary, &str, &str); 4] = [
        (
            "Requests",
            "Requests",
            result.requests(),
            "histo_requests",
            context.colors.requests.as_str(),
        ),
        (
            "Volume",
            "MiB",
            result.bytes(),
            "histo_bytes",
            context.colors.bytes.as_str(),
        ),
        (
            "404 errors",
            "404",
            result.not_found(),
            "histo_404",
            context.colors.not_found.as_str(),
        ),
        (
            "Latency",
            "Time",
            result.latency(),
            "histo_latency",
            context.colors.latency.as_str(),
        ),
    ];

    let mut page = String::new();

    page.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    page.push_str(&format!(
        "<title>Log report: {}</title>\n",
        escape_html(&report.metadata.log_path)
    ));
    page.push_str(&format!(
        "<script type=\"text/javascript\" src=\"{}\"></script>\n",
        CHARTS_LOADER
    ));
    page.push_str(
        "<script type=\"text/javascript\">google.charts.load(\"current\", {packages: [\"corechart\"]});</script>\n",
    );
    page.push_str("</head>\n<body>\n");

    page.push_str(&format!(
        "<h1>{}</h1>\n",
        escape_html(&report.metadata.log_path)
    ));
    page.push_str("<ul class=\"metadata\">\n");
    if let Some(ref filter) = report.metadata.url_filter {
        page.push_str(&format!(
            "<li>URL filter: <code>{}</code></li>\n",
            escape_html(filter)
        ));
    }
    page.push_str(&format!(
        "<li>Histogram period: {}s</li>\n",
        period.seconds()
    ));
    page.push_str(&format!(
        "<li>Lines: {} read, {} accepted, {} skipped</li>\n",
        result.stats().lines_read,
        result.stats().lines_accepted,
        result.stats().lines_skipped()
    ));
    page.push_str(&format!(
        "<li>Generated: {}</li>\n",
        report.metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    page.push_str("</ul>\n");

    for (chart_id, (title, legend, summary, div_id, color)) in sections.into_iter().enumerate() {
        let rows = chart_rows(summary.histogram(), period, &context.offset);

        page.push_str(&format!("<h2>{}</h2>\n", escape_html(title)));
        page.push_str(&render_chart(chart_id + 1, &rows, legend, div_id, color));
        page.push_str(&render_table(
            summary.top(),
            summary.total(),
            legend,
            &drilldown,
        ));
    }

    page.push_str("</body>\n</html>\n");

    page
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AggregationResult, Histogram, ReportMetadata, RunStats};
    use chrono::Utc;

    fn period() -> TimeBucketWidth {
        TimeBucketWidth::new(60).unwrap()
    }

    fn create_test_report() -> Report {
        let mut histo = Histogram::default();
        histo.add(1_704_103_200, 3);
        let requests = MetricSummary::new(
            histo,
            vec![RankedUrl {
                url: "/a?b=1&c=<2>".to_string(),
                value: 3,
            }],
            3,
        );

        Report {
            metadata: ReportMetadata {
                log_path: "/var/log/apache2/access.log".to_string(),
                url_filter: Some("^/a".to_string()),
                generated_at: Utc::now(),
                duration_seconds: 0.1,
            },
            result: AggregationResult::new(
                period(),
                requests,
                MetricSummary::default(),
                MetricSummary::default(),
                MetricSummary::default(),
                RunStats {
                    lines_read: 4,
                    lines_accepted: 3,
                },
            ),
        }
    }

    #[test]
    fn test_drilldown_href() {
        let drilldown = DrillDown {
            base: "/report",
            log_path: "/var/log/access.log",
            period: period(),
        };

        assert_eq!(
            drilldown.href("/a.php"),
            "/report?logpath=%2Fvar%2Flog%2Faccess.log&urlfilter=%5E%2Fa%5C.php%24&histo_period=60"
        );
    }

    #[test]
    fn test_render_chart() {
        let rows = vec![("10:00".to_string(), 2), ("10:01".to_string(), 0)];
        let chart = render_chart(7, &rows, "Requests", "histo_requests", "#3366cc");

        assert!(chart.contains("drawHisto7"));
        assert!(chart.contains(r#"[["Time","Requests"],["10:00",2],["10:01",0]]"#));
        assert!(chart.contains(r#"document.getElementById("histo_requests")"#));
        assert!(chart.contains(r##"colors: ["#3366cc"]"##));
    }

    #[test]
    fn test_render_chart_without_data() {
        let chart = render_chart(1, &[], "Requests", "histo", "#000");
        assert!(chart.contains("No data"));
        assert!(!chart.contains("<script"));
    }

    #[test]
    fn test_chart_legend_cannot_close_script() {
        let rows = vec![("10:00".to_string(), 1)];
        let chart = render_chart(1, &rows, "</script><b>", "histo", "#000");
        assert!(!chart.contains("</script><b>"));
    }

    #[test]
    fn test_render_table_escapes() {
        let drilldown = DrillDown {
            base: "",
            log_path: "access.log",
            period: period(),
        };
        let ranking = vec![RankedUrl {
            url: "/<script>".to_string(),
            value: 5,
        }];

        let table = render_table(&ranking, 9, "Requests", &drilldown);
        assert!(table.contains("&lt;script&gt;"));
        assert!(!table.contains("<script>"));
        assert!(table.contains("?logpath=access.log&amp;urlfilter="));
        assert!(table.contains("<th class=\"occurences\">9</th>"));
    }

    #[test]
    fn test_generate_html_report() {
        let report = create_test_report();
        let colors = ColorConfig::default();
        let context = DashboardContext {
            offset: FixedOffset::east_opt(0).unwrap(),
            drilldown_base: "",
            colors: &colors,
        };

        let html = generate_html_report(&report, &context);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains(CHARTS_LOADER));
        assert!(html.contains("drawHisto1"));
        assert!(html.contains("<h2>404 errors</h2>"));
        assert!(html.contains("/a?b=1&amp;c=&lt;2&gt;"));
        assert!(html.contains("4 read, 3 accepted, 1 skipped"));
        // the other metrics are empty
        assert_eq!(html.matches("No data").count(), 3);
    }
}
