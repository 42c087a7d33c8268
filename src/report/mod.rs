//! Report rendering: HTML dashboard, Markdown and JSON.

pub mod chart;
pub mod dashboard;
pub mod generator;

pub use dashboard::{generate_html_report, DashboardContext};
pub use generator::{generate_json_report, generate_markdown_report};
