//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use shopcheck_common::{Journey, RunReport, StepOutcome};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

/// One journey's outcome, flattened for display
#[derive(Debug, Serialize)]
pub struct OutcomeDisplay {
    pub journey: String,
    pub status: String,
    pub duration_ms: u64,
    pub message: String,
    pub screenshot: Option<String>,
}

impl OutcomeDisplay {
    pub fn new(journey: Journey, outcome: &StepOutcome, screenshot: Option<String>) -> Self {
        Self {
            journey: journey.to_string(),
            status: outcome.status.to_string(),
            duration_ms: outcome.duration_ms,
            message: outcome.message.clone(),
            screenshot,
        }
    }
}

impl TableDisplay for OutcomeDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Journey", "Status", "Duration", "Message", "Screenshot"]
    }

    fn row(&self) -> Vec<String> {
        let duration = if self.duration_ms >= 1000 {
            format!("{:.1}s", self.duration_ms as f64 / 1000.0)
        } else {
            format!("{}ms", self.duration_ms)
        };

        vec![
            self.journey.clone(),
            self.status.clone(),
            duration,
            self.message.clone(),
            self.screenshot.clone().unwrap_or_else(|| "-".to_string()),
        ]
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() {
        println!("No items found.");
        return;
    }

    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }

            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).unwrap_or_default());
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(items).unwrap_or_default());
        }
        OutputFormat::Plain => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                let row = item.row();
                for (header, value) in T::headers().iter().zip(row.iter()) {
                    println!("{}: {}", header, value);
                }
            }
        }
    }
}

/// Print a run report. `screenshots` maps journeys to saved diagnostic files.
pub fn print_report(report: &RunReport, screenshots: &[(Journey, String)], format: OutputFormat) {
    if let OutputFormat::Json = format {
        // Full report, screenshots inline, same shape as the HTTP response
        println!("{}", serde_json::to_string_pretty(report).unwrap_or_default());
        return;
    }

    let rows: Vec<OutcomeDisplay> = report
        .iter()
        .map(|(journey, outcome)| {
            let saved = screenshots
                .iter()
                .find(|(j, _)| j == journey)
                .map(|(_, path)| path.clone());
            OutcomeDisplay::new(*journey, outcome, saved)
        })
        .collect();
    print_list(&rows, format);

    if let OutputFormat::Table = format {
        let passed = report.iter().filter(|(_, o)| o.is_success()).count();
        let summary = format!("{}/{} journeys passed", passed, report.len());
        if report.all_succeeded() {
            print_success(&summary);
        } else {
            print_error(&summary);
        }
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{} {}", "✅".green(), message.green());
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "❌".red(), message.red().bold());
}

/// Print info message
pub fn print_info(message: &str) {
    println!("ℹ️  {}", message);
}
