//! Output formatting module for Fleetcall
//!
//! Colored human output and JSON output for run results and host listings.

use colored::Colorize;
use fleetcall::engine::TaskOutcome;
use fleetcall::runner::ResultSet;
use serde_json::Value;
use std::time::{Duration, Instant};

/// Colored label for an outcome
pub fn colored_outcome(outcome: TaskOutcome) -> String {
    match outcome {
        TaskOutcome::Ok => "ok".green().to_string(),
        TaskOutcome::Changed => "changed".yellow().to_string(),
        TaskOutcome::Skipped => "skipping".cyan().to_string(),
        TaskOutcome::Failed => "failed".red().bold().to_string(),
        TaskOutcome::Unreachable => "unreachable".red().bold().to_string(),
    }
}

fn outcome_of(record: &Value) -> TaskOutcome {
    match record.get("state").and_then(Value::as_str) {
        Some("changed") => TaskOutcome::Changed,
        Some("failed") => TaskOutcome::Failed,
        Some("skipped") => TaskOutcome::Skipped,
        Some("unreachable") => TaskOutcome::Unreachable,
        Some("ok") => TaskOutcome::Ok,
        _ => TaskOutcome::from_payload(record),
    }
}

/// Short message shown next to a host result
fn summary_message(record: &Value) -> Option<String> {
    ["msg", "stdout", "ping"]
        .iter()
        .find_map(|key| record.get(*key))
        .map(|value| match value {
            Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        })
        .filter(|s| !s.is_empty())
}

/// Output formatter for different output modes
pub struct OutputFormatter {
    /// Use colored output
    use_color: bool,
    /// JSON output mode
    json_mode: bool,
    /// Verbosity level
    verbosity: u8,
    /// Start time for duration calculations
    start_time: Instant,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(use_color: bool, json_mode: bool, verbosity: u8) -> Self {
        // Respect NO_COLOR environment variable
        let use_color = use_color && std::env::var("NO_COLOR").is_err();
        if !use_color {
            colored::control::set_override(false);
        }

        Self {
            use_color,
            json_mode,
            verbosity,
            start_time: Instant::now(),
        }
    }

    pub fn is_json(&self) -> bool {
        self.json_mode
    }

    /// Print a section header
    pub fn section(&self, title: &str) {
        if self.json_mode {
            return;
        }

        if self.use_color {
            println!("\n{}", title.cyan().bold());
            println!("{}", "-".repeat(title.len()).cyan());
        } else {
            println!("\n{}", title);
            println!("{}", "-".repeat(title.len()));
        }
    }

    /// Print one host result line
    pub fn task_result(&self, host: &str, outcome: TaskOutcome, message: Option<&str>) {
        let status_str = if self.use_color {
            colored_outcome(outcome)
        } else {
            outcome.as_str().to_string()
        };

        let host_str = if self.use_color {
            host.bright_white().bold().to_string()
        } else {
            host.to_string()
        };

        match message {
            Some(msg) => println!("{}: [{}] => {}", status_str, host_str, msg),
            None => println!("{}: [{}]", status_str, host_str),
        }
    }

    /// Print a whole result set
    pub fn results(&self, results: &ResultSet) {
        if self.json_mode {
            println!(
                "{}",
                serde_json::to_string_pretty(results).unwrap_or_default()
            );
            return;
        }

        for (host, record) in results.contacted.iter().chain(results.dark.iter()) {
            let message = if self.verbosity >= 1 {
                Some(record.to_string())
            } else {
                summary_message(record)
            };
            self.task_result(host, outcome_of(record), message.as_deref());
        }

        let summary = format!(
            "{} contacted, {} dark in {}",
            results.contacted.len(),
            results.dark.len(),
            format_duration(self.start_time.elapsed())
        );
        if !self.use_color {
            println!("\n{}", summary);
        } else if results.dark.is_empty() {
            println!("\n{}", summary.green());
        } else {
            println!("\n{}", summary.red());
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.json_mode {
            let err = serde_json::json!({
                "type": "error",
                "message": message
            });
            eprintln!("{}", err);
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "ERROR:".red().bold(), message);
        } else {
            eprintln!("ERROR: {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.json_mode {
            let warn = serde_json::json!({
                "type": "warning",
                "message": message
            });
            eprintln!("{}", warn);
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "WARNING:".yellow().bold(), message);
        } else {
            eprintln!("WARNING: {}", message);
        }
    }

    /// Print a list of items
    pub fn list(&self, title: &str, items: &[String]) {
        if self.json_mode {
            let list = serde_json::json!({
                "title": title,
                "items": items
            });
            println!("{}", serde_json::to_string_pretty(&list).unwrap_or_default());
            return;
        }

        if self.use_color {
            println!("\n{}:", title.bright_white().bold());
        } else {
            println!("\n{}:", title);
        }

        for item in items {
            if self.use_color {
                println!("  {} {}", "-".bright_black(), item);
            } else {
                println!("  - {}", item);
            }
        }
    }
}

/// Format a duration as a human-readable string
fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}.{:03}s", secs, millis)
    } else {
        format!("{}ms", millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_colored_outcome_text() {
        assert!(colored_outcome(TaskOutcome::Ok).contains("ok"));
        assert!(colored_outcome(TaskOutcome::Skipped).contains("skipping"));
        assert!(colored_outcome(TaskOutcome::Unreachable).contains("unreachable"));
    }

    #[test]
    fn test_outcome_of_record() {
        assert_eq!(outcome_of(&json!({"state": "changed"})), TaskOutcome::Changed);
        assert_eq!(outcome_of(&json!({"failed": true})), TaskOutcome::Failed);
    }

    #[test]
    fn test_summary_message() {
        assert_eq!(
            summary_message(&json!({"ping": "pong", "state": "ok"})),
            Some("pong".to_string())
        );
        assert_eq!(
            summary_message(&json!({"msg": "timed out", "stdout": "x"})),
            Some("timed out".to_string())
        );
        assert_eq!(summary_message(&json!({"stdout": ""})), None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs(5)), "5.000s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
    }
}
