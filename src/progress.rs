//! Progress event sink.
//!
//! The engines emit a small set of events and never depend on how they are
//! rendered. The default console reporter prints one glyph line per event;
//! tests use the recording reporter.

use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One line of the displayed plan.
#[derive(Debug, Clone)]
pub struct PlanEntry {
    pub name: &'static str,
    pub description: &'static str,
    pub estimate: Duration,
}

pub trait ProgressReporter: Send + Sync {
    fn plan_started(&self, entries: &[PlanEntry]);
    fn step_started(&self, name: &str, description: &str);
    fn step_succeeded(&self, name: &str);
    fn step_failed(&self, name: &str, error: &str);
    fn step_skipped(&self, name: &str, reason: &str);
    /// Free-form phase message (teardown phases, summaries).
    fn phase(&self, message: &str);
}

/// Prints plain console lines, one per event.
pub struct ConsoleReporter;

fn format_estimate(estimate: Duration) -> String {
    let secs = estimate.as_secs();
    if secs >= 60 {
        format!("~{}m", secs / 60)
    } else {
        format!("~{secs}s")
    }
}

impl ProgressReporter for ConsoleReporter {
    fn plan_started(&self, entries: &[PlanEntry]) {
        println!("Deployment plan ({} steps)", entries.len());
        println!("{}", "─".repeat(60));
        for (i, entry) in entries.iter().enumerate() {
            println!(
                "  {}. {} ({}) - {}",
                i + 1,
                entry.name,
                format_estimate(entry.estimate),
                entry.description
            );
        }
        println!();
    }

    fn step_started(&self, name: &str, description: &str) {
        println!("▶ {name}: {description}");
    }

    fn step_succeeded(&self, name: &str) {
        println!("✓ {name}");
    }

    fn step_failed(&self, name: &str, error: &str) {
        println!("✗ {name}: {error}");
    }

    fn step_skipped(&self, name: &str, reason: &str) {
        println!("- {name} (skipped: {reason})");
    }

    fn phase(&self, message: &str) {
        println!("{message}");
    }
}

/// Records events for test assertions.
#[derive(Default, Clone)]
pub struct RecordingReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl ProgressReporter for RecordingReporter {
    fn plan_started(&self, entries: &[PlanEntry]) {
        self.record(format!("plan:{}", entries.len()));
    }

    fn step_started(&self, name: &str, _description: &str) {
        self.record(format!("started:{name}"));
    }

    fn step_succeeded(&self, name: &str) {
        self.record(format!("succeeded:{name}"));
    }

    fn step_failed(&self, name: &str, _error: &str) {
        self.record(format!("failed:{name}"));
    }

    fn step_skipped(&self, name: &str, _reason: &str) {
        self.record(format!("skipped:{name}"));
    }

    fn phase(&self, _message: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_estimate() {
        assert_eq!(format_estimate(Duration::from_secs(30)), "~30s");
        assert_eq!(format_estimate(Duration::from_secs(90)), "~1m");
        assert_eq!(format_estimate(Duration::from_secs(600)), "~10m");
    }

    #[test]
    fn test_recording_reporter_order() {
        let reporter = RecordingReporter::new();
        reporter.step_started("infrastructure", "provision");
        reporter.step_succeeded("infrastructure");
        reporter.step_skipped("monitoring", "disabled");
        assert_eq!(
            reporter.events(),
            vec!["started:infrastructure", "succeeded:infrastructure", "skipped:monitoring"]
        );
    }
}
