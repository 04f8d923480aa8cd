//! Progress indicators for djdeploy

use colored::Colorize;
use declarative::{ApplyResult, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Create a spinner with a message
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Symbol shown next to a finished resource
pub fn result_symbol(result: &ApplyResult) -> colored::ColoredString {
    match result {
        ApplyResult::NoChange => "○".dimmed(),
        ApplyResult::Created | ApplyResult::Modified | ApplyResult::Removed => "✓".green(),
        ApplyResult::Failed { .. } => "✗".red(),
        ApplyResult::Skipped { .. } => "⊘".yellow(),
    }
}

/// Shows a spinner while each deployment runs and one line when it finishes
#[derive(Default)]
pub struct DeployProgress {
    current: Option<ProgressBar>,
    position: usize,
    total: usize,
}

impl DeployProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressCallback for DeployProgress {
    fn on_run_start(&mut self, count: usize) {
        self.total = count;
        println!();
        println!("  {} Deploying {} applications...", "→".cyan(), count);
    }

    fn on_resource_start(&mut self, _id: &str, description: &str) {
        self.position += 1;
        let msg = format!("[{}/{}] {}", self.position, self.total, description);
        self.current = Some(spinner(&msg));
    }

    fn on_resource_complete(&mut self, id: &str, result: &ApplyResult) {
        if let Some(pb) = self.current.take() {
            pb.finish_and_clear();
        }
        let detail = match result {
            ApplyResult::Failed { error } => format!(" {}", error.red()),
            ApplyResult::Skipped { reason } => format!(" ({reason})").dimmed().to_string(),
            ApplyResult::NoChange => " (unchanged)".dimmed().to_string(),
            _ => String::new(),
        };
        println!("    {} {}{}", result_symbol(result), id, detail);
    }

    fn on_run_complete(&mut self) {
        if let Some(pb) = self.current.take() {
            pb.finish_and_clear();
        }
    }
}
