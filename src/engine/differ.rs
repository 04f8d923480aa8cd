//! Diff display

use colored::Colorize;
use declarative::{DiffSummary, ResourceDiff, ResourceState};
use similar::{ChangeTag, TextDiff};

/// Display a list of diffs in a user-friendly format
pub fn display_diff(diffs: &[ResourceDiff]) {
    if diffs.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Deployment Plan".bold()
    );
    println!("│");

    for diff in diffs {
        let symbol = match (&diff.current, &diff.desired) {
            (ResourceState::Absent, ResourceState::Present { .. }) => "+".green(),
            (ResourceState::Modified { .. }, _) => "~".yellow(),
            (ResourceState::Unknown, _) => "?".red(),
            _ => "→".cyan(),
        };
        println!("│ {} {}", symbol, diff.description);
        println!("│     {}", state_desc(&diff.current, &diff.desired).dimmed());
    }

    let summary = DiffSummary::from_diffs(diffs);
    println!("│");
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} to deploy ({} new local settings, {} updates)",
        summary.total().to_string().bold(),
        summary.additions.to_string().green(),
        summary.modifications.to_string().yellow()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

fn state_desc(current: &ResourceState, desired: &ResourceState) -> String {
    match (current, desired) {
        (ResourceState::Absent, ResourceState::Present { details }) => format!(
            "write {}",
            details.as_deref().unwrap_or("local settings")
        ),
        (ResourceState::Modified { to, .. }, _) => format!("rewrite {to}"),
        (ResourceState::Unknown, _) => "attributes could not be resolved".to_string(),
        _ => "run management commands".to_string(),
    }
}

/// Print a unified line diff between two texts; returns whether they differ
pub fn display_content_diff(old: &str, new: &str) -> bool {
    let diff = TextDiff::from_lines(old, new);
    let mut has_changes = false;

    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Delete => {
                has_changes = true;
                print!("    {}", format!("- {change}").red());
            }
            ChangeTag::Insert => {
                has_changes = true;
                print!("    {}", format!("+ {change}").green());
            }
            ChangeTag::Equal => {}
        }
    }

    if !has_changes {
        println!("    {}", "(files are identical)".dimmed());
    }
    has_changes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_desc() {
        let desired = ResourceState::Present {
            details: Some("/srv/shop/mysite/local_settings.py".into()),
        };
        assert_eq!(
            state_desc(&ResourceState::Absent, &desired),
            "write /srv/shop/mysite/local_settings.py"
        );
        assert_eq!(
            state_desc(&desired, &desired),
            "run management commands"
        );
    }

    #[test]
    fn test_content_diff_detects_changes() {
        assert!(display_content_diff("DEBUG = True\n", "DEBUG = False\n"));
        assert!(!display_content_diff("DEBUG = True\n", "DEBUG = True\n"));
    }
}
