//! Output formatting utilities

use console::{style, Style};
use serde::Serialize;

use launchpad_core::{Build, VersionState};

/// Print a success message
pub fn success(message: &str) {
    println!("{} {}", style("✓").green().bold(), message);
}

/// Print an error message
pub fn error(message: &str) {
    eprintln!("{} {}", style("✗").red().bold(), message);
}

/// Print a warning message
pub fn warning(message: &str) {
    println!("{} {}", style("!").yellow().bold(), message);
}

/// Print an info message
pub fn info(message: &str) {
    println!("{} {}", style("→").blue(), message);
}

/// Create a styled header
pub fn header(text: &str) -> String {
    style(text).bold().to_string()
}

/// Create a styled key-value line
pub fn key_value(key: &str, value: &str) -> String {
    format!("  {}: {}", style(key).dim(), value)
}

/// Pretty-print any serializable value as JSON
pub fn json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Style for version strings
pub fn version_style() -> Style {
    Style::new().green().bold()
}

/// Style for ids
pub fn id_style() -> Style {
    Style::new().cyan()
}

/// Style for a version state
pub fn state_style(state: VersionState) -> Style {
    match state {
        VersionState::Approved => Style::new().green(),
        VersionState::Rejected => Style::new().red().bold(),
        VersionState::WaitingForReview | VersionState::InReview => Style::new().yellow(),
        VersionState::BuildSelected => Style::new().cyan(),
        VersionState::Draft | VersionState::BuildPending => Style::new().dim(),
    }
}

/// One-line build summary
pub fn build_line(build: &Build) -> String {
    let marker = if build.selected {
        style("●").green().to_string()
    } else {
        " ".to_string()
    };
    format!(
        "{} {} {} {}",
        marker,
        style(&build.build_number).bold(),
        style(build.processing_state.as_str()).dim(),
        id_style().apply_to(&build.remote_build_id)
    )
}
