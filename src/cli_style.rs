/*!
 * CLI Style System
 *
 * Themed text, icons and summary tables for terminal output.
 */

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use console::{style, StyledObject};

use crate::report::StageReport;

// ============================================================================
// THEME COLORS
// ============================================================================

pub struct Theme;

impl Theme {
    pub fn success<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).green()
    }

    pub fn warning<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).yellow()
    }

    pub fn error<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).red()
    }

    /// Muted/secondary text (dim)
    pub fn muted<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).dim()
    }

    /// Header style (bold green)
    pub fn header<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).green().bold()
    }
}

// ============================================================================
// ICONS
// ============================================================================

pub struct Icons;

impl Icons {
    pub const SUCCESS: &'static str = "✓";
    pub const ERROR: &'static str = "✗";
    pub const WARNING: &'static str = "⚠";

    pub const TREE: &'static str = "🌲";
    pub const DOWNLOAD: &'static str = "📦";
    pub const MAP: &'static str = "🗺";
    pub const MANIFEST: &'static str = "📋";
    pub const BROOM: &'static str = "🧹";

    pub const ARROW_RIGHT: &'static str = "→";
}

/// Icon shown next to a stage heading
pub fn stage_icon(stage: &str) -> &'static str {
    match stage {
        "fetch" => Icons::DOWNLOAD,
        "export" | "chunk" => Icons::MAP,
        "index" => Icons::MANIFEST,
        "cleanup" => Icons::BROOM,
        _ => Icons::TREE,
    }
}

/// Draw a section header with a line
pub fn section_header(title: &str) {
    let line_len = 50 - title.len().min(40);
    println!(
        "\n{} {}",
        Theme::header(title),
        Theme::muted("─".repeat(line_len))
    );
}

// ============================================================================
// TABLES
// ============================================================================

/// Create a minimal table (no outer borders)
pub fn create_minimal_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_NO_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Create a key-value table for stats
pub fn stats_table(items: &[(&str, String)]) -> Table {
    let mut table = create_minimal_table();

    for (key, value) in items {
        table.add_row(vec![
            Cell::new(key).fg(Color::Green),
            Cell::new(value)
                .fg(Color::White)
                .add_attribute(Attribute::Bold),
        ]);
    }

    table
}

/// Summary table for one stage report
pub fn stage_table(report: &dyn StageReport) -> Table {
    stats_table(&report.summary_rows())
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Format duration into human-readable string
pub fn format_duration(secs: f64) -> String {
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let mins = (secs / 60.0).floor();
        let remaining = secs % 60.0;
        format!("{}m {:.0}s", mins, remaining)
    }
}

/// Print a styled error message with optional suggestion
pub fn print_error(message: &str, suggestion: Option<&str>) {
    eprintln!(
        "\n{} {}",
        Theme::error(format!("{} Error:", Icons::ERROR)),
        message
    );

    if let Some(hint) = suggestion {
        eprintln!(
            "  {} {}",
            Theme::muted(Icons::ARROW_RIGHT),
            Theme::muted(hint)
        );
    }
    eprintln!();
}

/// Print a styled warning message
pub fn print_warning(message: &str) {
    eprintln!(
        "{} {}",
        Theme::warning(Icons::WARNING.to_string()),
        Theme::warning(message)
    );
}

/// Print a styled success message
pub fn print_success(message: &str) {
    println!(
        "{} {}",
        Theme::success(Icons::SUCCESS.to_string()),
        Theme::success(message)
    );
}
