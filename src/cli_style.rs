/*!
 * fwaudit CLI Style System
 *
 * Tables and themed text for run summaries, task status, and the log stream.
 */

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use console::{style, StyledObject};
use fwaudit_core_audit::{
    AuditReport, AuditStatus, AuditSummary, AuditTask, CheckRecord, CheckStatus,
    ConsoleLogRecord, LogLevel,
};

// ============================================================================
// THEME COLORS
// ============================================================================

/// Colors for consistent styling
pub struct Theme;

impl Theme {
    /// Primary accent color (cyan)
    pub fn primary<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).cyan()
    }

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
}

// ============================================================================
// ICONS
// ============================================================================

pub struct Icons;

impl Icons {
    pub const SUCCESS: &'static str = "✓";
    pub const ERROR: &'static str = "✗";
    pub const WARNING: &'static str = "⚠";
    pub const INFO: &'static str = "ℹ";
    pub const PENDING: &'static str = "○";
    pub const RUNNING: &'static str = "◐";
    pub const ARROW_RIGHT: &'static str = "→";
}

// ============================================================================
// TABLES
// ============================================================================

/// Create a styled data table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// End-of-run summary data
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummaryView {
    pub audit_id: String,
    pub status: AuditStatus,
    pub summary: AuditSummary,
    pub logs_dropped: u64,
    pub error_message: Option<String>,
    /// Warning and failed checks, in run order
    pub issues: Vec<CheckRecord>,
}

impl From<&AuditReport> for RunSummaryView {
    fn from(report: &AuditReport) -> Self {
        Self {
            audit_id: report.audit_id.clone(),
            status: report.status,
            summary: report.summary,
            logs_dropped: report
                .details
                .get("logsDropped")
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
            error_message: None,
            issues: report
                .checks
                .iter()
                .filter(|check| check.status != CheckStatus::Pass)
                .cloned()
                .collect(),
        }
    }
}

impl From<&AuditTask> for RunSummaryView {
    fn from(task: &AuditTask) -> Self {
        Self {
            audit_id: task.id.clone(),
            status: task.status,
            summary: task.summary.unwrap_or_default(),
            logs_dropped: 0,
            error_message: task.error_message.clone(),
            issues: Vec::new(),
        }
    }
}

impl RunSummaryView {
    pub fn table(&self) -> Table {
        let mut table = create_table();
        table.set_header(vec![
            Cell::new("Audit Summary")
                .fg(Color::Cyan)
                .add_attribute(Attribute::Bold),
            Cell::new(&self.audit_id).fg(Color::DarkGrey),
        ]);

        table.add_row(vec![Cell::new("Status"), status_cell(self.status)]);
        table.add_row(vec![
            Cell::new("Total"),
            Cell::new(self.summary.total.to_string()).add_attribute(Attribute::Bold),
        ]);
        table.add_row(vec![
            Cell::new("Passed"),
            Cell::new(self.summary.passed.to_string()).fg(Color::Green),
        ]);

        if self.summary.warning > 0 {
            table.add_row(vec![
                Cell::new("Warnings"),
                Cell::new(self.summary.warning.to_string()).fg(Color::Yellow),
            ]);
        }

        if self.summary.failed > 0 {
            table.add_row(vec![
                Cell::new("Failed"),
                Cell::new(self.summary.failed.to_string())
                    .fg(Color::Red)
                    .add_attribute(Attribute::Bold),
            ]);
        }

        table.add_row(vec![
            Cell::new("Duration"),
            Cell::new(format_duration(self.summary.duration_ms as f64 / 1000.0)),
        ]);

        if self.logs_dropped > 0 {
            table.add_row(vec![
                Cell::new("Lines Dropped"),
                Cell::new(self.logs_dropped.to_string()).fg(Color::Magenta),
            ]);
        }

        if let Some(ref reason) = self.error_message {
            table.add_row(vec![
                Cell::new("Error"),
                Cell::new(reason).fg(Color::Red),
            ]);
        }

        for check in &self.issues {
            let (icon, color) = match check.status {
                CheckStatus::Fail => (Icons::ERROR, Color::Red),
                CheckStatus::Warning | CheckStatus::Pass => (Icons::WARNING, Color::Yellow),
            };
            table.add_row(vec![
                Cell::new(format!("{} {}", icon, check.name)).fg(color),
                Cell::new(&check.description),
            ]);
        }

        table
    }
}

/// Per-rule breakdown table
pub fn checks_table(checks: &[CheckRecord]) -> Table {
    let mut table = create_table();
    table.set_header(vec![
        Cell::new("Step").add_attribute(Attribute::Bold),
        Cell::new("Check").add_attribute(Attribute::Bold),
        Cell::new("Category").add_attribute(Attribute::Bold),
        Cell::new("Status").add_attribute(Attribute::Bold),
        Cell::new("Detail").add_attribute(Attribute::Bold),
    ]);

    for check in checks {
        let step = check.step.map(|s| s.to_string()).unwrap_or_default();
        let status = match check.status {
            CheckStatus::Pass => Cell::new(format!("{} PASS", Icons::SUCCESS)).fg(Color::Green),
            CheckStatus::Warning => {
                Cell::new(format!("{} WARNING", Icons::WARNING)).fg(Color::Yellow)
            }
            CheckStatus::Fail => Cell::new(format!("{} FAIL", Icons::ERROR))
                .fg(Color::Red)
                .add_attribute(Attribute::Bold),
        };

        table.add_row(vec![
            Cell::new(step).fg(Color::DarkGrey),
            Cell::new(&check.name),
            Cell::new(check.category.as_deref().unwrap_or("")),
            status,
            Cell::new(&check.description),
        ]);
    }

    table
}

fn status_cell(status: AuditStatus) -> Cell {
    let (icon, color) = match status {
        AuditStatus::Pending => (Icons::PENDING, Color::DarkGrey),
        AuditStatus::Analyzing => (Icons::RUNNING, Color::Cyan),
        AuditStatus::Completed => (Icons::SUCCESS, Color::Green),
        AuditStatus::Failed => (Icons::ERROR, Color::Red),
        AuditStatus::Error => (Icons::WARNING, Color::Magenta),
    };
    Cell::new(format!("{} {}", icon, status))
        .fg(color)
        .add_attribute(Attribute::Bold)
}

// ============================================================================
// LOG STREAM
// ============================================================================

/// Render one console line as `HH:MM:SS.ffffff  level  message`
pub fn format_log_line(record: &ConsoleLogRecord) -> String {
    let time = record.timestamp.format("%H:%M:%S%.6f").to_string();
    let level = format!("{:<7}", record.level.as_str());
    let level = match record.level {
        LogLevel::Success => Theme::success(level).to_string(),
        LogLevel::Info => Theme::primary(level).to_string(),
        LogLevel::Warn => Theme::warning(level).to_string(),
        LogLevel::Error => Theme::error(level).bold().to_string(),
    };
    format!("{}  {}  {}", Theme::muted(time), level, record.message)
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
    } else if secs < 3600.0 {
        let mins = (secs / 60.0).floor();
        let remaining = secs % 60.0;
        format!("{}m {:.0}s", mins, remaining)
    } else {
        let hours = (secs / 3600.0).floor();
        let mins = ((secs % 3600.0) / 60.0).floor();
        format!("{}h {}m", hours, mins)
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

pub fn print_warning(message: &str) {
    eprintln!(
        "{} {}",
        Theme::warning(Icons::WARNING.to_string()),
        Theme::warning(message)
    );
}

pub fn print_success(message: &str) {
    println!(
        "{} {}",
        Theme::success(Icons::SUCCESS.to_string()),
        Theme::success(message)
    );
}

pub fn print_info(message: &str) {
    println!("{} {}", Theme::primary(Icons::INFO.to_string()), message);
}

// ============================================================================
// TESTS
// ============================================================================
