/*!
 * fwaudit CLI - operator view of audit runs
 *
 * Reads what the telemetry core wrote: the live log stream, task status, and
 * the final report.
 */

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use fwaudit::{
    cli_style::{self, checks_table, format_log_line, print_error, print_info, RunSummaryView},
    config::{AuditConfig, LogLevel},
    error::{AuditError, Result, EXIT_AUDIT_FAILED, EXIT_INFRA, EXIT_SUCCESS},
    logging,
};
use fwaudit_core_audit::{AuditStatus, FirmwareInfo};
use fwaudit_core_store::{AuditQuery, AuditStore};

#[derive(Parser)]
#[command(name = "fwaudit")]
#[command(
    version,
    about = "Inspect firmware audit runs: live logs, status, and reports",
    long_about = None
)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Store URL, overrides the config file (sqlite://path or memory://)
    #[arg(long = "database", value_name = "URL", global = true)]
    database: Option<String>,

    /// Log level for diagnostic output
    #[arg(long = "log-level", value_enum, global = true)]
    log_level: Option<LogLevelArg>,

    /// Write diagnostic logs as JSON to this file
    #[arg(long = "log", value_name = "FILE", global = true)]
    log: Option<PathBuf>,

    /// Verbose diagnostics (same as --log-level debug)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print console lines for an audit, optionally following until it ends
    Logs {
        audit_id: String,

        /// Only lines strictly after this RFC 3339 timestamp
        #[arg(long, value_parser = parse_timestamp)]
        since: Option<DateTime<Utc>>,

        /// Page size per poll
        #[arg(long, default_value_t = 500)]
        limit: usize,

        /// Keep polling until the audit reaches a terminal status
        #[arg(short = 'f', long)]
        follow: bool,

        /// Poll interval in milliseconds when following
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },

    /// Show the task status and summary
    Status { audit_id: String },

    /// Show the final report
    Report {
        audit_id: String,

        /// Print the raw report document
        #[arg(long)]
        json: bool,
    },

    /// Write a default configuration file
    Init {
        #[arg(default_value = "fwaudit.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Parse firmware metadata from a package filename
    Firmware { filename: String },
}

#[derive(Copy, Clone, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

fn parse_timestamp(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {}", e))
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            print_error(&e.to_string(), None);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => AuditConfig::load(path)?,
        None => AuditConfig::default(),
    };
    if let Some(url) = cli.database.clone() {
        config.database_url = url;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    }
    if cli.log.is_some() {
        config.log_file = cli.log.clone();
    }
    config.verbose |= cli.verbose;

    if let Err(e) = logging::init_logging(&config) {
        cli_style::print_warning(&format!("Failed to initialize logging: {}", e));
    }

    match cli.command {
        Commands::Init { path, force } => handle_init(&config, path, force),
        Commands::Firmware { filename } => handle_firmware(&filename),
        command => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(dispatch(&config, command))
        }
    }
}

async fn dispatch(config: &AuditConfig, command: Commands) -> Result<i32> {
    let store = fwaudit_core_store::open(&config.database_url).await?;

    match command {
        Commands::Logs {
            audit_id,
            since,
            limit,
            follow,
            interval_ms,
        } => {
            let interval = Duration::from_millis(interval_ms);
            handle_logs(store.as_ref(), &audit_id, since, limit, follow, interval).await
        }
        Commands::Status { audit_id } => handle_status(store.as_ref(), &audit_id).await,
        Commands::Report { audit_id, json } => handle_report(store.as_ref(), &audit_id, json).await,
        Commands::Init { .. } | Commands::Firmware { .. } => Ok(EXIT_SUCCESS),
    }
}

fn handle_init(config: &AuditConfig, path: PathBuf, force: bool) -> Result<i32> {
    if path.exists() && !force {
        return Err(AuditError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }

    let mut fresh = AuditConfig::default();
    fresh.database_url = config.database_url.clone();
    fresh.save(&path)?;

    cli_style::print_success(&format!("Wrote {}", path.display()));
    Ok(EXIT_SUCCESS)
}

fn handle_firmware(filename: &str) -> Result<i32> {
    let info = FirmwareInfo::from_filename(filename)?;
    let json = serde_json::to_string_pretty(&info).map_err(fwaudit_core_audit::Error::from)?;
    println!("{}", json);
    Ok(EXIT_SUCCESS)
}

/// Page through `timestamp > cursor`, advancing the cursor to the last line seen
async fn handle_logs(
    store: &dyn AuditStore,
    audit_id: &str,
    since: Option<DateTime<Utc>>,
    limit: usize,
    follow: bool,
    interval: Duration,
) -> Result<i32> {
    let limit = limit.max(1);
    let mut cursor = since;
    // One extra page after the task turns terminal catches lines written in between.
    let mut terminal_seen = false;

    loop {
        let batch = store.fetch_logs_since(audit_id, cursor, limit).await?;
        for record in &batch {
            println!("{}", format_log_line(record));
        }
        if let Some(last) = batch.last() {
            cursor = Some(last.timestamp);
        }

        if batch.len() == limit {
            continue;
        }
        if !follow || terminal_seen {
            break;
        }

        terminal_seen = store
            .get_task(audit_id)
            .await?
            .is_some_and(|task| task.status.is_terminal());

        if !terminal_seen {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = tokio::signal::ctrl_c() => break,
            }
        }
    }

    Ok(EXIT_SUCCESS)
}

async fn handle_status(store: &dyn AuditStore, audit_id: &str) -> Result<i32> {
    let task = store
        .get_task(audit_id)
        .await?
        .ok_or_else(|| AuditError::NotFound(audit_id.to_string()))?;

    println!("{}", RunSummaryView::from(&task).table());
    Ok(status_exit_code(task.status))
}

async fn handle_report(store: &dyn AuditStore, audit_id: &str, json: bool) -> Result<i32> {
    let report = store
        .get_report(audit_id)
        .await?
        .ok_or_else(|| AuditError::NotFound(format!("report for {}", audit_id)))?;

    if json {
        println!("{:#}", report.to_json()?);
        return Ok(status_exit_code(report.status));
    }

    if let Some(ref fw) = report.firmware {
        print_info(&format!(
            "{} {} {} {}",
            fw.manufacturer, fw.product, fw.fw_type, fw.version
        ));
    }

    println!("{}", RunSummaryView::from(&report).table());

    if !report.checks.is_empty() {
        println!("{}", checks_table(&report.checks));
    }

    Ok(status_exit_code(report.status))
}

fn status_exit_code(status: AuditStatus) -> i32 {
    match status {
        AuditStatus::Failed => EXIT_AUDIT_FAILED,
        AuditStatus::Error => EXIT_INFRA,
        AuditStatus::Pending | AuditStatus::Analyzing | AuditStatus::Completed => EXIT_SUCCESS,
    }
}
