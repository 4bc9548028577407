use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};

use crate::errors::DbError;

/// Target for per-command audit records.
pub const AUDIT_TARGET: &str = "nexusquery::audit";

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;
const DEFAULT_RETENTION: u32 = 7;

/// Initializes the logging system from `log4rs.yaml` in the working directory.
///
/// # Errors
/// Returns `DbError::Config` when the file is missing or invalid.
pub fn init() -> Result<(), DbError> {
    init_path(Path::new("log4rs.yaml"))
}

/// Initializes the logging system from a specific config file.
///
/// # Errors
/// Returns `DbError::Config` when the file is missing or invalid.
pub fn init_path(path: &Path) -> Result<(), DbError> {
    log4rs::init_file(path, log4rs::config::Deserializers::default())
        .map_err(|e| DbError::Config(format!("log config {}: {e}", path.display())))
}

#[must_use]
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling_appender(base: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender, DbError> {
    let pattern = base.join(format!("{stem}.{{}}.log"));
    let roller = FixedWindowRoller::builder()
        .build(&pattern.display().to_string(), keep)
        .map_err(|e| DbError::Config(format!("log roller for {stem}: {e}")))?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join(format!("{stem}.log")), Box::new(policy))
        .map_err(DbError::from)
}

/// Builds the rolling-file configuration: `app.log` for everything and
/// `audit.log` for [`AUDIT_TARGET`].
/// - dir: base directory for logs; current directory when `None`
/// - level: off|error|warn|info|debug|trace, default info
/// - retention: number of rolled files to keep, default 7
///
/// # Errors
/// Returns `DbError::Io` when the directory or files cannot be created.
pub fn build_config(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<u32>,
) -> Result<Config, DbError> {
    let base = match dir {
        Some(d) => d.to_path_buf(),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    std::fs::create_dir_all(&base)?;
    let keep = retention.unwrap_or(DEFAULT_RETENTION);
    let lvl = level.map_or(LevelFilter::Info, parse_level);

    let app = rolling_appender(&base, "app", keep)?;
    let audit = rolling_appender(&base, "audit", keep)?;
    Config::builder()
        .appender(Appender::builder().build("app", Box::new(app)))
        .appender(Appender::builder().build("audit", Box::new(audit)))
        .logger(Logger::builder().appender("audit").additive(false).build(AUDIT_TARGET, lvl))
        .build(Root::builder().appender("app").build(lvl))
        .map_err(|e| DbError::Config(e.to_string()))
}

/// Configures logging for the process. A second call fails because the
/// global logger is already set.
///
/// # Errors
/// See [`build_config`]; also `DbError::Config` when a logger is installed.
pub fn configure_logging(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<u32>,
) -> Result<(), DbError> {
    let config = build_config(dir, level, retention)?;
    log4rs::init_config(config).map_err(|e| DbError::Config(e.to_string()))?;
    Ok(())
}

/// Configure logging from environment variables if present:
/// - `NEXUSQUERY_LOG_DIR`
/// - `NEXUSQUERY_LOG_LEVEL`
/// - `NEXUSQUERY_LOG_RETENTION`
///
/// # Errors
/// See [`configure_logging`].
pub fn configure_from_env() -> Result<(), DbError> {
    let dir = std::env::var("NEXUSQUERY_LOG_DIR").ok().map(PathBuf::from);
    let level = std::env::var("NEXUSQUERY_LOG_LEVEL").ok();
    let retention =
        std::env::var("NEXUSQUERY_LOG_RETENTION").ok().and_then(|s| s.parse::<u32>().ok());
    configure_logging(dir.as_deref(), level.as_deref(), retention)
}
