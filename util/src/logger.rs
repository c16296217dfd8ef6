//! # Tuner logging
//!
//! One log per session, written to the console and to the session's log file. What the tuner logs
//! at each level:
//!
//! - `ERROR` - setup failures which leave the tuner disabled, such as a controller which could not
//!   be opened or configured.
//! - `WARN` - vendor status codes from per-cycle commands, lost telemetry samples and control cycle
//!   overruns.
//! - `INFO` - the session lifecycle: configuration loaded, test mode entered and left, cycle
//!   counts.
//! - `DEBUG` - mode control transitions, slaves bound to the master and pneumatics toggles.
//! - `TRACE` - a per-cycle trace of the mode control output and the demand sent to the master,
//!   plus simulated device traffic.
//!
//! The per-cycle trace runs at the control rate, so it only goes to the log file. The console
//! shows at most `DEBUG`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use log::{self, info};
use fern;
use colored::{ColoredString, Colorize};
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Most verbose level shown on the console.
pub const CONSOLE_MAX_LEVEL: LevelFilter = LevelFilter::Debug;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Tuning sessions must log at `INFO` or more verbose, found `{0}`")]
    InvalidMinLogLevel(log::LevelFilter),

    #[error("Could not open the session log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("A logger is already installed for this execution: {0}")]
    FernInitError(log::SetLoggerError)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the tuner's log for this session.
///
/// `min_level` applies to the session log file. The console is additionally capped at
/// `CONSOLE_MAX_LEVEL`.
///
/// # Notes
///
/// - `min_level` must be `INFO` or more verbose, otherwise test mode entry and exit would not be
///   recorded alongside the telemetry.
/// - Only the first call in an execution succeeds.
pub fn logger_init(
    min_level: self::LevelFilter,
    session: &session::Session
) -> Result<(), LoggerInitError> {

    if min_level < log::Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level))
    }

    let log_file = fern::log_file(session.log_file_path.clone())
        .map_err(LoggerInitError::LogFileInitError)?;

    let console = fern::Dispatch::new()
        .level(min_level.min(CONSOLE_MAX_LEVEL))
        .chain(std::io::stdout());

    fern::Dispatch::new()
        .format(|out, message, record| {

            // Per-cycle records carry their target, so a trace line can be tied to mode control,
            // a controller or the simulated bus
            if record.level() > log::Level::Info {
                out.finish(format_args!(
                    "[{:10.6} {}] {}: {}",
                    session::get_elapsed_seconds(),
                    level_to_str(record.level()),
                    record.target(),
                    message
                ))
            }
            else {
                out.finish(format_args!(
                    "[{:10.6} {}] {}",
                    session::get_elapsed_seconds(),
                    level_to_str(record.level()),
                    message
                ))
            }

        })
        .level(min_level)
        .chain(console)
        .chain(log_file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Tuner log initialised");
    if let Some(epoch) = session::get_epoch() {
        info!("    Session epoch: {}", epoch);
    }
    info!("    File level: {:?}, console level: {:?}", min_level, min_level.min(CONSOLE_MAX_LEVEL));
    info!("    Log file: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Short coloured tag for a level
fn level_to_str(level: log::Level) -> ColoredString {
    match level {
        log::Level::Trace => "TRC".dimmed().italic(),
        log::Level::Debug => "DBG".dimmed(),
        log::Level::Info  => "INF".normal(),
        log::Level::Warn  => "WRN".yellow(),
        log::Level::Error => "ERR".red().bold()
    }
}
