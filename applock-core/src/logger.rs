//! Bridges the `log` facade to a host-provided logger.

use std::sync::{Arc, OnceLock};

/// Receives log lines emitted by the app-lock core.
///
/// Implemented by the host and installed once with [`set_logger`].
///
/// ```rust
/// use applock_core::logger::{LogLevel, Logger};
///
/// struct StderrLogger;
///
/// impl Logger for StderrLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         eprintln!("[{level:?}] {message}");
///     }
/// }
/// ```
///
/// ## Swift
///
/// ```swift
/// final class AppLockLoggerBridge: AppLock.Logger {
///     static let shared = AppLockLoggerBridge()
///
///     func log(level: AppLock.LogLevel, message: String) {
///         os_log("%{public}@", type: level.osLogType, message)
///     }
/// }
///
/// // once, in the app delegate
/// AppLock.setLogger(logger: AppLockLoggerBridge.shared, maxLevel: .info)
/// ```
#[uniffi::export(with_foreign)]
pub trait Logger: Sync + Send {
    /// Records `message` at `level`.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, uniffi::Enum)]
pub enum LogLevel {
    /// Very detailed tracing.
    Trace,
    /// State transitions and decisions.
    Debug,
    /// Lock, unlock and escalation events.
    Info,
    /// Recovered collaborator failures.
    Warn,
    /// Unrecoverable failures.
    Error,
}

impl LogLevel {
    const fn as_filter(self) -> log::LevelFilter {
        match self {
            Self::Trace => log::LevelFilter::Trace,
            Self::Debug => log::LevelFilter::Debug,
            Self::Info => log::LevelFilter::Info,
            Self::Warn => log::LevelFilter::Warn,
            Self::Error => log::LevelFilter::Error,
        }
    }
}

/// `log::Log` implementation forwarding to the installed [`Logger`].
struct ForeignLogger;

impl log::Log for ForeignLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !should_forward(record.module_path(), record.level()) {
            return;
        }

        if let Some(logger) = LOGGER_INSTANCE.get() {
            logger.log(log_level(record.level()), record.args().to_string());
        } else {
            eprintln!("Logger not set: {}", record.args());
        }
    }

    fn flush(&self) {}
}

/// Debug and trace lines from dependencies are dropped; only ours go through.
fn should_forward(module_path: Option<&str>, level: log::Level) -> bool {
    let from_applock = module_path.is_some_and(|path| path.starts_with("applock"));
    from_applock || level <= log::Level::Info
}

const fn log_level(level: log::Level) -> LogLevel {
    match level {
        log::Level::Error => LogLevel::Error,
        log::Level::Warn => LogLevel::Warn,
        log::Level::Info => LogLevel::Info,
        log::Level::Debug => LogLevel::Debug,
        log::Level::Trace => LogLevel::Trace,
    }
}

static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();
static LOGGER: ForeignLogger = ForeignLogger;

/// Installs the host logger and sets the most verbose level forwarded
/// (`Trace` when `max_level` is `None`).
///
/// Only the first call installs a logger; later calls only adjust the level.
#[uniffi::export]
pub fn set_logger(logger: Arc<dyn Logger>, max_level: Option<LogLevel>) {
    if LOGGER_INSTANCE.set(logger).is_err() {
        eprintln!("Logger already set");
    }

    if let Err(e) = log::set_logger(&LOGGER) {
        eprintln!("Failed to set logger: {e}");
    }
    log::set_max_level(max_level.unwrap_or(LogLevel::Trace).as_filter());
}
