//! Process-wide file logging for the lab log.
//!
//! # Responsibility
//! - Start one size-rotated file logger per process.
//! - Capture panics into the same log before the default hook runs.
//!
//! # Invariants
//! - Repeating `init_logging` with the same settings is a no-op.
//! - A second call with another level or directory fails instead of
//!   silently re-targeting the running logger.
//! - Initialization never panics.
//! - Only ids, codes and durations are logged; record text (names, lots)
//!   never is.

use crate::config::LogSettings;
use flexi_logger::{
    Cleanup, Criterion, FileSpec, LogSpecification, Logger, LoggerHandle, Naming, WriteMode,
};
use log::{error, info, LevelFilter};
use once_cell::sync::OnceCell;
use std::any::Any;
use std::panic::PanicHookInfo;
use std::path::{Path, PathBuf};

const LOG_BASENAME: &str = "lablog";
const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;
const KEEP_ROTATED_FILES: usize = 5;
const PANIC_MESSAGE_LIMIT: usize = 160;

static ACTIVE_LOGGER: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

/// The running backend plus the settings it was started with.
struct ActiveLogger {
    level: LevelFilter,
    log_dir: PathBuf,
    _handle: LoggerHandle,
}

impl ActiveLogger {
    fn start(level: LevelFilter, log_dir: &Path) -> Result<Self, String> {
        std::fs::create_dir_all(log_dir)
            .map_err(|err| format!("cannot create log directory `{}`: {err}", log_dir.display()))?;

        let handle = Logger::with(LogSpecification::builder().default(level).build())
            .log_to_file(FileSpec::default().directory(log_dir).basename(LOG_BASENAME))
            .rotate(
                Criterion::Size(ROTATE_AT_BYTES),
                Naming::Numbers,
                Cleanup::KeepLogFiles(KEEP_ROTATED_FILES),
            )
            .write_mode(WriteMode::BufferAndFlush)
            .append()
            .format_for_files(flexi_logger::detailed_format)
            .start()
            .map_err(|err| format!("cannot start file logger: {err}"))?;

        install_panic_hook();
        info!(
            "event=core_init module=core status=ok level={level} log_dir={} version={}",
            log_dir.display(),
            env!("CARGO_PKG_VERSION")
        );

        Ok(Self {
            level,
            log_dir: log_dir.to_path_buf(),
            _handle: handle,
        })
    }

    fn accepts(&self, level: LevelFilter, log_dir: &Path) -> Result<(), String> {
        if self.log_dir != log_dir {
            return Err(format!(
                "logging already writes to `{}`; refusing to switch to `{}`",
                self.log_dir.display(),
                log_dir.display()
            ));
        }
        if self.level != level {
            return Err(format!(
                "logging already runs at level `{}`; refusing to switch to `{level}`",
                self.level
            ));
        }
        Ok(())
    }
}

/// Starts file logging described by `settings`.
///
/// # Errors
/// - Unknown level text, or a log directory that is empty, relative or
///   cannot be created.
/// - Logging already active with another level or directory.
/// - Backend start-up failure.
pub fn init_logging(settings: &LogSettings) -> Result<(), String> {
    let level = parse_level(&settings.level)?;
    let log_dir = absolute_log_dir(&settings.log_dir)?;

    let active = match ACTIVE_LOGGER.get() {
        Some(active) => active,
        None => ACTIVE_LOGGER.get_or_try_init(|| ActiveLogger::start(level, log_dir))?,
    };
    // A concurrent caller may have started the logger with other settings.
    active.accepts(level, log_dir)
}

/// Level and directory of the running logger, `None` before init.
pub fn logging_status() -> Option<(LevelFilter, PathBuf)> {
    ACTIVE_LOGGER
        .get()
        .map(|active| (active.level, active.log_dir.clone()))
}

/// Level used when settings do not name one: `debug` in debug builds,
/// `info` in release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn parse_level(text: &str) -> Result<LevelFilter, String> {
    let lowered = text.trim().to_ascii_lowercase();
    let parsed = match lowered.as_str() {
        "warning" => Ok(LevelFilter::Warn),
        "off" => Err(()),
        other => other.parse::<LevelFilter>().map_err(|_| ()),
    };
    parsed.map_err(|()| {
        format!("unsupported log level `{lowered}`; expected trace|debug|info|warn|error")
    })
}

fn absolute_log_dir(log_dir: &Path) -> Result<&Path, String> {
    if log_dir.as_os_str().is_empty() {
        return Err("log_dir cannot be empty".to_string());
    }
    if log_dir.is_relative() {
        return Err(format!(
            "log_dir must be absolute, got `{}`",
            log_dir.display()
        ));
    }
    Ok(log_dir)
}

fn install_panic_hook() {
    if PANIC_HOOK.set(()).is_err() {
        return;
    }

    let chained = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        log_panic(info);
        chained(info);
    }));
}

fn log_panic(info: &PanicHookInfo<'_>) {
    let location = info.location().map_or_else(
        || "unknown".to_string(),
        |loc| format!("{}:{}", loc.file(), loc.line()),
    );
    let message = single_line(&panic_text(info.payload()), PANIC_MESSAGE_LIMIT);
    error!("event=panic_captured module=core status=error location={location} payload={message}");
}

fn panic_text(payload: &(dyn Any + Send)) -> String {
    match (payload.downcast_ref::<&str>(), payload.downcast_ref::<String>()) {
        (Some(text), _) => (*text).to_string(),
        (None, Some(text)) => text.clone(),
        (None, None) => "non-string panic payload".to_string(),
    }
}

/// Flattens `text` to one line of at most `limit` chars, marking truncation.
fn single_line(text: &str, limit: usize) -> String {
    let flat: String = text
        .chars()
        .map(|ch| if ch == '\n' || ch == '\r' { ' ' } else { ch })
        .collect();
    match flat.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}
