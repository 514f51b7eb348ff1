//! Stderr logger for the `log` facade
//!
//! The library logs through [`log`] macros on its user-context paths (init,
//! teardown, store setup). Host programs that want to see that output can
//! install this minimal stderr logger; programs with their own logger just
//! skip this module. The level filter comes from the `SOFTVM_LOG`
//! environment variable (`error`, `warn`, `info`, `debug`, `trace`),
//! defaulting to `warn`.
//!
//! Nothing in this module is ever called from a signal handler; handler
//! diagnostics go through [`crate::diag`] instead.

use log::{LevelFilter, Log, Metadata, Record};

struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:>5}] {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Install the stderr logger.
///
/// Idempotent: if a logger is already installed (by this call or by the host
/// program), only the level filter is updated.
pub fn init() {
    let filter = match std::env::var("SOFTVM_LOG").as_deref() {
        Ok("error") => LevelFilter::Error,
        Ok("warn") => LevelFilter::Warn,
        Ok("info") => LevelFilter::Info,
        Ok("debug") => LevelFilter::Debug,
        Ok("trace") => LevelFilter::Trace,
        _ => LevelFilter::Warn,
    };
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(filter);
}
