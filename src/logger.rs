use log::{Level, LevelFilter, Log, Metadata, Record};
use std::io::{stderr, stdout, Write};
use std::sync::{Mutex, Once, PoisonError};
use std::thread;

/// Log implementation for standard output streams
///
/// Errors go to standard error, everything else to standard output. Every line is prefixed with
/// its level and the name of the thread that logged it, which for session threads is `ping-<id>`.
pub struct StdLogger(Mutex<()>);

impl StdLogger {
    /// Initialize logger
    ///
    /// Even if this function is called multiple times, initialization will only be done once. If
    /// another logger has been installed already, that logger stays in place.
    pub fn init(verbose: bool) {
        static INIT: Once = Once::new();

        // Initialization may run from more than one thread
        INIT.call_once(|| {
            let level = if verbose {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            };
            if log::set_boxed_logger(Box::new(StdLogger(Mutex::new(())))).is_ok() {
                log::set_max_level(level);
            }
        });
    }

    fn prefix(level: Level) -> &'static str {
        match level {
            Level::Error | Level::Warn => "[-]",
            Level::Info => "[i]",
            Level::Debug | Level::Trace => "[+]",
        }
    }
}

impl Log for StdLogger {
    /// This logger is enabled by default
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    /// Internal call to `write`
    fn log(&self, record: &Record) {
        // Keep lines of concurrent sessions from interleaving
        let _guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);

        let current = thread::current();
        let name = current.name().unwrap_or("-");
        let prefix = Self::prefix(record.level());

        if record.level() == Level::Error {
            let stderr = stderr();
            let mut handle = stderr.lock();
            let _ = writeln!(handle, "{} {}: {}", prefix, name, record.args());
        } else {
            let stdout = stdout();
            let mut handle = stdout.lock();
            let _ = writeln!(handle, "{} {}: {}", prefix, name, record.args());
        }
    }

    /// Flush buffered output stream
    fn flush(&self) {
        let _ = stdout().flush();
        let _ = stderr().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logger_init() {
        // Init logger, twice on purpose
        StdLogger::init(true);
        StdLogger::init(false);

        // Call different log implementations
        trace!("trace log succeeded");
        debug!("debug log succeeded");
        info!("info log succeeded");
        warn!("warn log succeeded");
        error!("error log succeeded");
    }

    #[test]
    fn logger_enabled() {
        use log::{logger, Metadata};

        // Init logger first...
        StdLogger::init(true);

        // ... then get reference to it
        let logger = logger();
        let meta = Metadata::builder().build();

        // Assert that it is active
        assert!(logger.enabled(&meta));
    }

    #[test]
    fn level_prefixes() {
        assert_eq!(StdLogger::prefix(Level::Error), "[-]");
        assert_eq!(StdLogger::prefix(Level::Info), "[i]");
        assert_eq!(StdLogger::prefix(Level::Trace), "[+]");
    }
}
