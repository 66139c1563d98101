//! Sinks for the status lines emitted during shutdown.
//!
//! The orchestrator only ever talks to the [`Logger`] trait. Three sinks ship
//! with the crate:
//!
//! | Sink | Behaviour |
//! |------|-----------|
//! | [`NoopLogger`] | Discards everything; used when no logger is supplied |
//! | [`TracingLogger`] | Emits a `tracing` event per line |
//! | [`WriterLogger`] | Writes one line per message to any `io::Write` |

use std::fmt;
use std::io::Write;
use std::sync::Mutex;
use tracing::Level;

/// A sink for human-readable status lines.
///
/// Lines arrive as unrendered [`fmt::Arguments`]; a sink that drops a line
/// never pays for formatting it.
pub trait Logger: Send + Sync {
    /// Emits one line. Implementations must not panic.
    fn log(&self, level: Level, args: fmt::Arguments<'_>);
}

/// A logger that accepts all messages and discards them.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _level: Level, _args: fmt::Arguments<'_>) {}
}

/// Forwards lines to the installed `tracing` subscriber under the `graceful` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        match level {
            Level::ERROR => tracing::error!(target: "graceful", "{args}"),
            Level::WARN => tracing::warn!(target: "graceful", "{args}"),
            Level::INFO => tracing::info!(target: "graceful", "{args}"),
            Level::DEBUG => tracing::debug!(target: "graceful", "{args}"),
            _ => tracing::trace!(target: "graceful", "{args}"),
        }
    }
}

/// Writes `prefix + line + '\n'` to a writer.
///
/// Write errors are swallowed: a broken sink must not turn a clean shutdown
/// into a failed one.
#[derive(Debug)]
pub struct WriterLogger<W> {
    prefix: String,
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterLogger<W> {
    pub fn new(writer: W) -> Self {
        Self {
            prefix: String::new(),
            writer: Mutex::new(writer),
        }
    }

    /// Prepends `prefix` to every line.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Consumes the logger and returns the underlying writer.
    pub fn into_inner(self) -> W {
        match self.writer.into_inner() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> Logger for WriterLogger<W> {
    fn log(&self, _level: Level, args: fmt::Arguments<'_>) {
        let mut writer = match self.writer.lock() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = writeln!(writer, "{}{}", self.prefix, args);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_writer_logger_lines() {
        let logger = WriterLogger::new(Vec::new());
        logger.log(Level::INFO, format_args!("Shutdown with timeout: {}s", 15));
        logger.log(Level::INFO, format_args!("Server stopped"));
        let output = String::from_utf8(logger.into_inner()).unwrap();
        assert_eq!(output, "Shutdown with timeout: 15s\nServer stopped\n");
    }

    #[test]
    fn test_writer_logger_prefix() {
        let logger = WriterLogger::new(Vec::new()).with_prefix("[http] ");
        logger.log(Level::ERROR, format_args!("Error: {}", "boom"));
        let output = String::from_utf8(logger.into_inner()).unwrap();
        assert_eq!(output, "[http] Error: boom\n");
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_writer_logger_ignores_write_errors() {
        let logger = WriterLogger::new(BrokenPipe);
        logger.log(Level::INFO, format_args!("Server stopped"));
    }

    #[test]
    fn test_noop_and_tracing_loggers_accept_all_levels() {
        for level in [Level::ERROR, Level::WARN, Level::INFO, Level::DEBUG, Level::TRACE] {
            NoopLogger.log(level, format_args!("discarded"));
            TracingLogger.log(level, format_args!("forwarded"));
        }
    }

    /// Counts how often it is rendered.
    struct Counted<'a>(&'a AtomicUsize);

    impl fmt::Display for Counted<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            self.0.fetch_add(1, Ordering::SeqCst);
            f.write_str("rendered")
        }
    }

    #[test]
    fn test_noop_logger_skips_formatting() {
        let renders = AtomicUsize::new(0);
        NoopLogger.log(Level::INFO, format_args!("{}", Counted(&renders)));
        assert_eq!(renders.load(Ordering::SeqCst), 0);

        let logger = WriterLogger::new(Vec::new());
        logger.log(Level::INFO, format_args!("{}", Counted(&renders)));
        assert_eq!(renders.load(Ordering::SeqCst), 1);
        assert_eq!(logger.into_inner(), b"rendered\n");
    }
}
