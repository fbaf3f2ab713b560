//! Log sinks for import diagnostics
//!
//! Readers report through the `log` facade. [`Logger`] is a `log::Log`
//! implementation that fans records out to any number of [`LogStream`]s.
//! It is optional: applications that already install a logger (env_logger,
//! tracing-log, ...) get the same records there.

use std::sync::{
    Arc, Mutex, OnceLock, RwLock,
    atomic::{AtomicBool, Ordering},
};

use crate::error::{Error, Result};

/// Log levels used by the importer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Verbose debug information
    Debug,
    /// Informational messages
    Info,
    /// Warning messages
    Warn,
    /// Error messages
    Error,
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Self::Error,
            log::Level::Warn => Self::Warn,
            log::Level::Info => Self::Info,
            log::Level::Debug | log::Level::Trace => Self::Debug,
        }
    }
}

/// Trait for custom log stream implementations
pub trait LogStream: Send + Sync {
    /// Write a formatted log line, including its trailing newline
    fn write(&mut self, message: &str);
}

/// A log stream that writes to stdout
pub struct StdoutLogStream;

impl LogStream for StdoutLogStream {
    fn write(&mut self, message: &str) {
        print!("{message}");
    }
}

/// A log stream that writes to stderr
pub struct StderrLogStream;

impl LogStream for StderrLogStream {
    fn write(&mut self, message: &str) {
        eprint!("{message}");
    }
}

/// A log stream that appends to a file
pub struct FileLogStream {
    file: std::fs::File,
}

impl FileLogStream {
    /// Create a new file log stream
    pub fn new<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(file, "=== Import Log Started ===")?;
        Ok(Self { file })
    }
}

impl LogStream for FileLogStream {
    fn write(&mut self, message: &str) {
        use std::io::Write;
        let _ = self.file.write_all(message.as_bytes());
        let _ = self.file.flush();
    }
}

/// A log stream that collects messages in memory
#[derive(Debug, Default)]
pub struct MemoryLogStream {
    messages: Vec<String>,
}

impl MemoryLogStream {
    /// Create a new memory log stream
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all collected messages
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Clear all collected messages
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

impl LogStream for MemoryLogStream {
    fn write(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }
}

/// Fans `log` records out to attached streams
#[derive(Default)]
pub struct Logger {
    streams: RwLock<Vec<Arc<Mutex<dyn LogStream>>>>,
    verbose: AtomicBool,
}

impl Logger {
    /// Create a new logger
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a log stream
    pub fn attach_stream(&self, stream: Arc<Mutex<dyn LogStream>>) {
        self.streams
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(stream);
    }

    /// Detach a log stream
    pub fn detach_stream(&self, stream: &Arc<Mutex<dyn LogStream>>) {
        self.streams
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|s| !Arc::ptr_eq(s, stream));
    }

    /// Detach all log streams
    pub fn detach_all_streams(&self) {
        self.streams
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Number of attached streams
    pub fn num_streams(&self) -> usize {
        self.streams.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Enable or disable debug output
    pub fn enable_verbose_logging(&self, enable: bool) {
        self.verbose.store(enable, Ordering::Relaxed);
    }

    /// Register the global logger with the `log` facade
    pub fn install() -> Result<()> {
        log::set_logger(global_logger())
            .map_err(|e| Error::other(format!("a logger is already installed: {e}")))?;
        log::set_max_level(log::LevelFilter::Trace);
        Ok(())
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= log::Level::Info || self.verbose.load(Ordering::Relaxed)
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "{:?}, {}: {}\n",
            LogLevel::from(record.level()),
            record.target(),
            record.args()
        );
        let Ok(streams) = self.streams.read() else {
            return;
        };
        for stream in streams.iter() {
            if let Ok(mut stream) = stream.lock() {
                stream.write(&line);
            }
        }
    }

    fn flush(&self) {}
}

static GLOBAL_LOGGER: OnceLock<Logger> = OnceLock::new();

/// Get the global logger instance
pub fn global_logger() -> &'static Logger {
    GLOBAL_LOGGER.get_or_init(Logger::new)
}

/// Attach a stdout log stream to the global logger
pub fn attach_stdout_stream() {
    global_logger().attach_stream(Arc::new(Mutex::new(StdoutLogStream)));
}

/// Attach a stderr log stream to the global logger
pub fn attach_stderr_stream() {
    global_logger().attach_stream(Arc::new(Mutex::new(StderrLogStream)));
}

/// Attach a file log stream to the global logger
pub fn attach_file_stream<P: AsRef<std::path::Path>>(path: P) -> Result<()> {
    global_logger().attach_stream(Arc::new(Mutex::new(FileLogStream::new(path)?)));
    Ok(())
}

/// Enable debug output on the global logger
pub fn enable_verbose_logging(enable: bool) {
    global_logger().enable_verbose_logging(enable);
}

/// Detach all streams from the global logger
pub fn detach_all_streams() {
    global_logger().detach_all_streams();
}
