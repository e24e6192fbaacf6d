use std::cell::RefCell;
use std::error::Error;
use std::fmt::Write as _;
use std::rc::Rc;

use cfg_if::cfg_if;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};
use tracing_subscriber::util::SubscriberInitExt;

use crate::model::TimeSource;

/// GPU stack crates are noisy at info.
const DEFAULT_FILTER: &str = "info,wgpu_core=warn,wgpu_hal=warn,naga=warn";

cfg_if! {
    if #[cfg(target_arch = "wasm32")] {
        pub fn init() {
            // browser console; there is no environment to read a filter from
            let filter = EnvFilter::new(DEFAULT_FILTER);

            let wasm_layer = tracing_wasm::WASMLayer::new(tracing_wasm::WASMLayerConfig::default());

            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(wasm_layer)
                .try_init();

            // Panics with stacktrace
            #[cfg(feature = "console_error_panic_hook")]
            console_error_panic_hook::set_once();
        }
    } else {
        use tracing_appender::non_blocking::WorkerGuard;
        use tracing_subscriber::fmt;
        use std::env;
        use std::io;
        use once_cell::sync::OnceCell;

        static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

        pub fn init() {
            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

            let console_layer = fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_level(true)
                .compact();

            let log_path = env::var("WHISPERS_LOG_FILE").unwrap_or_else(|_| "logs/whispers.log".to_string());
            let log_path = std::path::Path::new(&log_path);
            let (nb_writer, guard) = tracing_appender::non_blocking(
                tracing_appender::rolling::daily(
                    log_path.parent().unwrap_or(std::path::Path::new(".")),
                    log_path.file_name().unwrap_or(std::ffi::OsStr::new("whispers.log")),
                )
            );
            let _ = FILE_GUARD.set(guard);

            let file_layer = fmt::layer()
                .with_writer(nb_writer)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_level(true)
                .compact();

            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(console_layer)
                .with(file_layer)
                .try_init();

            // Hook panics to log with backtrace
            std::panic::set_hook(Box::new(|info| {
                let mut msg = String::new();
                if let Some(loc) = info.location() {
                    let _ = write!(msg, "panic at {}:{}:{} ", loc.file(), loc.line(), loc.column());
                }
                if let Some(s) = info.payload().downcast_ref::<&str>() { msg.push_str(s); }
                else if let Some(s) = info.payload().downcast_ref::<String>() { msg.push_str(s); }
                else { msg.push_str("<non-string panic>"); }
                let bt = std::backtrace::Backtrace::force_capture();
                tracing::error!("{}\nBacktrace:\n{:?}", msg, bt);
            }));
        }
    }
}

/// Session log the player can download.
///
/// Implementations must not panic and must not block the caller.
pub trait Logger {
    fn record(&self, message: &str);
    fn record_error(&self, error: &dyn Error);
    fn export_buffer(&self) -> Vec<u8>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Error,
}

impl LogLevel {
    fn label(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// Seconds on the buffer's time source.
    pub elapsed: f64,
    pub level: LogLevel,
    pub message: String,
}

/// Append-only in-memory `Logger`, mirrored to `tracing`.
pub struct LogBuffer {
    time: Rc<dyn TimeSource>,
    entries: RefCell<Vec<LogEntry>>,
}

impl LogBuffer {
    pub fn new(time: Rc<dyn TimeSource>) -> Self {
        Self { time, entries: RefCell::new(Vec::new()) }
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    fn push(&self, level: LogLevel, message: String) {
        let elapsed = self.time.now_seconds();
        match self.entries.try_borrow_mut() {
            Ok(mut entries) => entries.push(LogEntry { elapsed, level, message }),
            Err(_) => tracing::warn!(%message, "log buffer busy, entry kept in diagnostics only"),
        }
    }
}

impl Logger for LogBuffer {
    fn record(&self, message: &str) {
        tracing::info!(target: "whispers::session", "{message}");
        self.push(LogLevel::Info, message.to_string());
    }

    fn record_error(&self, error: &dyn Error) {
        let message = error.to_string();
        tracing::error!(target: "whispers::session", error = %message);
        self.push(LogLevel::Error, message);
    }

    fn export_buffer(&self) -> Vec<u8> {
        let mut out = String::new();
        for entry in self.entries.borrow().iter() {
            let _ = writeln!(out, "[{:>10.3}s] {:<5} {}", entry.elapsed, entry.level.label(), entry.message);
        }
        out.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ManualTime;

    #[test]
    fn entries_are_timestamped_in_order() {
        let time = ManualTime::new(1.0);
        let log = LogBuffer::new(time.source());
        log.record("Initialization complete.");
        time.advance(2.5);
        log.record_error(&std::io::Error::other("disk full"));

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].level, LogLevel::Info);
        assert_eq!(entries[0].elapsed, 1.0);
        assert_eq!(entries[1].level, LogLevel::Error);
        assert_eq!(entries[1].message, "disk full");
        assert_eq!(entries[1].elapsed, 3.5);
    }

    #[test]
    fn export_renders_one_line_per_entry() {
        let time = ManualTime::new(12.345);
        let log = LogBuffer::new(time.source());
        assert!(log.export_buffer().is_empty());

        log.record("Game started.");
        log.record_error(&std::io::Error::other("level load failed: disk full"));

        let text = String::from_utf8(log.export_buffer()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec![
            "[    12.345s] INFO  Game started.",
            "[    12.345s] ERROR level load failed: disk full",
        ]);
    }
}
