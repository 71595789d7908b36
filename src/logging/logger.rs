//! Context logger - the logger installed in each thread's `Context`
//!
//! Messages are formatted into temporary storage and handed to the logger's
//! proc together with their level and type.

use crate::containers::StringBuilder;
use crate::context;
use core::fmt::{self, Write};
use std::io::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Normal = 0,
    Verbose = 1,
    Trace = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogType {
    Info = 0,
    Error = 1,
    Warn = 2,
}

/// Receives a fully formatted message
pub type LoggerProc = fn(message: &str, level: LogLevel, kind: LogType);

#[derive(Debug, Clone, Copy)]
pub struct Logger {
    pub proc: LoggerProc,
    /// Prefix written as `[label] ` before every message
    pub label: Option<&'static str>,
}

impl Logger {
    pub const fn new(proc: LoggerProc) -> Self {
        Self { proc, label: None }
    }

    pub const fn with_label(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(tracing_logger_proc)
    }
}

/// Forward to `tracing` under the `ncz` target
pub fn tracing_logger_proc(message: &str, level: LogLevel, kind: LogType) {
    match (kind, level) {
        (LogType::Error, _) => tracing::error!(target: "ncz", "{}", message),
        (LogType::Warn, _) => tracing::warn!(target: "ncz", "{}", message),
        (LogType::Info, LogLevel::Normal) => tracing::info!(target: "ncz", "{}", message),
        (LogType::Info, LogLevel::Verbose) => tracing::debug!(target: "ncz", "{}", message),
        (LogType::Info, LogLevel::Trace) => tracing::trace!(target: "ncz", "{}", message),
    }
}

/// Plain terminal output: errors in red on stderr, warnings in yellow
pub fn console_logger_proc(message: &str, _level: LogLevel, kind: LogType) {
    const RED: &str = "\x1b[31m";
    const YELLOW: &str = "\x1b[33m";
    const RESET: &str = "\x1b[0m";

    // Nothing sensible to do if the terminal is gone
    let _ = match kind {
        LogType::Info => writeln!(std::io::stdout(), "{}", message),
        LogType::Warn => writeln!(std::io::stdout(), "{YELLOW}{}{RESET}", message),
        LogType::Error => writeln!(std::io::stderr(), "{RED}{}{RESET}", message),
    };
}

/// Format `args` in temporary storage and send it to the context logger
pub fn log_ex(level: LogLevel, kind: LogType, args: fmt::Arguments<'_>) {
    let logger = context::logger();
    let _scratch = context::save_temporary_mark();

    let mut sb = StringBuilder::new_in(context::temp());
    if let Some(label) = logger.label {
        let _ = write!(sb, "[{}] ", label);
    }
    let _ = sb.write_fmt(args);

    (logger.proc)(sb.as_str(), level, kind);
}
