//! Logging infrastructure - structured tracing throughout the arenas
//!
//! Design: `tracing` events at the allocation sites (zero-cost when no
//! subscriber listens), a subscriber installed once per process, and a
//! context-scoped `Logger` record for user-facing messages.

use once_cell::sync::OnceCell;
use std::io;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

mod logger;
mod macros;

pub use logger::{console_logger_proc, log_ex, tracing_logger_proc, LogLevel, LogType, Logger, LoggerProc};

/// Set once the process-wide subscriber has been installed (or lost the race)
static SUBSCRIBER: OnceCell<()> = OnceCell::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// How the `tracing` subscriber is set up
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level for the `ncz` targets unless `RUST_LOG` says otherwise
    pub level: Level,
    /// Write to this file instead of stdout
    pub file: Option<PathBuf>,
    pub format: LogFormat,
    /// Emit span enter/close events
    pub span_events: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            file: None,
            format: LogFormat::Pretty,
            span_events: false,
        }
    }
}

impl LogConfig {
    /// `NCZ_LOG_LEVEL`, `NCZ_LOG_FILE`, `NCZ_LOG_JSON` and `NCZ_LOG_SPANS` over the defaults
    pub fn from_env() -> Self {
        let env = |name: &str| std::env::var(name).ok();

        Self {
            level: env("NCZ_LOG_LEVEL").map_or(Level::INFO, |level| parse_level(&level)),
            file: env("NCZ_LOG_FILE").map(PathBuf::from),
            format: if env("NCZ_LOG_JSON").is_some() { LogFormat::Json } else { LogFormat::Pretty },
            span_events: env("NCZ_LOG_SPANS").is_some(),
        }
    }

    /// Everything, down to individual allocations
    pub fn verbose() -> Self {
        Self {
            level: Level::TRACE,
            span_events: true,
            ..Self::default()
        }
    }
}

fn parse_level(level: &str) -> Level {
    level.trim().parse().unwrap_or(Level::INFO)
}

/// Install the subscriber described by the environment
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Install a subscriber for `config`; only the first call has any effect
pub fn init_with_config(config: LogConfig) {
    SUBSCRIBER.get_or_init(|| install(&config));
}

fn install(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ncz={}", config.level).to_lowercase()));
    let spans = if config.span_events { FmtSpan::ENTER | FmtSpan::CLOSE } else { FmtSpan::NONE };
    let json = config.format == LogFormat::Json;

    let layer = match &config.file {
        Some(file) => {
            let directory = file.parent().filter(|dir| !dir.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = file.file_name().map_or_else(|| "ncz.log".into(), |name| name.to_os_string());
            let layer = fmt::layer()
                .with_writer(tracing_appender::rolling::never(directory, name))
                .with_ansi(false)
                .with_span_events(spans);
            if json { layer.json().boxed() } else { layer.boxed() }
        }
        None => {
            let layer = fmt::layer()
                .with_writer(io::stdout)
                .with_span_events(spans)
                .with_line_number(cfg!(debug_assertions));
            if json { layer.json().boxed() } else { layer.boxed() }
        }
    };

    // The host application may already own the global subscriber
    let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
}

pub fn is_initialized() -> bool {
    SUBSCRIBER.get().is_some()
}

// ============================================================================
// Allocator events
// ============================================================================

#[inline]
pub fn log_allocation(size: usize, ptr: *const u8) {
    tracing::trace!(target: "ncz::alloc", size, ptr = ?ptr, "allocated memory");
}

#[inline]
pub fn log_deallocation(size: usize, ptr: *const u8) {
    tracing::trace!(target: "ncz::alloc", size, ptr = ?ptr, "deallocated memory");
}

#[inline]
pub fn log_block_acquired(block_index: usize, block_size: usize) {
    tracing::trace!(target: "ncz::pool", block_index, block_size, "pool block acquired");
}

#[inline]
pub fn log_oversized(size: usize, oversized_blocks: usize) {
    tracing::debug!(target: "ncz::pool", size, oversized_blocks, "oversized pool allocation");
}

pub fn log_pool_reset(blocks: usize, oversized_freed: usize, poisoned: bool) {
    tracing::debug!(target: "ncz::pool", blocks, oversized_freed, poisoned, "pool reset");
}

pub fn log_commit(committed_bytes: usize, reserved_bytes: usize) {
    tracing::debug!(target: "ncz::flat", committed_bytes, reserved_bytes, "committed pages");
}

pub fn log_bucket_created(bucket_index: usize, items_per_bucket: usize) {
    tracing::debug!(target: "ncz::bucket", bucket_index, items_per_bucket, "bucket created");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_and_verbose_configs() {
        let config = LogConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert!(config.file.is_none());
        assert_eq!(config.format, LogFormat::Pretty);

        let verbose = LogConfig::verbose();
        assert_eq!(verbose.level, Level::TRACE);
        assert!(verbose.span_events);
    }

    #[test]
    fn levels_parse_case_insensitively() {
        assert_eq!(parse_level("TRACE"), Level::TRACE);
        assert_eq!(parse_level("warn"), Level::WARN);
        assert_eq!(parse_level("nonsense"), Level::INFO);
    }

    #[test]
    fn procs_accept_every_kind() {
        for kind in [LogType::Info, LogType::Warn, LogType::Error] {
            console_logger_proc("console", LogLevel::Normal, kind);
            tracing_logger_proc("tracing", LogLevel::Trace, kind);
        }
    }

    #[test]
    fn init_twice_is_harmless() {
        init();
        init();
        assert!(is_initialized());
    }
}
