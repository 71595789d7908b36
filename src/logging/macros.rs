//! Logging macros routed through the context logger

/// Log at normal level
#[macro_export]
macro_rules! log {
    ($($arg:tt)*) => {
        $crate::logging::log_ex($crate::logging::LogLevel::Normal, $crate::logging::LogType::Info, format_args!($($arg)*))
    };
}

/// Log at verbose level
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logging::log_ex($crate::logging::LogLevel::Verbose, $crate::logging::LogType::Info, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logging::log_ex($crate::logging::LogLevel::Normal, $crate::logging::LogType::Warn, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logging::log_ex($crate::logging::LogLevel::Normal, $crate::logging::LogType::Error, format_args!($($arg)*))
    };
}

/// Check a condition; on failure report through the context logger and panic
#[macro_export]
macro_rules! ncz_assert {
    ($cond:expr $(,)?) => {
        if !($cond) {
            $crate::context::handle_failed_assertion(stringify!($cond))
        }
    };
}
