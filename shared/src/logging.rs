//! Shared logging utilities for consistent tracing across all processes

use crate::errors::{SharedError, SharedResult};
use crate::types::ProcessId;
use chrono::{DateTime, Utc};
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing::{error, info};

/// Default per-crate filter for a given base level
fn default_filter(process_id: &ProcessId, base_level: &str) -> String {
    match process_id {
        ProcessId::Orchestrator(_) => {
            format!("orchestrator={base_level},shared={base_level},reqwest=warn,hyper=warn")
        }
        ProcessId::Scheduler => {
            format!("scheduler={base_level},orchestrator={base_level},shared={base_level},reqwest=warn,hyper=warn")
        }
    }
}

/// Initialize tracing with a compact stdout layer and an optional log file.
///
/// When `log_dir` is set, events are also appended (without ANSI colours) to
/// `<log_dir>/<process>.log`. `RUST_LOG` takes precedence over `log_level`.
pub fn init_tracing(process_id: &ProcessId, log_level: Option<&str>, log_dir: Option<&Path>) -> SharedResult<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let base_level = log_level.unwrap_or("info");
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(process_id, base_level)));

    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    let file_layer = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir).map_err(|e| SharedError::LoggingError {
                message: format!("cannot create {}: {e}", dir.display()),
            })?;
            let path = dir.join(format!("{process_id}.log"));
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| SharedError::LoggingError {
                    message: format!("cannot open {}: {e}", path.display()),
                })?;
            Some(fmt::layer().with_ansi(false).with_target(true).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| SharedError::LoggingError { message: e.to_string() })
}

/// Get formatted timestamp for consistent logging
pub fn format_timestamp() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%H:%M:%S%.3f").to_string()
}

/// Macro for process-aware info logging
#[macro_export]
macro_rules! process_info {
    ($process_id:expr, $($arg:tt)*) => {
        tracing::info!(
            process = %$process_id,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for process-aware warning logging
#[macro_export]
macro_rules! process_warn {
    ($process_id:expr, $($arg:tt)*) => {
        tracing::warn!(
            process = %$process_id,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for process-aware error logging
#[macro_export]
macro_rules! process_error {
    ($process_id:expr, $($arg:tt)*) => {
        tracing::error!(
            process = %$process_id,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for process-aware debug logging
#[macro_export]
macro_rules! process_debug {
    ($process_id:expr, $($arg:tt)*) => {
        tracing::debug!(
            process = %$process_id,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Contextual logging helper for startup messages
pub fn log_startup(process_id: &ProcessId, details: &str) {
    info!(
        process = %process_id,
        timestamp = format_timestamp(),
        "🚀 Starting {}",
        details
    );
}

/// Contextual logging helper for shutdown messages
pub fn log_shutdown(process_id: &ProcessId, reason: &str) {
    info!(
        process = %process_id,
        timestamp = format_timestamp(),
        "🛑 Shutting down: {}",
        reason
    );
}

/// Contextual logging helper for error conditions
pub fn log_error(process_id: &ProcessId, context: &str, error: &dyn std::fmt::Display) {
    error!(
        process = %process_id,
        timestamp = format_timestamp(),
        error = %error,
        "❌ {} failed: {}",
        context,
        error
    );
}

/// Contextual logging helper for success conditions
pub fn log_success(process_id: &ProcessId, message: &str) {
    info!(
        process = %process_id,
        timestamp = format_timestamp(),
        "✅ {}",
        message
    );
}

/// Contextual logging helper for progress updates
pub fn log_progress(process_id: &ProcessId, action: &str, details: &str) {
    info!(
        process = %process_id,
        timestamp = format_timestamp(),
        "📋 {}: {}",
        action,
        details
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Context;

    #[test]
    fn test_default_filter_names_process_crates() {
        let filter = default_filter(&ProcessId::Orchestrator(Context::Qsr), "debug");
        assert!(filter.starts_with("orchestrator=debug"));
        assert!(filter.contains("reqwest=warn"));

        let filter = default_filter(&ProcessId::Scheduler, "info");
        assert!(filter.contains("scheduler=info"));
        assert!(filter.contains("orchestrator=info"));
    }

    #[test]
    fn test_format_timestamp_shape() {
        let stamp = format_timestamp();
        // HH:MM:SS.mmm
        assert_eq!(stamp.len(), 12);
        assert_eq!(&stamp[2..3], ":");
        assert_eq!(&stamp[8..9], ".");
    }
}
