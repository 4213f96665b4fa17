//! Quiet-mode aware progress logging. When ABIX_QUIET=1, suppress [INFO].
//! Uses `tracing::info!` so output is captured by the tracing subscriber.

#[macro_export]
macro_rules! info_log {
    ($($arg:tt)*) => {{
        if !$crate::log::is_quiet() {
            tracing::info!($($arg)*);
        }
    }};
}

pub fn is_quiet() -> bool {
    abix_core::config::ObservabilityConfig::from_env().quiet
}

/// Seconds with two decimals, e.g. `3.41s`.
pub fn format_elapsed(elapsed: std::time::Duration) -> String {
    format!("{:.2}s", elapsed.as_secs_f64())
}
