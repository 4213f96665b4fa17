//! Observability: tracing init and the security events log.
//!
//! Uses config::ObservabilityConfig for ABIX_QUIET, ABIX_LOG_LEVEL,
//! ABIX_LOG_JSON and ABIX_SECURITY_EVENTS_LOG.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use serde_json::{json, Value};
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::config::ObservabilityConfig;

/// Initialize tracing. Call once at process startup.
/// When ABIX_QUIET=1 only WARN and above are logged.
pub fn init_tracing() {
    let cfg = ObservabilityConfig::from_env();
    let level = if cfg.quiet {
        "abix=warn".to_string()
    } else {
        cfg.log_level.clone()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .without_time()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
}

/// Record a security-relevant event: always to tracing at WARN, and as a
/// JSONL line when ABIX_SECURITY_EVENTS_LOG is set.
pub fn security_event(event: &str, message: &str, fields: Value) {
    tracing::warn!(event, "{}", message);
    if let Some(path) = ObservabilityConfig::from_env().security_events_log.as_deref() {
        append_security_event(Path::new(path), event, fields);
    }
}

fn append_security_event(path: &Path, event: &str, fields: Value) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let mut record = json!({
        "ts": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        "event": event,
    });
    if let (Some(obj), Value::Object(extra)) = (record.as_object_mut(), fields) {
        obj.extend(extra);
    }
    if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(path) {
        if let Ok(line) = serde_json::to_string(&record) {
            let _ = writeln!(f, "{}", line);
        }
    }
}
