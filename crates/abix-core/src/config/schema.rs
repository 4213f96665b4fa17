//! Structured configuration grouped by concern, loaded from the environment.

use super::env_keys::{mirrors, observability as obv_keys, transport};
use super::loader::{env_bool, env_optional, env_or, env_u64};
use std::time::Duration;

pub const DEFAULT_NODE_MIRROR: &str = "https://nodejs.org/dist";
pub const DEFAULT_PYTHON_MIRROR: &str =
    "https://github.com/indygreg/python-build-standalone/releases/download";
pub const DEFAULT_PYTHON_ORG_MIRROR: &str = "https://www.python.org/ftp/python";
pub const DEFAULT_GET_PIP_URL: &str = "https://bootstrap.pypa.io/get-pip.py";

/// Transfer timeout applied to every download.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 30;

/// Observability: quiet, log_level, log_json, security_events_log
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
    pub security_events_log: Option<String>,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| Self {
            quiet: env_bool(obv_keys::ABIX_QUIET, false),
            log_level: env_or(obv_keys::ABIX_LOG_LEVEL, || "abix=info".to_string()),
            log_json: env_bool(obv_keys::ABIX_LOG_JSON, false),
            security_events_log: env_optional(obv_keys::ABIX_SECURITY_EVENTS_LOG),
        })
    }
}

/// Base URLs for runtime distributions and the pip bootstrap script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorConfig {
    pub node: String,
    pub python_standalone: String,
    pub python_org: String,
    pub get_pip: String,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            node: DEFAULT_NODE_MIRROR.to_string(),
            python_standalone: DEFAULT_PYTHON_MIRROR.to_string(),
            python_org: DEFAULT_PYTHON_ORG_MIRROR.to_string(),
            get_pip: DEFAULT_GET_PIP_URL.to_string(),
        }
    }
}

impl MirrorConfig {
    pub fn from_env() -> Self {
        let trimmed = |key: &str, default: &str| {
            env_or(key, || default.to_string())
                .trim_end_matches('/')
                .to_string()
        };
        Self {
            node: trimmed(mirrors::ABIX_NODE_MIRROR, DEFAULT_NODE_MIRROR),
            python_standalone: trimmed(mirrors::ABIX_PYTHON_MIRROR, DEFAULT_PYTHON_MIRROR),
            python_org: trimmed(mirrors::ABIX_PYTHON_ORG_MIRROR, DEFAULT_PYTHON_ORG_MIRROR),
            get_pip: env_or(mirrors::ABIX_GET_PIP_URL, || DEFAULT_GET_PIP_URL.to_string()),
        }
    }
}

/// Archive transport settings.
#[derive(Debug, Clone, Copy)]
pub struct TransportConfig {
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
        }
    }
}

impl TransportConfig {
    pub fn from_env() -> Self {
        Self {
            timeout: Duration::from_secs(env_u64(
                transport::ABIX_DOWNLOAD_TIMEOUT_SECS,
                DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            )),
        }
    }
}
