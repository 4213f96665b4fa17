//! Environment variable key constants, grouped by concern.

/// Tool root and project paths
pub mod paths {
    pub const ABIX_ROOT: &str = "ABIX_ROOT";
}

/// Observability and logging
pub mod observability {
    pub const ABIX_QUIET: &str = "ABIX_QUIET";
    pub const ABIX_LOG_LEVEL: &str = "ABIX_LOG_LEVEL";
    pub const ABIX_LOG_JSON: &str = "ABIX_LOG_JSON";
    /// JSONL file receiving TOFU pins, checksum mismatches and corrupted snapshots.
    pub const ABIX_SECURITY_EVENTS_LOG: &str = "ABIX_SECURITY_EVENTS_LOG";
}

/// Distribution mirrors
pub mod mirrors {
    pub const ABIX_NODE_MIRROR: &str = "ABIX_NODE_MIRROR";
    pub const ABIX_PYTHON_MIRROR: &str = "ABIX_PYTHON_MIRROR";
    pub const ABIX_PYTHON_ORG_MIRROR: &str = "ABIX_PYTHON_ORG_MIRROR";
    pub const ABIX_GET_PIP_URL: &str = "ABIX_GET_PIP_URL";
}

/// Archive transport
pub mod transport {
    pub const ABIX_DOWNLOAD_TIMEOUT_SECS: &str = "ABIX_DOWNLOAD_TIMEOUT_SECS";
}

/// Variables exported into every spawned subprocess
pub mod exported {
    pub const ABIX_ROOT: &str = "ABIX_ROOT";
    pub const NPM_CONFIG_CACHE: &str = "npm_config_cache";
    pub const PIP_CACHE_DIR: &str = "PIP_CACHE_DIR";
    pub const PATH: &str = "PATH";
}

/// Host settings read by `abix shell`
pub mod host {
    pub const SHELL: &str = "SHELL";
    pub const COMSPEC: &str = "COMSPEC";
}
