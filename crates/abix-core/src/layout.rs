//! Tool-root layout: where runtimes, package caches, snapshots and the
//! integrity ledger live.
//!
//! ```text
//! <root>/
//!   locks/runtimes.lock
//!   runtimes/<kind>-<version>-<platform>-<arch>/
//!   packages/npm/  packages/pip/
//!   snapshots/snap_<fingerprint>.tar (+ .tar.sha256, .json)
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::env_keys::paths;
use crate::config::env_optional;
use crate::error::{AbixError, IoResultExt, Result};

pub const DEFAULT_ROOT_DIR: &str = ".abix";
const ROOT_CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolLayout {
    root: PathBuf,
}

impl ToolLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the tool root: `--root` > `ABIX_ROOT` > `~/.abix/config.json` `root` > `~/.abix`.
    pub fn resolve(cli_root: Option<&Path>) -> Result<Self> {
        Self::resolve_with(cli_root, env_optional(paths::ABIX_ROOT), dirs::home_dir())
    }

    pub fn resolve_with(
        cli_root: Option<&Path>,
        env_root: Option<String>,
        home: Option<PathBuf>,
    ) -> Result<Self> {
        if let Some(p) = cli_root {
            return Ok(Self::new(absolutize(p)?));
        }
        if let Some(p) = env_root {
            return Ok(Self::new(absolutize(Path::new(&p))?));
        }
        let home = home.ok_or_else(|| {
            AbixError::config("could not determine the home directory; set ABIX_ROOT or pass --root")
        })?;
        let default_root = home.join(DEFAULT_ROOT_DIR);
        if let Some(custom) = root_from_config_file(&default_root.join(ROOT_CONFIG_FILE)) {
            return Ok(Self::new(absolutize(&custom)?));
        }
        Ok(Self::new(default_root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn runtimes_dir(&self) -> PathBuf {
        self.root.join("runtimes")
    }

    pub fn packages_dir(&self) -> PathBuf {
        self.root.join("packages")
    }

    pub fn npm_cache_dir(&self) -> PathBuf {
        self.packages_dir().join("npm")
    }

    pub fn pip_cache_dir(&self) -> PathBuf {
        self.packages_dir().join("pip")
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.root.join("snapshots")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.root.join("locks").join("runtimes.lock")
    }

    /// Scratch location for a downloaded archive before it is verified.
    pub fn temp_archive_path(&self, kind: &str, extension: &str) -> PathBuf {
        self.root.join(format!("temp_{}.{}", kind, extension))
    }

    /// Cached copy of the pip bootstrap script.
    pub fn get_pip_path(&self) -> PathBuf {
        self.root.join("get-pip.py")
    }

    pub fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .io_context(|| format!("failed to create tool root {}", self.root.display()))
    }
}

fn absolutize(p: &Path) -> Result<PathBuf> {
    if p.is_absolute() {
        return Ok(p.to_path_buf());
    }
    let cwd = std::env::current_dir().io_context(|| "failed to read current directory".to_string())?;
    Ok(cwd.join(p))
}

fn root_from_config_file(path: &Path) -> Option<PathBuf> {
    let content = fs::read_to_string(path).ok()?;
    match serde_json::from_str::<serde_json::Value>(&content) {
        Ok(v) => v
            .get("root")
            .and_then(|r| r.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from),
        Err(e) => {
            tracing::warn!("ignoring malformed {}: {}", path.display(), e);
            None
        }
    }
}
