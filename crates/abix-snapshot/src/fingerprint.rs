//! Project fingerprint: sha256 over every input that can change the
//! installed dependency tree.
//!
//! Each input is hashed as `label`, length, bytes, so moving bytes between
//! adjacent inputs can never produce the same digest.

use abix_core::{HostTarget, IoResultExt, ProjectConfig, Result};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::Path;

/// Project files whose raw contents are part of the fingerprint, when present.
pub const LOCK_INPUTS: [&str; 4] = [
    "package-lock.json",
    "requirements.txt",
    "package.json",
    "pyproject.toml",
];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectFingerprint(String);

impl ProjectFingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }
}

impl fmt::Display for ProjectFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintInputs {
    pub config: Vec<u8>,
    pub platform: &'static str,
    pub arch: &'static str,
    pub tool_version: String,
    /// `(file name, contents)` for each present lock input, in
    /// [`LOCK_INPUTS`] order.
    pub lock_files: Vec<(String, Vec<u8>)>,
}

impl FingerprintInputs {
    /// Gather inputs from `project_dir`.
    pub fn collect(
        project_dir: &Path,
        config: &ProjectConfig,
        target: HostTarget,
        tool_version: &str,
    ) -> Result<Self> {
        let mut lock_files = Vec::new();
        for name in LOCK_INPUTS {
            let path = project_dir.join(name);
            if path.is_file() {
                let bytes = fs::read(&path).io_context(|| format!("failed to read {}", path.display()))?;
                lock_files.push((name.to_string(), bytes));
            }
        }
        Ok(Self {
            config: config.canonical_bytes(),
            platform: target.platform.as_str(),
            arch: target.arch.as_str(),
            tool_version: tool_version.to_string(),
            lock_files,
        })
    }

    pub fn fingerprint(&self) -> ProjectFingerprint {
        let mut hasher = Sha256::new();
        let mut feed = |label: &str, bytes: &[u8]| {
            hasher.update(label.as_bytes());
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        };
        feed("config", &self.config);
        feed("platform", self.platform.as_bytes());
        feed("arch", self.arch.as_bytes());
        feed("tool", self.tool_version.as_bytes());
        for (name, bytes) in &self.lock_files {
            feed(name, bytes);
        }
        ProjectFingerprint(hex::encode(hasher.finalize()))
    }
}
