//! Error taxonomy shared by every abix crate.
//!
//! Each variant names the failing subject (subject key, URL, archive or
//! command) so a fatal error is always attributable. Snapshot corruption is
//! deliberately absent: it is recovered from locally and never surfaces as an
//! error.

use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AbixError>;

#[derive(Debug, Error)]
pub enum AbixError {
    /// Network failure, timeout or non-200 status.
    #[error("download of {url} failed: {reason}")]
    Transport { url: String, reason: String },

    /// Archive digest disagrees with a pinned or official digest.
    #[error("SECURITY: integrity check failed for {subject}: expected sha256 {expected}, got {actual}")]
    Integrity {
        subject: String,
        expected: String,
        actual: String,
    },

    #[error("failed to extract {}: {reason}", .archive.display())]
    Extraction { archive: PathBuf, reason: String },

    /// An init command exited non-zero.
    #[error("init command `{command}` exited with code {code}")]
    Installer { command: String, code: i32 },

    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// A distribution extracted cleanly but lacks a file it must contain.
    #[error("corrupt {subject} distribution: {} missing after extraction", .missing.display())]
    CorruptDistribution { subject: String, missing: PathBuf },

    #[error("configuration error: {0}")]
    Configuration(String),

    /// The ledger or a project lock could not be parsed.
    #[error("lock file {} is unreadable: {reason}", .path.display())]
    Ledger { path: PathBuf, reason: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl AbixError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn transport(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Transport {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn extraction(archive: &Path, reason: impl ToString) -> Self {
        Self::Extraction {
            archive: archive.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Integrity failures are never downgraded to warnings.
    pub fn is_security(&self) -> bool {
        matches!(self, Self::Integrity { .. })
    }
}

/// Attach a lazily built context message to `std::io` results.
pub trait IoResultExt<T> {
    fn io_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn io_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| AbixError::io(f(), e))
    }
}
