//! `.abix_state`: the fingerprint last applied successfully in a project.

use abix_core::{IoResultExt, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::fingerprint::ProjectFingerprint;

pub const STATE_FILE: &str = ".abix_state";

#[derive(Debug, Clone)]
pub struct ProjectState {
    path: PathBuf,
}

impl ProjectState {
    pub fn new(project_dir: &Path) -> Self {
        Self {
            path: project_dir.join(STATE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The recorded fingerprint; `None` when absent or unreadable.
    pub fn read(&self) -> Option<ProjectFingerprint> {
        let content = fs::read_to_string(&self.path).ok()?;
        let fp = content.trim();
        (!fp.is_empty()).then(|| ProjectFingerprint::from_hex(fp))
    }

    pub fn matches(&self, fingerprint: &ProjectFingerprint) -> bool {
        self.read().as_ref() == Some(fingerprint)
    }

    pub fn write(&self, fingerprint: &ProjectFingerprint) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .io_context(|| format!("failed to stage {}", self.path.display()))?;
        writeln!(tmp, "{}", fingerprint)
            .io_context(|| format!("failed to write {}", self.path.display()))?;
        tmp.persist(&self.path).map_err(|e| {
            abix_core::AbixError::io(format!("failed to replace {}", self.path.display()), e.error)
        })?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                Err(abix_core::AbixError::io(format!("failed to remove {}", self.path.display()), e))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let state = ProjectState::new(tmp.path());
        assert!(state.read().is_none());

        let fp = ProjectFingerprint::from_hex("abc123");
        state.write(&fp).unwrap();
        assert!(state.matches(&fp));
        assert_eq!(fs::read_to_string(tmp.path().join(".abix_state")).unwrap(), "abc123\n");
        assert!(!state.matches(&ProjectFingerprint::from_hex("def456")));

        state.clear().unwrap();
        assert!(state.read().is_none());
        state.clear().unwrap();
    }
}
