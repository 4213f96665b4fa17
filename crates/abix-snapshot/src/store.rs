//! Snapshot store under `<root>/snapshots/`.
//!
//! Per fingerprint: `snap_<fp>.tar` (the dependency output directories),
//! `snap_<fp>.tar.sha256` (hex digest of the tar) and `snap_<fp>.json`
//! (manifest of captured directories).

use abix_core::{AbixError, IoResultExt, Result};
use abix_runtime::transport::{create_tar, extract, sha256_file, ArchiveFormat};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::fingerprint::ProjectFingerprint;

/// Project directories produced by the package installers.
pub const OUTPUT_DIRS: [&str; 2] = ["node_modules", "Lib"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySnapshot {
    pub fingerprint: ProjectFingerprint,
    pub archive_path: PathBuf,
    pub archive_digest: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub fingerprint: String,
    pub dirs: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotLookup {
    Missing,
    /// Archive present but unusable; never restored.
    Corrupt { reason: String },
    Valid(DependencySnapshot),
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn archive_path(&self, fp: &ProjectFingerprint) -> PathBuf {
        self.dir.join(format!("snap_{}.tar", fp))
    }

    pub fn sidecar_path(&self, fp: &ProjectFingerprint) -> PathBuf {
        self.dir.join(format!("snap_{}.tar.sha256", fp))
    }

    pub fn manifest_path(&self, fp: &ProjectFingerprint) -> PathBuf {
        self.dir.join(format!("snap_{}.json", fp))
    }

    /// Check the snapshot for `fp`: the archive's recomputed digest must
    /// equal the sidecar.
    pub fn lookup(&self, fp: &ProjectFingerprint) -> Result<SnapshotLookup> {
        let archive = self.archive_path(fp);
        if !archive.is_file() {
            return Ok(SnapshotLookup::Missing);
        }
        let sidecar = self.sidecar_path(fp);
        let expected = match fs::read_to_string(&sidecar) {
            Ok(s) => s.trim().to_ascii_lowercase(),
            Err(_) => {
                return Ok(SnapshotLookup::Corrupt {
                    reason: format!("{} is missing", sidecar.display()),
                })
            }
        };
        let actual = sha256_file(&archive)?;
        if actual != expected {
            return Ok(SnapshotLookup::Corrupt {
                reason: format!("digest {} does not match recorded {}", actual, expected),
            });
        }
        Ok(SnapshotLookup::Valid(DependencySnapshot {
            fingerprint: fp.clone(),
            archive_path: archive,
            archive_digest: actual,
        }))
    }

    pub fn manifest(&self, fp: &ProjectFingerprint) -> Option<SnapshotManifest> {
        let content = fs::read_to_string(self.manifest_path(fp)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Archive every output directory present in `project_dir` (possibly
    /// none) and record its digest and manifest.
    pub fn capture(&self, fp: &ProjectFingerprint, project_dir: &Path) -> Result<DependencySnapshot> {
        fs::create_dir_all(&self.dir).io_context(|| format!("failed to create {}", self.dir.display()))?;
        let dirs = present_output_dirs(project_dir);
        let archive = self.archive_path(fp);
        create_tar(&archive, project_dir, &dirs)?;
        let digest = sha256_file(&archive)?;
        let sidecar = self.sidecar_path(fp);
        fs::write(&sidecar, &digest).io_context(|| format!("failed to write {}", sidecar.display()))?;
        self.write_manifest(fp, &dirs)?;
        Ok(DependencySnapshot {
            fingerprint: fp.clone(),
            archive_path: archive,
            archive_digest: digest,
        })
    }

    /// Replace the project's output directories with the snapshot contents.
    pub fn restore(&self, snapshot: &DependencySnapshot, project_dir: &Path) -> Result<()> {
        let dirs = match self.manifest(&snapshot.fingerprint) {
            Some(m) => m.dirs,
            None => OUTPUT_DIRS.iter().map(|d| d.to_string()).collect(),
        };
        for dir in &dirs {
            let path = project_dir.join(dir);
            if path.exists() {
                fs::remove_dir_all(&path).io_context(|| format!("failed to clear {}", path.display()))?;
            }
        }
        extract(&snapshot.archive_path, project_dir, ArchiveFormat::Tar)?;
        if self.manifest(&snapshot.fingerprint).is_none() {
            // Older snapshot without a manifest: describe what it restored.
            self.write_manifest(&snapshot.fingerprint, &present_output_dirs(project_dir))?;
        }
        Ok(())
    }

    /// Delete every file of the snapshot for `fp`.
    pub fn remove(&self, fp: &ProjectFingerprint) -> Result<()> {
        for path in [self.archive_path(fp), self.sidecar_path(fp), self.manifest_path(fp)] {
            if path.exists() {
                fs::remove_file(&path).io_context(|| format!("failed to remove {}", path.display()))?;
            }
        }
        Ok(())
    }

    fn write_manifest(&self, fp: &ProjectFingerprint, dirs: &[&str]) -> Result<()> {
        let manifest = SnapshotManifest {
            fingerprint: fp.to_string(),
            dirs: dirs.iter().map(|d| d.to_string()).collect(),
            created_at: Utc::now(),
        };
        let path = self.manifest_path(fp);
        let content = serde_json::to_string_pretty(&manifest)
            .map_err(|e| AbixError::config(format!("cannot serialize snapshot manifest: {}", e)))?;
        fs::write(&path, content).io_context(|| format!("failed to write {}", path.display()))
    }
}

pub fn present_output_dirs(project_dir: &Path) -> Vec<&'static str> {
    OUTPUT_DIRS
        .into_iter()
        .filter(|d| project_dir.join(d).is_dir())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp() -> ProjectFingerprint {
        ProjectFingerprint::from_hex("f00d")
    }

    fn populate(project: &Path) {
        fs::create_dir_all(project.join("node_modules/left-pad")).unwrap();
        fs::write(project.join("node_modules/left-pad/index.js"), "module.exports = s => s;\n").unwrap();
        fs::write(project.join("node_modules/.package-lock.json"), "{}\n").unwrap();
    }

    #[test]
    fn test_capture_then_lookup_is_valid() {
        let tmp = tempfile::tempdir().unwrap();
        let project = tmp.path().join("p");
        populate(&project);
        let store = SnapshotStore::new(tmp.path().join("snapshots"));

        assert_eq!(store.lookup(&fp()).unwrap(), SnapshotLookup::Missing);
        let snap = store.capture(&fp(), &project).unwrap();
        assert_eq!(store.lookup(&fp()).unwrap(), SnapshotLookup::Valid(snap.clone()));
        assert_eq!(
            fs::read_to_string(store.sidecar_path(&fp())).unwrap(),
            snap.archive_digest
        );
        assert_eq!(store.manifest(&fp()).unwrap().dirs, vec!["node_modules".to_string()]);
    }

    #[test]
    fn test_restore_replaces_output_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let project = tmp.path().join("p");
        populate(&project);
        let store = SnapshotStore::new(tmp.path().join("snapshots"));
        let snap = store.capture(&fp(), &project).unwrap();

        // stray file that was not in the snapshot must not survive
        fs::write(project.join("node_modules/stray.js"), "x").unwrap();
        store.restore(&snap, &project).unwrap();
        assert!(!project.join("node_modules/stray.js").exists());
        assert_eq!(
            fs::read_to_string(project.join("node_modules/left-pad/index.js")).unwrap(),
            "module.exports = s => s;\n"
        );
    }

    #[test]
    fn test_tampered_archive_is_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        let project = tmp.path().join("p");
        populate(&project);
        let store = SnapshotStore::new(tmp.path().join("snapshots"));
        store.capture(&fp(), &project).unwrap();

        fs::write(store.sidecar_path(&fp()), "0".repeat(64)).unwrap();
        assert!(matches!(store.lookup(&fp()).unwrap(), SnapshotLookup::Corrupt { .. }));

        fs::remove_file(store.sidecar_path(&fp())).unwrap();
        assert!(matches!(store.lookup(&fp()).unwrap(), SnapshotLookup::Corrupt { .. }));

        store.remove(&fp()).unwrap();
        assert_eq!(store.lookup(&fp()).unwrap(), SnapshotLookup::Missing);
    }

    #[test]
    fn test_capture_with_no_output_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let project = tmp.path().join("p");
        fs::create_dir_all(&project).unwrap();
        let store = SnapshotStore::new(tmp.path().join("snapshots"));
        let snap = store.capture(&fp(), &project).unwrap();
        assert!(snap.archive_path.exists());
        assert!(store.manifest(&fp()).unwrap().dirs.is_empty());
        store.restore(&snap, &project).unwrap();
    }
}
