//! `abix clean` and `abix clean-global`.

use abix_core::ToolLayout;
use abix_runtime::lockfile::PROJECT_LOCK_FILE;
use abix_snapshot::{ProjectState, OUTPUT_DIRS};
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

/// Project-local virtualenv; never snapshotted but removed by `clean`.
const VENV_DIR: &str = ".venv";

/// Remove the project's dependency outputs, virtualenv, state marker and
/// abix.lock.
pub fn cmd_clean(project_dir: &Path) -> Result<()> {
    let mut removed = 0;
    for dir in OUTPUT_DIRS.into_iter().chain([VENV_DIR]) {
        let path = project_dir.join(dir);
        if path.is_dir() {
            fs::remove_dir_all(&path).with_context(|| format!("failed to remove {}", path.display()))?;
            removed += 1;
        }
    }
    ProjectState::new(project_dir).clear()?;
    let lock = project_dir.join(PROJECT_LOCK_FILE);
    if lock.exists() {
        fs::remove_file(&lock).with_context(|| format!("failed to remove {}", lock.display()))?;
    }
    eprintln!("✅ Cleaned {} ({} dependency dir(s) removed)", project_dir.display(), removed);
    Ok(())
}

/// Delete the tool root. Refuses without `force`.
pub fn cmd_clean_global(root: Option<&Path>, force: bool) -> Result<()> {
    let layout = ToolLayout::resolve(root)?;
    if !force {
        bail!(
            "this deletes every runtime, cache and snapshot under {}; re-run with --force",
            layout.root().display()
        );
    }
    if layout.root().exists() {
        fs::remove_dir_all(layout.root())
            .with_context(|| format!("failed to remove {}", layout.root().display()))?;
    }
    eprintln!("✅ Removed {}", layout.root().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_removes_outputs_state_and_lock() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path();
        fs::create_dir_all(p.join("node_modules/x")).unwrap();
        fs::create_dir_all(p.join(".venv/bin")).unwrap();
        fs::write(p.join(".abix_state"), "abc\n").unwrap();
        fs::write(p.join("abix.lock"), "{}").unwrap();
        fs::write(p.join("abix.json"), "{}").unwrap();

        cmd_clean(p).unwrap();
        assert!(!p.join("node_modules").exists());
        assert!(!p.join(".venv").exists());
        assert!(!p.join(".abix_state").exists());
        assert!(!p.join("abix.lock").exists());
        assert!(p.join("abix.json").exists());
    }

    #[test]
    fn test_clean_global_requires_force() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("root");
        fs::create_dir_all(root.join("runtimes")).unwrap();
        assert!(cmd_clean_global(Some(&root), false).is_err());
        assert!(root.exists());
        cmd_clean_global(Some(&root), true).unwrap();
        assert!(!root.exists());
    }
}
