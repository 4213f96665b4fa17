//! The restore-or-install state machine.
//!
//! 1. state == fingerprint and every captured output directory exists: done.
//! 2. a snapshot for the fingerprint verifies: restore it, record state.
//! 3. otherwise run the init commands in order, capture a snapshot, record
//!    state.
//!
//! A snapshot failing verification is dropped and step 3 runs; it is never
//! restored and never aborts the run.

use abix_core::observability::security_event;
use abix_core::{AbixError, HostTarget, ProjectConfig, Result};
use abix_runtime::info_log;
use abix_runtime::log::format_elapsed;
use abix_runtime::{CommandRunner, ComposedEnv, ManagedRuntime};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::fingerprint::{FingerprintInputs, ProjectFingerprint};
use crate::installer::plan_commands;
use crate::state::ProjectState;
use crate::store::{present_output_dirs, SnapshotLookup, SnapshotStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// No init commands configured; nothing was touched.
    NothingToInstall,
    UpToDate(ProjectFingerprint),
    Restored(ProjectFingerprint),
    Installed(ProjectFingerprint),
}

/// Dependency cache for one project directory.
#[derive(Debug, Clone)]
pub struct DependencyCache {
    project_dir: PathBuf,
    store: SnapshotStore,
    target: HostTarget,
    tool_version: String,
}

impl DependencyCache {
    pub fn new(
        project_dir: impl Into<PathBuf>,
        store: SnapshotStore,
        target: HostTarget,
        tool_version: impl Into<String>,
    ) -> Self {
        Self {
            project_dir: project_dir.into(),
            store,
            target,
            tool_version: tool_version.into(),
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn state(&self) -> ProjectState {
        ProjectState::new(&self.project_dir)
    }

    pub fn fingerprint(&self, config: &ProjectConfig) -> Result<ProjectFingerprint> {
        Ok(FingerprintInputs::collect(&self.project_dir, config, self.target, &self.tool_version)?.fingerprint())
    }

    pub fn apply<R: CommandRunner>(
        &self,
        config: &ProjectConfig,
        env: &ComposedEnv,
        runtimes: &[ManagedRuntime],
        runner: &R,
    ) -> Result<ApplyOutcome> {
        if config.init_commands.is_empty() {
            return Ok(ApplyOutcome::NothingToInstall);
        }
        let start = Instant::now();
        let fp = self.fingerprint(config)?;
        let state = self.state();

        // Both predicates: the fingerprint alone says nothing about whether
        // the outputs are still on disk.
        if state.matches(&fp) && self.outputs_present(&fp) {
            tracing::debug!("dependencies up to date ({})", fp);
            return Ok(ApplyOutcome::UpToDate(fp));
        }

        match self.store.lookup(&fp)? {
            SnapshotLookup::Valid(snapshot) => {
                info_log!("restoring dependency snapshot");
                self.store.restore(&snapshot, &self.project_dir)?;
                state.write(&fp)?;
                info_log!("restored in {}", format_elapsed(start.elapsed()));
                return Ok(ApplyOutcome::Restored(fp));
            }
            SnapshotLookup::Corrupt { reason } => {
                security_event(
                    "snapshot_corrupted",
                    &format!("ignoring corrupted dependency snapshot {}: {}", fp, reason),
                    json!({
                        "fingerprint": fp.as_str(),
                        "archive": self.store.archive_path(&fp).display().to_string(),
                        "reason": reason,
                    }),
                );
                self.store.remove(&fp)?;
            }
            SnapshotLookup::Missing => {}
        }

        info_log!("installing dependencies from scratch");
        for step in plan_commands(&config.init_commands, &self.project_dir, runtimes)? {
            info_log!("$ {}", step.command);
            let code = runner.run(&step.program, &step.args, &self.project_dir, env)?;
            if code != 0 {
                return Err(AbixError::Installer {
                    command: step.command,
                    code,
                });
            }
        }

        self.store.capture(&fp, &self.project_dir)?;
        state.write(&fp)?;
        info_log!("dependencies installed in {}", format_elapsed(start.elapsed()));
        Ok(ApplyOutcome::Installed(fp))
    }

    /// Every directory recorded for `fp`'s snapshot still exists. With no
    /// manifest (snapshots wiped from the tool root) any known output
    /// directory in the project counts.
    fn outputs_present(&self, fp: &ProjectFingerprint) -> bool {
        match self.store.manifest(fp) {
            Some(m) => m.dirs.iter().all(|d| self.project_dir.join(d).is_dir()),
            None => !present_output_dirs(&self.project_dir).is_empty(),
        }
    }
}

#[cfg(test)]
mod tests;
