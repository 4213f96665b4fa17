//! Provisioning pipeline shared by `run`, `shell` and `check`:
//! config -> runtimes (ledger-gated) -> abix.lock -> environment -> dependencies.

use abix_core::config::MirrorConfig;
use abix_core::{HostTarget, ProjectConfig, ToolLayout, TOOL_VERSION};
use abix_runtime::{
    compose_from_process, ComposedEnv, HttpFetcher, IntegrityLedger, ManagedRuntime, ProjectLock,
    RuntimeProvisioner, SystemRunner,
};
use abix_snapshot::{ApplyOutcome, DependencyCache, SnapshotStore};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub struct Session {
    pub project_dir: PathBuf,
    pub config: ProjectConfig,
    pub target: HostTarget,
    pub runtimes: Vec<ManagedRuntime>,
    pub env: ComposedEnv,
    pub outcome: ApplyOutcome,
}

/// Bring `project_dir` to a runnable state.
pub fn prepare(root: Option<&Path>, project_dir: &Path) -> Result<Session> {
    let project_dir = project_dir
        .canonicalize()
        .with_context(|| format!("project directory {} not found", project_dir.display()))?;

    // Configuration problems surface before any download starts.
    let config = ProjectConfig::load(&project_dir)?;
    let target = HostTarget::detect()?;
    let layout = ToolLayout::resolve(root)?;
    layout.ensure_root()?;
    tracing::debug!("tool root {} target {}", layout.root().display(), target);

    let mut ledger = IntegrityLedger::load(layout.ledger_path())?;
    let existing_lock = ProjectLock::load(&project_dir)?;
    if let Some(lock) = &existing_lock {
        let adopted = ledger.adopt(lock)?;
        if adopted > 0 {
            tracing::info!("adopted {} pin(s) from abix.lock", adopted);
        }
    }

    let mut provisioner = RuntimeProvisioner::new(
        layout.clone(),
        target,
        MirrorConfig::from_env(),
        HttpFetcher::from_env(),
        SystemRunner,
        ledger,
    );
    let mut runtimes = Vec::new();
    for spec in config.runtime_specs() {
        let runtime = provisioner
            .resolve(&spec)
            .with_context(|| format!("failed to provision {}", spec))?;
        runtimes.push(runtime);
    }

    let lock = ProjectLock::from_ledger(provisioner.ledger(), runtimes.iter().map(|r| &r.subject));
    if !lock.is_empty() && existing_lock.as_ref() != Some(&lock) {
        lock.save(&project_dir)?;
    }

    let env = compose_from_process(&runtimes, &layout, target.platform);
    let cache = DependencyCache::new(
        &project_dir,
        SnapshotStore::new(layout.snapshots_dir()),
        target,
        TOOL_VERSION,
    );
    let outcome = cache
        .apply(&config, &env, &runtimes, &SystemRunner)
        .context("failed to install project dependencies")?;

    Ok(Session {
        project_dir,
        config,
        target,
        runtimes,
        env,
        outcome,
    })
}
