//! `abix check`: provision and print what the project runs with.

use abix_runtime::{CommandRunner, SystemRunner};
use abix_snapshot::ApplyOutcome;
use anyhow::Result;
use std::path::Path;

use super::session::prepare;

pub fn cmd_check(root: Option<&Path>, project_dir: &Path) -> Result<()> {
    let session = prepare(root, project_dir)?;
    eprintln!("Project: {} ({})", session.project_dir.display(), session.target);
    for rt in &session.runtimes {
        eprintln!("  {} {} -> {}", rt.kind, rt.version, rt.primary_executable.display());
        let code = SystemRunner.run(
            &rt.primary_executable,
            &["--version".to_string()],
            &session.project_dir,
            &session.env,
        )?;
        if code != 0 {
            eprintln!("  ⚠️  {} --version exited with {}", rt.kind, code);
        }
    }
    let deps = match &session.outcome {
        ApplyOutcome::NothingToInstall => "no init commands".to_string(),
        ApplyOutcome::UpToDate(fp) => format!("up to date ({})", short(fp.as_str())),
        ApplyOutcome::Restored(fp) => format!("restored from snapshot ({})", short(fp.as_str())),
        ApplyOutcome::Installed(fp) => format!("installed ({})", short(fp.as_str())),
    };
    eprintln!("Dependencies: {}", deps);
    Ok(())
}

fn short(fp: &str) -> &str {
    &fp[..fp.len().min(12)]
}
