//! `abix init`: write abix.json for a project.

use abix_core::project::CONFIG_FILE;
use abix_core::{ProjectConfig, RuntimeSpec};
use anyhow::{bail, Result};
use std::path::Path;

pub fn cmd_init(project_dir: &Path, specs: &[String], force: bool) -> Result<()> {
    let config = build_config(project_dir, specs, force)?;
    config.save(project_dir)?;

    eprintln!("✅ Wrote {}", project_dir.join(CONFIG_FILE).display());
    for (kind, version) in &config.runtimes {
        eprintln!("   {} {}", kind, version);
    }
    for cmd in &config.init_commands {
        eprintln!("   init: {}", cmd);
    }
    eprintln!("   Set \"entry\" in {} to use `abix run`.", CONFIG_FILE);
    Ok(())
}

fn build_config(project_dir: &Path, specs: &[String], force: bool) -> Result<ProjectConfig> {
    if project_dir.join(CONFIG_FILE).exists() && !force {
        bail!(
            "{} already exists in {} (use --force to overwrite)",
            CONFIG_FILE,
            project_dir.display()
        );
    }
    let explicit = specs
        .iter()
        .map(|s| RuntimeSpec::parse(s))
        .collect::<abix_core::Result<Vec<_>>>()?;
    let config = ProjectConfig::detect(project_dir, &explicit);
    if config.runtimes.is_empty() {
        bail!(
            "no runtime detected in {}; pass one explicitly, e.g. `abix init node:20.18.0`",
            project_dir.display()
        );
    }
    config.validate()?;
    Ok(config)
}
