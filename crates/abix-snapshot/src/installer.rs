//! Turn configured init command strings into concrete invocations.

use abix_core::{AbixError, Result, RuntimeKind};
use abix_runtime::ManagedRuntime;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallStep {
    /// The command as configured, for messages.
    pub command: String,
    pub program: PathBuf,
    pub args: Vec<String>,
}

/// Plan `commands` for `project_dir`.
///
/// - `pip`/`pip3` run through the managed interpreter's pip when one was
///   resolved, so packages never land in a system Python.
/// - A bare `npm install` becomes `npm ci` when `package-lock.json` exists.
pub fn plan_commands(
    commands: &[String],
    project_dir: &Path,
    runtimes: &[ManagedRuntime],
) -> Result<Vec<InstallStep>> {
    let managed_pip = runtimes
        .iter()
        .find(|r| r.kind == RuntimeKind::Python)
        .and_then(|r| r.auxiliary("pip"));
    let has_npm_lock = project_dir.join("package-lock.json").is_file();

    commands
        .iter()
        .map(|command| {
            let mut words = command.split_whitespace().map(str::to_string);
            let head = words
                .next()
                .ok_or_else(|| AbixError::config("init command is empty"))?;
            let mut args: Vec<String> = words.collect();

            let program = match (head.as_str(), managed_pip) {
                ("pip" | "pip3", Some(pip)) => pip.to_path_buf(),
                _ => PathBuf::from(&head),
            };
            if head == "npm" && has_npm_lock && is_plain_install(&args) {
                args[0] = "ci".to_string();
            }
            Ok(InstallStep {
                command: command.clone(),
                program,
                args,
            })
        })
        .collect()
}

/// `install` with no package operands (flags allowed).
fn is_plain_install(args: &[String]) -> bool {
    matches!(args.first().map(String::as_str), Some("install" | "i"))
        && args[1..].iter().all(|a| a.starts_with('-'))
}
