//! Subprocess capability: run a program with the composed environment,
//! inheriting stdio, and report its exit code.

use abix_core::{AbixError, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::env::ComposedEnv;

pub trait CommandRunner {
    /// Run `program` to completion in `cwd`. A non-zero exit is returned as
    /// the code, not as an error; only failing to start is an error.
    fn run(&self, program: &Path, args: &[String], cwd: &Path, env: &ComposedEnv) -> Result<i32>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    /// Resolve a bare program name against the composed `PATH` so managed
    /// runtimes shadow system installs. Paths with separators are used as-is.
    pub fn locate(program: &Path, cwd: &Path, env: &ComposedEnv) -> Option<PathBuf> {
        if program.components().count() > 1 || program.is_absolute() {
            return Some(program.to_path_buf());
        }
        which::which_in(program, Some(&env.path), cwd).ok()
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &Path, args: &[String], cwd: &Path, env: &ComposedEnv) -> Result<i32> {
        let resolved = Self::locate(program, cwd, env).ok_or_else(|| AbixError::Spawn {
            command: program.display().to_string(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "not found on the composed PATH",
            ),
        })?;
        tracing::debug!("spawn {} {:?} in {}", resolved.display(), args, cwd.display());

        let mut cmd = Command::new(&resolved);
        cmd.args(args)
            .current_dir(cwd)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        env.apply(&mut cmd);

        let status = cmd.status().map_err(|e| AbixError::Spawn {
            command: resolved.display().to_string(),
            source: e,
        })?;
        // Killed by a signal: no code.
        Ok(status.code().unwrap_or(-1))
    }
}
