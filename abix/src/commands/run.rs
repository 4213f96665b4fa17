//! `abix run` and `abix shell`: provision, then hand the terminal to a child
//! process running with the composed environment.

use abix_core::config::env_keys::host;
use abix_core::config::env_optional;
use abix_core::{AbixError, Platform, RuntimeKind};
use abix_runtime::{CommandRunner, ManagedRuntime, SystemRunner};
use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

use super::session::{prepare, Session};

/// Run the configured entry command; returns its exit code.
pub fn cmd_run(root: Option<&Path>, project_dir: &Path, extra_args: &[String]) -> Result<i32> {
    let session = prepare(root, project_dir)?;
    let entry = session
        .config
        .entry
        .clone()
        .ok_or_else(|| anyhow!("no \"entry\" configured in abix.json"))?;
    let (program, args) = entry_invocation(&entry, extra_args, &session.runtimes)?;
    tracing::debug!("entry: {} {:?}", program.display(), args);
    spawn(&session, &program, &args)
}

/// Open the user's shell with the managed runtimes first on PATH.
pub fn cmd_shell(root: Option<&Path>, project_dir: &Path) -> Result<i32> {
    let session = prepare(root, project_dir)?;
    let shell = user_shell(session.target.platform);
    eprintln!("abix shell: runtimes on PATH; exit to return");
    spawn(&session, &shell, &[])
}

fn spawn(session: &Session, program: &Path, args: &[String]) -> Result<i32> {
    Ok(SystemRunner.run(program, args, &session.project_dir, &session.env)?)
}

/// Split `entry` into program and arguments. Runtime names (`node`, `python`,
/// `python3`) and their bundled tools resolve to the managed executables, never
/// to whatever the ambient PATH offers.
fn entry_invocation(
    entry: &str,
    extra_args: &[String],
    runtimes: &[ManagedRuntime],
) -> Result<(PathBuf, Vec<String>)> {
    let mut words = entry.split_whitespace().map(str::to_string);
    let program = words
        .next()
        .ok_or_else(|| anyhow!("\"entry\" in abix.json is empty"))?;
    let mut args: Vec<String> = words.collect();
    args.extend(extra_args.iter().cloned());
    Ok((managed_program(&program, runtimes)?, args))
}

fn managed_program(program: &str, runtimes: &[ManagedRuntime]) -> Result<PathBuf> {
    let (kind, auxiliary) = match program {
        "node" => (RuntimeKind::Node, None),
        "npm" | "npx" => (RuntimeKind::Node, Some(program)),
        "python" | "python3" => (RuntimeKind::Python, None),
        "pip" | "pip3" => (RuntimeKind::Python, Some("pip")),
        _ => return Ok(PathBuf::from(program)),
    };
    let runtime = runtimes.iter().find(|r| r.kind == kind).ok_or_else(|| {
        AbixError::config(format!(
            "entry uses `{}` but no {} runtime is configured in abix.json",
            program, kind
        ))
    })?;
    let path = match auxiliary {
        None => &runtime.primary_executable,
        Some(name) => runtime.auxiliary_executables.get(name).ok_or_else(|| {
            AbixError::config(format!("{} runtime {} ships no `{}`", kind, runtime.version, name))
        })?,
    };
    Ok(path.clone())
}

fn user_shell(platform: Platform) -> PathBuf {
    let (key, fallback) = if platform.is_windows() {
        (host::COMSPEC, "cmd.exe")
    } else {
        (host::SHELL, "sh")
    };
    PathBuf::from(env_optional(key).unwrap_or_else(|| fallback.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use abix_core::{Arch, HostTarget};
    use abix_runtime::SubjectKey;
    use std::collections::BTreeMap;

    fn runtime(kind: RuntimeKind, primary: &str, aux: &[(&str, &str)]) -> ManagedRuntime {
        let install = PathBuf::from("/r").join(kind.to_string());
        ManagedRuntime {
            kind,
            version: "1.0.0".to_string(),
            subject: SubjectKey::new(kind, "1.0.0", HostTarget::new(Platform::Linux, Arch::X64)),
            primary_executable: install.join(primary),
            auxiliary_executables: aux
                .iter()
                .map(|(n, p)| (n.to_string(), install.join(p)))
                .collect::<BTreeMap<_, _>>(),
            bin_dirs: vec![install.join("bin")],
            install_path: install,
        }
    }

    #[test]
    fn test_entry_invocation_appends_args() {
        let node = runtime(RuntimeKind::Node, "bin/node", &[("npm", "bin/npm")]);
        let (program, args) =
            entry_invocation("node server.js --port 3000", &["--verbose".to_string()], &[node.clone()]).unwrap();
        assert_eq!(program, node.primary_executable);
        assert_eq!(args, vec!["server.js", "--port", "3000", "--verbose"]);
        assert!(entry_invocation("  ", &[], &[]).is_err());
    }

    #[test]
    fn test_python_entry_uses_managed_interpreter() {
        let py = runtime(RuntimeKind::Python, "bin/python3", &[("pip", "bin/pip3")]);
        let (program, _) = entry_invocation("python app.py", &[], &[py.clone()]).unwrap();
        assert_eq!(program, PathBuf::from("/r/python/bin/python3"));
        let (program, _) = entry_invocation("python3 app.py", &[], &[py.clone()]).unwrap();
        assert_eq!(program, py.primary_executable);
        let (program, _) = entry_invocation("pip list", &[], &[py]).unwrap();
        assert_eq!(program, PathBuf::from("/r/python/bin/pip3"));
    }

    #[test]
    fn test_entry_for_unconfigured_runtime_is_refused() {
        let node = runtime(RuntimeKind::Node, "bin/node", &[]);
        let err = entry_invocation("python app.py", &[], &[node]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AbixError>(),
            Some(AbixError::Configuration(_))
        ));
    }

    #[test]
    fn test_other_programs_are_looked_up_on_path() {
        let (program, args) = entry_invocation("./serve.sh prod", &[], &[]).unwrap();
        assert_eq!(program, PathBuf::from("./serve.sh"));
        assert_eq!(args, vec!["prod"]);
    }
}
