//! Restore-or-install scenarios driven through a fake installer.

use abix_core::{AbixError, Arch, HostTarget, Platform, ProjectConfig, Result, RuntimeKind, ToolLayout};
use abix_runtime::{compose, CommandRunner, ComposedEnv, ManagedRuntime, SubjectKey};
use super::{ApplyOutcome, DependencyCache};
use crate::{ProjectState, SnapshotLookup, SnapshotStore};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Pretends to be a package installer: writes `outputs` under the project
/// directory and records what it was asked to run.
struct FakeInstaller {
    outputs: Vec<(&'static str, &'static [u8])>,
    fail_on: Option<usize>,
    runs: RefCell<Vec<(PathBuf, Vec<String>)>>,
}

impl FakeInstaller {
    fn writing(outputs: Vec<(&'static str, &'static [u8])>) -> Self {
        Self {
            outputs,
            fail_on: None,
            runs: RefCell::new(Vec::new()),
        }
    }

    fn run_count(&self) -> usize {
        self.runs.borrow().len()
    }
}

impl CommandRunner for FakeInstaller {
    fn run(&self, program: &Path, args: &[String], cwd: &Path, _env: &ComposedEnv) -> Result<i32> {
        let index = self.run_count();
        self.runs.borrow_mut().push((program.to_path_buf(), args.to_vec()));
        if self.fail_on == Some(index) {
            return Ok(2);
        }
        for (rel, data) in &self.outputs {
            let path = cwd.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, data).unwrap();
        }
        Ok(0)
    }
}

struct Fixture {
    _tmp: tempfile::TempDir,
    project: PathBuf,
    layout: ToolLayout,
}

impl Fixture {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let project = tmp.path().join("project");
        fs::create_dir_all(&project).unwrap();
        let layout = ToolLayout::new(tmp.path().join("root"));
        Self {
            _tmp: tmp,
            project,
            layout,
        }
    }

    fn cache(&self) -> DependencyCache {
        DependencyCache::new(
            &self.project,
            SnapshotStore::new(self.layout.snapshots_dir()),
            HostTarget::new(Platform::Linux, Arch::X64),
            "0.1.0",
        )
    }

    fn env(&self) -> ComposedEnv {
        compose(&[], &self.layout, Platform::Linux, None)
    }
}

fn python_runtime(root: &Path) -> ManagedRuntime {
    let install = root.join("runtimes/python-3.12.0-linux-x64");
    let mut aux = BTreeMap::new();
    aux.insert("pip".to_string(), install.join("bin/pip3"));
    ManagedRuntime {
        kind: RuntimeKind::Python,
        version: "3.12.0".to_string(),
        subject: SubjectKey::new(RuntimeKind::Python, "3.12.0", HostTarget::new(Platform::Linux, Arch::X64)),
        primary_executable: install.join("bin/python3"),
        auxiliary_executables: aux,
        bin_dirs: vec![install.join("bin")],
        install_path: install,
    }
}

fn config(kind: RuntimeKind, version: &str, commands: &[&str]) -> ProjectConfig {
    let mut c = ProjectConfig::default();
    c.runtimes.insert(kind, version.to_string());
    c.init_commands = commands.iter().map(|s| s.to_string()).collect();
    c
}

fn read_tree(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut out = BTreeMap::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(d) = stack.pop() {
        for entry in fs::read_dir(&d).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                out.insert(path.strip_prefix(dir).unwrap().to_path_buf(), fs::read(&path).unwrap());
            }
        }
    }
    out
}

#[test]
fn test_pip_project_installs_once_then_short_circuits() {
    let fx = Fixture::new();
    fs::write(fx.project.join("requirements.txt"), "requests==2.31.0\n").unwrap();
    let cfg = config(RuntimeKind::Python, "3.12.0", &["pip install -r requirements.txt"]);
    let runtimes = [python_runtime(fx.layout.root())];
    let runner = FakeInstaller::writing(Vec::new());
    let cache = fx.cache();

    let first = cache.apply(&cfg, &fx.env(), &runtimes, &runner).unwrap();
    let fp = match first {
        ApplyOutcome::Installed(fp) => fp,
        other => panic!("expected fresh install, got {:?}", other),
    };
    assert_eq!(runner.run_count(), 1);
    assert_eq!(runner.runs.borrow()[0].0, runtimes[0].install_path.join("bin/pip3"));
    assert!(cache.store().archive_path(&fp).exists());
    assert!(cache.store().sidecar_path(&fp).exists());
    assert_eq!(
        fs::read_to_string(fx.project.join(".abix_state")).unwrap().trim(),
        fp.as_str()
    );

    let second = cache.apply(&cfg, &fx.env(), &runtimes, &runner).unwrap();
    assert_eq!(second, ApplyOutcome::UpToDate(fp));
    assert_eq!(runner.run_count(), 1);
}

#[test]
fn test_snapshot_restore_is_byte_identical() {
    let fx = Fixture::new();
    fs::write(fx.project.join("package-lock.json"), "{\"lockfileVersion\":3}").unwrap();
    let cfg = config(RuntimeKind::Node, "22.1.0", &["npm install"]);
    let runner = FakeInstaller::writing(vec![
        ("node_modules/left-pad/index.js", b"module.exports = (s) => s;\n"),
        ("node_modules/left-pad/package.json", b"{\"name\":\"left-pad\"}"),
        ("node_modules/.bin/left-pad", b"#!/usr/bin/env node\n"),
    ]);
    let cache = fx.cache();

    assert!(matches!(cache.apply(&cfg, &fx.env(), &[], &runner).unwrap(), ApplyOutcome::Installed(_)));
    // lockfile present: the install ran as `npm ci`
    assert_eq!(runner.runs.borrow()[0].1, vec!["ci".to_string()]);
    let installed = read_tree(&fx.project.join("node_modules"));

    fs::remove_dir_all(fx.project.join("node_modules")).unwrap();
    let outcome = cache.apply(&cfg, &fx.env(), &[], &runner).unwrap();
    assert!(matches!(outcome, ApplyOutcome::Restored(_)), "{:?}", outcome);
    assert_eq!(runner.run_count(), 1);
    assert_eq!(read_tree(&fx.project.join("node_modules")), installed);

    // state and outputs agree again
    assert!(matches!(cache.apply(&cfg, &fx.env(), &[], &runner).unwrap(), ApplyOutcome::UpToDate(_)));
}

#[test]
fn test_corrupted_snapshot_falls_back_to_fresh_install() {
    let fx = Fixture::new();
    let cfg = config(RuntimeKind::Node, "22.1.0", &["npm install"]);
    let runner = FakeInstaller::writing(vec![("node_modules/a/index.js", b"a")]);
    let cache = fx.cache();

    let fp = match cache.apply(&cfg, &fx.env(), &[], &runner).unwrap() {
        ApplyOutcome::Installed(fp) => fp,
        other => panic!("unexpected {:?}", other),
    };
    // flip bytes in the archive so it no longer matches its sidecar
    let archive = cache.store().archive_path(&fp);
    let mut bytes = fs::read(&archive).unwrap();
    bytes[0] ^= 0xff;
    fs::write(&archive, bytes).unwrap();
    fs::remove_dir_all(fx.project.join("node_modules")).unwrap();

    let outcome = cache.apply(&cfg, &fx.env(), &[], &runner).unwrap();
    assert_eq!(outcome, ApplyOutcome::Installed(fp.clone()));
    assert_eq!(runner.run_count(), 2);
    // the replacement snapshot is sound
    assert!(matches!(
        cache.store().lookup(&fp).unwrap(),
        SnapshotLookup::Valid(_)
    ));
}

#[test]
fn test_state_match_without_outputs_is_not_up_to_date() {
    let fx = Fixture::new();
    let cfg = config(RuntimeKind::Node, "22.1.0", &["npm install"]);
    let runner = FakeInstaller::writing(vec![("node_modules/a/index.js", b"a")]);
    let cache = fx.cache();
    cache.apply(&cfg, &fx.env(), &[], &runner).unwrap();

    // snapshot gone and outputs deleted: only a reinstall can help
    let fp = cache.fingerprint(&cfg).unwrap();
    cache.store().remove(&fp).unwrap();
    fs::remove_dir_all(fx.project.join("node_modules")).unwrap();
    assert!(ProjectState::new(&fx.project).matches(&fp));

    let outcome = cache.apply(&cfg, &fx.env(), &[], &runner).unwrap();
    assert_eq!(outcome, ApplyOutcome::Installed(fp));
    assert_eq!(runner.run_count(), 2);
}

#[test]
fn test_wiped_snapshots_with_outputs_on_disk_stay_up_to_date() {
    let fx = Fixture::new();
    let cfg = config(RuntimeKind::Node, "22.1.0", &["npm install"]);
    let runner = FakeInstaller::writing(vec![("node_modules/a/index.js", b"a")]);
    let cache = fx.cache();
    let fp = match cache.apply(&cfg, &fx.env(), &[], &runner).unwrap() {
        ApplyOutcome::Installed(fp) => fp,
        other => panic!("unexpected {:?}", other),
    };

    // tool root snapshots removed from outside; project untouched
    fs::remove_dir_all(fx.layout.snapshots_dir()).unwrap();
    assert!(fx.project.join("node_modules").is_dir());

    let outcome = cache.apply(&cfg, &fx.env(), &[], &runner).unwrap();
    assert_eq!(outcome, ApplyOutcome::UpToDate(fp));
    assert_eq!(runner.run_count(), 1);
}

#[test]
fn test_failing_command_halts_and_keeps_state() {
    let fx = Fixture::new();
    let cfg = config(RuntimeKind::Node, "22.1.0", &["npm install", "npm run build"]);
    let runner = FakeInstaller {
        fail_on: Some(0),
        ..FakeInstaller::writing(Vec::new())
    };
    let cache = fx.cache();

    let err = cache.apply(&cfg, &fx.env(), &[], &runner).unwrap_err();
    match err {
        AbixError::Installer { command, code } => {
            assert_eq!(command, "npm install");
            assert_eq!(code, 2);
        }
        other => panic!("expected installer error, got {}", other),
    }
    assert_eq!(runner.run_count(), 1);
    assert!(!fx.project.join(".abix_state").exists());
    assert!(!fx.layout.snapshots_dir().exists());
}

#[test]
fn test_changed_lockfile_triggers_new_install() {
    let fx = Fixture::new();
    fs::write(fx.project.join("requirements.txt"), "flask==3.0.0\n").unwrap();
    let cfg = config(RuntimeKind::Python, "3.12.0", &["pip install -r requirements.txt"]);
    let runtimes = [python_runtime(fx.layout.root())];
    let runner = FakeInstaller::writing(Vec::new());
    let cache = fx.cache();

    let first = cache.apply(&cfg, &fx.env(), &runtimes, &runner).unwrap();
    fs::write(fx.project.join("requirements.txt"), "flask==3.0.1\n").unwrap();
    let second = cache.apply(&cfg, &fx.env(), &runtimes, &runner).unwrap();
    assert!(matches!(second, ApplyOutcome::Installed(_)));
    assert_ne!(first, second);
    assert_eq!(runner.run_count(), 2);
}

#[test]
fn test_no_init_commands_is_a_no_op() {
    let fx = Fixture::new();
    let cfg = config(RuntimeKind::Node, "22.1.0", &[]);
    let runner = FakeInstaller::writing(Vec::new());
    let outcome = fx.cache().apply(&cfg, &fx.env(), &[], &runner).unwrap();
    assert_eq!(outcome, ApplyOutcome::NothingToInstall);
    assert!(!fx.project.join(".abix_state").exists());
}
