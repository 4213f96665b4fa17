//! Environment composition: the `PATH` and cache variables every spawned
//! subprocess (init commands, entry, shell) runs with.
//!
//! Pure: nothing here touches the filesystem.

use abix_core::config::env_keys::exported;
use abix_core::{Platform, ToolLayout};
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::Command;

use crate::resolver::ManagedRuntime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedEnv {
    /// Search path: managed runtime directories first, ambient `PATH` last.
    pub path: OsString,
    /// Extra variables (cache roots, tool root).
    pub vars: BTreeMap<String, OsString>,
    separator: char,
}

impl ComposedEnv {
    /// Overlay this environment on `cmd`; everything else is inherited.
    pub fn apply(&self, cmd: &mut Command) {
        cmd.env(exported::PATH, &self.path);
        for (k, v) in &self.vars {
            cmd.env(k, v);
        }
    }

    pub fn path_entries(&self) -> Vec<PathBuf> {
        let s = self.path.to_string_lossy();
        s.split(self.separator)
            .filter(|e| !e.is_empty())
            .map(PathBuf::from)
            .collect()
    }

    pub fn var(&self, key: &str) -> Option<&OsStr> {
        self.vars.get(key).map(OsString::as_os_str)
    }
}

/// Compose the subprocess environment for `runtimes`, in the given priority
/// order, on top of `ambient_path`.
pub fn compose(
    runtimes: &[ManagedRuntime],
    layout: &ToolLayout,
    platform: Platform,
    ambient_path: Option<&OsStr>,
) -> ComposedEnv {
    let separator = platform.path_list_separator();
    let mut path = OsString::new();
    let mut seen: Vec<&PathBuf> = Vec::new();
    for dir in runtimes.iter().flat_map(|r| r.bin_dirs.iter()) {
        if seen.contains(&dir) {
            continue;
        }
        seen.push(dir);
        if !path.is_empty() {
            path.push(separator.to_string());
        }
        path.push(dir.as_os_str());
    }
    if let Some(ambient) = ambient_path.filter(|p| !p.is_empty()) {
        if !path.is_empty() {
            path.push(separator.to_string());
        }
        path.push(ambient);
    }

    let mut vars = BTreeMap::new();
    vars.insert(exported::ABIX_ROOT.to_string(), layout.root().as_os_str().to_owned());
    vars.insert(
        exported::NPM_CONFIG_CACHE.to_string(),
        layout.npm_cache_dir().into_os_string(),
    );
    vars.insert(
        exported::PIP_CACHE_DIR.to_string(),
        layout.pip_cache_dir().into_os_string(),
    );

    ComposedEnv {
        path,
        vars,
        separator,
    }
}

/// [`compose`] against the current process `PATH`.
pub fn compose_from_process(
    runtimes: &[ManagedRuntime],
    layout: &ToolLayout,
    platform: Platform,
) -> ComposedEnv {
    let ambient = std::env::var_os(exported::PATH);
    compose(runtimes, layout, platform, ambient.as_deref())
}
