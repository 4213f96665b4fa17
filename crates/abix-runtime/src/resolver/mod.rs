//! Runtime resolver: `(kind, version)` on a host target to an installed,
//! integrity-checked [`ManagedRuntime`].
//!
//! The kind set is closed, so per-kind behaviour (distribution URL, file
//! layout, post-install steps) lives in [`node`] and [`python`] and is
//! dispatched by `match` rather than through a trait object.

pub mod node;
pub mod python;

use abix_core::config::MirrorConfig;
use abix_core::{AbixError, HostTarget, IoResultExt, Platform, Result, RuntimeKind, RuntimeSpec, ToolLayout};
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::env::compose_from_process;
use crate::info_log;
use crate::ledger::{IntegrityLedger, SubjectKey, TrustOrigin};
use crate::log::format_elapsed;
use crate::process::CommandRunner;
use crate::transport::{extract, sha256_file, ArchiveFormat, Fetcher};

/// A concrete installed runtime. `install_path` is a pure function of the
/// subject key, so equal inputs always resolve to the same location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedRuntime {
    pub kind: RuntimeKind,
    pub version: String,
    pub subject: SubjectKey,
    pub install_path: PathBuf,
    pub primary_executable: PathBuf,
    /// Package installer and friends, e.g. `npm`, `pip`.
    pub auxiliary_executables: BTreeMap<String, PathBuf>,
    /// Directories to put on `PATH`, highest priority first.
    pub bin_dirs: Vec<PathBuf>,
}

impl ManagedRuntime {
    pub fn auxiliary(&self, name: &str) -> Option<&Path> {
        self.auxiliary_executables.get(name).map(PathBuf::as_path)
    }
}

/// Where and how a vendor publishes one artifact variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    pub url: String,
    pub filename: String,
    pub format: ArchiveFormat,
    /// Vendor checksum list covering `filename`, when one exists.
    pub checksum_feed: Option<String>,
}

/// Per-kind executable layout inside an install directory.
#[derive(Debug, Clone)]
pub(crate) struct RuntimeFiles {
    pub primary: PathBuf,
    pub auxiliary: BTreeMap<String, PathBuf>,
    pub bin_dirs: Vec<PathBuf>,
    /// Auxiliaries whose presence is part of the "already installed" check.
    pub fast_path_aux: Vec<&'static str>,
}

impl RuntimeFiles {
    fn for_kind(kind: RuntimeKind, install_path: &Path, platform: Platform) -> Self {
        match kind {
            RuntimeKind::Node => node::files(install_path, platform),
            RuntimeKind::Python => python::files(install_path, platform),
        }
    }

    fn installed(&self) -> bool {
        self.primary.exists()
            && self
                .fast_path_aux
                .iter()
                .all(|name| self.auxiliary.get(*name).is_some_and(|p| p.exists()))
    }

    /// First expected file absent after an install, if any.
    fn first_missing(&self) -> Option<&Path> {
        std::iter::once(&self.primary)
            .chain(self.auxiliary.values())
            .find(|p| !p.exists())
            .map(PathBuf::as_path)
    }
}

pub fn distribution(kind: RuntimeKind, version: &str, target: HostTarget, mirrors: &MirrorConfig) -> Distribution {
    match kind {
        RuntimeKind::Node => node::distribution(version, target, mirrors),
        RuntimeKind::Python => python::distribution(version, target, mirrors),
    }
}

/// Find `filename` in a `sha256sum`-style listing (`<hex>  <name>`, with an
/// optional `*` binary marker or `./` prefix on the name).
pub fn parse_checksum_feed(text: &str, filename: &str) -> Option<String> {
    text.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        let digest = parts.next()?;
        let name = parts.next()?;
        let name = name.trim_start_matches('*').trim_start_matches("./");
        let valid = digest.len() == 64 && digest.chars().all(|c| c.is_ascii_hexdigit());
        (valid && name == filename).then(|| digest.to_ascii_lowercase())
    })
}

/// Acquires runtimes into a tool root, gated by the integrity ledger.
pub struct RuntimeProvisioner<F: Fetcher, R: CommandRunner> {
    layout: ToolLayout,
    target: HostTarget,
    mirrors: MirrorConfig,
    fetcher: F,
    runner: R,
    ledger: IntegrityLedger,
}

impl<F: Fetcher, R: CommandRunner> RuntimeProvisioner<F, R> {
    pub fn new(
        layout: ToolLayout,
        target: HostTarget,
        mirrors: MirrorConfig,
        fetcher: F,
        runner: R,
        ledger: IntegrityLedger,
    ) -> Self {
        Self {
            layout,
            target,
            mirrors,
            fetcher,
            runner,
            ledger,
        }
    }

    pub fn layout(&self) -> &ToolLayout {
        &self.layout
    }

    pub fn target(&self) -> HostTarget {
        self.target
    }

    pub fn ledger(&self) -> &IntegrityLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut IntegrityLedger {
        &mut self.ledger
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn subject_key(&self, spec: &RuntimeSpec) -> SubjectKey {
        SubjectKey::new(spec.kind, &spec.version, self.target)
    }

    pub fn install_path(&self, spec: &RuntimeSpec) -> PathBuf {
        self.layout
            .runtimes_dir()
            .join(self.subject_key(spec).as_str())
    }

    fn managed(&self, spec: &RuntimeSpec, files: RuntimeFiles) -> ManagedRuntime {
        ManagedRuntime {
            kind: spec.kind,
            version: spec.version.clone(),
            subject: self.subject_key(spec),
            install_path: self.install_path(spec),
            primary_executable: files.primary,
            auxiliary_executables: files.auxiliary,
            bin_dirs: files.bin_dirs,
        }
    }

    /// Return the installed runtime for `spec`, downloading, verifying and
    /// extracting it first when it is not already present.
    pub fn resolve(&mut self, spec: &RuntimeSpec) -> Result<ManagedRuntime> {
        let install_path = self.install_path(spec);
        let files = RuntimeFiles::for_kind(spec.kind, &install_path, self.target.platform);
        if files.installed() {
            tracing::debug!("{} already installed at {}", spec, install_path.display());
            return Ok(self.managed(spec, files));
        }

        let start = Instant::now();
        let dist = distribution(spec.kind, &spec.version, self.target, &self.mirrors);
        let archive = self
            .layout
            .temp_archive_path(spec.kind.as_str(), dist.format.extension());
        self.layout.ensure_root()?;
        info_log!("downloading {} from {}", spec, dist.url);

        let result = self.acquire(spec, &dist, &archive, &install_path, &files);
        if archive.exists() {
            let _ = fs::remove_file(&archive);
        }
        result?;

        info_log!("{} ready in {}", spec, format_elapsed(start.elapsed()));
        Ok(self.managed(spec, files))
    }

    fn acquire(
        &mut self,
        spec: &RuntimeSpec,
        dist: &Distribution,
        archive: &Path,
        install_path: &Path,
        files: &RuntimeFiles,
    ) -> Result<()> {
        self.fetcher.fetch(&dist.url, archive)?;
        let digest = sha256_file(archive)?;
        let key = self.subject_key(spec);

        let fetcher = &self.fetcher;
        let admission = self.ledger.admit(&key, &dist.url, &digest, || {
            official_digest(fetcher, dist)
        })?;
        if !admission.newly_pinned {
            info_log!("integrity confirmed for {} ({:?})", key, admission.origin);
        } else if admission.origin == TrustOrigin::OfficialChecksum {
            abix_core::observability::security_event(
                "runtime_official_pinned",
                &format!("{} verified against the vendor checksum list and pinned", key),
                json!({ "subject": key.as_str(), "url": dist.url, "digest": digest }),
            );
        }

        self.install(archive, dist.format, install_path)?;
        if let Err(e) = self.post_install(spec, install_path, files) {
            let _ = fs::remove_dir_all(install_path);
            return Err(e);
        }
        Ok(())
    }

    /// Extract into a staging directory beside the final location, then move
    /// it into place. A lone top-level directory in the archive is unwrapped.
    fn install(&self, archive: &Path, format: ArchiveFormat, install_path: &Path) -> Result<()> {
        let runtimes_dir = self.layout.runtimes_dir();
        fs::create_dir_all(&runtimes_dir)
            .io_context(|| format!("failed to create {}", runtimes_dir.display()))?;
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&runtimes_dir)
            .io_context(|| format!("failed to stage in {}", runtimes_dir.display()))?;
        extract(archive, staging.path(), format)?;

        let root = single_top_level_dir(staging.path())?.unwrap_or_else(|| staging.path().to_path_buf());
        if install_path.exists() {
            fs::remove_dir_all(install_path)
                .io_context(|| format!("failed to clear {}", install_path.display()))?;
        }
        fs::rename(&root, install_path).io_context(|| {
            format!("failed to move {} to {}", root.display(), install_path.display())
        })?;
        Ok(())
    }

    fn post_install(&self, spec: &RuntimeSpec, install_path: &Path, files: &RuntimeFiles) -> Result<()> {
        if spec.kind == RuntimeKind::Python {
            if self.target.platform.is_windows() && python::enable_site(install_path)? {
                tracing::debug!("enabled site-packages in {}", install_path.display());
            }
            let pip_missing = files.auxiliary.get("pip").is_some_and(|p| !p.exists());
            if pip_missing && files.primary.exists() {
                self.bootstrap_pip(&files.primary, install_path)?;
            }
        }

        #[cfg(unix)]
        {
            if !self.target.platform.is_windows() {
                make_executable(&files.primary)?;
            }
        }

        if let Some(missing) = files.first_missing() {
            return Err(AbixError::CorruptDistribution {
                subject: self.subject_key(spec).to_string(),
                missing: missing.to_path_buf(),
            });
        }
        Ok(())
    }

    /// Install pip into a fresh interpreter with the cached get-pip.py.
    fn bootstrap_pip(&self, python: &Path, install_path: &Path) -> Result<()> {
        info_log!("bootstrapping pip into {}", install_path.display());
        let script = self.layout.get_pip_path();
        if !script.exists() {
            self.fetcher.fetch(&self.mirrors.get_pip, &script)?;
        }
        let args = vec![
            script.to_string_lossy().to_string(),
            "--quiet".to_string(),
            "--no-warn-script-location".to_string(),
        ];
        let env = compose_from_process(&[], &self.layout, self.target.platform);
        let code = self.runner.run(python, &args, install_path, &env)?;
        if code != 0 {
            return Err(AbixError::Installer {
                command: format!("{} {}", python.display(), args.join(" ")),
                code,
            });
        }
        Ok(())
    }
}

fn official_digest<F: Fetcher>(fetcher: &F, dist: &Distribution) -> Option<String> {
    let feed = dist.checksum_feed.as_deref()?;
    match fetcher.fetch_text(feed) {
        Ok(text) => {
            let found = parse_checksum_feed(&text, &dist.filename);
            if found.is_none() {
                tracing::warn!("{} does not list {}", feed, dist.filename);
            }
            found
        }
        Err(e) => {
            tracing::warn!("checksum list unavailable, falling back to trust on first use: {}", e);
            None
        }
    }
}

fn single_top_level_dir(dir: &Path) -> Result<Option<PathBuf>> {
    let mut entries = fs::read_dir(dir)
        .io_context(|| format!("failed to list {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()
        .io_context(|| format!("failed to list {}", dir.display()))?;
    if entries.len() != 1 {
        return Ok(None);
    }
    let only = entries.remove(0).path();
    Ok(only.is_dir().then_some(only))
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    if path.exists() {
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))
            .io_context(|| format!("failed to chmod {}", path.display()))?;
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    const D1: &str = "1111111111111111111111111111111111111111111111111111111111111111";
    const D2: &str = "2222222222222222222222222222222222222222222222222222222222222222";

    #[test]
    fn test_parse_checksum_feed_exact_name() {
        let feed = format!(
            "{}  node-v22.1.0-linux-x64.tar.gz.extra\n{}  node-v22.1.0-linux-x64.tar.gz\n",
            D1, D2
        );
        assert_eq!(
            parse_checksum_feed(&feed, "node-v22.1.0-linux-x64.tar.gz").as_deref(),
            Some(D2)
        );
        assert_eq!(parse_checksum_feed(&feed, "node-v22.1.0-linux-x64"), None);
    }

    #[test]
    fn test_parse_checksum_feed_binary_marker() {
        let feed = format!("{} *./cpython.tar.gz\n", D1.to_uppercase());
        assert_eq!(parse_checksum_feed(&feed, "cpython.tar.gz").as_deref(), Some(D1));
    }

    #[test]
    fn test_single_top_level_dir() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("python/bin")).unwrap();
        assert_eq!(
            single_top_level_dir(tmp.path()).unwrap(),
            Some(tmp.path().join("python"))
        );
        fs::write(tmp.path().join("python312._pth"), "").unwrap();
        assert_eq!(single_top_level_dir(tmp.path()).unwrap(), None);
    }
}
