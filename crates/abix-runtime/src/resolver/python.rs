//! CPython distributions: python-build-standalone `install_only` builds on
//! Linux and macOS, python.org embeddable zips on Windows.
//!
//! The embeddable build ships with `site` disabled and without pip, so it
//! needs [`enable_site`] and a get-pip bootstrap after extraction.

use abix_core::config::MirrorConfig;
use abix_core::{Arch, HostTarget, IoResultExt, Platform, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::{Distribution, RuntimeFiles};
use crate::transport::ArchiveFormat;

/// python-build-standalone release the unix builds are taken from.
pub const STANDALONE_RELEASE: &str = "20230507";

pub(super) fn distribution(version: &str, target: HostTarget, mirrors: &MirrorConfig) -> Distribution {
    if target.platform.is_windows() {
        let arch = match target.arch {
            Arch::X64 => "amd64",
            Arch::Arm64 => "arm64",
        };
        let filename = format!("python-{}-embed-{}.zip", version, arch);
        return Distribution {
            url: format!("{}/{}/{}", mirrors.python_org.trim_end_matches('/'), version, filename),
            filename,
            format: ArchiveFormat::Zip,
            // python.org publishes no machine-readable checksum list
            checksum_feed: None,
        };
    }

    let arch = match target.arch {
        Arch::X64 => "x86_64",
        Arch::Arm64 => "aarch64",
    };
    let os = match target.platform {
        Platform::Darwin => "apple-darwin",
        _ => "unknown-linux-gnu",
    };
    let filename = format!(
        "cpython-{}+{}-{}-{}-install_only.tar.gz",
        version, STANDALONE_RELEASE, arch, os
    );
    let base = format!(
        "{}/{}",
        mirrors.python_standalone.trim_end_matches('/'),
        STANDALONE_RELEASE
    );
    Distribution {
        url: format!("{}/{}", base, filename),
        checksum_feed: Some(format!("{}/SHA256SUMS", base)),
        filename,
        format: ArchiveFormat::TarGz,
    }
}

pub(super) fn files(install_path: &Path, platform: Platform) -> RuntimeFiles {
    let mut aux = BTreeMap::new();
    if platform.is_windows() {
        let pip = install_path.join("Scripts").join("pip.exe");
        aux.insert("pip".to_string(), pip);
        RuntimeFiles {
            primary: install_path.join("python.exe"),
            auxiliary: aux,
            bin_dirs: vec![install_path.to_path_buf(), install_path.join("Scripts")],
            fast_path_aux: vec!["pip"],
        }
    } else {
        let bin = install_path.join("bin");
        aux.insert("pip".to_string(), bin.join("pip3"));
        RuntimeFiles {
            primary: bin.join("python3"),
            auxiliary: aux,
            bin_dirs: vec![bin],
            fast_path_aux: vec!["pip"],
        }
    }
}

/// Uncomment `import site` in the embeddable build's `._pth` file so
/// site-packages (and therefore pip) work. Returns whether a file changed.
pub(super) fn enable_site(install_path: &Path) -> Result<bool> {
    let entries = fs::read_dir(install_path)
        .io_context(|| format!("failed to list {}", install_path.display()))?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("_pth") {
            continue;
        }
        let content =
            fs::read_to_string(&path).io_context(|| format!("failed to read {}", path.display()))?;
        if !content.contains("#import site") {
            return Ok(false);
        }
        fs::write(&path, content.replacen("#import site", "import site", 1))
            .io_context(|| format!("failed to write {}", path.display()))?;
        return Ok(true);
    }
    Ok(false)
}
