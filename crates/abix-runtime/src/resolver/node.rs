//! Node.js distributions from nodejs.org (or a mirror with the same layout).

use abix_core::config::MirrorConfig;
use abix_core::{Arch, HostTarget, Platform};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{Distribution, RuntimeFiles};
use crate::transport::ArchiveFormat;

pub(super) fn distribution(version: &str, target: HostTarget, mirrors: &MirrorConfig) -> Distribution {
    let os = match target.platform {
        Platform::Windows => "win",
        Platform::Darwin => "darwin",
        Platform::Linux => "linux",
    };
    let arch = match target.arch {
        Arch::X64 => "x64",
        Arch::Arm64 => "arm64",
    };
    let format = if target.platform.is_windows() {
        ArchiveFormat::Zip
    } else {
        ArchiveFormat::TarGz
    };
    let filename = format!("node-v{}-{}-{}.{}", version, os, arch, format.extension());
    let base = format!("{}/v{}", mirrors.node.trim_end_matches('/'), version);
    Distribution {
        url: format!("{}/{}", base, filename),
        checksum_feed: Some(format!("{}/SHASUMS256.txt", base)),
        filename,
        format,
    }
}

pub(super) fn files(install_path: &Path, platform: Platform) -> RuntimeFiles {
    let mut aux = BTreeMap::new();
    if platform.is_windows() {
        aux.insert("npm".to_string(), install_path.join("npm.cmd"));
        aux.insert("npx".to_string(), install_path.join("npx.cmd"));
        RuntimeFiles {
            primary: install_path.join("node.exe"),
            auxiliary: aux,
            bin_dirs: vec![install_path.to_path_buf()],
            fast_path_aux: Vec::new(),
        }
    } else {
        let bin: PathBuf = install_path.join("bin");
        aux.insert("npm".to_string(), bin.join("npm"));
        aux.insert("npx".to_string(), bin.join("npx"));
        RuntimeFiles {
            primary: bin.join("node"),
            auxiliary: aux,
            bin_dirs: vec![bin],
            fast_path_aux: Vec::new(),
        }
    }
}
