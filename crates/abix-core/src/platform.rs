//! Host platform and architecture identifiers.
//!
//! Identifiers follow the Node.js naming (`linux`, `darwin`, `win32`; `x64`,
//! `arm64`) because they end up in subject keys and install directory names,
//! which must stay stable across releases.

use std::fmt;

use crate::error::{AbixError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Linux,
    Darwin,
    Windows,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Darwin => "darwin",
            Platform::Windows => "win32",
        }
    }

    /// Map a `std::env::consts::OS` value.
    pub fn from_os(os: &str) -> Result<Self> {
        match os {
            "linux" => Ok(Platform::Linux),
            "macos" => Ok(Platform::Darwin),
            "windows" => Ok(Platform::Windows),
            other => Err(AbixError::config(format!(
                "unsupported operating system '{}'",
                other
            ))),
        }
    }

    pub fn is_windows(self) -> bool {
        matches!(self, Platform::Windows)
    }

    /// Separator between `PATH` entries.
    pub fn path_list_separator(self) -> char {
        if self.is_windows() {
            ';'
        } else {
            ':'
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    X64,
    Arm64,
}

impl Arch {
    pub fn as_str(self) -> &'static str {
        match self {
            Arch::X64 => "x64",
            Arch::Arm64 => "arm64",
        }
    }

    /// Map a `std::env::consts::ARCH` value. Unknown architectures are an
    /// error rather than a silent x64 fallback.
    pub fn from_arch(arch: &str) -> Result<Self> {
        match arch {
            "x86_64" => Ok(Arch::X64),
            "aarch64" => Ok(Arch::Arm64),
            other => Err(AbixError::config(format!(
                "unsupported CPU architecture '{}' (supported: x86_64, aarch64)",
                other
            ))),
        }
    }
}

/// The (platform, architecture) pair every runtime artifact is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostTarget {
    pub platform: Platform,
    pub arch: Arch,
}

impl HostTarget {
    pub fn new(platform: Platform, arch: Arch) -> Self {
        Self { platform, arch }
    }

    pub fn detect() -> Result<Self> {
        Ok(Self {
            platform: Platform::from_os(std::env::consts::OS)?,
            arch: Arch::from_arch(std::env::consts::ARCH)?,
        })
    }
}

impl fmt::Display for HostTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.platform.as_str(), self.arch.as_str())
    }
}
