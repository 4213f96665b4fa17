//! Project configuration (`abix.json`) and runtime specs.
//!
//! The core only reads this file; `detect` and `save` back the `init` command.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{AbixError, IoResultExt, Result};

pub const CONFIG_FILE: &str = "abix.json";

/// The closed set of managed runtime kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    /// JavaScript engine; package installer `npm` ships in the archive.
    Node,
    /// General-purpose interpreter; package installer `pip`.
    Python,
}

impl RuntimeKind {
    pub const ALL: [RuntimeKind; 2] = [RuntimeKind::Node, RuntimeKind::Python];

    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeKind::Node => "node",
            RuntimeKind::Python => "python",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "node" => Some(RuntimeKind::Node),
            "python" => Some(RuntimeKind::Python),
            _ => None,
        }
    }

    pub fn default_version(self) -> &'static str {
        match self {
            RuntimeKind::Node => "20.18.0",
            RuntimeKind::Python => "3.12.0",
        }
    }

    /// The init command `abix init` writes for a detected project of this kind.
    pub fn default_init_command(self) -> &'static str {
        match self {
            RuntimeKind::Node => "npm install",
            RuntimeKind::Python => "pip install -r requirements.txt",
        }
    }
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuntimeSpec {
    pub kind: RuntimeKind,
    pub version: String,
}

impl RuntimeSpec {
    pub fn new(kind: RuntimeKind, version: impl Into<String>) -> Self {
        Self {
            kind,
            version: version.into(),
        }
    }

    /// Parse `kind:version`, e.g. `node:22.1.0`.
    pub fn parse(spec: &str) -> Result<Self> {
        let (kind, version) = spec.split_once(':').ok_or_else(|| {
            AbixError::config(format!("runtime spec '{}' must look like kind:version", spec))
        })?;
        let kind = RuntimeKind::parse(kind).ok_or_else(|| {
            AbixError::config(format!(
                "unsupported runtime kind '{}' in '{}' (supported: node, python)",
                kind, spec
            ))
        })?;
        let version = version.trim();
        validate_version(kind, version)?;
        Ok(Self::new(kind, version))
    }
}

impl fmt::Display for RuntimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.version)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub runtimes: BTreeMap<RuntimeKind, String>,
    #[serde(default)]
    pub init_commands: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
}

impl ProjectConfig {
    /// Load and validate `<project_dir>/abix.json`.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let path = project_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Err(AbixError::config(format!(
                "{} not found in {}; run `abix init` first",
                CONFIG_FILE,
                project_dir.display()
            )));
        }
        let content =
            fs::read_to_string(&path).io_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: ProjectConfig = serde_json::from_str(content)
            .map_err(|e| AbixError::config(format!("invalid {}: {}", CONFIG_FILE, e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (kind, version) in &self.runtimes {
            validate_version(*kind, version)?;
        }
        if let Some(i) = self.init_commands.iter().position(|c| c.trim().is_empty()) {
            return Err(AbixError::config(format!("init_commands[{}] is empty", i)));
        }
        if matches!(self.entry.as_deref(), Some(e) if e.trim().is_empty()) {
            return Err(AbixError::config("entry is empty"));
        }
        Ok(())
    }

    pub fn runtime_specs(&self) -> Vec<RuntimeSpec> {
        self.runtimes
            .iter()
            .map(|(kind, version)| RuntimeSpec::new(*kind, version.clone()))
            .collect()
    }

    /// Canonical serialized form. Map keys are ordered, so equal configs
    /// always serialize to identical bytes.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }

    pub fn save(&self, project_dir: &Path) -> Result<()> {
        let path = project_dir.join(CONFIG_FILE);
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| AbixError::config(format!("cannot serialize {}: {}", CONFIG_FILE, e)))?;
        fs::write(&path, content).io_context(|| format!("failed to write {}", path.display()))
    }

    /// Build a config for `abix init`: explicit specs win, otherwise the
    /// project's manifests decide which runtimes are needed.
    pub fn detect(project_dir: &Path, explicit: &[RuntimeSpec]) -> Self {
        let mut config = ProjectConfig::default();
        let kinds: Vec<(RuntimeKind, String)> = if explicit.is_empty() {
            detect_kinds(project_dir)
                .into_iter()
                .map(|k| (k, k.default_version().to_string()))
                .collect()
        } else {
            explicit.iter().map(|s| (s.kind, s.version.clone())).collect()
        };
        for (kind, version) in kinds {
            if config.runtimes.insert(kind, version).is_none() {
                config.init_commands.push(kind.default_init_command().to_string());
            }
        }
        config
    }
}

/// Runtime kinds implied by the manifests present in `project_dir`.
pub fn detect_kinds(project_dir: &Path) -> Vec<RuntimeKind> {
    let mut kinds = Vec::new();
    if project_dir.join("package.json").exists() {
        kinds.push(RuntimeKind::Node);
    }
    if project_dir.join("requirements.txt").exists() || project_dir.join("pyproject.toml").exists() {
        kinds.push(RuntimeKind::Python);
    }
    kinds
}

fn validate_version(kind: RuntimeKind, version: &str) -> Result<()> {
    let valid = !version.is_empty()
        && version
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+' | '_'));
    if valid {
        Ok(())
    } else {
        Err(AbixError::config(format!(
            "invalid {} version '{}'",
            kind, version
        )))
    }
}
