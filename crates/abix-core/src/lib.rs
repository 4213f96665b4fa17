pub mod config;
pub mod error;
pub mod layout;
pub mod observability;
pub mod platform;
pub mod project;

pub use error::{AbixError, IoResultExt, Result};
pub use layout::ToolLayout;
pub use platform::{Arch, HostTarget, Platform};
pub use project::{ProjectConfig, RuntimeKind, RuntimeSpec};

/// Version string of the tool itself. Part of every project fingerprint.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Short tool name used for project-local file names (`abix.json`, `.abix_state`).
pub const TOOL_NAME: &str = "abix";
