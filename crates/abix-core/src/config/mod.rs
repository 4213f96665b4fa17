//! abix configuration layer
//!
//! Every environment variable read goes through this module; the rest of the
//! workspace consumes structured config instead of calling `std::env::var`.
//!
//! - `loader`: env_or, env_optional, env_bool, env_u64 helpers
//! - `schema`: ObservabilityConfig, MirrorConfig, TransportConfig
//! - `env_keys`: key constants

pub mod env_keys;
pub mod loader;
pub mod schema;

pub use loader::{env_bool, env_optional, env_or, env_u64};
pub use schema::{MirrorConfig, ObservabilityConfig, TransportConfig};
