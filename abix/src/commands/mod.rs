//! CLI commands. Each `cmd_*` maps one subcommand onto the library crates;
//! the shared provisioning pipeline lives in `session`.

pub mod check;
pub mod clean;
pub mod init;
pub mod run;
pub mod session;
