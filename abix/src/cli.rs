use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// abix - project-local Node.js and Python runtimes, pinned and cached
#[derive(Parser, Debug)]
#[command(name = "abix")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Tool root (runtimes, package caches, snapshots, integrity ledger).
    /// Defaults to ABIX_ROOT, then ~/.abix/config.json, then ~/.abix
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Project directory
    #[arg(long, short = 'C', global = true, value_name = "DIR", default_value = ".")]
    pub project: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write abix.json for this project (runtimes detected from package.json /
    /// requirements.txt / pyproject.toml unless given explicitly)
    Init {
        /// Runtimes as kind:version, e.g. node:22.1.0 python:3.12.0
        #[arg(value_name = "KIND:VERSION")]
        runtimes: Vec<String>,

        /// Overwrite an existing abix.json
        #[arg(long)]
        force: bool,
    },

    /// Provision runtimes and dependencies, then run the configured entry
    Run {
        /// Extra arguments appended to the entry command
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Provision runtimes and dependencies, then open a shell with them on PATH
    Shell,

    /// Provision runtimes and report their versions and locations
    Check,

    /// Remove this project's installed dependencies, state marker and abix.lock
    Clean,

    /// Delete the whole tool root (every runtime, cache and snapshot)
    CleanGlobal {
        /// Required: confirms the deletion
        #[arg(long)]
        force: bool,
    },
}
