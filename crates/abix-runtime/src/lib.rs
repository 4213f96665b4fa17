//! Runtime acquisition for abix: fetch, verify against the integrity ledger,
//! extract, and compose the environment subprocesses run with.

pub mod env;
pub mod ledger;
pub mod lockfile;
pub mod log;
pub mod process;
pub mod resolver;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use env::{compose, compose_from_process, ComposedEnv};
pub use ledger::{Admission, IntegrityLedger, IntegrityRecord, SubjectKey, TrustOrigin, Verdict};
pub use lockfile::ProjectLock;
pub use process::{CommandRunner, SystemRunner};
pub use resolver::{ManagedRuntime, RuntimeProvisioner};
pub use transport::{ArchiveFormat, Fetcher, HttpFetcher};
