//! Dependency snapshot cache: decide between "nothing to do", "restore from
//! snapshot" and "fresh install + snapshot" for a project, keyed by a
//! fingerprint of everything that can change the installed tree.

pub mod apply;
pub mod fingerprint;
pub mod installer;
pub mod state;
pub mod store;

pub use apply::{ApplyOutcome, DependencyCache};
pub use fingerprint::{FingerprintInputs, ProjectFingerprint};
pub use installer::{plan_commands, InstallStep};
pub use state::ProjectState;
pub use store::{DependencySnapshot, SnapshotLookup, SnapshotManifest, SnapshotStore, OUTPUT_DIRS};
