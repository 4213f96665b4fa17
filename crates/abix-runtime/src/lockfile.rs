//! Project lock (`abix.lock`): the runtime pins a project was last resolved
//! with, carried alongside the project so another machine verifies the same
//! archives instead of trusting its own first download.

use abix_core::{AbixError, IoResultExt, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::ledger::{parse_records, write_records, IntegrityLedger, IntegrityRecord, SubjectKey, TrustOrigin};

pub const PROJECT_LOCK_FILE: &str = "abix.lock";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectLock {
    records: BTreeMap<String, IntegrityRecord>,
}

impl ProjectLock {
    /// Load `<project_dir>/abix.lock`; `None` when the project has no lock.
    pub fn load(project_dir: &Path) -> Result<Option<Self>> {
        let path = project_dir.join(PROJECT_LOCK_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content =
            fs::read_to_string(&path).io_context(|| format!("failed to read {}", path.display()))?;
        Ok(Some(Self {
            records: parse_records(&path, &content)?,
        }))
    }

    /// Snapshot the ledger entries for `keys`. Keys the ledger does not know
    /// are skipped.
    pub fn from_ledger<'a>(ledger: &IntegrityLedger, keys: impl IntoIterator<Item = &'a SubjectKey>) -> Self {
        let records = keys
            .into_iter()
            .filter_map(|k| ledger.lookup(k).map(|r| (k.to_string(), r.clone())))
            .collect();
        Self { records }
    }

    pub fn save(&self, project_dir: &Path) -> Result<()> {
        write_records(&project_dir.join(PROJECT_LOCK_FILE), &self.records)
    }

    pub fn get(&self, key: &SubjectKey) -> Option<&IntegrityRecord> {
        self.records.get(key.as_str())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl IntegrityLedger {
    /// Adopt the pins of a project lock. Unknown keys are recorded with
    /// origin `PINNED_LOCK`; a lock entry contradicting an existing pin is an
    /// integrity error. Returns the number of adopted entries.
    pub fn adopt(&mut self, lock: &ProjectLock) -> Result<usize> {
        let mut adopted = 0;
        for (key, rec) in &lock.records {
            match self.raw_lookup(key) {
                Some(existing) if existing.digest.eq_ignore_ascii_case(&rec.digest) => {}
                Some(existing) => {
                    return Err(AbixError::Integrity {
                        subject: key.clone(),
                        expected: existing.digest.clone(),
                        actual: rec.digest.to_lowercase(),
                    });
                }
                None => {
                    self.insert_pinned(
                        key,
                        IntegrityRecord {
                            url: rec.url.clone(),
                            digest: rec.digest.to_lowercase(),
                            origin: TrustOrigin::PinnedLock,
                            pinned_at: Some(Utc::now()),
                        },
                    );
                    adopted += 1;
                }
            }
        }
        if adopted > 0 {
            self.persist()?;
            tracing::debug!("adopted {} pin(s) from {}", adopted, PROJECT_LOCK_FILE);
        }
        Ok(adopted)
    }
}
