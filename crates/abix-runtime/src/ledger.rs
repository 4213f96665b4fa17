//! Integrity ledger: the global `locks/runtimes.lock` mapping each runtime
//! artifact variant to its pinned sha256 digest and trust origin.
//!
//! The ledger is a single-owner value: loaded once, mutated only through
//! [`IntegrityLedger::record`] / [`IntegrityLedger::admit`], and flushed as a
//! whole file on every new pin. A pinned key is never re-pinned to a
//! different digest.

use abix_core::observability::security_event;
use abix_core::{AbixError, HostTarget, IoResultExt, Result, RuntimeKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// `<kind>-<version>-<platform>-<arch>`: one key per concrete artifact
/// variant. Also names the install directory under `runtimes/`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubjectKey(String);

impl SubjectKey {
    pub fn new(kind: RuntimeKind, version: &str, target: HostTarget) -> Self {
        Self(format!(
            "{}-{}-{}-{}",
            kind.as_str(),
            version,
            target.platform.as_str(),
            target.arch.as_str()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a pinned digest came from, strongest first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrustOrigin {
    /// Adopted from a project `abix.lock`.
    PinnedLock,
    /// Matched the vendor's published checksum list.
    OfficialChecksum,
    /// Nothing to compare against; the first download was trusted.
    TrustOnFirstUse,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IntegrityRecord {
    pub url: String,
    /// Lowercase hex sha256 of the archive.
    pub digest: String,
    pub origin: TrustOrigin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Match,
    Mismatch { expected: String },
    Unknown,
}

/// Outcome of running an archive through the trust policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub origin: TrustOrigin,
    /// True when this call wrote a new ledger entry.
    pub newly_pinned: bool,
}

#[derive(Debug)]
pub struct IntegrityLedger {
    path: PathBuf,
    records: BTreeMap<String, IntegrityRecord>,
}

impl IntegrityLedger {
    /// Load the ledger at `path`. A missing file is an empty ledger; an
    /// unparsable one is an error so that pins are never silently dropped.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = if path.exists() {
            let content = fs::read_to_string(&path)
                .io_context(|| format!("failed to read {}", path.display()))?;
            parse_records(&path, &content)?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn lookup(&self, key: &SubjectKey) -> Option<&IntegrityRecord> {
        self.records.get(key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &IntegrityRecord)> {
        self.records.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn verify(&self, key: &SubjectKey, digest: &str) -> Verdict {
        match self.lookup(key) {
            None => Verdict::Unknown,
            Some(r) if digests_equal(&r.digest, digest) => Verdict::Match,
            Some(r) => Verdict::Mismatch {
                expected: r.digest.clone(),
            },
        }
    }

    /// Pin `digest` for `key` and flush the ledger. Recording the digest a
    /// key already holds is a no-op; a different digest is refused.
    pub fn record(
        &mut self,
        key: &SubjectKey,
        url: &str,
        digest: &str,
        origin: TrustOrigin,
    ) -> Result<()> {
        match self.verify(key, digest) {
            Verdict::Match => Ok(()),
            Verdict::Mismatch { expected } => Err(AbixError::Integrity {
                subject: key.to_string(),
                expected,
                actual: digest.to_lowercase(),
            }),
            Verdict::Unknown => {
                self.records.insert(
                    key.to_string(),
                    IntegrityRecord {
                        url: url.to_string(),
                        digest: digest.to_lowercase(),
                        origin,
                        pinned_at: Some(Utc::now()),
                    },
                );
                self.persist()
            }
        }
    }

    /// Apply the three-tier trust policy to a downloaded archive digest:
    /// an existing pin must match; otherwise the official checksum (fetched
    /// lazily) must match; otherwise the digest is trusted on first use.
    pub fn admit<F>(
        &mut self,
        key: &SubjectKey,
        url: &str,
        actual: &str,
        official: F,
    ) -> Result<Admission>
    where
        F: FnOnce() -> Option<String>,
    {
        match self.verify(key, actual) {
            Verdict::Match => {
                let origin = self
                    .lookup(key)
                    .map(|r| r.origin)
                    .unwrap_or(TrustOrigin::TrustOnFirstUse);
                return Ok(Admission {
                    origin,
                    newly_pinned: false,
                });
            }
            Verdict::Mismatch { expected } => {
                return Err(self.mismatch(key, url, expected, actual));
            }
            Verdict::Unknown => {}
        }

        if let Some(expected) = official() {
            if !digests_equal(&expected, actual) {
                return Err(self.mismatch(key, url, expected.to_lowercase(), actual));
            }
            self.record(key, url, actual, TrustOrigin::OfficialChecksum)?;
            return Ok(Admission {
                origin: TrustOrigin::OfficialChecksum,
                newly_pinned: true,
            });
        }

        self.record(key, url, actual, TrustOrigin::TrustOnFirstUse)?;
        security_event(
            "runtime_tofu_pinned",
            &format!(
                "new runtime {} trusted on first use; digest pinned in {}",
                key,
                self.path.display()
            ),
            json!({ "subject": key.as_str(), "url": url, "digest": actual }),
        );
        Ok(Admission {
            origin: TrustOrigin::TrustOnFirstUse,
            newly_pinned: true,
        })
    }

    /// Insert a record verbatim (used when adopting project lock pins).
    pub(crate) fn insert_pinned(&mut self, key: &str, record: IntegrityRecord) {
        self.records.insert(key.to_string(), record);
    }

    pub(crate) fn raw_lookup(&self, key: &str) -> Option<&IntegrityRecord> {
        self.records.get(key)
    }

    fn mismatch(&self, key: &SubjectKey, url: &str, expected: String, actual: &str) -> AbixError {
        security_event(
            "runtime_integrity_mismatch",
            &format!("integrity mismatch for {} downloaded from {}", key, url),
            json!({
                "subject": key.as_str(),
                "url": url,
                "expected": expected,
                "actual": actual,
            }),
        );
        AbixError::Integrity {
            subject: key.to_string(),
            expected,
            actual: actual.to_lowercase(),
        }
    }

    /// Rewrite the whole ledger file through a temp file in the same directory.
    pub(crate) fn persist(&self) -> Result<()> {
        write_records(&self.path, &self.records)
    }
}

pub(crate) fn parse_records(path: &Path, content: &str) -> Result<BTreeMap<String, IntegrityRecord>> {
    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_str(content).map_err(|e| AbixError::Ledger {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

pub(crate) fn write_records(path: &Path, records: &BTreeMap<String, IntegrityRecord>) -> Result<()> {
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&dir).io_context(|| format!("failed to create {}", dir.display()))?;
    let content = serde_json::to_string_pretty(records).map_err(|e| AbixError::Ledger {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)
        .io_context(|| format!("failed to stage {}", path.display()))?;
    tmp.write_all(content.as_bytes())
        .io_context(|| format!("failed to write {}", path.display()))?;
    tmp.persist(path)
        .map_err(|e| AbixError::io(format!("failed to replace {}", path.display()), e.error))?;
    Ok(())
}

fn digests_equal(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use abix_core::{Arch, Platform};

    fn key() -> SubjectKey {
        SubjectKey::new(
            RuntimeKind::Node,
            "22.1.0",
            HostTarget::new(Platform::Linux, Arch::X64),
        )
    }

    #[test]
    fn test_subject_key_format() {
        assert_eq!(key().as_str(), "node-22.1.0-linux-x64");
    }

    #[test]
    fn test_record_persists_whole_file_and_reloads() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("locks").join("runtimes.lock");
        let mut ledger = IntegrityLedger::load(&path).unwrap();
        assert!(ledger.is_empty());

        ledger
            .record(&key(), "https://example/node.tar.gz", "ABCDEF", TrustOrigin::TrustOnFirstUse)
            .unwrap();
        assert!(path.exists());

        let reloaded = IntegrityLedger::load(&path).unwrap();
        let rec = reloaded.lookup(&key()).unwrap();
        assert_eq!(rec.digest, "abcdef");
        assert_eq!(rec.origin, TrustOrigin::TrustOnFirstUse);

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("TRUST_ON_FIRST_USE"));
    }

    #[test]
    fn test_verify_verdicts() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ledger = IntegrityLedger::load(tmp.path().join("l.lock")).unwrap();
        assert_eq!(ledger.verify(&key(), "aa"), Verdict::Unknown);
        ledger.record(&key(), "u", "aa", TrustOrigin::OfficialChecksum).unwrap();
        assert_eq!(ledger.verify(&key(), "AA"), Verdict::Match);
        assert_eq!(
            ledger.verify(&key(), "bb"),
            Verdict::Mismatch { expected: "aa".to_string() }
        );
    }

    #[test]
    fn test_never_repins_existing_key() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ledger = IntegrityLedger::load(tmp.path().join("l.lock")).unwrap();
        ledger.record(&key(), "u", "aa", TrustOrigin::TrustOnFirstUse).unwrap();
        let err = ledger
            .record(&key(), "u", "bb", TrustOrigin::OfficialChecksum)
            .unwrap_err();
        assert!(err.is_security());
        assert_eq!(ledger.lookup(&key()).unwrap().digest, "aa");
    }

    #[test]
    fn test_admit_tiers() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ledger = IntegrityLedger::load(tmp.path().join("l.lock")).unwrap();

        // official checksum matches -> OFFICIAL_CHECKSUM
        let adm = ledger.admit(&key(), "u", "aa", || Some("AA".to_string())).unwrap();
        assert_eq!(adm, Admission { origin: TrustOrigin::OfficialChecksum, newly_pinned: true });

        // pinned now: the feed is not consulted again
        let adm = ledger
            .admit(&key(), "u", "aa", || panic!("feed must not be fetched for a pinned key"))
            .unwrap();
        assert!(!adm.newly_pinned);
        assert_eq!(adm.origin, TrustOrigin::OfficialChecksum);

        // no pin, no feed -> TOFU
        let other = SubjectKey::new(
            RuntimeKind::Python,
            "3.12.0",
            HostTarget::new(Platform::Linux, Arch::X64),
        );
        let adm = ledger.admit(&other, "u", "cc", || None).unwrap();
        assert_eq!(adm.origin, TrustOrigin::TrustOnFirstUse);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_admit_official_mismatch_does_not_pin() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ledger = IntegrityLedger::load(tmp.path().join("l.lock")).unwrap();
        let err = ledger.admit(&key(), "u", "aa", || Some("bb".to_string())).unwrap_err();
        assert!(matches!(err, AbixError::Integrity { .. }));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_malformed_ledger_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("runtimes.lock");
        fs::write(&path, "{ definitely not json").unwrap();
        let err = IntegrityLedger::load(&path).unwrap_err();
        assert!(matches!(err, AbixError::Ledger { .. }));
    }
}
