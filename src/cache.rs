//! Classification cache
//!
//! An append-only CSV file of past verdicts, keyed by a digest of the
//! message subject with the raw sender as a fallback key. Rows are never
//! rewritten; lookups scan in stored order.
//!
//! Only one process may write to a cache file at a time. No locking is
//! done here.

use crate::error::Result;
use crate::importance::ImportanceLevel;
use crate::message::NormalizedMessage;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Column order of the persisted file. Must never change.
pub const HEADER: [&str; 6] = [
    "sender",
    "importance_level",
    "email_subject",
    "email_subject_hash",
    "reasoning",
    "time_added",
];

/// Hex SHA-256 of a subject line.
///
/// ```
/// let a = mail_triage::fingerprint("Your invoice");
/// assert_eq!(a, mail_triage::fingerprint("Your invoice"));
/// assert_eq!(a.len(), 64);
/// ```
#[must_use]
pub fn fingerprint(subject: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(subject.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// One persisted row.
///
/// The level is kept as raw text so a row with an unknown value can
/// still be read; [`CacheRecord::level`] does the validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub sender: String,
    pub importance_level: String,
    pub email_subject: String,
    pub email_subject_hash: String,
    pub reasoning: String,
    pub time_added: String,
}

impl CacheRecord {
    /// The stored tier, or `None` if the value is not a known tier.
    #[must_use]
    pub fn level(&self) -> Option<ImportanceLevel> {
        self.importance_level.parse().ok()
    }
}

/// A rule that picks the cache row deciding a lookup.
type Strategy = fn(&CacheRecord, &NormalizedMessage, &str) -> bool;

/// Same subject digest.
fn by_fingerprint(record: &CacheRecord, _message: &NormalizedMessage, digest: &str) -> bool {
    record.email_subject_hash == digest
}

/// Same raw `From` header. This is a weak heuristic: a different message
/// from a sender seen before inherits that sender's first verdict.
fn by_sender(record: &CacheRecord, message: &NormalizedMessage, _digest: &str) -> bool {
    record.sender == message.sender
}

const STRATEGIES: [(&str, Strategy); 2] = [("fingerprint", by_fingerprint), ("sender", by_sender)];

/// Handle to the on-disk cache file.
#[derive(Debug, Clone)]
pub struct ClassificationCache {
    path: PathBuf,
}

impl ClassificationCache {
    /// Open the cache at `path`, creating it with a header row if it
    /// does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or its parent directory cannot be
    /// created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let needs_header = !fs::metadata(&path).is_ok_and(|meta| meta.len() > 0);
        if needs_header {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let mut writer = csv::Writer::from_writer(File::create(&path)?);
            writer.write_record(HEADER)?;
            writer.flush()?;
            debug!(path = %path.display(), "Created cache file");
        }

        Ok(Self { path })
    }

    /// Open a cache that must already exist. Nothing is created.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if `path` does not exist or
    /// is not a regular file.
    pub fn existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !fs::metadata(&path)?.is_file() {
            let err = std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file");
            return Err(err.into());
        }
        Ok(Self { path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All readable rows in stored order. Rows that cannot be decoded
    /// are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn records(&self) -> Result<Vec<CacheRecord>> {
        let mut reader = csv::Reader::from_path(&self.path)?;
        let records = reader
            .deserialize::<CacheRecord>()
            .enumerate()
            .filter_map(|(index, row)| match row {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(row = index + 1, error = %e, "Skipping unreadable cache row");
                    None
                }
            })
            .collect();
        Ok(records)
    }

    /// The cached tier for `message`, if any.
    ///
    /// The fingerprint strategy is tried over every row before the
    /// sender strategy. The first row a strategy matches decides the
    /// lookup; if that row carries an unknown level the result is
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn exists(&self, message: &NormalizedMessage) -> Result<Option<ImportanceLevel>> {
        let records = self.records()?;
        let digest = fingerprint(&message.subject);

        for (name, strategy) in STRATEGIES {
            if let Some(record) = records.iter().find(|r| strategy(r, message, &digest)) {
                let level = record.level();
                if level.is_none() {
                    warn!(
                        strategy = name,
                        value = %record.importance_level,
                        "Cached row has an unknown importance level"
                    );
                }
                debug!(strategy = name, uid = message.uid, ?level, "Cache hit");
                return Ok(level);
            }
        }

        Ok(None)
    }

    /// Append a record for `message`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or written.
    pub fn add_record(
        &self,
        message: &NormalizedMessage,
        level: ImportanceLevel,
        rationale: &str,
    ) -> Result<()> {
        let record = CacheRecord {
            sender: message.sender.clone(),
            importance_level: level.as_str().to_string(),
            email_subject: message.subject.clone(),
            email_subject_hash: fingerprint(&message.subject),
            reasoning: rationale.to_string(),
            time_added: chrono::Local::now().to_rfc3339(),
        };

        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.serialize(&record)?;
        writer.flush()?;

        debug!(uid = message.uid, level = %level, "Cached verdict");
        Ok(())
    }
}
