//! Destination folders and mailbox selection
//!
//! [`FolderMap`] ties each [`ImportanceLevel`] to the folder messages of
//! that tier are filed into. [`MailboxFilter`] decides which remote
//! mailboxes are scanned at all; destination folders are always
//! skipped so filed mail is never re-triaged.

use crate::error::{Error, Result};
use crate::importance::ImportanceLevel;

/// Static mapping from importance tier to destination folder.
///
/// The three importance folders are mandatory. The scam folder is
/// optional; relocating a scam without one fails and leaves the message
/// unread in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderMap {
    most_important: String,
    medium_important: String,
    least_important: String,
    scam: Option<String>,
}

impl FolderMap {
    /// Build the mapping.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if any of the three importance folders
    /// is empty.
    pub fn new(most: &str, medium: &str, least: &str, scam: Option<&str>) -> Result<Self> {
        let non_empty = |level: ImportanceLevel, name: &str| {
            let name = name.trim();
            if name.is_empty() {
                Err(Error::Config(format!("No destination folder configured for {level}")))
            } else {
                Ok(name.to_string())
            }
        };

        Ok(Self {
            most_important: non_empty(ImportanceLevel::MostImportant, most)?,
            medium_important: non_empty(ImportanceLevel::MediumImportant, medium)?,
            least_important: non_empty(ImportanceLevel::LeastImportant, least)?,
            scam: scam
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string),
        })
    }

    /// The folder a message of `level` is filed into, if configured.
    #[must_use]
    pub fn destination(&self, level: ImportanceLevel) -> Option<&str> {
        match level {
            ImportanceLevel::MostImportant => Some(&self.most_important),
            ImportanceLevel::MediumImportant => Some(&self.medium_important),
            ImportanceLevel::LeastImportant => Some(&self.least_important),
            ImportanceLevel::Scam => self.scam.as_deref(),
        }
    }

    /// All configured destination folders.
    pub fn destinations(&self) -> impl Iterator<Item = &str> {
        ImportanceLevel::ALL
            .into_iter()
            .filter_map(|level| self.destination(level))
    }
}

/// Allow/deny policy applied to remote mailbox names.
#[derive(Debug, Clone, Default)]
pub struct MailboxFilter {
    excluded: Vec<String>,
    included: Vec<String>,
}

impl MailboxFilter {
    /// Build a filter that always excludes the destination folders.
    #[must_use]
    pub fn new(folders: &FolderMap, excluded: &[String], included: &[String]) -> Self {
        let mut all_excluded: Vec<String> =
            folders.destinations().map(ToString::to_string).collect();
        all_excluded.extend(excluded.iter().cloned());
        Self {
            excluded: all_excluded,
            included: included.to_vec(),
        }
    }

    /// Whether `mailbox` should be scanned.
    ///
    /// `INBOX` is compared case-insensitively (RFC 3501); every other
    /// name is compared exactly.
    #[must_use]
    pub fn allows(&self, mailbox: &str) -> bool {
        if self.excluded.iter().any(|name| same_mailbox(name, mailbox)) {
            return false;
        }
        self.included.is_empty() || self.included.iter().any(|name| same_mailbox(name, mailbox))
    }
}

fn same_mailbox(a: &str, b: &str) -> bool {
    if a.eq_ignore_ascii_case("inbox") {
        b.eq_ignore_ascii_case("inbox")
    } else {
        a == b
    }
}
