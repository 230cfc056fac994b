//! IMAP message flags touched during relocation
//!
//! Only the system flags the triage loop actually mutates are modeled.

use std::fmt;

/// An IMAP system flag.
///
/// # Examples
///
/// ```
/// use mail_triage::Flag;
///
/// assert_eq!(Flag::Seen.as_imap_str(), "\\Seen");
/// assert_eq!(Flag::Deleted.store_query(true), "+FLAGS.SILENT (\\Deleted)");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    /// Message has been read (`\Seen`). Its absence is what makes a
    /// message show up in an `UNSEEN` search.
    Seen,
    /// Message is marked for removal by the next `EXPUNGE`.
    Deleted,
}

impl Flag {
    /// The IMAP wire representation of this flag.
    #[must_use]
    pub const fn as_imap_str(self) -> &'static str {
        match self {
            Self::Seen => "\\Seen",
            Self::Deleted => "\\Deleted",
        }
    }

    /// The `UID STORE` data item that adds (`set = true`) or removes
    /// this flag without echoing the new flag list.
    #[must_use]
    pub fn store_query(self, set: bool) -> String {
        let sign = if set { '+' } else { '-' };
        format!("{sign}FLAGS.SILENT ({})", self.as_imap_str())
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_imap_str())
    }
}
