//! Importance triage for IMAP mailboxes
//!
//! Scans unseen mail, asks a local language model (via
//! [Ollama](https://ollama.com)) how important each message is, and
//! files it into one of three importance folders, or a scam folder.
//! Verdicts are remembered in a CSV cache so recurring mail is filed
//! without consulting the model again.
//!
//! The entry point is [`Triage::process_emails`]; the per-mailbox loop
//! is [`MailboxProcessor`]. Both are generic over the [`MailTransport`]
//! and [`Oracle`] seams, with [`ImapTransport`] and [`OllamaOracle`] as
//! the production implementations.

mod cache;
mod config;
mod connection;
mod error;
mod flag;
mod folder;
mod importance;
mod message;
mod oracle;
mod processor;
mod prompt;
mod transport;
mod triage;
mod verdict;

pub use cache::{CacheRecord, ClassificationCache, fingerprint};
pub use config::{ImapConfig, OracleConfig, Security, TriageConfig};
pub use error::{Error, Result};
pub use flag::Flag;
pub use folder::{FolderMap, MailboxFilter};
pub use importance::{ImportanceLevel, SCAM_SCORE, UnknownLevel};
pub use message::{NormalizedMessage, normalize};
pub use oracle::{OllamaOracle, Oracle};
pub use processor::{MailboxProcessor, MailboxReport};
pub use prompt::{ImportancePrompt, Prompt, ScamPrompt};
pub use transport::{ImapTransport, MailTransport};
pub use triage::{Triage, TriageSummary};
pub use verdict::{Verdict, extract};
