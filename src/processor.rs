//! Per-mailbox processing loop
//!
//! One call to [`MailboxProcessor::process`] scans a mailbox's unseen
//! messages: fetch, consult the cache, ask the oracle on a miss, record
//! the verdict and file the message into its destination folder.
//!
//! Progress lives on the server. A message that has been filed is no
//! longer unseen, so a pass that fails halfway is simply thrown away:
//! the transport reconnects and the next pass re-lists what is left.

use crate::cache::ClassificationCache;
use crate::error::{Error, Result};
use crate::flag::Flag;
use crate::folder::FolderMap;
use crate::importance::ImportanceLevel;
use crate::message::{self, NormalizedMessage};
use crate::oracle::Oracle;
use crate::prompt::{ImportancePrompt, Prompt, ScamPrompt};
use crate::transport::MailTransport;
use crate::verdict::Verdict;
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// Outcome of processing one mailbox. Counters accumulate over all
/// passes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MailboxReport {
    pub mailbox: String,
    /// Passes started, including the successful one.
    pub passes: u32,
    /// Whether a pass ran to the end without a fetch failure.
    pub completed: bool,
    /// Messages classified by the oracle.
    pub classified: usize,
    /// Messages decided from the cache.
    pub cache_hits: usize,
    /// Oracle answers that justified no decision; left unseen in place.
    pub inconclusive: usize,
    pub relocated: usize,
    /// Relocations that failed; the message was forced back to unread.
    pub relocation_failures: usize,
}

impl MailboxReport {
    fn new(mailbox: &str) -> Self {
        Self {
            mailbox: mailbox.to_string(),
            ..Self::default()
        }
    }
}

/// Drives the fetch, classify and relocate cycle for one mailbox at a
/// time over a borrowed transport.
pub struct MailboxProcessor<'a, T, O> {
    transport: &'a mut T,
    oracle: &'a O,
    folders: &'a FolderMap,
    cache: Option<&'a ClassificationCache>,
    max_retries: u32,
    scam_detection: bool,
    copy_as_read: bool,
}

impl<'a, T: MailTransport, O: Oracle> MailboxProcessor<'a, T, O> {
    pub const DEFAULT_MAX_RETRIES: u32 = 2;

    #[must_use]
    pub const fn new(transport: &'a mut T, oracle: &'a O, folders: &'a FolderMap) -> Self {
        Self {
            transport,
            oracle,
            folders,
            cache: None,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            scam_detection: false,
            copy_as_read: false,
        }
    }

    /// Consult and extend `cache`. Without one every message goes to
    /// the oracle and nothing is recorded.
    #[must_use]
    pub const fn with_cache(mut self, cache: Option<&'a ClassificationCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Extra passes allowed after a failed one.
    #[must_use]
    pub const fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Screen cache misses for scams before scoring importance.
    #[must_use]
    pub const fn scam_detection(mut self, enabled: bool) -> Self {
        self.scam_detection = enabled;
        self
    }

    /// File messages as read instead of unread.
    #[must_use]
    pub const fn copy_as_read(mut self, enabled: bool) -> Self {
        self.copy_as_read = enabled;
        self
    }

    /// Process every unseen message in `mailbox`.
    ///
    /// Never fails: pass failures are retried up to `max_retries` times
    /// and exhaustion is logged and reflected in the report.
    pub async fn process(&mut self, mailbox: &str) -> MailboxReport {
        let mut report = MailboxReport::new(mailbox);
        let total_passes = self.max_retries.saturating_add(1);

        for pass in 1..=total_passes {
            report.passes = pass;
            match self.run_pass(mailbox, &mut report).await {
                Ok(()) => {
                    report.completed = true;
                    info!(mailbox, pass, "Mailbox processed");
                    return report;
                }
                Err(e) => {
                    warn!(mailbox, pass, error = %e, "Mailbox pass failed");
                    if pass < total_passes
                        && let Err(e) = self.transport.reconnect().await
                    {
                        warn!(mailbox, error = %e, "Reconnect failed");
                    }
                }
            }
        }

        error!(mailbox, passes = total_passes, "Giving up on mailbox after repeated failures");
        report
    }

    async fn run_pass(&mut self, mailbox: &str, report: &mut MailboxReport) -> Result<()> {
        let uids = self.transport.list_unseen(mailbox).await?;

        for uid in uids {
            let message = self.fetch(uid).await?;
            self.handle(mailbox, &message, report).await;
        }
        Ok(())
    }

    async fn fetch(&mut self, uid: u32) -> Result<NormalizedMessage> {
        let raw = self
            .transport
            .fetch(uid)
            .await?
            .ok_or_else(|| Error::Imap(format!("No body found for UID {uid}")))?;
        message::normalize(uid, &raw)
    }

    async fn handle(&mut self, mailbox: &str, message: &NormalizedMessage, report: &mut MailboxReport) {
        let uid = message.uid;
        let subject = message.subject.as_str();

        if let Some(level) = self.cached_level(message) {
            report.cache_hits += 1;
            info!(mailbox, uid, subject, %level, "Already classified");
            self.file(mailbox, uid, level, report).await;
            return;
        }

        let verdict = self.classify(message).await;
        let Some(level) = verdict.decide() else {
            report.inconclusive += 1;
            info!(
                mailbox,
                uid,
                subject,
                importance = verdict.importance_score,
                confidence = verdict.confidence_score,
                rationale = %verdict.rationale,
                "Inconclusive verdict, leaving message in place"
            );
            return;
        };

        report.classified += 1;
        info!(mailbox, uid, subject, %level, rationale = %verdict.rationale, "Classified");

        if let Some(cache) = self.cache
            && let Err(e) = cache.add_record(message, level, &verdict.rationale)
        {
            warn!(mailbox, uid, subject, error = %e, "Failed to record verdict in cache");
        }

        self.file(mailbox, uid, level, report).await;
    }

    fn cached_level(&self, message: &NormalizedMessage) -> Option<ImportanceLevel> {
        let cache = self.cache?;
        cache.exists(message).unwrap_or_else(|e| {
            warn!(uid = message.uid, error = %e, "Cache lookup failed, treating as miss");
            None
        })
    }

    async fn classify(&self, message: &NormalizedMessage) -> Verdict {
        if self.scam_detection {
            let screen = self.ask(&ScamPrompt::new(message)).await;
            if screen.decide() == Some(ImportanceLevel::Scam) {
                return screen;
            }
            debug!(uid = message.uid, rationale = %screen.rationale, "Scam screen passed");
        }
        self.ask(&ImportancePrompt::new(message)).await
    }

    /// Oracle failures count as "no signal".
    async fn ask(&self, prompt: &impl Prompt) -> Verdict {
        match self.oracle.generate(&prompt.render()).await {
            Ok(raw) => prompt.interpret(&raw),
            Err(e) => {
                warn!(error = %e, "Oracle call failed");
                Verdict::sentinel()
            }
        }
    }

    async fn file(&mut self, mailbox: &str, uid: u32, level: ImportanceLevel, report: &mut MailboxReport) {
        match self.relocate(uid, level).await {
            Ok(folder) => {
                report.relocated += 1;
                info!(mailbox, uid, folder, "Moved message");
            }
            Err(e) => {
                report.relocation_failures += 1;
                warn!(mailbox, uid, %level, error = %e, "Relocation failed, marking message unread");
                if let Err(e) = self.transport.clear_flag(uid, Flag::Seen).await {
                    warn!(mailbox, uid, error = %e, "Failed to mark message unread");
                }
            }
        }
    }

    /// Copy then delete. The original is only flagged deleted after the
    /// copy succeeded.
    async fn relocate(&mut self, uid: u32, level: ImportanceLevel) -> Result<&'a str> {
        let folders = self.folders;
        let folder = folders.destination(level).ok_or_else(|| {
            Error::Config(format!("No destination folder configured for {level}"))
        })?;

        if self.copy_as_read {
            self.transport.set_flag(uid, Flag::Seen).await?;
            self.transport.copy(uid, folder).await?;
        } else {
            self.transport.clear_flag(uid, Flag::Seen).await?;
            self.transport.copy(uid, folder).await?;
            self.transport.set_flag(uid, Flag::Seen).await?;
        }
        self.transport.set_flag(uid, Flag::Deleted).await?;
        self.transport.expunge().await?;
        Ok(folder)
    }
}
