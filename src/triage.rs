//! Triage run over a whole account
//!
//! [`Triage`] lists the account's mailboxes, skips excluded ones and
//! hands each of the rest to a [`MailboxProcessor`], one at a time over
//! a single transport session.

use crate::cache::ClassificationCache;
use crate::config::TriageConfig;
use crate::error::{Error, Result};
use crate::folder::MailboxFilter;
use crate::oracle::Oracle;
use crate::processor::{MailboxProcessor, MailboxReport};
use crate::transport::MailTransport;
use serde::Serialize;
use tracing::{info, warn};

/// Result of one [`Triage::process_emails`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TriageSummary {
    /// Reports of processed mailboxes, in server listing order.
    pub mailboxes: Vec<MailboxReport>,
    /// Mailboxes skipped by the filter.
    pub skipped: Vec<String>,
}

impl TriageSummary {
    #[must_use]
    pub fn relocated(&self) -> usize {
        self.mailboxes.iter().map(|r| r.relocated).sum()
    }

    /// Mailboxes that ran out of retries.
    pub fn incomplete(&self) -> impl Iterator<Item = &str> {
        self.mailboxes
            .iter()
            .filter(|r| !r.completed)
            .map(|r| r.mailbox.as_str())
    }
}

pub struct Triage<T, O> {
    transport: T,
    oracle: O,
    config: TriageConfig,
    filter: MailboxFilter,
    cache: Option<ClassificationCache>,
}

impl<T: MailTransport, O: Oracle> Triage<T, O> {
    /// Set up a triage run, opening the cache when enabled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if caching is enabled without a cache
    /// path, or an I/O error if the cache file cannot be created.
    pub fn new(transport: T, oracle: O, config: TriageConfig) -> Result<Self> {
        let cache = if config.cache_enabled {
            let path = config
                .cache_file
                .as_ref()
                .ok_or_else(|| Error::Config("Cache enabled but no cache file configured".into()))?;
            Some(ClassificationCache::open(path)?)
        } else {
            None
        };
        let filter = MailboxFilter::new(
            &config.folders,
            &config.excluded_mailboxes,
            &config.included_mailboxes,
        );

        Ok(Self {
            transport,
            oracle,
            config,
            filter,
            cache,
        })
    }

    #[must_use]
    pub const fn filter(&self) -> &MailboxFilter {
        &self.filter
    }

    #[must_use]
    pub const fn cache(&self) -> Option<&ClassificationCache> {
        self.cache.as_ref()
    }

    pub const fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Process every allowed mailbox, then log out.
    ///
    /// Per-mailbox failures end up in the summary. The session is
    /// logged out even when listing fails.
    ///
    /// # Errors
    ///
    /// Returns an error only if the mailbox list cannot be retrieved.
    pub async fn process_emails(&mut self) -> Result<TriageSummary> {
        let mailboxes = match self.transport.list_mailboxes().await {
            Ok(names) => names,
            Err(e) => {
                self.logout().await;
                return Err(e);
            }
        };

        let mut summary = TriageSummary::default();
        for mailbox in mailboxes {
            if !self.filter.allows(&mailbox) {
                info!(mailbox = %mailbox, "Skipping excluded mailbox");
                summary.skipped.push(mailbox);
                continue;
            }

            let report = MailboxProcessor::new(&mut self.transport, &self.oracle, &self.config.folders)
                .with_cache(self.cache.as_ref())
                .max_retries(self.config.max_retries)
                .scam_detection(self.config.scam_detection)
                .copy_as_read(self.config.copy_as_read)
                .process(&mailbox)
                .await;
            summary.mailboxes.push(report);
        }

        self.logout().await;
        info!(
            mailboxes = summary.mailboxes.len(),
            relocated = summary.relocated(),
            "Triage finished"
        );
        Ok(summary)
    }

    async fn logout(&mut self) {
        if let Err(e) = self.transport.logout().await {
            warn!(error = %e, "Logout failed");
        }
    }
}
