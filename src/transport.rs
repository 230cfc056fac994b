//! Mail transport
//!
//! [`MailTransport`] is the set of mailbox primitives the processing
//! loop needs. Ids are UIDs of the currently selected mailbox.
//! [`ImapTransport`] implements it over a single long-lived IMAP session
//! that is opened on first use and replaced by [`MailTransport::reconnect`].

use crate::config::ImapConfig;
use crate::connection::{self, ImapSession};
use crate::error::{Error, Result};
use crate::flag::Flag;
use async_imap::types::Fetch;
use async_trait::async_trait;
use futures::TryStreamExt;
use tracing::{debug, info, warn};

#[async_trait]
pub trait MailTransport: Send {
    /// Names of every mailbox on the account.
    async fn list_mailboxes(&mut self) -> Result<Vec<String>>;

    /// Select `mailbox` and return its unseen UIDs in ascending order.
    async fn list_unseen(&mut self, mailbox: &str) -> Result<Vec<u32>>;

    /// Raw RFC 2822 bytes of `uid`, or `None` if the server returned no
    /// body for it. Must not mark the message read.
    async fn fetch(&mut self, uid: u32) -> Result<Option<Vec<u8>>>;

    async fn set_flag(&mut self, uid: u32, flag: Flag) -> Result<()>;

    async fn clear_flag(&mut self, uid: u32, flag: Flag) -> Result<()>;

    /// Copy `uid` into `folder`, keeping the original.
    async fn copy(&mut self, uid: u32, folder: &str) -> Result<()>;

    /// Permanently remove messages flagged `\Deleted` in the selected
    /// mailbox.
    async fn expunge(&mut self) -> Result<()>;

    /// Drop the current session and open a new one.
    async fn reconnect(&mut self) -> Result<()>;

    async fn logout(&mut self) -> Result<()>;
}

/// [`MailTransport`] over IMAP
pub struct ImapTransport {
    config: ImapConfig,
    session: Option<ImapSession>,
}

impl ImapTransport {
    /// Create a transport. No connection is made until the first call.
    #[must_use]
    pub const fn new(config: ImapConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    async fn session(&mut self) -> Result<&mut ImapSession> {
        if self.session.is_none() {
            self.session = Some(connection::connect(&self.config).await?);
        }
        self.session
            .as_mut()
            .ok_or_else(|| Error::Imap("No IMAP session".into()))
    }

    async fn store(&mut self, uid: u32, flag: Flag, set: bool) -> Result<()> {
        let query = flag.store_query(set);
        let session = self.session().await?;
        let updates = session
            .uid_store(uid.to_string(), &query)
            .await
            .map_err(|e| Error::Imap(format!("Store {query} on UID {uid} failed: {e}")))?;
        let _: Vec<Fetch> = updates
            .try_collect()
            .await
            .map_err(|e| Error::Imap(format!("Store {query} on UID {uid} failed: {e}")))?;
        debug!(uid, %flag, set, "Updated flag");
        Ok(())
    }
}

#[async_trait]
impl MailTransport for ImapTransport {
    async fn list_mailboxes(&mut self) -> Result<Vec<String>> {
        let session = self.session().await?;
        let names = session
            .list(Some(""), Some("*"))
            .await
            .map_err(|e| Error::Imap(format!("List folders failed: {e}")))?;
        let names: Vec<_> = names
            .try_collect()
            .await
            .map_err(|e| Error::Imap(format!("List folders failed: {e}")))?;
        Ok(names.iter().map(|n| n.name().to_string()).collect())
    }

    async fn list_unseen(&mut self, mailbox: &str) -> Result<Vec<u32>> {
        let session = self.session().await?;
        connection::select(session, mailbox).await?;

        let uids = session
            .uid_search("UNSEEN")
            .await
            .map_err(|e| Error::Imap(format!("Search failed: {e}")))?;

        let mut uid_list: Vec<u32> = uids.into_iter().collect();
        uid_list.sort_unstable();
        info!(mailbox, count = uid_list.len(), "Found unseen messages");
        Ok(uid_list)
    }

    async fn fetch(&mut self, uid: u32) -> Result<Option<Vec<u8>>> {
        let session = self.session().await?;
        let messages = session
            .uid_fetch(uid.to_string(), "(BODY.PEEK[])")
            .await
            .map_err(|e| Error::Imap(format!("Fetch failed: {e}")))?;
        let messages: Vec<Fetch> = messages
            .try_collect()
            .await
            .map_err(|e| Error::Imap(format!("Fetch error: {e}")))?;

        Ok(messages
            .iter()
            .find_map(|msg| msg.body().map(<[u8]>::to_vec)))
    }

    async fn set_flag(&mut self, uid: u32, flag: Flag) -> Result<()> {
        self.store(uid, flag, true).await
    }

    async fn clear_flag(&mut self, uid: u32, flag: Flag) -> Result<()> {
        self.store(uid, flag, false).await
    }

    async fn copy(&mut self, uid: u32, folder: &str) -> Result<()> {
        let session = self.session().await?;
        session
            .uid_copy(uid.to_string(), folder)
            .await
            .map_err(|e| Error::Imap(format!("Copy of UID {uid} to {folder} failed: {e}")))
    }

    async fn expunge(&mut self) -> Result<()> {
        let session = self.session().await?;
        let removed = session
            .expunge()
            .await
            .map_err(|e| Error::Imap(format!("Expunge failed: {e}")))?;
        let removed: Vec<u32> = removed
            .try_collect()
            .await
            .map_err(|e| Error::Imap(format!("Expunge failed: {e}")))?;
        debug!(count = removed.len(), "Expunged messages");
        Ok(())
    }

    async fn reconnect(&mut self) -> Result<()> {
        if let Some(mut old) = self.session.take()
            && let Err(e) = old.logout().await
        {
            debug!(error = %e, "Logout of stale session failed");
        }
        self.session = Some(connection::connect(&self.config).await?);
        info!("Reconnected to IMAP server");
        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };
        match session.logout().await {
            Ok(()) => {
                info!("Disconnected from IMAP server");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Logout failed");
                Err(Error::Imap(format!("Logout failed: {e}")))
            }
        }
    }
}
