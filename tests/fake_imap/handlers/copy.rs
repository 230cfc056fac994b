//! UID COPY
//!
//! Copies get fresh UIDs in the destination and keep their flags
//! except `\Deleted`. A missing destination is answered with
//! `NO [TRYCREATE]`.

use super::{require_selected, uids_in};
use crate::fake_imap::io::complete;
use crate::fake_imap::mailbox::Mailbox;
use imap_codec::imap_types::sequence::SequenceSet;
use std::sync::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub async fn handle_uid_copy<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    sequence_set: &SequenceSet,
    destination: &str,
    mailbox: &Mutex<Mailbox>,
    selected: Option<&str>,
    stream: &mut BufReader<S>,
) {
    let Some(name) = require_selected(tag, selected, stream).await else {
        return;
    };

    let status = {
        let mut mb = mailbox.lock().unwrap();
        let copies: Option<Vec<_>> = mb.get_folder(name).map(|source| {
            let uids = uids_in(sequence_set, source.next_uid().saturating_sub(1));
            source
                .emails
                .iter()
                .filter(|e| uids.contains(&e.uid))
                .cloned()
                .collect()
        });
        match (copies, mb.get_folder_mut(destination)) {
            (None, _) => "NO Mailbox vanished",
            (Some(_), None) => "NO [TRYCREATE] Destination does not exist",
            (Some(copies), Some(dest)) => {
                for mut email in copies {
                    email.uid = dest.next_uid();
                    email.deleted = false;
                    dest.emails.push(email);
                }
                "OK COPY completed"
            }
        }
    };
    complete(stream, tag, status).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::handlers::uid_set;
    use crate::fake_imap::io::capture;
    use crate::fake_imap::mailbox::MailboxBuilder;

    fn account() -> Mutex<Mailbox> {
        Mutex::new(
            MailboxBuilder::new()
                .folder("INBOX")
                .email(12, true, b"Subject: moved\r\n\r\n")
                .folder("Low")
                .email(1, true, b"Subject: old\r\n\r\n")
                .build(),
        )
    }

    #[tokio::test]
    async fn copy_gets_next_uid_and_keeps_flags() {
        let mailbox = account();
        let (client, mut stream) = capture::stream();

        handle_uid_copy("C1", &uid_set(&[12]), "Low", &mailbox, Some("INBOX"), &mut stream).await;

        assert_eq!(capture::output(client, stream).await, "C1 OK COPY completed\r\n");
        let mb = mailbox.lock().unwrap();
        let low = mb.get_folder("Low").unwrap();
        assert_eq!(low.emails.len(), 2);
        assert_eq!(low.emails[1].uid, 2);
        assert!(low.emails[1].seen);
        assert_eq!(mb.get_folder("INBOX").unwrap().emails.len(), 1);
    }

    #[tokio::test]
    async fn missing_destination_is_trycreate() {
        let mailbox = account();
        let (client, mut stream) = capture::stream();

        handle_uid_copy("C2", &uid_set(&[12]), "Scam", &mailbox, Some("INBOX"), &mut stream).await;

        assert!(capture::output(client, stream).await.starts_with("C2 NO [TRYCREATE]"));
    }
}
