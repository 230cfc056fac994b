//! UID FETCH
//!
//! Every fetch is answered with the whole message as `BODY[]`, sent as
//! a counted literal:
//!
//! ```text
//! * 1 FETCH (UID 42 BODY[] {1234}
//! <1234 raw bytes>
//! )
//! ```
//!
//! Flags are left alone, like `BODY.PEEK[]`. While the account has
//! `failing_fetches` left, the command completes OK without any FETCH
//! data.

use super::{require_selected, uids_in};
use crate::fake_imap::io::{complete, write_bytes, write_line};
use crate::fake_imap::mailbox::Mailbox;
use imap_codec::imap_types::sequence::SequenceSet;
use std::sync::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub async fn handle_uid_fetch<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    sequence_set: &SequenceSet,
    mailbox: &Mutex<Mailbox>,
    selected: Option<&str>,
    stream: &mut BufReader<S>,
) {
    let Some(name) = require_selected(tag, selected, stream).await else {
        return;
    };

    let folder = {
        let mut mb = mailbox.lock().unwrap();
        if mb.failing_fetches > 0 {
            mb.failing_fetches -= 1;
            None
        } else {
            mb.get_folder(name).cloned()
        }
    };
    let Some(folder) = folder else {
        complete(stream, tag, "OK FETCH completed").await;
        return;
    };

    let max_uid = folder.next_uid().saturating_sub(1);
    for uid in uids_in(sequence_set, max_uid) {
        let Some(seq) = folder.emails.iter().position(|e| e.uid == uid) else {
            continue;
        };
        let raw = &folder.emails[seq].raw;
        let header = format!("* {} FETCH (UID {uid} BODY[] {{{}}}\r\n", seq + 1, raw.len());
        if write_line(stream, &header).await.is_err()
            || write_bytes(stream, raw).await.is_err()
            || write_line(stream, ")\r\n").await.is_err()
        {
            return;
        }
    }
    complete(stream, tag, "OK FETCH completed").await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::handlers::uid_set;
    use crate::fake_imap::io::capture;
    use crate::fake_imap::mailbox::MailboxBuilder;

    const RAW: &[u8] = b"From: a@example.com\r\nSubject: Hi\r\n\r\nBody";

    #[tokio::test]
    async fn body_is_a_counted_literal() {
        let mailbox = Mutex::new(MailboxBuilder::new().folder("INBOX").email(7, false, RAW).build());
        let (client, mut stream) = capture::stream();

        handle_uid_fetch("A5", &uid_set(&[7]), &mailbox, Some("INBOX"), &mut stream).await;
        let out = capture::output(client, stream).await;

        assert!(out.starts_with(&format!("* 1 FETCH (UID 7 BODY[] {{{}}}\r\n", RAW.len())));
        assert!(out.contains("Subject: Hi"));
        assert!(out.ends_with(")\r\nA5 OK FETCH completed\r\n"));
        assert!(!mailbox.lock().unwrap().folders[0].emails[0].seen);
    }

    #[tokio::test]
    async fn injected_failure_returns_nothing_once() {
        let mailbox = Mutex::new(
            MailboxBuilder::new()
                .folder("INBOX")
                .email(1, false, RAW)
                .failing_fetches(1)
                .build(),
        );

        let (client, mut stream) = capture::stream();
        handle_uid_fetch("A1", &uid_set(&[1]), &mailbox, Some("INBOX"), &mut stream).await;
        assert_eq!(capture::output(client, stream).await, "A1 OK FETCH completed\r\n");

        let (client, mut stream) = capture::stream();
        handle_uid_fetch("A2", &uid_set(&[1]), &mailbox, Some("INBOX"), &mut stream).await;
        assert!(capture::output(client, stream).await.contains("BODY[]"));
    }

    #[tokio::test]
    async fn requires_selection() {
        let mailbox = Mutex::new(Mailbox::default());
        let (client, mut stream) = capture::stream();
        handle_uid_fetch("A1", &uid_set(&[1]), &mailbox, None, &mut stream).await;
        assert_eq!(
            capture::output(client, stream).await,
            "A1 BAD No mailbox selected\r\n"
        );
    }
}
