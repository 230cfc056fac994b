//! LOGIN and LOGOUT
//!
//! Any credentials are accepted; each login is counted so tests can
//! tell how many sessions the client opened.

use crate::fake_imap::io::{complete, write_line};
use crate::fake_imap::mailbox::Mailbox;
use std::sync::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Returns `false` once the client is gone.
pub async fn handle_login<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    mailbox: &Mutex<Mailbox>,
    stream: &mut BufReader<S>,
) -> bool {
    mailbox.lock().unwrap().logins += 1;
    write_line(stream, &format!("{tag} OK LOGIN completed\r\n"))
        .await
        .is_ok()
}

pub async fn handle_logout<S: AsyncRead + AsyncWrite + Unpin>(tag: &str, stream: &mut BufReader<S>) {
    let _ = write_line(stream, "* BYE Logging out\r\n").await;
    complete(stream, tag, "OK LOGOUT completed").await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::io::capture;

    #[tokio::test]
    async fn login_is_counted() {
        let mailbox = Mutex::new(Mailbox::default());
        let (client, mut stream) = capture::stream();

        assert!(handle_login("A1", &mailbox, &mut stream).await);
        assert_eq!(capture::output(client, stream).await, "A1 OK LOGIN completed\r\n");
        assert_eq!(mailbox.lock().unwrap().logins, 1);
    }

    #[tokio::test]
    async fn logout_says_bye_first() {
        let (client, mut stream) = capture::stream();
        handle_logout("A9", &mut stream).await;
        assert_eq!(
            capture::output(client, stream).await,
            "* BYE Logging out\r\nA9 OK LOGOUT completed\r\n"
        );
    }
}
