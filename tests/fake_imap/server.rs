//! In-process IMAP server
//!
//! Listens on an ephemeral localhost port with a self-signed `rcgen`
//! certificate. Depending on [`TlsMode`] the greeting is sent in clear
//! and the client must upgrade with STARTTLS, or TLS starts right after
//! the TCP handshake. Commands are parsed with `imap-codec`.

use super::handlers::{
    StoreArgs, handle_expunge, handle_list, handle_login, handle_logout, handle_select,
    handle_uid_copy, handle_uid_fetch, handle_uid_search, handle_uid_store,
};
use super::io::{complete, write_line};
use super::mailbox::Mailbox;
use imap_codec::CommandCodec;
use imap_codec::decode::Decoder;
use imap_codec::imap_types::command::CommandBody;
use imap_codec::imap_types::mailbox::Mailbox as ImapMailbox;
use rcgen::generate_simple_self_signed;
use rustls::pki_types::PrivatePkcs8KeyDer;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;

const GREETING: &str = "* OK IMAP4rev1 Fake server ready\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    StartTls,
    Implicit,
}

pub struct FakeImapServer {
    port: u16,
    mailbox: Arc<Mutex<Mailbox>>,
    _handle: tokio::task::JoinHandle<()>,
}

impl FakeImapServer {
    /// Serve `mailbox` with STARTTLS until the server is dropped.
    pub async fn start(mailbox: Mailbox) -> Self {
        Self::start_with(mailbox, TlsMode::StartTls).await
    }

    pub async fn start_with(mailbox: Mailbox, mode: TlsMode) -> Self {
        // Several tests race to install the provider; losing is fine.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to ephemeral port");
        let port = listener.local_addr().unwrap().port();

        let cert = generate_simple_self_signed(vec!["127.0.0.1".to_string()])
            .expect("generate self-signed cert");
        let key = PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());
        let tls_config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![cert.cert.der().clone()], key.into())
            .expect("build server TLS config");
        let acceptor = TlsAcceptor::from(Arc::new(tls_config));

        let mailbox = Arc::new(Mutex::new(mailbox));
        let shared = Arc::clone(&mailbox);
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let acceptor = acceptor.clone();
                let mailbox = Arc::clone(&shared);
                tokio::spawn(async move {
                    handle_connection(stream, acceptor, mode, &mailbox).await;
                });
            }
        });

        Self {
            port,
            mailbox,
            _handle: handle,
        }
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Current account state, including changes made by clients.
    pub fn snapshot(&self) -> Mailbox {
        self.mailbox.lock().unwrap().clone()
    }
}

async fn handle_connection(
    stream: TcpStream,
    acceptor: TlsAcceptor,
    mode: TlsMode,
    mailbox: &Mutex<Mailbox>,
) {
    let tcp = match mode {
        TlsMode::Implicit => stream,
        TlsMode::StartTls => match negotiate_starttls(stream).await {
            Some(tcp) => tcp,
            None => return,
        },
    };

    let Ok(tls) = acceptor.accept(tcp).await else {
        return;
    };
    let mut reader = BufReader::new(tls);
    if mode == TlsMode::Implicit && write_line(&mut reader, GREETING).await.is_err() {
        return;
    }
    serve(reader, mailbox).await;
}

/// Greet in clear and wait for STARTTLS. Returns the raw stream once
/// the client has been told to start the handshake.
async fn negotiate_starttls(stream: TcpStream) -> Option<TcpStream> {
    let mut reader = BufReader::new(stream);
    write_line(&mut reader, GREETING).await.ok()?;

    let mut line = String::new();
    reader.read_line(&mut line).await.ok()?;
    let (tag, command) = line.trim().split_once(' ')?;
    if !command.eq_ignore_ascii_case("STARTTLS") {
        complete(&mut reader, tag, "BAD Expected STARTTLS").await;
        return None;
    }
    complete(&mut reader, tag, "OK Begin TLS negotiation now").await;
    Some(reader.into_inner())
}

fn folder_name(mailbox: &ImapMailbox<'_>) -> String {
    match mailbox {
        ImapMailbox::Inbox => "INBOX".to_string(),
        ImapMailbox::Other(other) => {
            let bytes: &[u8] = other.as_ref();
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Command loop of an encrypted session.
async fn serve<S: AsyncRead + AsyncWrite + Unpin>(mut reader: BufReader<S>, mailbox: &Mutex<Mailbox>) {
    let codec = CommandCodec::default();
    let mut selected: Option<String> = None;

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        if line.trim().is_empty() {
            continue;
        }

        let Ok((_, command)) = codec.decode(line.as_bytes()) else {
            let tag = line.split_whitespace().next().unwrap_or("*").to_string();
            complete(&mut reader, &tag, "BAD Parse error").await;
            continue;
        };
        let tag = command.tag.inner();
        let current = selected.as_deref();

        match command.body {
            CommandBody::Login { .. } => {
                if !handle_login(tag, mailbox, &mut reader).await {
                    break;
                }
            }
            CommandBody::List { .. } => {
                let snap = mailbox.lock().unwrap().clone();
                handle_list(tag, &snap, &mut reader).await;
            }
            CommandBody::Select { mailbox: ref mb, .. } => {
                let snap = mailbox.lock().unwrap().clone();
                selected = handle_select(tag, &folder_name(mb), &snap, &mut reader).await;
            }
            CommandBody::Search {
                ref criteria,
                uid: true,
                ..
            } => {
                let snap = mailbox.lock().unwrap().clone();
                handle_uid_search(tag, criteria.as_ref(), &snap, current, &mut reader).await;
            }
            CommandBody::Fetch {
                ref sequence_set,
                uid: true,
                ..
            } => {
                handle_uid_fetch(tag, sequence_set, mailbox, current, &mut reader).await;
            }
            CommandBody::Store {
                ref sequence_set,
                ref kind,
                ref response,
                ref flags,
                uid: true,
                ..
            } => {
                let args = StoreArgs {
                    sequence_set,
                    kind,
                    response,
                    flags,
                };
                handle_uid_store(tag, &args, mailbox, current, &mut reader).await;
            }
            CommandBody::Copy {
                ref sequence_set,
                mailbox: ref dest,
                uid: true,
                ..
            } => {
                handle_uid_copy(tag, sequence_set, &folder_name(dest), mailbox, current, &mut reader)
                    .await;
            }
            CommandBody::Expunge => {
                handle_expunge(tag, mailbox, current, &mut reader).await;
            }
            CommandBody::Logout => {
                handle_logout(tag, &mut reader).await;
                break;
            }
            _ => complete(&mut reader, tag, "BAD Unsupported command").await,
        }
    }
}
