//! Message normalization
//!
//! Turns a raw RFC 2822 payload into the handful of fields the
//! classifier looks at, with a best-effort plain-text body.

use crate::error::{Error, Result};
use mailparse::{DispositionType, MailHeaderMap, ParsedMail};
use tracing::debug;

/// The fields of one message a classification cycle works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedMessage {
    /// Transport-scoped id (an IMAP UID), not globally stable.
    pub uid: u32,
    pub sender: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub date: String,
    pub message_id: String,
}

/// Parse a raw message into a [`NormalizedMessage`].
///
/// Missing headers fall back to placeholder values. The body prefers the
/// first non-attachment `text/plain` part, then the first `text/html`
/// part converted to text.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the payload is not a parseable message.
pub fn normalize(uid: u32, raw: &[u8]) -> Result<NormalizedMessage> {
    let parsed = mailparse::parse_mail(raw).map_err(|e| Error::Parse(e.to_string()))?;

    let header = |name: &str, fallback: &str| {
        parsed
            .headers
            .get_first_value(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| fallback.to_string())
    };

    Ok(NormalizedMessage {
        uid,
        sender: header("From", "Unknown Sender"),
        recipient: header("To", "Unknown Recipient"),
        subject: header("Subject", "No Subject"),
        date: header("Date", "Unknown Date"),
        message_id: header("Message-ID", "No Message ID"),
        body: best_body(&parsed),
    })
}

fn best_body(mail: &ParsedMail<'_>) -> String {
    if mail.subparts.is_empty() {
        let body = mail.get_body().unwrap_or_default();
        let text = if mail.ctype.mimetype.eq_ignore_ascii_case("text/html") {
            html_to_text(&body)
        } else {
            body
        };
        return text.trim().to_string();
    }

    let mut plain = None;
    let mut html = None;
    collect_text_parts(mail, &mut plain, &mut html);

    plain
        .or_else(|| html.map(|h| html_to_text(&h)))
        .map(|text| text.trim().to_string())
        .unwrap_or_default()
}

/// Walk a multipart tree, keeping the first non-empty plain and HTML
/// parts and skipping attachments.
fn collect_text_parts(mail: &ParsedMail<'_>, plain: &mut Option<String>, html: &mut Option<String>) {
    for part in &mail.subparts {
        if part.get_content_disposition().disposition == DispositionType::Attachment {
            continue;
        }
        if !part.subparts.is_empty() {
            collect_text_parts(part, plain, html);
            continue;
        }

        let Ok(body) = part.get_body() else {
            continue;
        };
        if body.trim().is_empty() {
            continue;
        }
        let ctype = part.ctype.mimetype.to_ascii_lowercase();
        if ctype == "text/plain" && plain.is_none() {
            *plain = Some(body);
        } else if ctype == "text/html" && html.is_none() {
            *html = Some(body);
        }
    }
}

/// Line width handed to the renderer; wide enough that it never wraps
/// ordinary paragraphs.
const RENDER_WIDTH: usize = 10_000;

/// Reduce HTML to readable text: markup dropped, entities decoded, one
/// line per block and no blank lines.
fn html_to_text(html: &str) -> String {
    match html2text::config::plain_no_decorate().string_from_read(html.as_bytes(), RENDER_WIDTH) {
        Ok(text) => text
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        Err(e) => {
            debug!(error = %e, "HTML rendering failed, using raw markup");
            html.to_string()
        }
    }
}
