//! Raw IMAP over TLS. Blocking; callers run these in `spawn_blocking`.
//!
//! Uses UID-based SEARCH/FETCH/STORE so message ids stay valid across
//! sessions: `mark_seen` opens a fresh connection, possibly minutes after
//! the fetch that produced the id.

use std::io::Write as IoWrite;
use std::net::TcpStream;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mail_parser::MessageParser;
use tracing::debug;

use crate::config::MailConfig;
use crate::error::MailboxError;
use crate::mailbox::RawMessage;

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// Fetch unseen messages addressed to the alias. Does NOT set `\Seen`.
pub fn fetch_unseen(config: &MailConfig) -> Result<Vec<RawMessage>, MailboxError> {
    let mut session = ImapSession::connect(config)?;
    session.login(config)?;
    session.select_inbox()?;

    let uids = session.search_unseen_to(&config.alias)?;
    debug!(count = uids.len(), "IMAP search returned unseen messages");

    let mut results = Vec::with_capacity(uids.len());
    for uid in uids {
        match session.fetch_message(&uid) {
            Ok(Some(msg)) => results.push(msg),
            Ok(None) => debug!(uid = %uid, "Unparseable message skipped"),
            Err(e) => return Err(e),
        }
    }

    session.logout();
    Ok(results)
}

/// Mark a message `\Seen` by UID over a fresh session.
pub fn mark_seen(config: &MailConfig, uid: &str) -> Result<(), MailboxError> {
    let mut session = ImapSession::connect(config)?;
    session.login(config)?;
    session.select_inbox()?;

    session
        .command(&format!("UID STORE {uid} +FLAGS (\\Seen)"))
        .map_err(|e| MailboxError::MarkHandled {
            id: uid.to_string(),
            reason: e.to_string(),
        })?;

    session.logout();
    Ok(())
}

// ── Session ─────────────────────────────────────────────────────────

struct ImapSession {
    tls: TlsStream,
    tag_counter: u32,
}

impl ImapSession {
    fn connect(config: &MailConfig) -> Result<Self, MailboxError> {
        let tcp = TcpStream::connect((&*config.imap_host, config.imap_port))
            .map_err(|e| MailboxError::Connect(e.to_string()))?;
        tcp.set_read_timeout(Some(Duration::from_secs(30)))
            .map_err(|e| MailboxError::Connect(e.to_string()))?;

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = std::sync::Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );
        let server_name: rustls::pki_types::ServerName<'_> =
            rustls::pki_types::ServerName::try_from(config.imap_host.clone())
                .map_err(|e| MailboxError::Connect(e.to_string()))?;
        let conn = rustls::ClientConnection::new(tls_config, server_name)
            .map_err(|e| MailboxError::Connect(e.to_string()))?;

        let mut session = Self {
            tls: rustls::StreamOwned::new(conn, tcp),
            tag_counter: 0,
        };

        // Server greeting
        session
            .read_line()
            .map_err(|e| MailboxError::Connect(e.to_string()))?;
        Ok(session)
    }

    fn login(&mut self, config: &MailConfig) -> Result<(), MailboxError> {
        let resp = self
            .command(&format!(
                "LOGIN \"{}\" \"{}\"",
                config.username, config.password
            ))
            .map_err(|e| MailboxError::Connect(e.to_string()))?;

        if !resp.last().is_some_and(|l| l.contains("OK")) {
            return Err(MailboxError::Login {
                username: config.username.clone(),
            });
        }
        Ok(())
    }

    fn select_inbox(&mut self) -> Result<(), MailboxError> {
        self.command("SELECT \"INBOX\"")
            .map(|_| ())
            .map_err(|e| MailboxError::Fetch(e.to_string()))
    }

    /// UID SEARCH for unseen messages addressed to `alias`.
    fn search_unseen_to(&mut self, alias: &str) -> Result<Vec<String>, MailboxError> {
        let resp = self
            .command(&format!("UID SEARCH UNSEEN TO \"{alias}\""))
            .map_err(|e| MailboxError::Fetch(e.to_string()))?;

        let mut uids = Vec::new();
        for line in &resp {
            if line.starts_with("* SEARCH") {
                uids.extend(
                    line.split_whitespace()
                        .skip(2)
                        .map(|s| s.trim().to_string()),
                );
            }
        }
        Ok(uids)
    }

    /// UID FETCH one message and parse it. Returns `None` when the body
    /// is not parseable as mail.
    fn fetch_message(&mut self, uid: &str) -> Result<Option<RawMessage>, MailboxError> {
        let resp = self
            .command(&format!("UID FETCH {uid} RFC822"))
            .map_err(|e| MailboxError::Fetch(e.to_string()))?;

        let raw = message_source(&resp);

        let Some(parsed) = MessageParser::default().parse(raw.as_bytes()) else {
            return Ok(None);
        };

        let subject = parsed.subject().unwrap_or("(no subject)").to_string();
        let from = extract_sender(&parsed);
        let body = extract_text(&parsed);
        let received_at = extract_date(&parsed);
        // Canonical, re-derivable date string: the fingerprint depends on it.
        let date = received_at.map(|d| d.to_rfc3339()).unwrap_or_default();

        Ok(Some(RawMessage {
            id: uid.to_string(),
            subject,
            body,
            from,
            date,
            received_at: received_at.unwrap_or_else(Utc::now),
        }))
    }

    fn logout(&mut self) {
        let _ = self.command("LOGOUT");
    }

    fn command(&mut self, cmd: &str) -> Result<Vec<String>, std::io::Error> {
        self.tag_counter += 1;
        let tag = format!("A{}", self.tag_counter);
        let full = format!("{tag} {cmd}\r\n");
        IoWrite::write_all(&mut self.tls, full.as_bytes())?;
        IoWrite::flush(&mut self.tls)?;

        let mut lines = Vec::new();
        loop {
            let line = self.read_line()?;
            let done = line.starts_with(&tag);
            lines.push(line);
            if done {
                break;
            }
        }
        Ok(lines)
    }

    fn read_line(&mut self) -> Result<String, std::io::Error> {
        let mut buf = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            match std::io::Read::read(&mut self.tls, &mut byte) {
                Ok(0) => {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "IMAP connection closed",
                    ));
                }
                Ok(_) => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        return Ok(String::from_utf8_lossy(&buf).to_string());
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ── Parsing helpers ─────────────────────────────────────────────────

/// Reassemble the message literal from a UID FETCH response: everything
/// between the untagged FETCH header and the tagged completion, minus the
/// lone `)` line the server uses to close the literal. That `)` is
/// protocol framing, not message content.
fn message_source(resp: &[String]) -> String {
    if resp.len() < 2 {
        return String::new();
    }
    let mut body = &resp[1..resp.len() - 1];
    if let Some((last, rest)) = body.split_last()
        && last.trim() == ")"
    {
        body = rest;
    }
    body.concat()
}

/// Extract the sender address from a parsed email.
fn extract_sender(parsed: &mail_parser::Message) -> String {
    parsed
        .from()
        .and_then(|addr| addr.first())
        .and_then(|a| a.address())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".into())
}

/// Extract readable text from a parsed email, preferring the plain part.
fn extract_text(parsed: &mail_parser::Message) -> String {
    if let Some(text) = parsed.body_text(0) {
        return text.to_string();
    }
    if let Some(html) = parsed.body_html(0) {
        return strip_html(html.as_ref());
    }
    "(no readable content)".to_string()
}

/// Convert the parsed Date header into UTC. `None` when absent.
fn extract_date(parsed: &mail_parser::Message) -> Option<DateTime<Utc>> {
    parsed.date().and_then(|d| {
        chrono::NaiveDate::from_ymd_opt(d.year as i32, u32::from(d.month), u32::from(d.day))
            .and_then(|date| {
                date.and_hms_opt(
                    u32::from(d.hour),
                    u32::from(d.minute),
                    u32::from(d.second),
                )
            })
            .map(|n| n.and_utc())
    })
}

/// Strip HTML tags from content (basic).
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    // Normalize whitespace
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_html_basic() {
        assert_eq!(strip_html("<p>Hallo</p>"), "Hallo");
    }

    #[test]
    fn strip_html_nested_tags() {
        assert_eq!(
            strip_html("<div><b>Buffet</b> für <i>60 Personen</i></div>"),
            "Buffet für 60 Personen"
        );
    }

    #[test]
    fn strip_html_whitespace_normalized() {
        assert_eq!(strip_html("<p>  zwei   Wörter  </p>"), "zwei Wörter");
    }

    #[test]
    fn strip_html_plain_text_passthrough() {
        assert_eq!(strip_html("kein HTML"), "kein HTML");
    }

    #[test]
    fn message_source_drops_protocol_framing() {
        let resp: Vec<String> = vec![
            "* 7 FETCH (RFC822 {128}\r\n".into(),
            "Subject: Anfrage\r\n".into(),
            "\r\n".into(),
            "Wir planen ein Buffet.\r\n".into(),
            ")\r\n".into(),
            "A2 OK UID FETCH completed\r\n".into(),
        ];
        let raw = message_source(&resp);
        assert!(raw.ends_with("Wir planen ein Buffet.\r\n"));
        assert!(!raw.contains(')'));
    }

    #[test]
    fn message_source_body_never_gains_a_closing_paren() {
        let resp: Vec<String> = vec![
            "* 7 FETCH (RFC822 {64}\r\n".into(),
            "Subject: Feier\r\n".into(),
            "\r\n".into(),
            "Feier im Hof.\r\n".into(),
            ")\r\n".into(),
            "A2 OK UID FETCH completed\r\n".into(),
        ];
        let raw = message_source(&resp);
        let parsed = MessageParser::default().parse(raw.as_bytes()).unwrap();
        assert_eq!(extract_text(&parsed).trim_end(), "Feier im Hof.");
    }

    #[test]
    fn message_source_tolerates_short_responses() {
        assert_eq!(message_source(&["A2 OK\r\n".to_string()]), "");
    }

    #[test]
    fn parses_rfc822_message() {
        let raw = "From: Kunde <kunde@example.com>\r\n\
                   To: catering@example.com\r\n\
                   Subject: Anfrage Buffet\r\n\
                   Date: Mon, 5 Jan 2026 10:00:00 +0000\r\n\
                   \r\n\
                   Wir planen eine Feier.\r\n";
        let parsed = MessageParser::default().parse(raw.as_bytes()).unwrap();
        assert_eq!(extract_sender(&parsed), "kunde@example.com");
        assert!(extract_text(&parsed).contains("Feier"));
        assert!(extract_date(&parsed).is_some());
    }
}
