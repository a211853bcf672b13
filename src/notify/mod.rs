//! Ops-channel mirroring. Notifier failures are logged and never block
//! or roll back the pipeline.

use std::collections::BTreeMap;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::SlackConfig;
use crate::error::NotifyError;
use crate::quote::QuoteDraft;

/// Longest text a single section block may carry; longer bodies are split
/// on line boundaries across continuation blocks.
const MAX_BLOCK_TEXT: usize = 2800;

/// An inquiry/quote event card for the ops channel.
#[derive(Debug, Clone)]
pub struct QuoteEvent {
    pub subject: String,
    pub from: String,
    pub inquiry_body: String,
    pub quote_text: String,
    pub documents_used: Vec<String>,
    pub tier_prices: BTreeMap<String, String>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post a quote event card to the event channel.
    async fn post_event(&self, event: &QuoteEvent) -> Result<(), NotifyError>;

    /// Post a plain log line to the log channel.
    async fn log(&self, text: &str) -> Result<(), NotifyError>;
}

/// Notifier used when no Slack token is configured.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn post_event(&self, event: &QuoteEvent) -> Result<(), NotifyError> {
        debug!(subject = %event.subject, "Notifier disabled, event dropped");
        Ok(())
    }

    async fn log(&self, _text: &str) -> Result<(), NotifyError> {
        Ok(())
    }
}

// ── Slack Block Kit ─────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Block {
    Header { text: Text },
    Section { text: Text },
    Divider,
    Context { elements: Vec<Text> },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Text {
    PlainText { text: String },
    Mrkdwn { text: String },
}

impl Text {
    fn plain(text: impl Into<String>) -> Self {
        Self::PlainText { text: text.into() }
    }

    fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Serialize)]
struct PostMessageBody<'a> {
    channel: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    blocks: Vec<Block>,
}

#[derive(serde::Deserialize)]
struct PostMessageReply {
    ok: bool,
    error: Option<String>,
}

/// Posts via `chat.postMessage` with a bot token.
pub struct SlackNotifier {
    client: reqwest::Client,
    config: SlackConfig,
}

impl SlackNotifier {
    pub fn new(config: SlackConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn post(&self, channel: &str, fallback: &str, blocks: Vec<Block>) -> Result<(), NotifyError> {
        let body = PostMessageBody {
            channel,
            text: fallback,
            blocks,
        };

        let response = self
            .client
            .post("https://slack.com/api/chat.postMessage")
            .bearer_auth(self.config.bot_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        let reply: PostMessageReply = response
            .json()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        if !reply.ok {
            return Err(NotifyError::Api(
                reply.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn post_event(&self, event: &QuoteEvent) -> Result<(), NotifyError> {
        let mut blocks = vec![
            Block::Header {
                text: Text::plain("Neue Catering-Anfrage beantwortet"),
            },
            Block::Section {
                text: Text::mrkdwn(format!(
                    "*Von:* {}\n*Betreff:* {}",
                    event.from, event.subject
                )),
            },
            Block::Divider,
        ];

        blocks.push(Block::Section {
            text: Text::mrkdwn("*Anfrage:*".to_string()),
        });
        for chunk in chunk_lines(&event.inquiry_body, MAX_BLOCK_TEXT) {
            blocks.push(Block::Section {
                text: Text::mrkdwn(chunk),
            });
        }

        blocks.push(Block::Divider);
        blocks.push(Block::Section {
            text: Text::mrkdwn("*Angebot:*".to_string()),
        });
        for chunk in chunk_lines(&event.quote_text, MAX_BLOCK_TEXT) {
            blocks.push(Block::Section {
                text: Text::mrkdwn(chunk),
            });
        }

        if !event.tier_prices.is_empty() {
            let summary = event
                .tier_prices
                .iter()
                .map(|(tier, price)| format!("• {tier}: {price}"))
                .collect::<Vec<_>>()
                .join("\n");
            blocks.push(Block::Section {
                text: Text::mrkdwn(format!("*Preisübersicht:*\n{summary}")),
            });
        }

        blocks.push(Block::Context {
            elements: vec![Text::mrkdwn(format!(
                "Wissensdokumente: {}",
                if event.documents_used.is_empty() {
                    "keine".to_string()
                } else {
                    event.documents_used.join(", ")
                }
            ))],
        });

        let fallback = format!("Angebot versendet: {}", event.subject);
        if let Err(e) = self
            .post(&self.config.event_channel, &fallback, blocks)
            .await
        {
            warn!(error = %e, "Slack event post failed");
            return Err(e);
        }
        Ok(())
    }

    async fn log(&self, text: &str) -> Result<(), NotifyError> {
        self.post(&self.config.log_channel, text, Vec::new()).await
    }
}

impl QuoteEvent {
    pub fn from_draft(
        subject: &str,
        from: &str,
        inquiry_body: &str,
        draft: &QuoteDraft,
        tier_prices: BTreeMap<String, String>,
    ) -> Self {
        Self {
            subject: subject.to_string(),
            from: from.to_string(),
            inquiry_body: inquiry_body.to_string(),
            quote_text: draft.raw_text.clone(),
            documents_used: draft.documents_used.clone(),
            tier_prices,
        }
    }
}

/// Split `text` into chunks of at most `max` characters, breaking on line
/// boundaries where possible. A single line longer than `max` is split
/// mid-line.
fn chunk_lines(text: &str, max: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        let mut line = line;
        // Oversized lines are split hard.
        while line.chars().count() > max {
            let split_at = line
                .char_indices()
                .nth(max)
                .map(|(i, _)| i)
                .unwrap_or(line.len());
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.push(line[..split_at].to_string());
            line = &line[split_at..];
        }

        let needed = line.chars().count() + if current.is_empty() { 0 } else { 1 };
        if current.chars().count() + needed > max && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    if chunks.is_empty() {
        chunks.push(String::new());
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = chunk_lines("hallo\nwelt", 2800);
        assert_eq!(chunks, vec!["hallo\nwelt"]);
    }

    #[test]
    fn splits_on_line_boundaries() {
        let text = format!("{}\n{}", "a".repeat(2000), "b".repeat(2000));
        let chunks = chunk_lines(&text, 2800);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].chars().all(|c| c == 'a'));
        assert!(chunks[1].chars().all(|c| c == 'b'));
    }

    #[test]
    fn oversized_line_is_split_hard() {
        let text = "x".repeat(6000);
        let chunks = chunk_lines(&text, 2800);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 2800));
    }

    #[test]
    fn blocks_serialize_to_slack_wire_format() {
        let block = Block::Section {
            text: Text::mrkdwn("*Von:* kunde@example.com"),
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "section");
        assert_eq!(json["text"]["type"], "mrkdwn");

        let header = Block::Header {
            text: Text::plain("Titel"),
        };
        let json = serde_json::to_value(&header).unwrap();
        assert_eq!(json["type"], "header");
        assert_eq!(json["text"]["type"], "plain_text");

        let json = serde_json::to_value(Block::Divider).unwrap();
        assert_eq!(json["type"], "divider");
    }

    #[test]
    fn event_card_lists_documents() {
        let event = QuoteEvent {
            subject: "Catering".into(),
            from: "kunde@example.com".into(),
            inquiry_body: "40 Personen".into(),
            quote_text: "Basis-Paket: 25-35€".into(),
            documents_used: vec!["Business Conditions".into()],
            tier_prices: BTreeMap::from([("Basis".to_string(), "25-35€".to_string())]),
        };
        // Card assembly must not panic and the fallback carries the subject.
        let fallback = format!("Angebot versendet: {}", event.subject);
        assert!(fallback.contains("Catering"));
    }
}
