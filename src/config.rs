//! Configuration types, built from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Mailbox configuration (IMAP inbound, SMTP outbound).
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    /// Address inquiries are sent to; the IMAP search is scoped to it.
    pub alias: String,
}

impl MailConfig {
    /// Build config from environment variables.
    /// Returns `None` if `MAIL_IMAP_HOST` is not set (mailbox disabled).
    pub fn from_env() -> Option<Self> {
        let imap_host = std::env::var("MAIL_IMAP_HOST").ok()?;

        let imap_port: u16 = std::env::var("MAIL_IMAP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(993);

        let smtp_host =
            std::env::var("MAIL_SMTP_HOST").unwrap_or_else(|_| imap_host.replace("imap", "smtp"));

        let smtp_port: u16 = std::env::var("MAIL_SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);

        let username = std::env::var("MAIL_USERNAME").unwrap_or_default();
        let password = std::env::var("MAIL_PASSWORD").unwrap_or_default();
        let alias = std::env::var("MAIL_ALIAS").unwrap_or_else(|_| username.clone());

        Some(Self {
            imap_host,
            imap_port,
            smtp_host,
            smtp_port,
            username,
            password,
            alias,
        })
    }
}

/// Generative model endpoint configuration.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Base URL of an OpenAI-compatible chat-completions endpoint.
    pub endpoint: String,
    pub api_key: SecretString,
    pub deployment: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Hard wall-clock bound on a single completion call.
    pub timeout: Duration,
}

impl ModelConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let endpoint = std::env::var("MODEL_ENDPOINT")
            .map_err(|_| ConfigError::MissingEnvVar("MODEL_ENDPOINT".into()))?;
        let api_key = std::env::var("MODEL_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("MODEL_API_KEY".into()))?;

        let deployment =
            std::env::var("MODEL_DEPLOYMENT").unwrap_or_else(|_| "gpt-4o".to_string());

        let timeout_secs: u64 = std::env::var("MODEL_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        Ok(Self {
            endpoint,
            api_key: SecretString::from(api_key),
            deployment,
            temperature: 0.3,
            max_tokens: 2500,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    #[cfg(test)]
    pub fn for_tests(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            api_key: SecretString::from("test-key"),
            deployment: "gpt-4o".to_string(),
            temperature: 0.3,
            max_tokens: 2500,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Slack notifier configuration.
#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub bot_token: SecretString,
    /// Channel for inquiry/quote event cards.
    pub event_channel: String,
    /// Channel for run logs and error reports.
    pub log_channel: String,
}

impl SlackConfig {
    /// Returns `None` if `SLACK_BOT_TOKEN` is not set (notifier disabled).
    pub fn from_env() -> Option<Self> {
        let bot_token = std::env::var("SLACK_BOT_TOKEN").ok()?;
        let event_channel = std::env::var("SLACK_CHANNEL_ID").unwrap_or_default();
        let log_channel =
            std::env::var("SLACK_LOG_CHANNEL_ID").unwrap_or_else(|_| event_channel.clone());

        Some(Self {
            bot_token: SecretString::from(bot_token),
            event_channel,
            log_channel,
        })
    }
}

/// Which backing store the dedup ledger uses. Selected once at startup;
/// both backends implement the same `Ledger` trait.
#[derive(Debug, Clone)]
pub enum LedgerBackend {
    /// Durable keyed store (preferred).
    LibSql(PathBuf),
    /// Flat JSON file with an in-memory index (degraded mode).
    File(PathBuf),
}

/// Dedup ledger configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub backend: LedgerBackend,
    /// Records older than this are pruned; advisory housekeeping only.
    pub ttl: Duration,
}

impl LedgerConfig {
    const DEFAULT_TTL_DAYS: u64 = 7;

    pub fn from_env() -> Self {
        let ttl_days: u64 = std::env::var("LEDGER_TTL_DAYS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(Self::DEFAULT_TTL_DAYS);

        let backend = match std::env::var("LEDGER_DB_PATH") {
            Ok(path) => LedgerBackend::LibSql(PathBuf::from(path)),
            Err(_) => {
                let path = std::env::var("LEDGER_FILE_PATH")
                    .unwrap_or_else(|_| "./data/processed-inquiries.json".to_string());
                LedgerBackend::File(PathBuf::from(path))
            }
        };

        Self {
            backend,
            ttl: Duration::from_secs(ttl_days * 24 * 3600),
        }
    }
}

// ── Business constants ──────────────────────────────────────────────

/// A priced service package tier.
#[derive(Debug, Clone)]
pub struct Package {
    pub name: &'static str,
    /// EUR per person, inclusive range.
    pub price_range: (u32, u32),
}

/// Discount percentages (cumulative up to `discount_cap`).
#[derive(Debug, Clone)]
pub struct Discounts {
    pub weekday: u32,
    pub large_group: u32,
    pub nonprofit: u32,
    pub loyalty: u32,
}

/// Surcharge percentages.
#[derive(Debug, Clone)]
pub struct Surcharges {
    pub weekend: u32,
    pub rush: u32,
    pub holiday: u32,
    pub summer: u32,
}

/// Static business constants embedded in every generation prompt.
#[derive(Debug, Clone)]
pub struct BusinessConfig {
    pub name: &'static str,
    pub location: &'static str,
    pub service_area: &'static str,
    /// Minimum party size.
    pub min_order: u32,
    /// Minimum lead time in hours.
    pub advance_notice_hours: u32,
    pub basis: Package,
    pub standard: Package,
    pub premium: Package,
    pub discounts: Discounts,
    /// Maximum cumulative discount percentage.
    pub discount_cap: u32,
    pub surcharges: Surcharges,
}

impl Default for BusinessConfig {
    fn default() -> Self {
        Self {
            name: "Jasmin Catering",
            location: "Berlin, Deutschland",
            service_area: "Berlin und Umgebung (bis 50km)",
            min_order: 10,
            advance_notice_hours: 48,
            basis: Package {
                name: "Basis-Paket",
                price_range: (25, 35),
            },
            standard: Package {
                name: "Standard-Paket",
                price_range: (35, 45),
            },
            premium: Package {
                name: "Premium-Paket",
                price_range: (50, 70),
            },
            discounts: Discounts {
                weekday: 10,
                large_group: 10,
                nonprofit: 10,
                loyalty: 5,
            },
            discount_cap: 20,
            surcharges: Surcharges {
                weekend: 10,
                rush: 25,
                holiday: 20,
                summer: 15,
            },
        }
    }
}

// ── Aggregate ───────────────────────────────────────────────────────

/// Full application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub mail: MailConfig,
    pub model: ModelConfig,
    pub slack: Option<SlackConfig>,
    pub ledger: LedgerConfig,
    pub business: BusinessConfig,
    /// Directory of knowledge documents (`*.md`).
    pub knowledge_dir: PathBuf,
    /// Interval between pipeline runs.
    pub poll_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mail = MailConfig::from_env()
            .ok_or_else(|| ConfigError::MissingEnvVar("MAIL_IMAP_HOST".into()))?;
        let model = ModelConfig::from_env()?;
        let slack = SlackConfig::from_env();
        let ledger = LedgerConfig::from_env();

        let knowledge_dir = std::env::var("KNOWLEDGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./knowledge"));

        let poll_interval_secs: u64 = std::env::var("POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(300);

        Ok(Self {
            mail,
            model,
            slack,
            ledger,
            business: BusinessConfig::default(),
            knowledge_dir,
            poll_interval: Duration::from_secs(poll_interval_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_defaults_match_published_tables() {
        let biz = BusinessConfig::default();
        assert_eq!(biz.min_order, 10);
        assert_eq!(biz.advance_notice_hours, 48);
        assert_eq!(biz.basis.price_range, (25, 35));
        assert_eq!(biz.standard.price_range, (35, 45));
        assert_eq!(biz.premium.price_range, (50, 70));
        assert_eq!(biz.discount_cap, 20);
        assert_eq!(biz.surcharges.rush, 25);
    }

    #[test]
    fn ledger_config_defaults_to_file_backend() {
        // SAFETY: tests in this module are the only readers of these vars.
        unsafe {
            std::env::remove_var("LEDGER_DB_PATH");
            std::env::remove_var("LEDGER_FILE_PATH");
            std::env::remove_var("LEDGER_TTL_DAYS");
        }
        let cfg = LedgerConfig::from_env();
        assert!(matches!(cfg.backend, LedgerBackend::File(_)));
        assert_eq!(cfg.ttl, Duration::from_secs(7 * 24 * 3600));
    }
}
