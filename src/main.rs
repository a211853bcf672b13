use std::sync::Arc;
use std::sync::atomic::Ordering;

use quoteflow::config::{Config, LedgerBackend};
use quoteflow::dispatch::Dispatcher;
use quoteflow::llm::OpenAiChatModel;
use quoteflow::mailbox::{ImapSmtpMailbox, Mailbox};
use quoteflow::notify::{NoopNotifier, Notifier, SlackNotifier};
use quoteflow::pipeline::{InquiryPipeline, spawn_pipeline_runner};
use quoteflow::quote::QuoteGenerator;
use quoteflow::retrieval::Corpus;
use quoteflow::store::{FileLedger, Ledger, LibSqlLedger};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    eprintln!("📬 Quoteflow v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "   Mailbox: {} (alias: {})",
        config.mail.imap_host, config.mail.alias
    );
    eprintln!("   Model: {}", config.model.deployment);
    eprintln!("   Poll interval: {}s\n", config.poll_interval.as_secs());

    // ── Knowledge corpus ─────────────────────────────────────────────────
    let corpus = Corpus::load_dir(&config.knowledge_dir).unwrap_or_else(|e| {
        eprintln!(
            "Error: Failed to load knowledge from {}: {}",
            config.knowledge_dir.display(),
            e
        );
        std::process::exit(1);
    });
    eprintln!("   Knowledge: {} documents", corpus.len());

    // ── Dedup ledger ─────────────────────────────────────────────────────
    let ledger: Arc<dyn Ledger> = match &config.ledger.backend {
        LedgerBackend::LibSql(path) => {
            eprintln!("   Ledger: libsql ({})", path.display());
            Arc::new(LibSqlLedger::new_local(path).await.unwrap_or_else(|e| {
                eprintln!("Error: Failed to open ledger at {}: {}", path.display(), e);
                std::process::exit(1);
            }))
        }
        LedgerBackend::File(path) => {
            eprintln!("   Ledger: file ({})", path.display());
            Arc::new(FileLedger::load(path, config.ledger.ttl))
        }
    };

    // Startup housekeeping; stale dedup records only waste space.
    match ledger.prune(config.ledger.ttl).await {
        Ok(pruned) if pruned > 0 => eprintln!("   Ledger: pruned {} stale records", pruned),
        Ok(_) => {}
        Err(e) => eprintln!("   Warning: ledger prune failed: {}", e),
    }

    // ── Collaborators ────────────────────────────────────────────────────
    let mailbox: Arc<dyn Mailbox> = Arc::new(ImapSmtpMailbox::new(config.mail.clone()));

    let notifier: Arc<dyn Notifier> = match config.slack.clone() {
        Some(slack) => {
            eprintln!("   Slack: enabled (events: {})", slack.event_channel);
            Arc::new(SlackNotifier::new(slack))
        }
        None => {
            eprintln!("   Slack: disabled");
            Arc::new(NoopNotifier)
        }
    };

    let model = Arc::new(OpenAiChatModel::new(config.model.clone()));
    let generator = QuoteGenerator::new(
        model,
        config.business.clone(),
        config.model.temperature,
        config.model.max_tokens,
        config.model.timeout,
    );

    let dispatcher = Dispatcher::new(mailbox.clone(), ledger.clone(), notifier.clone());
    let pipeline = Arc::new(InquiryPipeline::new(
        mailbox,
        ledger,
        corpus,
        generator,
        dispatcher,
        notifier,
    ));

    // ── Run ──────────────────────────────────────────────────────────────
    let (mut handle, shutdown) = spawn_pipeline_runner(pipeline, config.poll_interval);

    tokio::signal::ctrl_c().await?;
    eprintln!("\nShutting down...");
    shutdown.store(true, Ordering::Relaxed);

    // Give an in-flight run a moment to finish its dispatch before forcing
    // the task down.
    let grace = std::time::Duration::from_secs(10);
    if tokio::time::timeout(grace, &mut handle).await.is_err() {
        handle.abort();
        let _ = handle.await;
    }

    Ok(())
}
