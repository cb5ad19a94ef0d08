use anyhow::Result;
use clap::{Arg, Command};
use std::sync::Arc;
use tracing::{info, warn};

use chapterizer::api::ApiServer;
use chapterizer::auth::StaticTokenResolver;
use chapterizer::cache::ResultCache;
use chapterizer::config::Config;
use chapterizer::generator::ChapterGenerator;
use chapterizer::jobs::{JobOrchestrator, OrchestratorSettings};
use chapterizer::ledger::CreditLedger;
use chapterizer::llm::create_generator;
use chapterizer::storage::MemoryStore;
use chapterizer::transcript::{scrape, AcquirerConfig, TimedTextClient, TranscriptAcquirer};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chapterizer=info,warn".into()),
        )
        .init();

    let matches = Command::new("chapterizer")
        .version("0.1.0")
        .about("Video chapter generation service")
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Port for the API server (overrides config)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    // Load configuration
    let mut config = Config::load().unwrap_or_else(|e| {
        warn!("Failed to load config, using defaults: {}", e);
        Config::default()
    });

    if let Some(port) = matches.get_one::<String>("port") {
        config.server.port = port.parse()?;
    }
    if matches.get_flag("verbose") {
        info!("Verbose logging enabled");
    }

    config.validate()?;
    info!("🚀 Chapterizer starting...");
    info!("{}", config.summary());

    // Shared store backs cache, ledger and per-video leases
    let store = Arc::new(MemoryStore::new());

    let caption_client = TimedTextClient::new(
        config.transcript.request_timeout_seconds,
        config.transcript.proxy_url.as_deref(),
    )?;
    let acquirer = Arc::new(TranscriptAcquirer::new(
        Arc::new(caption_client),
        scrape::scrape_client(config.transcript.request_timeout_seconds),
        AcquirerConfig {
            preferred_languages: config.transcript.preferred_languages.clone(),
            translation_language: config.transcript.translation_language.clone(),
        },
    ));

    let backend = create_generator(&config.generation)?;
    let generator = Arc::new(ChapterGenerator::new(
        Arc::from(backend),
        config.generation.model_variants.clone(),
    ));

    let cache = ResultCache::new(store.clone());
    let ledger = CreditLedger::new(store.clone(), config.credits.signup_bonus);

    let settings = OrchestratorSettings {
        transcript_budget: std::time::Duration::from_secs(config.transcript.acquire_budget_seconds),
        sync_wait: std::time::Duration::from_secs(config.jobs.sync_wait_seconds),
        job_retention: std::time::Duration::from_secs(config.jobs.retention_seconds),
        generation_cost: config.credits.generation_cost,
        max_input_tokens: config.generation.max_input_tokens,
    };
    let orchestrator = Arc::new(JobOrchestrator::new(
        acquirer,
        generator,
        cache,
        ledger,
        store,
        settings,
    ));

    let resolver = Arc::new(StaticTokenResolver::new(config.auth.tokens.clone()));

    let server = ApiServer::new(orchestrator, resolver, Arc::new(config));
    server.start().await
}
