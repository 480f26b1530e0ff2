mod cli;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use sentinel_core::config::{RunMode, SentinelConfig};
use sentinel_core::StateStore;
use sentinel_deliver::PolitenessGate;
use sentinel_fetch::{RenderedFetcher, StaticFetcher};
use sentinel_guard::{DomainPolicy, UrlSafetyGuard};
use sentinel_pipeline::{run_pass, replay, PipelineContext};
use sentinel_store::{MemoryStore, PostgresStore};
use tracing::{info, warn};

use crate::cli::{Cli, Commands};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .max_blocking_threads(64) // headless-chrome fetches run via spawn_blocking
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.command.config_path();

    let config_str = std::fs::read_to_string(config_path).unwrap_or_else(|_| {
        eprintln!("config file {config_path} not found, using embedded defaults");
        include_str!("../config/default.json").to_string()
    });
    let config: SentinelConfig =
        serde_json::from_str(&config_str).context("parsing configuration document")?;

    init_tracing(&config, cli.debug, cli.structured_logs);

    // The CLI subcommand picks the code path; the config document's own
    // `mode` field must agree, since it's the field a config
    // meant for `sentinel-watch run` would carry.
    match (&cli.command, config.mode) {
        (Commands::Run { .. }, RunMode::ReplayDeadLetter)
        | (Commands::Replay { .. }, RunMode::Monitor) => {
            bail!("config `mode` does not match the invoked subcommand");
        }
        _ => {}
    }

    let ctx = build_context(&config).await?;

    match &cli.command {
        Commands::Run { .. } => {
            let targets = config.resolved_targets();
            if targets.is_empty() {
                bail!("no targets configured: set `target_url` or `targets`");
            }
            let result = run_pass(&ctx, &targets).await.context("run pass failed")?;
            info!(
                total = result.summary.total_targets,
                delivered = result.summary.change_delivered,
                dead_lettered = result.summary.change_dead_lettered,
                fetch_failed = result.summary.fetch_failed,
                "run complete"
            );
        }
        Commands::Replay { .. } => {
            let result = replay(&ctx, &config.replay).await.context("dead-letter replay failed")?;
            info!(
                total = result.summary.total,
                delivered = result.summary.delivered,
                failed = result.summary.failed,
                invalid = result.summary.invalid,
                "replay complete"
            );
        }
    }

    // Exit 0 on run completion even with per-target failures; nonzero
    // only for the fatal errors that already bailed out above.
    Ok(())
}

fn init_tracing(config: &SentinelConfig, force_debug: bool, force_structured: bool) {
    let default_level = if config.policy.debug || force_debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    if config.policy.structured_logs || force_structured {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Wires a `PipelineContext` for this run: fetcher chosen by
/// `rendering_mode`, a `StateStore` chosen by the `DATABASE_URL`
/// environment variable (falling back to an in-memory store when unset —
/// the config document has no store-backend field of its own), and the
/// guard/domain-policy pair the target pipeline itself needs.
async fn build_context(config: &SentinelConfig) -> Result<PipelineContext> {
    let policy = &config.policy;

    let webhook_guard = Arc::new(UrlSafetyGuard::new());
    let webhook_domain_policy = Arc::new(DomainPolicy::new(
        policy.webhook_domain_allowlist.clone(),
        policy.webhook_domain_denylist.clone(),
    ));

    let target_guard = Arc::new(UrlSafetyGuard::new());
    let target_domain_policy = Arc::new(DomainPolicy::new(
        policy.target_domain_allowlist.clone(),
        policy.target_domain_denylist.clone(),
    ));
    let politeness = Arc::new(PolitenessGate::new());

    let fetcher: Arc<dyn sentinel_core::Fetcher> = match policy.rendering_mode {
        sentinel_core::config::RenderingMode::Static => Arc::new(StaticFetcher::new(
            policy,
            target_guard,
            target_domain_policy,
            politeness,
        )?),
        sentinel_core::config::RenderingMode::Playwright => Arc::new(RenderedFetcher::new(
            policy,
            target_guard,
            target_domain_policy,
            politeness,
        )),
    };

    let state_store: Arc<dyn StateStore> = match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let store = PostgresStore::new(&url, 10).await?;
            store.run_migrations().await?;
            info!("using postgres state store");
            Arc::new(store)
        }
        Err(_) => {
            warn!("DATABASE_URL not set, using in-memory state store (state will not persist)");
            Arc::new(MemoryStore::new())
        }
    };

    Ok(PipelineContext {
        policy: Arc::new(config.policy.clone()),
        fetcher,
        state_store,
        webhook_guard,
        webhook_domain_policy,
        http_client: reqwest::Client::new(),
        run_id: Arc::from(uuid_like_run_id().as_str()),
    })
}

/// A short, time-ordered run identifier. Not a UUID — the corpus doesn't
/// carry a `uuid` dependency, and ordering by time is all the dead-letter
/// and history stores need from it.
fn uuid_like_run_id() -> String {
    let now = chrono::Utc::now();
    format!("run-{}", now.format("%Y%m%dT%H%M%S%.3fZ"))
}
