use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use campaign_indexer::db::{DbPool, EntityStore, MemoryStore};
use campaign_indexer::replay;
use campaign_indexer::rpc::{RpcChainReader, RpcClient};
use campaign_indexer::transformations::{build_registry, HandlerContext, TransformationEngine};
use campaign_indexer::types::config::chain::ChainConfig;
use campaign_indexer::types::config::indexer::IndexerConfig;

const EVENT_CHANNEL_CAPACITY: usize = 1000;

struct Args {
    config: PathBuf,
    chain: Option<String>,
    events: PathBuf,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut config = PathBuf::from("config/config.json");
    let mut chain = None;
    let mut events = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config = args.next().context("--config needs a path")?.into(),
            "--chain" => chain = Some(args.next().context("--chain needs a name")?),
            _ if events.is_none() => events = Some(PathBuf::from(arg)),
            other => anyhow::bail!("Unexpected argument '{}'", other),
        }
    }

    Ok(Args {
        config,
        chain,
        events: events.context(
            "Usage: campaign-indexer [--config <path>] [--chain <name>] <events.jsonl>",
        )?,
    })
}

fn load_env_vars(config: &IndexerConfig, chain: &ChainConfig) -> anyhow::Result<()> {
    let wanted = [
        chain.rpc_url_env_var.as_str(),
        config.database_url_env_var.as_str(),
    ];
    if wanted.iter().all(|var| env::var(var).is_ok()) {
        return Ok(());
    }

    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    anyhow::ensure!(
        env::var(&chain.rpc_url_env_var).is_ok(),
        "Missing required env var {} (also looked in .env)",
        chain.rpc_url_env_var
    );
    Ok(())
}

async fn open_store(config: &IndexerConfig) -> anyhow::Result<Arc<dyn EntityStore>> {
    match env::var(&config.database_url_env_var) {
        Ok(url) => {
            let pool = DbPool::new(&url)
                .await
                .context("Failed to connect to database")?;
            pool.run_migrations()
                .await
                .context("Failed to run migrations")?;
            Ok(Arc::new(pool))
        }
        Err(_) => {
            tracing::warn!(
                "{} is not set, using the in-memory store (nothing is persisted)",
                config.database_url_env_var
            );
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = parse_args()?;
    let config = IndexerConfig::load(&args.config)?;
    let chain = match &args.chain {
        Some(name) => config
            .chain(name)
            .with_context(|| format!("Chain '{}' not found in config", name))?,
        None => config.chains.first().context("No chain configured")?,
    };

    load_env_vars(&config, chain)?;

    let store = open_store(&config).await?;

    let rpc_url = env::var(&chain.rpc_url_env_var)
        .with_context(|| format!("Env var {} not set", chain.rpc_url_env_var))?;
    let client = RpcClient::from_url(&rpc_url)
        .with_context(|| format!("Invalid RPC URL for chain {}", chain.name))?;
    let reader = Arc::new(RpcChainReader::new(
        client,
        chain.multicall_address,
        chain.multicall_batch_size,
    ));

    let ctx = HandlerContext::new(chain.name.clone(), chain.chain_id, store, reader);
    let registry = Arc::new(build_registry());
    let engine = TransformationEngine::new(registry, ctx);

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let events = args.events.clone();
    let producer = tokio::spawn(async move { replay::stream_file(&events, tx).await });

    let stats = engine.run(rx).await;
    let sent = producer
        .await
        .context("Replay task panicked")?
        .with_context(|| format!("Failed to replay {}", args.events.display()))?;

    tracing::info!(
        "Done: {} events read, {} processed, {} handler failures",
        sent,
        stats.events,
        stats.handler_failures
    );

    Ok(())
}
