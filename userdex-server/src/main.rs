use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use userdex::api::ApiServer;
use userdex::config::{BackendKind, Config, LoggingConfig};
use userdex::{MemoryUserStore, UserStore};
use userdex_es::ElasticsearchUserStore;

const METRICS_UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "userdex-server")]
#[command(about = "HTTP gateway for user documents in Elasticsearch")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "userdex.toml", env = "USERDEX_CONFIG")]
    config: PathBuf,

    /// Address to bind to (overrides config)
    #[arg(long, env = "USERDEX_BIND_ADDR")]
    bind_addr: Option<String>,

    /// Elasticsearch base URL (overrides config)
    #[arg(long, env = "USERDEX_ES_URL")]
    es_url: Option<String>,

    /// Default user index (overrides config)
    #[arg(long, env = "USERDEX_INDEX")]
    index: Option<String>,

    /// Keep documents in process memory instead of Elasticsearch
    #[arg(long)]
    memory: bool,
}

fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    if config.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn build_store(config: &Config) -> Result<Arc<dyn UserStore>> {
    let store: Arc<dyn UserStore> = match config.backend.kind {
        BackendKind::Elasticsearch => {
            let store = ElasticsearchUserStore::from_config(&config.backend)?;
            match store.client().ping().await {
                Ok(info) => tracing::info!(
                    "Connected to cluster '{}' (version {})",
                    info.cluster_name,
                    info.version
                        .map(|v| v.number)
                        .unwrap_or_else(|| "unknown".into())
                ),
                Err(e) => tracing::warn!(
                    "Elasticsearch at {} is not reachable yet: {}",
                    config.backend.url,
                    e
                ),
            }
            Arc::new(store)
        }
        BackendKind::Memory => Arc::new(MemoryUserStore::new(config.backend.index.clone())),
    };

    if config.backend.create_index_on_startup {
        if let Err(e) = store.create_index(&config.backend.index).await {
            tracing::warn!("Could not create index '{}': {}", config.backend.index, e);
        }
    }

    Ok(store)
}

/// Histograms are only drained on upkeep, which `install_recorder` leaves to the caller.
fn spawn_metrics_upkeep(handle: PrometheusHandle) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(METRICS_UPKEEP_INTERVAL);
        loop {
            interval.tick().await;
            handle.run_upkeep();
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load_or_create(&args.config)?;
    if let Some(bind_addr) = args.bind_addr {
        config.server.bind_addr = bind_addr;
    }
    if let Some(url) = args.es_url {
        config.backend.url = url;
    }
    if let Some(index) = args.index {
        config.backend.index = index;
    }
    if args.memory {
        config.backend.kind = BackendKind::Memory;
    }
    config.validate()?;

    init_logging(&config.logging);

    tracing::info!("Starting userdex server");
    tracing::info!("Config file: {}", args.config.display());
    tracing::info!(
        "Backend: {:?} at {} (index '{}')",
        config.backend.kind,
        config.backend.url,
        config.backend.index
    );

    let store = build_store(&config).await?;

    let mut server = ApiServer::with_config(store, &config.server);
    if config.observability.metrics_enabled {
        let handle = PrometheusBuilder::new().install_recorder()?;
        spawn_metrics_upkeep(handle.clone());
        server = server.with_metrics(handle);
    }

    server.serve(&config.server.bind_addr).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_metrics_upkeep_keeps_running() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let task = spawn_metrics_upkeep(handle);

        tokio::time::sleep(METRICS_UPKEEP_INTERVAL * 3).await;
        assert!(!task.is_finished());
        task.abort();
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::parse_from([
            "userdex-server",
            "--config",
            "conf/userdex.toml",
            "--es-url",
            "http://es:9200",
            "--memory",
        ]);
        assert_eq!(args.config, PathBuf::from("conf/userdex.toml"));
        assert_eq!(args.es_url.as_deref(), Some("http://es:9200"));
        assert!(args.memory);
        assert!(args.index.is_none());
    }
}
