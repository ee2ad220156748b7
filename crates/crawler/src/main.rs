//! CiteForge Crawler
//!
//! Crawls the citation network around one or more arXiv publications.
//! Seeds come from the command line, or from `crawl.seeds` in configuration
//! when no arguments are given. The final report is printed as JSON.

use anyhow::Context;
use citeforge_common::{
    config::{AppConfig, ObservabilityConfig},
    db::{DbPool, Repository},
    metrics,
    sources::{ArxivMetadataProvider, StaticSeeds},
    store::{MemoryCatalogStore, MemoryGraphStore},
    CatalogStore, GraphStore, VERSION,
};
use citeforge_crawler::{
    fetcher::rate_limiter_from_config, ArxivPdfSource, CrawlOptions, FrontierScheduler,
    PersistenceGateway, RecordFetcher, RetryPolicy,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let mut config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.observability);

    info!("Starting CiteForge Crawler v{}", VERSION);

    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        config.crawl.seeds = args;
    }
    config.validate().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        e
    })?;

    if config.observability.metrics_port != 0 {
        install_metrics_exporter(config.observability.metrics_port)?;
    }
    metrics::register_metrics();

    // Everything fallible is built before the stores are opened
    let fetcher = RecordFetcher::new(
        Arc::new(ArxivMetadataProvider::new(&config.arxiv)?),
        Arc::new(ArxivPdfSource::new(&config.arxiv)?),
        RetryPolicy::from(&config.retry),
    )
    .with_rate_limiter(rate_limiter_from_config(&config.rate_limit)?);

    let (catalog, graph) = open_stores(&config).await?;
    let gateway = PersistenceGateway::open(catalog, graph)
        .await
        .context("Failed to open stores")?;

    let scheduler = FrontierScheduler::new(CrawlOptions::from(&config.crawl), fetcher, gateway);

    let cancel = scheduler.cancellation_token();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight work");
            cancel.cancel();
        }
    });

    let report = scheduler
        .run_from_source(&StaticSeeds(config.crawl.seeds.clone()))
        .await?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.is_degraded() {
        warn!(
            store_failures = report.store_failures.len(),
            "Crawl completed with store failures"
        );
    }

    info!("Crawler shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    // Logs go to stderr so stdout carries only the report
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn install_metrics_exporter(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            metrics::FETCH_BUCKETS,
        )?
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!(%addr, "Prometheus exporter listening");
    Ok(())
}

async fn open_stores(
    config: &AppConfig,
) -> anyhow::Result<(Arc<dyn CatalogStore>, Arc<dyn GraphStore>)> {
    match &config.database {
        Some(db) => {
            info!("Connecting to database...");
            let repository = Arc::new(Repository::new(DbPool::new(db).await?));
            let catalog: Arc<dyn CatalogStore> = repository.clone();
            let graph: Arc<dyn GraphStore> = repository;
            Ok((catalog, graph))
        }
        None => {
            info!("No database configured, using in-memory stores");
            let catalog: Arc<dyn CatalogStore> = Arc::new(MemoryCatalogStore::new());
            let graph: Arc<dyn GraphStore> = Arc::new(MemoryGraphStore::new());
            Ok((catalog, graph))
        }
    }
}
