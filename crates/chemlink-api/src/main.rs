use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chemlink_api::{router, AppState};
use chemlink_convert::{Canonicalizer, ConversionPipeline, OpenBabelConvertor};
use chemlink_core::defaults::SERVER_PORT;
use chemlink_core::ChemicalIndex;
use chemlink_db::{create_pool_with_config, BingoChemicalIndex, PoolConfig};
use chemlink_engines::{EmbeddedEngine, IndigoToolkit, OpenBabel};
use chemlink_search::{
    FileChemicalIndex, IndexScheduler, SchedulerConfig, SearchConfig, SearchRepository,
    SearchService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        concat!(
            "chemlink_api=debug,chemlink_convert=info,chemlink_search=info,",
            "chemlink_engines=info,tower_http=debug"
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(env_filter);

    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("chemlink-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(SERVER_PORT);

    // Engines
    let obabel = Arc::new(OpenBabel::from_env()?);
    let banner = obabel
        .verify_version()
        .await
        .context("obabel version check failed")?;
    info!(subsystem = "api", program = obabel.program(), banner = %banner, "Open Babel verified");

    let embedded = EmbeddedEngine::new(Arc::new(IndigoToolkit::from_env()?));
    info!(subsystem = "api", toolkit = embedded.name(), "Embedded toolkit loaded");

    // Search
    let search_config = SearchConfig::from_env()?;
    let index: Arc<dyn ChemicalIndex> = match search_config.repository {
        SearchRepository::File => Arc::new(FileChemicalIndex::new(
            search_config.file_dir.clone(),
            obabel.clone(),
        )),
        SearchRepository::Bingo => {
            let pool =
                create_pool_with_config(&search_config.database_url, PoolConfig::from_env())
                    .await?;
            Arc::new(BingoChemicalIndex::new(pool))
        }
    };
    info!(subsystem = "api", index = index.name(), "Search repository selected");

    let conversion = ConversionPipeline::standard(obabel.clone(), embedded.clone());
    let canonicalizer = Canonicalizer::new(
        embedded.clone(),
        conversion.clone(),
        Arc::new(OpenBabelConvertor::new(obabel.clone())),
    );
    let search = SearchService::new(canonicalizer, index.clone());
    search.initialize().await?;

    let scheduler_config = SchedulerConfig::from_env();
    let enabled = scheduler_config.enabled;
    let scheduler = Arc::new(IndexScheduler::new(index, scheduler_config).start());

    let mut state = AppState::from_engines(conversion, obabel, embedded, search);
    if enabled {
        state = state.with_scheduler(scheduler.clone());
    }

    let app = router(state);
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await.ok();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
