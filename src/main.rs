use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use local_llm_gateway::config::export_backend_memory_env;
use local_llm_gateway::{AppConfig, Cli, ModelManager, StubBackend, build_router};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // The backend reads these itself; the gateway only exports defaults.
    // Must run before the runtime spawns worker threads: mutating the
    // environment is unsound once other threads may be reading it.
    export_backend_memory_env();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(serve(cli))
}

async fn serve(cli: Cli) -> anyhow::Result<()> {
    let config = Arc::new(AppConfig::from_cli(&cli)?);
    tracing::info!(
        model = %config.model_id,
        max_cache_size = config.max_cache_size,
        "starting gateway"
    );

    // No ML runtime is linked into this build; serve stub completions so the
    // HTTP surface and editor integrations still work.
    tracing::warn!("no generation runtime linked, serving stub completions");
    let backend = Box::new(StubBackend::new(&config.model_id));
    let manager = Arc::new(ModelManager::new(&config.model_id, backend));

    let router = build_router(manager);

    let listener = TcpListener::bind(config.listen_addr).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "gateway listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("interrupt received, shutting down"),
        Err(err) => {
            tracing::error!(%err, "failed to install interrupt handler");
            std::future::pending::<()>().await;
        }
    }
}

fn init_tracing(verbose: bool) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let default_filter = if verbose {
        "debug,hyper=warn"
    } else {
        "info,hyper=warn,axum::rejection=trace"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
