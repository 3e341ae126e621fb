use std::sync::Arc;

use tracing::info;

use hourglass::clock::SystemClock;
use hourglass::config::Config;
use hourglass::directory::StaticDirectory;
use hourglass::engine::Engine;
use hourglass::notify::NotifyHub;
use hourglass::scheduler;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    hourglass::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;

    // Listings and users are mirrored in by the embedding service.
    let directory = Arc::new(StaticDirectory::new());
    let engine = Arc::new(Engine::new(
        config.wal_path(),
        directory.clone(),
        directory,
        Arc::new(SystemClock),
        Arc::new(NotifyHub::new()),
    )?);

    info!("hourglass started");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  completion sweep every {:?}", config.completion_interval);
    info!(
        "  compaction after {} appends, checked every {:?}",
        config.compact_threshold, config.compact_interval
    );
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let completer = tokio::spawn(scheduler::run_completer(
        engine.clone(),
        config.completion_interval,
    ));
    let compactor = tokio::spawn(scheduler::run_compactor(
        engine.clone(),
        config.compact_threshold,
        config.compact_interval,
    ));

    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await?;
    }

    info!("shutdown signal received");
    completer.abort();
    compactor.abort();
    if let Err(e) = engine.compact_wal().await {
        tracing::warn!("final compaction failed: {e}");
    }
    info!("hourglass stopped");
    Ok(())
}
