//! casewise-worker: turns uploaded clinical documents into draft case notes.

mod logging;

use std::sync::Arc;

use tracing::{info, warn};

use casewise_gateway::HttpGateway;
use casewise_jobs::{
    ExtractorConfig, ExtractorRegistry, IntakeWorker, StartupConfig, StartupSequencer,
    WorkerConfig, WorkerEvent,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let log_settings = logging::LogSettings::from_env();
    let _file_guard = logging::init(&log_settings);
    info!(
        log_format = log_settings.format_name(),
        log_file = log_settings
            .file
            .as_deref()
            .and_then(|p| p.to_str())
            .unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let gateway = Arc::new(HttpGateway::from_env()?);

    let extractor_config = ExtractorConfig::from_env();
    let registry = ExtractorRegistry::from_config(&extractor_config);
    for (extractor, healthy) in registry.health_check_all().await {
        if healthy {
            info!(extractor = %extractor, "Extractor available");
        } else {
            warn!(
                extractor = %extractor,
                "Extractor backend unavailable, documents it handles will fail"
            );
        }
    }

    let worker_config = WorkerConfig::from_env();
    info!(
        poll_interval_ms = worker_config.poll_interval_ms,
        enabled = worker_config.enabled,
        processed_dir = ?worker_config.processed_dir,
        "Worker configuration loaded"
    );
    let worker = IntakeWorker::with_gateway(gateway.clone(), registry, worker_config);

    // A failed admin seed ends the process here, before any document is touched.
    let sequencer = StartupSequencer::new(gateway, StartupConfig::from_env());
    let (_report, handle) = sequencer.launch(worker).await?;
    info!("Intake worker launched");

    let mut events = handle.events();
    let event_log = tokio::spawn(async move {
        let mut processed = 0u64;
        let mut failed = 0u64;
        while let Ok(event) = events.recv().await {
            match event {
                WorkerEvent::DocumentProcessed { .. } => processed += 1,
                WorkerEvent::DocumentFailed { .. } => failed += 1,
                WorkerEvent::WorkerStopped => break,
                _ => {}
            }
        }
        (processed, failed)
    });

    shutdown_signal().await;
    info!("Shutdown signal received, finishing current document");

    handle.shutdown();
    handle.join().await?;

    if let Ok((processed, failed)) = event_log.await {
        info!(processed, failed, "Intake worker exited");
    }

    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
