use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

use invoice_intake::config::Config;
use invoice_intake::drop_source::{ChannelDropSource, DropEvent, DropOrigin};
use invoice_intake::notify::LogNotifier;
use invoice_intake::recognizer::http::HttpRecognizer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = Config::from_env().expect("Failed to load configuration");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(&config.log_level)
        }))
        .init();

    tracing::info!("Starting invoice intake");

    let ocr = config
        .ocr
        .clone()
        .ok_or("OCR_API_KEY and OCR_SECRET_KEY must be set")?;
    let recognizer = Arc::new(HttpRecognizer::new(ocr)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let intake = invoice_intake::build_intake(
        &config,
        recognizer,
        Arc::new(LogNotifier),
        shutdown_rx.clone(),
    );

    // Each stdin line is a programmatic append of tab-separated paths. These
    // are not drag-and-drop deliveries, so they skip the drop debounce.
    let (drops, mut source) = ChannelDropSource::new(16);
    let forwarder = match intake.adapter.attach(&mut source, shutdown_rx) {
        Ok(forwarder) => {
            tokio::spawn(read_drops(drops));
            Some(forwarder)
        }
        Err(e) => {
            tracing::warn!("Drop input unavailable: {e}");
            None
        }
    };

    // Command-line arguments behave like a file dialog pick.
    let picked: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    if !picked.is_empty() {
        let outcome = intake
            .adapter
            .handle(DropEvent::new(DropOrigin::Dialog, picked))?;
        tracing::info!("Queued {} file(s) from the command line", outcome.accepted.len());
    }

    let settled = async {
        if let Some(forwarder) = forwarder {
            let _ = forwarder.await;
        }
        intake.processor.wait_idle().await
    };

    tokio::select! {
        _ = shutdown_signal() => {}
        status = settled => {
            tracing::info!("All input processed ({} drain cycle(s))", status.completed_drains);
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = intake.worker.await;

    Ok(())
}

async fn read_drops(drops: mpsc::Sender<DropEvent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let paths: Vec<PathBuf> = line
                    .split('\t')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from)
                    .collect();
                if paths.is_empty() {
                    continue;
                }
                if drops
                    .send(DropEvent::new(DropOrigin::Programmatic, paths))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Failed to read stdin: {e}");
                break;
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, abandoning unfinished items");
}
