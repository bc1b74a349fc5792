//! Run clipboard sync until interrupted.

use anyhow::{Context, Result};
use clip_client::{AppConfig, AppContext, AppEvent, ClipboardBackend, MockTransport, Transport};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use crate::config;

/// Run the run command.
pub async fn run(data_dir: &Path, use_mock: bool) -> Result<()> {
    let app_config = config::load(data_dir).await?;

    if !use_mock {
        anyhow::bail!("No network transport is built in. Use --mock for the loopback transport.");
    }

    // Own publishes come back like on a real stream, exercising echo filtering
    let transport = MockTransport::new().with_reflection();
    let backend = clipboard_backend()?;
    run_app(&app_config, transport, backend).await
}

#[cfg(feature = "system-clipboard")]
fn clipboard_backend() -> Result<Arc<clip_client::SystemClipboard>> {
    let clipboard =
        clip_client::SystemClipboard::new().context("Failed to open the system clipboard")?;
    Ok(Arc::new(clipboard))
}

#[cfg(not(feature = "system-clipboard"))]
fn clipboard_backend() -> Result<Arc<clip_client::MemoryClipboard>> {
    println!("Built without system-clipboard; syncing an in-memory clipboard.");
    Ok(Arc::new(clip_client::MemoryClipboard::new()))
}

async fn run_app<T: Transport, B: ClipboardBackend>(
    app_config: &AppConfig,
    transport: T,
    backend: Arc<B>,
) -> Result<()> {
    let (mut app, events) =
        AppContext::new(app_config, transport, backend).context("Invalid configuration")?;

    let printer = tokio::spawn(print_events(events));

    println!("Syncing {} in {} mode", app.connection().stream(), app.sync_mode());
    app.start().await.context("Failed to start")?;
    println!("Press Ctrl+C to stop");

    app.run_until(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    })
    .await;

    drop(app);
    printer.await.ok();
    info!("Stopped");
    Ok(())
}

async fn print_events(mut events: mpsc::UnboundedReceiver<AppEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            AppEvent::Notification { title, body } => println!("{}: {}", title, body),
            AppEvent::FileReceived { name, path } => {
                println!("Saved {} to {}", name, path.display())
            }
            AppEvent::ReconnectAvailable => {
                println!("Not connected. Restart to retry.")
            }
            AppEvent::Refresh => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn run_requires_init() {
        let dir = tempdir().unwrap();
        assert!(run(dir.path(), true).await.is_err());
    }

    #[tokio::test]
    async fn run_without_mock_is_rejected() {
        let dir = tempdir().unwrap();
        crate::commands::init::run(dir.path(), "stream", "key", None)
            .await
            .unwrap();

        let err = run(dir.path(), false).await.unwrap_err();
        assert!(err.to_string().contains("--mock"));
    }
}
