//! Initialize device identity and configuration.

use anyhow::Result;
use clip_client::AppConfig;
use clip_types::DeviceId;
use std::path::{Path, PathBuf};

use crate::config;

/// Run the init command.
pub async fn run(
    data_dir: &Path,
    stream_url: &str,
    private_key: &str,
    download_dir: Option<PathBuf>,
) -> Result<()> {
    // Check if already initialized
    if config::exists(data_dir) {
        anyhow::bail!(
            "Device already initialized. Delete {} to reinitialize.",
            config::config_path(data_dir).display()
        );
    }

    let mut app_config = AppConfig::default();
    let device_id = DeviceId::generate();
    app_config.device.device_id = Some(device_id.clone());
    app_config.connection.stream_url = stream_url.to_string();
    app_config.connection.private_key = private_key.to_string();
    app_config.storage.download_dir = download_dir;
    app_config.validate()?;
    config::save(&app_config, data_dir).await?;

    println!("Device initialized successfully!");
    println!();
    println!("  Device ID: {}", device_id);
    println!("  Stream:    {}", stream_url);
    println!("  Config:    {}", config::config_path(data_dir).display());
    println!();
    println!("Next steps:");
    println!("  1. Start syncing: uniclip run");
    println!("  2. Or only sync on request: uniclip sync-mode manual");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn init_creates_config() {
        let dir = tempdir().unwrap();
        run(dir.path(), "0xabc/clipboard", "secret", None)
            .await
            .unwrap();

        let loaded = config::load(dir.path()).await.unwrap();
        assert_eq!(loaded.connection.stream_url, "0xabc/clipboard");
        assert!(loaded.device.device_id.is_some());
        assert!(loaded.validate().is_ok());
    }

    #[tokio::test]
    async fn init_fails_if_already_initialized() {
        let dir = tempdir().unwrap();

        // First init should succeed
        run(dir.path(), "stream-1", "key", None).await.unwrap();

        // Second init should fail
        let result = run(dir.path(), "stream-2", "key", None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn init_rejects_empty_credentials() {
        let dir = tempdir().unwrap();
        let result = run(dir.path(), "stream", "   ", None).await;

        assert!(result.is_err());
        assert!(!config::exists(dir.path()));
    }
}
