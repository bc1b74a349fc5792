//! Switch the persisted sync mode.

use anyhow::Result;
use clip_client::SyncMode;
use std::path::Path;

use crate::config;

/// Run the sync-mode command.
pub async fn run(data_dir: &Path, mode: SyncMode) -> Result<()> {
    let mut app_config = config::load(data_dir).await?;

    if app_config.device.sync_mode == mode {
        println!("Sync mode already {}", mode);
        return Ok(());
    }

    app_config.device.sync_mode = mode;
    config::save(&app_config, data_dir).await?;
    println!("Sync mode set to {}", mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn sync_mode_is_persisted() {
        let dir = tempdir().unwrap();
        crate::commands::init::run(dir.path(), "stream", "key", None)
            .await
            .unwrap();

        run(dir.path(), SyncMode::Manual).await.unwrap();

        let loaded = config::load(dir.path()).await.unwrap();
        assert_eq!(loaded.device.sync_mode, SyncMode::Manual);
    }

    #[tokio::test]
    async fn sync_mode_requires_init() {
        let dir = tempdir().unwrap();
        assert!(run(dir.path(), SyncMode::Manual).await.is_err());
    }
}
