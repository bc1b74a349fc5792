//! Configuration file handling for the uniclip binary.

use anyhow::{Context, Result};
use clip_client::AppConfig;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.toml";

/// Path of the configuration file in `data_dir`.
pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE)
}

/// Check if the device is initialized.
pub fn exists(data_dir: &Path) -> bool {
    config_path(data_dir).exists()
}

/// Load the configuration from `data_dir`.
pub async fn load(data_dir: &Path) -> Result<AppConfig> {
    let path = config_path(data_dir);
    if !path.exists() {
        anyhow::bail!("Device not initialized. Run 'uniclip init' first.");
    }
    AppConfig::from_file(&path).context("Invalid configuration")
}

/// Save the configuration to `data_dir`, readable by the owner only.
pub async fn save(config: &AppConfig, data_dir: &Path) -> Result<()> {
    let path = config_path(data_dir);
    config
        .save(&path)
        .context("Failed to save configuration")?;
    set_file_permissions_0600(&path).await?;
    Ok(())
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
async fn set_file_permissions_0600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .context("Failed to set file permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
