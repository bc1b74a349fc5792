//! Show the stored configuration.

use anyhow::Result;
use std::path::Path;

use crate::config;

/// Run the status command.
pub async fn run(data_dir: &Path) -> Result<()> {
    println!("=== uniclip status ===");
    println!();

    let app_config = match config::load(data_dir).await {
        Ok(app_config) => app_config,
        Err(_) => {
            println!("Device: NOT INITIALIZED");
            println!();
            println!("Run 'uniclip init --stream-url <url> --private-key <key>' to initialize.");
            return Ok(());
        }
    };

    println!("Device:");
    match &app_config.device.device_id {
        Some(id) => println!("  ID:        {}", short(id.as_str())),
        None => println!("  ID:        MISSING"),
    }
    println!("  Sync mode: {}", app_config.device.sync_mode);
    println!();

    let connection = &app_config.connection;
    println!("Connection:");
    println!("  Stream:    {}", connection.stream_url);
    println!(
        "  Retry:     every {} ms within a {} ms budget",
        connection.retry_delay_ms, connection.timeout_ms
    );
    println!();

    println!("Storage:");
    match app_config.download_dir() {
        Ok(dir) => println!("  Downloads: {}", dir.display()),
        Err(e) => println!("  Downloads: {}", e),
    }
    println!(
        "  History:   {} received, {} sent",
        app_config.history.received_capacity, app_config.history.sent_capacity
    );

    if let Err(e) = app_config.validate() {
        println!();
        println!("Warning: {}", e);
    }

    Ok(())
}

fn short(id: &str) -> &str {
    match id.char_indices().nth(16) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}
