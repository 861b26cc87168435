use messenger_demo::APP_DIR_NAME;
use messenger_demo::error::DemoError;
use messenger_demo::logger::initialize as LoggerInitialize;
use messenger_demo::scenario;
use messenger_demo::session::SessionInfo;

use messenger_core::config::MessengerConfig;
use messenger_core::transport::ws::{WsClient, WsHost};

use common::ErrorLocation;

use std::fs::create_dir_all;
use std::panic::Location;
use std::path::PathBuf;

use log::{error, info};
use uuid::Uuid;

#[track_caller]
fn app_dir(base: Option<PathBuf>, kind: &str) -> Result<PathBuf, DemoError> {
    let dir = base
        .map(|base| base.join(APP_DIR_NAME))
        .ok_or_else(|| DemoError::Demo {
            message: format!("No {kind} directory on this platform"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    create_dir_all(&dir).map_err(|e| DemoError::Demo {
        message: format!("Failed to create {kind} directory {}: {e}", dir.display()),
        location: ErrorLocation::from(Location::caller()),
    })?;

    Ok(dir)
}

#[tokio::main]
async fn main() -> Result<(), DemoError> {
    let log_dir = app_dir(dirs::data_local_dir(), "log")?;

    // Initialize logger FIRST
    LoggerInitialize(&log_dir)?;

    info!("Messenger demo starting");
    info!("Log directory: {}", log_dir.display());

    let config_dir = app_dir(dirs::config_dir(), "config")?;
    let config = MessengerConfig::load(&config_dir)?;

    let session = SessionInfo::new(config.transport.port, Uuid::new_v4().to_string());
    info!("Starting messenger host on port {}", session.port());

    let host = WsHost::bind(session.port(), session.auth_token().clone()).await?;
    let session = session.with_port(host.local_addr().port());

    let renderer = WsClient::connect(&session.url()?, session.auth_token()).await?;

    match scenario::run(host.clone(), renderer, &config.channels).await {
        Ok(report) => {
            info!("Scenario finished: {:?}", report);
            host.shutdown();
            Ok(())
        }
        Err(e) => {
            error!("Scenario failed: {}", e);
            host.shutdown();
            Err(e)
        }
    }
}
