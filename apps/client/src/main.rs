mod auth;
mod cmd;
mod config;
mod errors;
mod guard;
mod matches;
mod models;
mod session;
mod transfer;
mod upload;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::session::SessionStore;
use crate::transfer::TransferClient;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting job-match client v{}", env!("CARGO_PKG_VERSION"));

    let session = Arc::new(SessionStore::new(config.credential_path.clone()));
    session.initialize();

    let transfer = Arc::new(TransferClient::new(
        config.api_base_url.clone(),
        session.clone(),
    ));

    cmd::run(session, transfer).await?;
    Ok(())
}
