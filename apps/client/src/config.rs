use std::path::PathBuf;

use anyhow::{Context, Result};

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub credential_path: PathBuf,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            api_base_url: require_env("API_BASE_URL")?
                .trim_end_matches('/')
                .to_string(),
            credential_path: match std::env::var("CREDENTIAL_PATH") {
                Ok(path) => PathBuf::from(path),
                Err(_) => default_credential_path()?,
            },
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn default_credential_path() -> Result<PathBuf> {
    let home =
        std::env::var("HOME").context("HOME is not set and CREDENTIAL_PATH was not provided")?;
    Ok(PathBuf::from(home).join(".jobmatch").join("credential.json"))
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
