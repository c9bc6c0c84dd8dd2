use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::guard::Screen;

/// Durable credentials are kept for 7 days, mirroring the session cookie
/// retention on the hosted client.
const RETENTION_DAYS: i64 = 7;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to persist credential: {0}")]
    Persist(#[source] std::io::Error),

    #[error("failed to encode credential: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredCredential {
    token: String,
    saved_at: DateTime<Utc>,
}

impl StoredCredential {
    fn expired(&self, now: DateTime<Utc>) -> bool {
        now - self.saved_at > Duration::days(RETENTION_DAYS)
    }
}

/// Owns the bearer credential and the authenticated signal. All credential
/// reads go through [`SessionStore::credential`] so the missing-credential
/// fail-fast stays centralized; collaborators observe session changes
/// through the watch channels instead of polling.
pub struct SessionStore {
    path: PathBuf,
    credential: RwLock<Option<StoredCredential>>,
    auth_tx: watch::Sender<bool>,
    nav_tx: watch::Sender<Screen>,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (auth_tx, _) = watch::channel(false);
        let (nav_tx, _) = watch::channel(Screen::Login);
        Self {
            path: path.into(),
            credential: RwLock::new(None),
            auth_tx,
            nav_tx,
        }
    }

    /// Reads any persisted credential at startup. Authenticated iff a
    /// non-empty, unexpired credential is found; an expired one is removed
    /// and the session starts logged out.
    pub fn initialize(&self) {
        let stored = fs::read_to_string(&self.path)
            .ok()
            .and_then(|raw| serde_json::from_str::<StoredCredential>(&raw).ok());

        let stored = match stored {
            Some(credential) if credential.token.is_empty() => None,
            Some(credential) if credential.expired(Utc::now()) => {
                info!("persisted credential expired, removing");
                let _ = fs::remove_file(&self.path);
                None
            }
            other => other,
        };

        let authenticated = stored.is_some();
        if authenticated {
            debug!("restored persisted session");
        }
        *self.credential.write().expect("session lock poisoned") = stored;
        self.auth_tx.send_replace(authenticated);
    }

    /// Stores the credential durably and signals navigation to the main
    /// screen. Overwrites any prior credential (last write wins).
    pub fn login(&self, token: &str) -> Result<(), SessionError> {
        let stored = StoredCredential {
            token: token.to_string(),
            saved_at: Utc::now(),
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(SessionError::Persist)?;
        }
        let raw = serde_json::to_string(&stored)?;
        fs::write(&self.path, raw).map_err(SessionError::Persist)?;

        *self.credential.write().expect("session lock poisoned") = Some(stored);
        self.auth_tx.send_replace(true);
        self.nav_tx.send_replace(Screen::Dashboard);
        Ok(())
    }

    /// Erases the durable credential and signals navigation to the entry
    /// screen. Always succeeds: no network call is involved, and a missing
    /// credential file is already the desired end state.
    pub fn logout(&self) {
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!("could not remove credential file: {err}");
            }
        }
        *self.credential.write().expect("session lock poisoned") = None;
        self.auth_tx.send_replace(false);
        self.nav_tx.send_replace(Screen::Login);
    }

    /// The single accessor outgoing requests read the credential through.
    pub fn credential(&self) -> Option<String> {
        self.credential
            .read()
            .expect("session lock poisoned")
            .as_ref()
            .map(|credential| credential.token.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        *self.auth_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.auth_tx.subscribe()
    }

    pub fn navigation(&self) -> watch::Receiver<Screen> {
        self.nav_tx.subscribe()
    }
}
