/// Identity service calls. Login and registration are the only requests
/// that go out without a credential attached; a successful login hands the
/// issued token straight to the session store.
use tracing::{debug, info};

use crate::errors::ClientError;
use crate::models::auth::{LoginRequest, RegisterRequest, TokenResponse};
use crate::session::SessionStore;
use crate::transfer::{TransferClient, TransferError};

pub async fn login(
    transfer: &TransferClient,
    session: &SessionStore,
    username: &str,
    password: &str,
) -> Result<(), ClientError> {
    let raw = transfer
        .post_public("/api/auth/login", &LoginRequest { username, password })
        .await?;
    let token: TokenResponse = serde_json::from_value(raw).map_err(TransferError::Decode)?;
    debug!(
        "issued {} token",
        token.token_type.as_deref().unwrap_or("bearer")
    );

    session.login(&token.access_token)?;
    info!("logged in as {username}");
    Ok(())
}

pub async fn register(
    transfer: &TransferClient,
    username: &str,
    email: &str,
    password: &str,
) -> Result<(), ClientError> {
    transfer
        .post_public(
            "/api/auth/register",
            &RegisterRequest {
                username,
                email,
                password,
            },
        )
        .await?;
    info!("registered {email}");
    Ok(())
}
