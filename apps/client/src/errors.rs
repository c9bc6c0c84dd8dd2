use thiserror::Error;

use crate::session::SessionError;
use crate::transfer::TransferError;

/// Application-level error type. Every failure is caught at the command
/// layer and converted to a user-visible, non-crashing message via
/// [`ClientError::user_message`]; nothing leaves a component silently
/// un-surfaced.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not authenticated")]
    Unauthenticated,

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("presign response missing destination or fields")]
    PresignMissing,

    #[error("storage rejected the upload (status {status})")]
    StorageRejected { status: u16 },

    #[error("upload confirmation rejected")]
    ConfirmRejected,

    #[error("download address unavailable")]
    DownloadUnavailable,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ClientError {
    /// Maps each variant to a stable code and the message shown to the
    /// user. Internal classes log their full detail here so diagnosis never
    /// depends on what the user happened to see.
    pub fn user_message(&self) -> (&'static str, String) {
        match self {
            ClientError::Unauthenticated
            | ClientError::Transfer(TransferError::Unauthenticated) => (
                "UNAUTHENTICATED",
                "You are not logged in. Please log in first.".to_string(),
            ),
            ClientError::Validation(msg) => ("VALIDATION_ERROR", msg.clone()),
            ClientError::Transfer(TransferError::Network(e)) => {
                tracing::error!("network error: {e}");
                (
                    "NETWORK_ERROR",
                    "Network error. Please try again.".to_string(),
                )
            }
            ClientError::Transfer(TransferError::Http { status, body }) => {
                tracing::error!("API error {status}: {body}");
                let message = match *status {
                    401 | 403 => "Your session is no longer valid. Please log in again.".to_string(),
                    409 => "That account is already registered.".to_string(),
                    _ => format!("The server rejected the request (status {status})."),
                };
                ("HTTP_ERROR", message)
            }
            ClientError::Transfer(TransferError::Upload { status, raw_body }) => {
                tracing::error!("storage error {status}: {raw_body}");
                (
                    "STORAGE_REJECTED",
                    "Upload failed. Please try again.".to_string(),
                )
            }
            ClientError::Transfer(TransferError::Decode(e)) => {
                tracing::error!("decode error: {e}");
                (
                    "DECODE_ERROR",
                    "Unexpected response from the server.".to_string(),
                )
            }
            ClientError::PresignMissing => (
                "PRESIGN_MISSING",
                "Upload failed. Please try again.".to_string(),
            ),
            ClientError::StorageRejected { status } => {
                tracing::error!("storage rejected upload (status {status})");
                (
                    "STORAGE_REJECTED",
                    "Upload failed. Please try again.".to_string(),
                )
            }
            ClientError::ConfirmRejected => (
                "CONFIRM_REJECTED",
                "Upload failed. Please try again.".to_string(),
            ),
            ClientError::DownloadUnavailable => (
                "DOWNLOAD_UNAVAILABLE",
                "The resume file is not available for download.".to_string(),
            ),
            ClientError::Session(e) => {
                tracing::error!("session storage error: {e}");
                (
                    "SESSION_ERROR",
                    "Could not save your session locally.".to_string(),
                )
            }
            ClientError::Internal(e) => {
                tracing::error!("internal error: {e:?}");
                (
                    "INTERNAL_ERROR",
                    "An internal error occurred.".to_string(),
                )
            }
        }
    }
}
