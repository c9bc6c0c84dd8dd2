/// Transfer client: the single point of entry for all network I/O in the
/// job-match client.
///
/// ARCHITECTURAL RULE: No other module may talk to a backend directly.
/// Three primitives cover every interaction: an authenticated JSON request,
/// a direct multipart upload to a presigned storage target, and a status
/// notification to the processing service. Isolating them lets the upload
/// orchestrator read as a plain sequence of calls with explicit failure
/// points instead of embedding transport handling at each call site.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Method};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::resume::UploadTarget;
use crate::session::SessionStore;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Field name the storage policy expects the file payload under.
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Error)]
pub enum TransferError {
    /// No credential available for a request that requires one. The request
    /// is never sent; an unauthenticated call against an auth-requiring
    /// target would only produce a confusing server-side rejection.
    #[error("not authenticated")]
    Unauthenticated,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("request failed (status {status})")]
    Http { status: u16, body: String },

    #[error("storage rejected the upload (status {status})")]
    Upload { status: u16, raw_body: String },

    #[error("response decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The three network primitives the rest of the client is built on.
/// Object-safe so orchestration logic can be exercised against
/// instrumented fakes.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Authenticated JSON request against the application API. Fails fast
    /// with [`TransferError::Unauthenticated`] when no credential is held.
    async fn request_json(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        query: &[(&str, String)],
    ) -> Result<Value, TransferError>;

    /// Direct multipart POST of the file bytes to a presigned storage
    /// target, bypassing the application server for the payload.
    async fn direct_upload(
        &self,
        target: &UploadTarget,
        file_bytes: Bytes,
        file_name: &str,
    ) -> Result<(), TransferError>;

    /// Informs the processing service of a client-observed state change.
    async fn notify_status(
        &self,
        resume_id: Uuid,
        status: &str,
        progress: Option<f64>,
    ) -> Result<Value, TransferError>;
}

/// reqwest-backed [`Transport`]. One shared client with a request timeout;
/// the credential is read from the session store on every call.
pub struct TransferClient {
    http: Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl TransferClient {
    pub fn new(base_url: impl Into<String>, session: Arc<SessionStore>) -> Self {
        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("failed to build HTTP client"),
            base_url: base_url.into(),
            session,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Unauthenticated POST used by the identity endpoints (login and
    /// registration run before any credential exists). Everything else goes
    /// through [`Transport::request_json`].
    pub async fn post_public<T: Serialize + Sync>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Value, TransferError> {
        let response = self.http.post(self.url(path)).json(body).send().await?;
        read_json(response).await
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value, TransferError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!("API returned {status}: {body}");
        return Err(TransferError::Http {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json().await?)
}

#[async_trait]
impl Transport for TransferClient {
    async fn request_json(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        query: &[(&str, String)],
    ) -> Result<Value, TransferError> {
        let token = self
            .session
            .credential()
            .ok_or(TransferError::Unauthenticated)?;

        let mut request = self.http.request(method, self.url(path)).bearer_auth(token);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        read_json(response).await
    }

    async fn direct_upload(
        &self,
        target: &UploadTarget,
        file_bytes: Bytes,
        file_name: &str,
    ) -> Result<(), TransferError> {
        // Server-issued fields go in first, verbatim, then the file part
        // under the fixed field name. No manual Content-Type header: the
        // boundary must come from the multipart encoder, since storage
        // signature validation is sensitive to the exact framing.
        let mut form = reqwest::multipart::Form::new();
        for (name, value) in &target.fields {
            form = form.text(name.clone(), value.clone());
        }
        let part =
            reqwest::multipart::Part::bytes(file_bytes.to_vec()).file_name(file_name.to_string());
        form = form.part(FILE_FIELD, part);

        let response = self
            .http
            .post(&target.destination)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // Storage errors are provider-specific XML; keep the raw body
            // for diagnosis.
            let raw_body = response.text().await.unwrap_or_default();
            warn!("storage rejected upload ({status}): {raw_body}");
            return Err(TransferError::Upload {
                status: status.as_u16(),
                raw_body,
            });
        }

        debug!("direct upload accepted ({status})");
        Ok(())
    }

    async fn notify_status(
        &self,
        resume_id: Uuid,
        status: &str,
        progress: Option<f64>,
    ) -> Result<Value, TransferError> {
        let mut query = vec![("status", status.to_string())];
        if let Some(progress) = progress {
            query.push(("progress", progress.to_string()));
        }
        self.request_json(
            Method::PUT,
            &format!("/api/resume/{resume_id}/status"),
            None,
            &query,
        )
        .await
    }
}
