#![allow(dead_code)]

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Server-side lifecycle of an uploaded document. Transitions are monotonic
/// forward; `failed` is reachable from any non-terminal state and terminal,
/// `parsed` is terminal-success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResumeStatus {
    Pending,
    Uploaded,
    Processing,
    Parsed,
    Failed,
}

impl ResumeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ResumeStatus::Parsed | ResumeStatus::Failed)
    }

    pub fn label(self) -> &'static str {
        match self {
            ResumeStatus::Pending => "pending",
            ResumeStatus::Uploaded => "uploaded",
            ResumeStatus::Processing => "processing",
            ResumeStatus::Parsed => "parsed",
            ResumeStatus::Failed => "failed",
        }
    }
}

/// Read-mostly snapshot of one uploaded document, as reported by the resume
/// service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeRecord {
    pub id: Uuid,
    pub original_filename: String,
    pub file_size: Option<u64>,
    pub status: ResumeStatus,
    #[serde(default)]
    pub upload_progress: f64,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResumeListResponse {
    pub resumes: Vec<ResumeRecord>,
    #[serde(default)]
    pub total: u64,
}

fn default_expiry() -> u64 {
    3600
}

/// Wire shape of the presign response. The URL and field map are validated
/// into an [`UploadTarget`]; their absence is a hard failure, not a soft
/// default.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadUrlResponse {
    pub resume_id: Uuid,
    pub upload_url: Option<String>,
    pub upload_fields: Option<HashMap<String, String>>,
    #[serde(default = "default_expiry")]
    pub expires_in: u64,
}

impl UploadUrlResponse {
    pub fn into_target(self) -> Option<UploadTarget> {
        match (self.upload_url, self.upload_fields) {
            (Some(destination), Some(fields)) if !destination.is_empty() => Some(UploadTarget {
                resume_id: self.resume_id,
                destination,
                fields,
                expires_in: self.expires_in,
            }),
            _ => None,
        }
    }
}

/// Short-lived, single-use capability authorizing a direct upload to object
/// storage. Never persisted.
#[derive(Debug, Clone)]
pub struct UploadTarget {
    pub resume_id: Uuid,
    pub destination: String,
    /// Server-issued form fields, forwarded verbatim (order irrelevant).
    pub fields: HashMap<String, String>,
    pub expires_in: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadUrlResponse {
    pub url: Option<String>,
    #[serde(default = "default_expiry")]
    pub expires_in: u64,
}
