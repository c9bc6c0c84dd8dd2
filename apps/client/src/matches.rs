/// Match feed loading: one authenticated fetch per page, normalized once at
/// the ingestion boundary so display logic never sees upstream schema
/// drift.
use std::sync::Arc;

use reqwest::Method;
use tracing::debug;

use crate::errors::ClientError;
use crate::models::matches::{MatchListResponse, MatchView};
use crate::transfer::{TransferError, Transport};

pub struct MatchFeedLoader {
    transport: Arc<dyn Transport>,
}

/// A page of normalized matches. An empty page is a valid displayed state
/// (matching runs asynchronously in the background), not an error.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchFeed {
    pub matches: Vec<MatchView>,
    pub total: u64,
}

impl MatchFeed {
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

impl MatchFeedLoader {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn list(&self, skip: u64, limit: u64) -> Result<MatchFeed, ClientError> {
        let raw = self
            .transport
            .request_json(
                Method::GET,
                "/api/matches/",
                None,
                &[("skip", skip.to_string()), ("limit", limit.to_string())],
            )
            .await?;
        let response: MatchListResponse =
            serde_json::from_value(raw).map_err(TransferError::Decode)?;
        debug!(
            "fetched {} of {} matches",
            response.matches.len(),
            response.total
        );
        Ok(MatchFeed {
            total: response.total,
            matches: response
                .matches
                .into_iter()
                .map(|record| record.normalize())
                .collect(),
        })
    }
}
