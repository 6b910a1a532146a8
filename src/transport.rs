//! Transport layer - fetches delegation operations from the TzKT API.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{Result, ServiceError};

/// Default page size requested from TzKT.
pub const DEFAULT_PAGE_LIMIT: u32 = 1000;

/// Raw delegation record as returned by the TzKT API.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDelegation {
    pub id: i64,
    pub timestamp: String,
    #[serde(default)]
    pub amount: i64,
    pub sender: Sender,
    pub level: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sender {
    pub address: String,
}

/// Capability interface over the remote delegation source.
///
/// `cursor` maps to a "strictly greater than" timestamp filter and
/// `offset` to a pagination skip count; both are omitted from the
/// request when zero/empty. Implementations own page sizing and
/// request timeouts.
#[async_trait]
pub trait DelegationSource: Send + Sync {
    /// Fetch one ordered batch of delegations, possibly empty.
    async fn fetch(&self, offset: u64, cursor: &str) -> Result<Vec<RawDelegation>>;
}

/// HTTP client for the TzKT delegations endpoint.
pub struct TzktClient {
    base_url: String,
    page_limit: u32,
    http: reqwest::Client,
}

impl TzktClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_page_limit(base_url, DEFAULT_PAGE_LIMIT)
    }

    pub fn with_page_limit(base_url: impl Into<String>, page_limit: u32) -> Self {
        Self {
            base_url: base_url.into(),
            page_limit,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl DelegationSource for TzktClient {
    async fn fetch(&self, offset: u64, cursor: &str) -> Result<Vec<RawDelegation>> {
        let url = format!("{}/v1/operations/delegations", self.base_url);

        let mut query: Vec<(&str, String)> = vec![
            ("limit", self.page_limit.to_string()),
            ("sort.asc", "timestamp".to_string()),
        ];
        if !cursor.is_empty() {
            query.push(("timestamp.gt", cursor.to_string()));
        }
        if offset > 0 {
            query.push(("offset", offset.to_string()));
        }

        let response = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| ServiceError::Transport(format!("TzKT request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Transport(format!(
                "Unexpected status code: {}",
                status.as_u16()
            )));
        }

        response
            .json::<Vec<RawDelegation>>()
            .await
            .map_err(|e| ServiceError::Transport(format!("Failed to decode TzKT response: {}", e)))
    }
}
