//! HTTP block source for a Minter node, backed by `reqwest`.
//!
//! Endpoints used (every response is wrapped in `{ "result": ... }`):
//! - `GET /status`            → `latest_block_height`
//! - `GET /block?height=H`    → raw block
//! - `GET /events?height=H`   → `{ "events": [...] }`
//!
//! Each call is a single attempt; retrying is left to the reader.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use minterwatch_core::error::WatchError;
use minterwatch_core::reader::BlockSource;
use minterwatch_core::types::Block;

use crate::block::{block_from_json, lenient_u64};

/// Strip trailing slashes from a node base URL.
pub fn normalize_endpoint(endpoint: &str) -> String {
    endpoint.trim_end_matches('/').to_string()
}

/// Block source talking to one Minter node over HTTP.
pub struct MinterClient {
    endpoint: String,
    http: reqwest::Client,
}

impl MinterClient {
    /// Create a client for the node at `endpoint`.
    pub fn new(endpoint: &str, request_timeout: Duration) -> Result<Self, WatchError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| WatchError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint: normalize_endpoint(endpoint),
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// GET `{endpoint}/{path}` and unwrap the `result` field.
    async fn get_result(&self, path: &str, height: Option<u64>) -> Result<Value, WatchError> {
        let url = format!("{}/{path}", self.endpoint);
        let mut req = self.http.get(&url);
        if let Some(height) = height {
            req = req.query(&[("height", height)]);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| WatchError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(WatchError::Http(format!("HTTP {status} from {url}: {body}")));
        }

        let mut body = resp
            .json::<Value>()
            .await
            .map_err(|e| WatchError::Decode(format!("{url}: {e}")))?;

        match body.get_mut("result") {
            Some(result) => Ok(result.take()),
            None => Err(WatchError::Decode(format!("{url}: response has no 'result' field"))),
        }
    }
}

#[async_trait]
impl BlockSource for MinterClient {
    async fn setup(&self) -> Result<(), WatchError> {
        self.get_result("status", None).await.map_err(|e| {
            tracing::warn!(endpoint = %self.endpoint, error = %e, "node unreachable");
            WatchError::NotInitialized {
                endpoint: self.endpoint.clone(),
            }
        })?;
        Ok(())
    }

    async fn fetch_head_block_height(&self) -> Result<u64, WatchError> {
        let status = self.get_result("status", None).await?;
        lenient_u64(&status["latest_block_height"]).ok_or_else(|| {
            WatchError::Decode(format!(
                "latest_block_height is not an integer: {}",
                status["latest_block_height"]
            ))
        })
    }

    async fn fetch_block(&self, height: u64) -> Result<Block, WatchError> {
        let raw = self.get_result("block", Some(height)).await?;
        let events = self.get_result("events", Some(height)).await?;
        let events = events["events"].as_array().map(Vec::as_slice).unwrap_or(&[]);
        block_from_json(&raw, events)
    }
}
