//! Snapshot retrieval from IPFS gateways
//!
//! Gateways are tried one at a time in configured order. Each gets exactly one
//! timed GET per sweep; the first one that answers 2xx with a body that parses
//! as a [`DataSnapshot`] wins. A 200 with an unparseable body counts as a
//! failure of that gateway, never as data.

use crate::config::Config;
use crate::error::{GatewayFailure, GatewayFailureReason, YapError, YapResult};
use crate::snapshot::DataSnapshot;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const IPFS_SCHEME: &str = "ipfs://";

/// Status and body of a completed GET
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("{0}")]
    Network(String),
}

/// Minimal HTTP GET used by [`GatewayFetcher`]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> Result<TransportResponse, TransportError>;
}

/// `reqwest`-backed transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> YapResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("yapscope/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| YapError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

fn transport_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(e.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, timeout: Duration) -> Result<TransportResponse, TransportError> {
        // The request timeout covers reading the body as well
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(transport_error)?;

        Ok(TransportResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// Fallback-ordered fetcher over a fixed gateway list
pub struct GatewayFetcher {
    gateways: Vec<String>,
    timeout: Duration,
    transport: Arc<dyn HttpTransport>,
}

impl GatewayFetcher {
    /// Create a fetcher. An empty gateway list is a configuration error.
    pub fn new(
        gateways: Vec<String>,
        timeout: Duration,
        transport: Arc<dyn HttpTransport>,
    ) -> YapResult<Self> {
        if gateways.is_empty() {
            return Err(YapError::ConfigError(
                "At least one gateway must be configured".into(),
            ));
        }

        Ok(Self {
            gateways,
            timeout,
            transport,
        })
    }

    /// Build from config with the `reqwest` transport
    pub fn from_config(config: &Config) -> YapResult<Self> {
        Self::new(
            config.gateways.clone(),
            config.fetch_timeout(),
            Arc::new(ReqwestTransport::new()?),
        )
    }

    /// Fetch and parse the snapshot named by `content_id`.
    ///
    /// Fails with [`YapError::AllGatewaysFailed`] carrying one entry per gateway
    /// when none of them produced a valid snapshot.
    pub async fn fetch_content(&self, content_id: &str) -> YapResult<DataSnapshot> {
        let content_id = normalize_content_id(content_id)?;
        let mut failures = Vec::with_capacity(self.gateways.len());

        for gateway in &self.gateways {
            match self.try_gateway(gateway, content_id).await {
                Ok(snapshot) => {
                    info!(
                        gateway = %gateway,
                        content_id,
                        records = snapshot.len(),
                        "fetched snapshot"
                    );
                    return Ok(snapshot);
                }
                Err(reason) => {
                    warn!(gateway = %gateway, content_id, %reason, "gateway failed");
                    failures.push(GatewayFailure {
                        gateway: gateway.clone(),
                        reason,
                    });
                }
            }
        }

        Err(YapError::AllGatewaysFailed { failures })
    }

    /// Repeat the full gateway sweep up to `attempts` times, sleeping
    /// `attempt * base_delay` before each retry. Content that was just pinned
    /// can take a while to propagate to public gateways.
    pub async fn fetch_with_retries(
        &self,
        content_id: &str,
        attempts: u32,
        base_delay: Duration,
    ) -> YapResult<DataSnapshot> {
        let attempts = attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.fetch_content(content_id).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(e @ YapError::AllGatewaysFailed { .. }) if attempt < attempts => {
                    attempt += 1;
                    let delay = base_delay * attempt;
                    warn!(attempt, attempts, ?delay, error = %e, "retrying gateway sweep");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_gateway(
        &self,
        gateway: &str,
        content_id: &str,
    ) -> Result<DataSnapshot, GatewayFailureReason> {
        let url = gateway_url(gateway, content_id);
        debug!(url = %url, "trying gateway");

        let response = self
            .transport
            .get(&url, self.timeout)
            .await
            .map_err(|e| match e {
                TransportError::Timeout => GatewayFailureReason::Timeout,
                TransportError::Network(msg) => GatewayFailureReason::Network(msg),
            })?;

        if !response.is_success() {
            return Err(GatewayFailureReason::Status(response.status));
        }

        DataSnapshot::from_slice(&response.body)
            .map_err(|e| GatewayFailureReason::MalformedPayload(e.to_string()))
    }
}

/// Strip whitespace and an optional `ipfs://` prefix; reject empty ids
fn normalize_content_id(content_id: &str) -> YapResult<&str> {
    let trimmed = content_id.trim();
    let id = trimmed.strip_prefix(IPFS_SCHEME).unwrap_or(trimmed);
    if id.is_empty() {
        return Err(YapError::InvalidContentId(content_id.to_string()));
    }
    Ok(id)
}

/// `{gateway}{content_id}`, inserting the separator if the base lacks one
pub fn gateway_url(gateway: &str, content_id: &str) -> String {
    if gateway.ends_with('/') {
        format!("{}{}", gateway, content_id)
    } else {
        format!("{}/{}", gateway, content_id)
    }
}
