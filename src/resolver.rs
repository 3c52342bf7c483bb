//! ENS text record resolution
//!
//! The current snapshot's content id is published as a text record on an ENS
//! name. Resolving it takes two read-only calls: find the name's resolver in
//! the ENS registry, then ask that resolver for the text record.

use crate::config::Config;
use crate::error::{ResolutionError, YapError, YapResult};
use async_trait::async_trait;
use ethers::abi::{self, ParamType, Token};
use ethers::providers::{ens, Http, Middleware, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Read-only access to a decentralized naming service
#[async_trait]
pub trait NameService: Send + Sync {
    /// Resolver contract for `name`, or `None` if the name has none
    async fn find_resolver(&self, name: &str) -> Result<Option<Address>, ResolutionError>;

    /// Text record `key` of `name` on `resolver`, or `None` if unset or empty
    async fn text_record(
        &self,
        resolver: Address,
        name: &str,
        key: &str,
    ) -> Result<Option<String>, ResolutionError>;
}

/// ENS over Ethereum JSON-RPC
#[derive(Debug, Clone)]
pub struct EnsNameService {
    provider: Provider<Http>,
    registry: Address,
}

impl EnsNameService {
    /// Connect to the mainnet ENS registry through `rpc_url`
    pub fn new(rpc_url: &str) -> YapResult<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| YapError::ConfigError(format!("Invalid RPC URL {}: {}", rpc_url, e)))?;

        Ok(Self {
            provider,
            registry: ens::ENS_ADDRESS,
        })
    }

    async fn call(&self, tx: TypedTransaction) -> Result<Bytes, ResolutionError> {
        self.provider
            .call(&tx, None)
            .await
            .map_err(|e| ResolutionError::Provider(e.to_string()))
    }
}

fn decode_single(kind: ParamType, data: &[u8]) -> Result<Token, ResolutionError> {
    abi::decode(&[kind], data)
        .map_err(|e| ResolutionError::Provider(format!("Failed to decode response: {}", e)))?
        .into_iter()
        .next()
        .ok_or_else(|| ResolutionError::Provider("Empty response".into()))
}

#[async_trait]
impl NameService for EnsNameService {
    async fn find_resolver(&self, name: &str) -> Result<Option<Address>, ResolutionError> {
        let data = self.call(ens::get_resolver(self.registry, name).into()).await?;
        let resolver = decode_single(ParamType::Address, &data)?.into_address();

        Ok(resolver.filter(|address| !address.is_zero()))
    }

    async fn text_record(
        &self,
        resolver: Address,
        name: &str,
        key: &str,
    ) -> Result<Option<String>, ResolutionError> {
        let parameters = ens::parameterhash(key);
        let tx = ens::resolve(resolver, ens::FIELD_SELECTOR, name, Some(parameters.as_slice()));
        let data = self.call(tx.into()).await?;
        let value = decode_single(ParamType::String, &data)?.into_string();

        Ok(value.filter(|v| !v.trim().is_empty()))
    }
}

/// Resolves a name record to a content id with a bounded wait per call.
/// Makes a single attempt; retrying is the caller's business.
pub struct NameRecordResolver {
    service: Arc<dyn NameService>,
    timeout: Duration,
}

impl NameRecordResolver {
    pub fn new(service: Arc<dyn NameService>, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    /// Build from config with the ENS JSON-RPC service
    pub fn from_config(config: &Config) -> YapResult<Self> {
        Ok(Self::new(
            Arc::new(EnsNameService::new(&config.rpc_url)?),
            config.resolve_timeout(),
        ))
    }

    /// Content id currently published under `name`/`key`
    pub async fn resolve_content_id(&self, name: &str, key: &str) -> Result<String, ResolutionError> {
        self.current_record(name, key)
            .await?
            .ok_or_else(|| ResolutionError::NoRecord {
                name: name.to_string(),
                key: key.to_string(),
            })
    }

    /// Like [`resolve_content_id`](Self::resolve_content_id) but an unset
    /// record is `Ok(None)`. A missing resolver is still an error.
    pub async fn current_record(
        &self,
        name: &str,
        key: &str,
    ) -> Result<Option<String>, ResolutionError> {
        let resolver = self
            .bounded(self.service.find_resolver(name))
            .await?
            .ok_or_else(|| ResolutionError::NoResolver(name.to_string()))?;
        debug!(name, ?resolver, "found resolver");

        let record = self.bounded(self.service.text_record(resolver, name, key)).await?;
        Ok(record
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty()))
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, ResolutionError>>,
    ) -> Result<T, ResolutionError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| ResolutionError::Timeout(self.timeout))?
    }
}
