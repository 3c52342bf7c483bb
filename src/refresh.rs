//! Snapshot refresh orchestration
//!
//! ```text
//! CheckCache --fresh--> return cached
//!     |
//!  Resolve --fail--> Fallback
//!     |
//!   Fetch  --fail--> Fallback
//!     |
//! WriteCache --> return fetched
//!
//! Fallback: cached entry still in window --> return it (Cached)
//!           cached entry past window     --> return it (Stale)
//!           nothing cached               --> return empty snapshot
//! ```
//!
//! [`RefreshOrchestrator::get_latest_data`] never fails. Every error along the
//! way is logged and absorbed; the worst outcome is the empty snapshot. A
//! failed refresh never clears or overwrites what is already cached.

use crate::cache::{is_fresh, CacheEntry, CacheStore, FileCacheStore};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::YapResult;
use crate::gateway::GatewayFetcher;
use crate::resolver::NameRecordResolver;
use crate::snapshot::DataSnapshot;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Terminal state of one refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Cache was fresh; network untouched
    Fresh,
    /// New snapshot fetched and cached
    Fetched,
    /// Refresh failed; served a cache entry still inside the window
    Cached,
    /// Refresh failed; served a cache entry past the window
    Stale,
    /// Refresh failed and nothing was cached
    Empty,
}

impl RefreshOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshOutcome::Fresh => "fresh cache",
            RefreshOutcome::Fetched => "fetched",
            RefreshOutcome::Cached => "cached",
            RefreshOutcome::Stale => "stale cache",
            RefreshOutcome::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub snapshot: DataSnapshot,
    pub outcome: RefreshOutcome,
}

/// Knobs the orchestrator needs from [`Config`]
#[derive(Debug, Clone)]
pub struct RefreshSettings {
    pub name: String,
    pub key: String,
    pub freshness_window: Duration,
    pub storage_timeout: Duration,
}

impl From<&Config> for RefreshSettings {
    fn from(config: &Config) -> Self {
        Self {
            name: config.name_record.name.clone(),
            key: config.name_record.key.clone(),
            freshness_window: config.freshness_window(),
            storage_timeout: config.storage_timeout(),
        }
    }
}

pub struct RefreshOrchestrator {
    cache: Arc<dyn CacheStore>,
    resolver: NameRecordResolver,
    fetcher: GatewayFetcher,
    clock: Arc<dyn Clock>,
    settings: RefreshSettings,
    // Serializes network refreshes; see `refresh`
    refresh_lock: Mutex<()>,
}

impl RefreshOrchestrator {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        resolver: NameRecordResolver,
        fetcher: GatewayFetcher,
        clock: Arc<dyn Clock>,
        settings: RefreshSettings,
    ) -> Self {
        Self {
            cache,
            resolver,
            fetcher,
            clock,
            settings,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Wire up the production pieces: file cache, ENS resolver, reqwest gateways
    pub fn from_config(config: &Config) -> YapResult<Self> {
        config.validate()?;

        Ok(Self::new(
            Arc::new(FileCacheStore::in_config_dir()?),
            NameRecordResolver::from_config(config)?,
            GatewayFetcher::from_config(config)?,
            Arc::new(SystemClock),
            RefreshSettings::from(config),
        ))
    }

    /// Current snapshot, preferring a fresh cache unless `force_fetch`
    pub async fn get_latest_data(&self, force_fetch: bool) -> DataSnapshot {
        self.refresh(force_fetch).await.snapshot
    }

    /// Like [`get_latest_data`](Self::get_latest_data), also reporting which
    /// path produced the snapshot.
    ///
    /// Network refreshes are serialized. A non-forced caller that waited for
    /// another refresh re-checks the cache first, so overlapping triggers
    /// cost one network round.
    pub async fn refresh(&self, force_fetch: bool) -> RefreshReport {
        if !force_fetch {
            if let Some(report) = self.fresh_cache().await {
                return report;
            }
        }

        let _guard = self.refresh_lock.lock().await;

        if !force_fetch {
            if let Some(report) = self.fresh_cache().await {
                return report;
            }
        }

        match self.fetch_latest().await {
            Ok(snapshot) => {
                self.store(&snapshot).await;
                RefreshReport {
                    snapshot,
                    outcome: RefreshOutcome::Fetched,
                }
            }
            Err(e) => {
                warn!(error = %e, "refresh failed, falling back to cache");
                self.fallback().await
            }
        }
    }

    fn is_entry_fresh(&self, entry: &CacheEntry) -> bool {
        is_fresh(entry, self.clock.now_ms(), self.settings.freshness_window)
    }

    async fn fresh_cache(&self) -> Option<RefreshReport> {
        let entry = self.read_cache().await?;
        if !self.is_entry_fresh(&entry) {
            debug!(last_updated = entry.last_updated, "cache is stale");
            return None;
        }

        debug!(last_updated = entry.last_updated, "using cached snapshot");
        Some(RefreshReport {
            snapshot: entry.snapshot,
            outcome: RefreshOutcome::Fresh,
        })
    }

    async fn fetch_latest(&self) -> YapResult<DataSnapshot> {
        let content_id = self
            .resolver
            .resolve_content_id(&self.settings.name, &self.settings.key)
            .await?;
        info!(name = %self.settings.name, content_id = %content_id, "resolved content id");

        self.fetcher.fetch_content(&content_id).await
    }

    async fn fallback(&self) -> RefreshReport {
        match self.read_cache().await {
            Some(entry) => {
                let outcome = if self.is_entry_fresh(&entry) {
                    RefreshOutcome::Cached
                } else {
                    RefreshOutcome::Stale
                };
                info!(
                    last_updated = entry.last_updated,
                    outcome = outcome.as_str(),
                    "serving cached snapshot after failed refresh"
                );
                RefreshReport {
                    snapshot: entry.snapshot,
                    outcome,
                }
            }
            None => {
                warn!("no cached snapshot, serving empty data");
                RefreshReport {
                    snapshot: DataSnapshot::empty(),
                    outcome: RefreshOutcome::Empty,
                }
            }
        }
    }

    async fn read_cache(&self) -> Option<CacheEntry> {
        match tokio::time::timeout(self.settings.storage_timeout, self.cache.read()).await {
            Ok(entry) => entry,
            Err(_) => {
                warn!(timeout = ?self.settings.storage_timeout, "cache read timed out");
                None
            }
        }
    }

    async fn store(&self, snapshot: &DataSnapshot) {
        let now = self.clock.now_ms();
        match tokio::time::timeout(self.settings.storage_timeout, self.cache.write(snapshot, now)).await {
            Ok(Ok(())) => info!(records = snapshot.len(), "cache updated with new data"),
            Ok(Err(e)) => warn!(error = %e, "failed to write cache"),
            Err(_) => warn!(timeout = ?self.settings.storage_timeout, "cache write timed out"),
        }
    }
}
