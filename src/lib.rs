//! yapscope - Keep a fresh local snapshot of yap point scores
//!
//! The current score snapshot is published to IPFS and its content id is
//! stored in an ENS text record. This library resolves that record, downloads
//! the snapshot through a fallback-ordered list of gateways, and keeps it in a
//! single-slot local cache with a freshness window. Callers always get *some*
//! snapshot back: fresh cache, freshly fetched data, stale cache, or empty.
//!
//! # Quick Start
//!
//! ```ignore
//! use yapscope::{Config, RefreshOrchestrator, ScoreIndex};
//!
//! let orchestrator = RefreshOrchestrator::from_config(&Config::load()?)?;
//!
//! // Uses the cache while it is fresh, the network otherwise
//! let snapshot = orchestrator.get_latest_data(false).await;
//!
//! let index = ScoreIndex::from_snapshot(&snapshot);
//! println!("{:?}", index.get("@someone"));
//! ```
//!
//! # Serving other processes
//!
//! ```ignore
//! use yapscope::service::{Request, ScoreService};
//!
//! let (handle, _task) = ScoreService::new(orchestrator).spawn(32);
//! let response = handle.request(Request::GetYapScores).await;
//! assert!(response.success);
//! ```

pub mod cache;
pub mod cli;
pub mod clock;
pub mod config;
pub mod display;
pub mod error;
pub mod gateway;
pub mod publish;
pub mod refresh;
pub mod resolver;
pub mod service;
pub mod snapshot;

#[cfg(test)]
mod testing;

// Public re-exports for library users
pub use cache::{is_fresh, CacheEntry, CacheStore, FileCacheStore, MemoryCacheStore};
pub use config::Config;
pub use error::{GatewayFailure, GatewayFailureReason, ResolutionError, YapError, YapResult};
pub use gateway::{GatewayFetcher, HttpTransport, ReqwestTransport};
pub use refresh::{RefreshOrchestrator, RefreshOutcome, RefreshReport};
pub use resolver::{EnsNameService, NameRecordResolver, NameService};
pub use snapshot::{DataSnapshot, ScoreIndex, ScoreRecord};
