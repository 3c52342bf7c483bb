//! Request/response contract and scheduled refresh
//!
//! Consumers ask for scores with `{"type": "getYapScores"}` and get back
//! `{"success": true, "data": {...}}` or `{"success": false, "error": "..."}`.
//! [`ScoreService`] answers requests arriving over a channel;
//! [`RefreshScheduler`] keeps the cache warm in the background.

use crate::error::YapResult;
use crate::refresh::RefreshOrchestrator;
use crate::snapshot::DataSnapshot;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use std::io::BufRead;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Messages a consumer can send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    #[serde(rename = "getYapScores")]
    GetYapScores,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DataSnapshot>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok(data: DataSnapshot) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

type Envelope = (Request, oneshot::Sender<Response>);

/// Answers requests against the orchestrator
#[derive(Clone)]
pub struct ScoreService {
    orchestrator: Arc<RefreshOrchestrator>,
}

impl ScoreService {
    pub fn new(orchestrator: Arc<RefreshOrchestrator>) -> Self {
        Self { orchestrator }
    }

    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::GetYapScores => Response::ok(self.orchestrator.get_latest_data(false).await),
        }
    }

    /// Run the service loop on its own task until every handle is dropped
    pub fn spawn(self, buffer: usize) -> (ServiceHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Envelope>(buffer.max(1));

        let task = tokio::spawn(async move {
            while let Some((request, reply)) = rx.recv().await {
                debug!(?request, "handling request");
                let response = self.handle(request).await;
                if reply.send(response).is_err() {
                    debug!("requester went away before the reply");
                }
            }
            debug!("service loop stopped");
        });

        (ServiceHandle { tx }, task)
    }
}

/// Cloneable client side of a spawned [`ScoreService`]
#[derive(Clone)]
pub struct ServiceHandle {
    tx: mpsc::Sender<Envelope>,
}

impl ServiceHandle {
    pub async fn request(&self, request: Request) -> Response {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send((request, reply_tx)).await.is_err() {
            return Response::error("score service is not running");
        }

        reply_rx
            .await
            .unwrap_or_else(|_| Response::error("score service dropped the request"))
    }

    /// Parse one JSON request and answer it; bad input gets a failure response
    pub async fn request_json(&self, line: &str) -> Response {
        match serde_json::from_str::<Request>(line) {
            Ok(request) => self.request(request).await,
            Err(e) => Response::error(format!("Invalid request: {}", e)),
        }
    }
}

/// Feed stdin lines into a channel from a detached OS thread. A pending read
/// there never holds up runtime shutdown.
pub fn stdin_lines(buffer: usize) -> YapResult<mpsc::Receiver<String>> {
    let (tx, rx) = mpsc::channel(buffer.max(1));

    std::thread::Builder::new()
        .name("yapscope-stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to read stdin");
                        break;
                    }
                }
            }
            debug!("stdin reader stopped");
        })?;

    Ok(rx)
}

/// Line-delimited JSON transport: one request per input line, one response
/// per output line. Returns once the line channel closes.
pub async fn serve_lines<W>(
    handle: &ServiceHandle,
    mut lines: mpsc::Receiver<String>,
    mut writer: W,
) -> YapResult<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = lines.recv().await {
        if line.trim().is_empty() {
            continue;
        }

        let response = handle.request_json(&line).await;
        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        writer.write_all(&out).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Background refresh: one forced refresh at start, then a non-forced one
/// every `interval`. Non-forced ticks only reach the network once the cache
/// has aged past its freshness window.
pub struct RefreshScheduler {
    orchestrator: Arc<RefreshOrchestrator>,
    interval: Duration,
}

impl RefreshScheduler {
    pub fn new(orchestrator: Arc<RefreshOrchestrator>, interval: Duration) -> Self {
        Self {
            orchestrator,
            interval,
        }
    }

    /// Run until `shutdown` flips to `true` or its sender is dropped
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let report = self.orchestrator.refresh(true).await;
        info!(outcome = report.outcome.as_str(), records = report.snapshot.len(), "initial refresh");

        let mut ticker = Instant::now().checked_add(self.interval).map(|start| {
            let mut ticker = tokio::time::interval_at(start, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        if ticker.is_none() {
            warn!(interval = ?self.interval, "refresh interval out of range, scheduled refreshes disabled");
        }

        loop {
            tokio::select! {
                _ = next_tick(&mut ticker) => {
                    let report = self.orchestrator.refresh(false).await;
                    info!(outcome = report.outcome.as_str(), "scheduled refresh");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("refresh scheduler stopped");
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheStore, MemoryCacheStore};
    use crate::clock::ManualClock;
    use crate::config::Config;
    use crate::gateway::GatewayFetcher;
    use crate::refresh::RefreshSettings;
    use crate::resolver::NameRecordResolver;
    use crate::testing::{snapshot, snapshot_json, ScriptedNameService, ScriptedTransport};

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);
    const DAY_MS: i64 = 24 * 60 * 60 * 1000;
    const NOW: i64 = 1_750_000_000_000;
    const GATEWAY: &str = "https://gw.example/ipfs/";

    struct Fixture {
        orchestrator: Arc<RefreshOrchestrator>,
        names: Arc<ScriptedNameService>,
        cache: Arc<MemoryCacheStore>,
        clock: Arc<ManualClock>,
    }

    fn fixture(cache: MemoryCacheStore, names: ScriptedNameService) -> Fixture {
        let cache = Arc::new(cache);
        let names = Arc::new(names);
        let clock = Arc::new(ManualClock::new(NOW));
        let transport = ScriptedTransport::new()
            .with_response(
                &format!("{}QmOne", GATEWAY),
                200,
                snapshot_json(&[("alice", 5)], 1),
            )
            .with_response(
                &format!("{}QmTwo", GATEWAY),
                200,
                snapshot_json(&[("alice", 6), ("bob", 1)], 2),
            );

        let orchestrator = Arc::new(RefreshOrchestrator::new(
            cache.clone(),
            NameRecordResolver::new(names.clone(), Duration::from_secs(10)),
            GatewayFetcher::new(vec![GATEWAY.to_string()], Duration::from_secs(5), Arc::new(transport))
                .unwrap(),
            clock.clone(),
            RefreshSettings::from(&Config::default()),
        ));

        Fixture {
            orchestrator,
            names,
            cache,
            clock,
        }
    }

    #[test]
    fn test_request_wire_format() {
        let request: Request = serde_json::from_str(r#"{"type":"getYapScores"}"#).unwrap();
        assert_eq!(request, Request::GetYapScores);
        assert!(serde_json::from_str::<Request>(r#"{"type":"deleteEverything"}"#).is_err());
    }

    #[test]
    fn test_response_wire_format() {
        let ok = serde_json::to_value(Response::ok(DataSnapshot::empty())).unwrap();
        assert_eq!(
            ok,
            serde_json::json!({"success": true, "data": {"attestations": [], "timestamp": 0}})
        );

        let err = serde_json::to_value(Response::error("boom")).unwrap();
        assert_eq!(err, serde_json::json!({"success": false, "error": "boom"}));
    }

    #[tokio::test]
    async fn test_handle_returns_cached_scores() {
        let f = fixture(
            MemoryCacheStore::with_entry(snapshot(&[("carol", 9)], 3), NOW),
            ScriptedNameService::with_record("QmOne"),
        );

        let response = ScoreService::new(f.orchestrator).handle(Request::GetYapScores).await;

        assert!(response.success);
        assert_eq!(response.data, Some(snapshot(&[("carol", 9)], 3)));
        assert_eq!(f.names.resolver_calls(), 0);
    }

    #[tokio::test]
    async fn test_spawned_service_answers_over_channel() {
        let f = fixture(MemoryCacheStore::new(), ScriptedNameService::without_resolver());
        let (handle, task) = ScoreService::new(f.orchestrator).spawn(8);

        let response = handle.request(Request::GetYapScores).await;
        assert_eq!(response, Response::ok(DataSnapshot::empty()));

        let response = handle.request_json("{\"type\": 42}").await;
        assert!(!response.success);
        assert!(response.error.unwrap().starts_with("Invalid request"));

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_serve_lines_answers_each_line() {
        let f = fixture(
            MemoryCacheStore::with_entry(snapshot(&[("dave", 4)], 8), NOW),
            ScriptedNameService::with_record("QmOne"),
        );
        let (handle, _task) = ScoreService::new(f.orchestrator).spawn(8);

        let (tx, rx) = mpsc::channel(4);
        for line in [r#"{"type":"getYapScores"}"#, "", "not json"] {
            tx.send(line.to_string()).await.unwrap();
        }
        drop(tx);

        let mut output = Vec::new();
        serve_lines(&handle, rx, &mut output).await.unwrap();

        let lines: Vec<Response> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], Response::ok(snapshot(&[("dave", 4)], 8)));
        assert!(!lines[1].success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_forces_initial_refresh_then_respects_window() {
        let f = fixture(
            MemoryCacheStore::with_entry(snapshot(&[("old", 1)], 0), NOW),
            ScriptedNameService::with_record("QmOne"),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = RefreshScheduler::new(f.orchestrator.clone(), DAY).spawn(shutdown_rx);

        // install-time refresh ignores the fresh cache
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(f.names.resolver_calls(), 1);
        assert_eq!(f.cache.read().await.unwrap().snapshot, snapshot(&[("alice", 5)], 1));

        // daily tick inside the freshness window stays offline
        tokio::time::sleep(DAY).await;
        assert_eq!(f.names.resolver_calls(), 1);

        // once the cache ages out, the next tick fetches the new record
        f.names.set_record("QmTwo");
        f.clock.advance(5 * DAY_MS);
        tokio::time::sleep(DAY).await;
        assert_eq!(f.names.resolver_calls(), 2);
        assert_eq!(f.cache.read().await.unwrap().snapshot.len(), 2);

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_stops_when_sender_dropped() {
        let f = fixture(MemoryCacheStore::new(), ScriptedNameService::without_resolver());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = RefreshScheduler::new(f.orchestrator, DAY).spawn(shutdown_rx);

        drop(shutdown_tx);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_survives_out_of_range_interval() {
        let f = fixture(MemoryCacheStore::new(), ScriptedNameService::with_record("QmOne"));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = RefreshScheduler::new(f.orchestrator.clone(), Duration::from_secs(u64::MAX))
            .spawn(shutdown_rx);

        tokio::time::sleep(DAY).await;
        assert_eq!(f.names.resolver_calls(), 1);
        assert_eq!(f.cache.read().await.unwrap().snapshot, snapshot(&[("alice", 5)], 1));

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }
}
