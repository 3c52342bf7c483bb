//! Scripted doubles shared by the unit tests

use crate::error::ResolutionError;
use crate::gateway::{HttpTransport, TransportError, TransportResponse};
use crate::resolver::NameService;
use crate::snapshot::{DataSnapshot, ScoreRecord};
use async_trait::async_trait;
use ethers::types::Address;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn snapshot(records: &[(&str, u64)], timestamp: i64) -> DataSnapshot {
    DataSnapshot::new(
        records
            .iter()
            .map(|(name, points)| ScoreRecord::new(*name, *points))
            .collect(),
        timestamp,
    )
}

pub fn snapshot_json(records: &[(&str, u64)], timestamp: i64) -> Vec<u8> {
    serde_json::to_vec(&snapshot(records, timestamp)).unwrap()
}

type Scripted = Result<TransportResponse, TransportError>;

/// HTTP transport answering from a per-URL script. The last scripted answer
/// for a URL repeats; unscripted URLs fail with a network error.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, url: &str, status: u16, body: Vec<u8>) -> Self {
        self.push(url, Ok(TransportResponse { status, body }))
    }

    pub fn with_error(self, url: &str, error: TransportError) -> Self {
        self.push(url, Err(error))
    }

    fn push(self, url: &str, answer: Scripted) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(answer);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, url: &str, _timeout: Duration) -> Result<TransportResponse, TransportError> {
        self.calls.lock().unwrap().push(url.to_string());

        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(TransportError::Network("no script".into()))),
            None => Err(TransportError::Network("connection refused".into())),
        }
    }
}

/// Naming service with a fixed answer that counts its calls
pub struct ScriptedNameService {
    resolver: Option<Address>,
    record: Mutex<Option<String>>,
    failure: Option<String>,
    hang: bool,
    resolver_calls: AtomicUsize,
    record_calls: AtomicUsize,
}

impl ScriptedNameService {
    fn build(resolver: Option<Address>, record: Option<&str>, failure: Option<&str>) -> Self {
        Self {
            resolver,
            record: Mutex::new(record.map(str::to_string)),
            failure: failure.map(str::to_string),
            hang: false,
            resolver_calls: AtomicUsize::new(0),
            record_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_record(record: &str) -> Self {
        Self::build(Some(Address::from_low_u64_be(0xe75)), Some(record), None)
    }

    pub fn without_resolver() -> Self {
        Self::build(None, None, None)
    }

    pub fn without_record() -> Self {
        Self::build(Some(Address::from_low_u64_be(0xe75)), None, None)
    }

    pub fn failing(message: &str) -> Self {
        Self::build(None, None, Some(message))
    }

    /// Never answer
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn set_record(&self, record: &str) {
        *self.record.lock().unwrap() = Some(record.to_string());
    }

    pub fn resolver_calls(&self) -> usize {
        self.resolver_calls.load(Ordering::SeqCst)
    }

    pub fn record_calls(&self) -> usize {
        self.record_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NameService for ScriptedNameService {
    async fn find_resolver(&self, _name: &str) -> Result<Option<Address>, ResolutionError> {
        self.resolver_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        match &self.failure {
            Some(message) => Err(ResolutionError::Provider(message.clone())),
            None => Ok(self.resolver),
        }
    }

    async fn text_record(
        &self,
        _resolver: Address,
        _name: &str,
        _key: &str,
    ) -> Result<Option<String>, ResolutionError> {
        self.record_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.record.lock().unwrap().clone())
    }
}
