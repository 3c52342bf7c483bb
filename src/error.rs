//! Error types for yapscope

use thiserror::Error;

/// Why a single gateway attempt was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayFailureReason {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// One failed gateway attempt, kept for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{gateway}: {reason}")]
pub struct GatewayFailure {
    pub gateway: String,
    pub reason: GatewayFailureReason,
}

/// Failures while resolving a name record to a content id
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("no resolver found for {0}")]
    NoResolver(String),

    #[error("no '{key}' record found for {name}")]
    NoRecord { name: String, key: String },

    #[error("naming service did not answer within {0:?}")]
    Timeout(std::time::Duration),

    #[error("naming service error: {0}")]
    Provider(String),
}

/// Main error type for yapscope operations
#[derive(Debug, Error)]
pub enum YapError {
    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid content id: {0:?}")]
    InvalidContentId(String),

    #[error("Name resolution failed: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("All gateways failed: {}", join_failures(.failures))]
    AllGatewaysFailed { failures: Vec<GatewayFailure> },

    #[error("Export error: {0}")]
    ExportError(String),
}

fn join_failures(failures: &[GatewayFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for yapscope operations
pub type YapResult<T> = Result<T, YapError>;
