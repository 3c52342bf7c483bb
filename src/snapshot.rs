//! Score snapshot types
//!
//! A [`DataSnapshot`] is the unit that gets published, fetched and cached as a
//! whole. It is never patched in place; a refresh replaces it entirely.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// One user's score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    /// Handle on the social network, without the leading `@`
    pub twitter_username: String,

    /// Yap points. Exports write these as decimal strings, so both forms are accepted.
    #[serde(deserialize_with = "deserialize_points")]
    pub yap_points: u64,

    /// Attestation uid (present in published exports)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    /// Attestation time in epoch seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter_user_id: Option<String>,
}

impl ScoreRecord {
    pub fn new(twitter_username: impl Into<String>, yap_points: u64) -> Self {
        Self {
            twitter_username: twitter_username.into(),
            yap_points,
            uid: None,
            timestamp: None,
            twitter_user_id: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PointsRepr {
    Number(u64),
    Text(String),
}

pub(crate) fn deserialize_points<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match PointsRepr::deserialize(deserializer)? {
        PointsRepr::Number(n) => Ok(n),
        PointsRepr::Text(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid yap points: {:?}", s))),
    }
}

/// Full set of score records plus the time they were exported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSnapshot {
    pub attestations: Vec<ScoreRecord>,

    /// Export time in epoch milliseconds
    pub timestamp: i64,
}

impl DataSnapshot {
    pub fn new(attestations: Vec<ScoreRecord>, timestamp: i64) -> Self {
        Self {
            attestations,
            timestamp,
        }
    }

    /// The snapshot handed out when nothing has ever been fetched
    pub fn empty() -> Self {
        Self::new(Vec::new(), 0)
    }

    pub fn is_empty(&self) -> bool {
        self.attestations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.attestations.len()
    }

    /// Parse a gateway payload
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// Normalize a username for lookups: trimmed, no leading `@`, lowercase
pub fn normalize_username(username: &str) -> String {
    username.trim().trim_start_matches('@').to_lowercase()
}

/// Case-insensitive username -> yap points index
#[derive(Debug, Clone, Default)]
pub struct ScoreIndex {
    points: HashMap<String, u64>,
}

impl ScoreIndex {
    /// Build an index. When a username appears twice, the first record wins.
    pub fn from_snapshot(snapshot: &DataSnapshot) -> Self {
        let mut points = HashMap::with_capacity(snapshot.len());
        for record in &snapshot.attestations {
            points
                .entry(normalize_username(&record.twitter_username))
                .or_insert(record.yap_points);
        }
        Self { points }
    }

    pub fn get(&self, username: &str) -> Option<u64> {
        self.points.get(&normalize_username(username)).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
