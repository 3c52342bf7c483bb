//! Publish-side helpers
//!
//! Attestation exports are written as
//! `{timestamp, attestations: [{uid, timestamp, twitterUserId, twitterUsername, yapPoints}]}`
//! and pinned to IPFS; the resulting content id is then written to the ENS
//! text record. The same document is what gateways serve back as a
//! [`DataSnapshot`].

use crate::error::{YapError, YapResult};
use crate::snapshot::{deserialize_points, normalize_username, DataSnapshot, ScoreRecord};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;
use std::path::Path;

/// One attestation as exported from the attestation service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedAttestation {
    pub uid: String,

    /// Attestation time in epoch seconds
    pub timestamp: u64,

    pub twitter_user_id: String,

    pub twitter_username: String,

    /// Exported as a decimal string
    #[serde(
        serialize_with = "serialize_points",
        deserialize_with = "deserialize_points"
    )]
    pub yap_points: u64,
}

fn serialize_points<S: Serializer>(points: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&points.to_string())
}

impl From<ExportedAttestation> for ScoreRecord {
    fn from(a: ExportedAttestation) -> Self {
        ScoreRecord {
            twitter_username: a.twitter_username,
            yap_points: a.yap_points,
            uid: Some(a.uid),
            timestamp: Some(a.timestamp),
            twitter_user_id: Some(a.twitter_user_id),
        }
    }
}

/// A full export file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationExport {
    /// Export time in epoch milliseconds
    pub timestamp: i64,

    pub attestations: Vec<ExportedAttestation>,
}

impl AttestationExport {
    /// Load an export written by the attestation fetcher
    pub fn load(path: impl AsRef<Path>) -> YapResult<Self> {
        let path = path.as_ref();
        let contents = match std::fs::read(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(YapError::ExportError(format!(
                    "No export found at {}. Fetch attestations first.",
                    path.display()
                )));
            }
            Err(e) => return Err(YapError::IoError(e)),
        };

        Ok(serde_json::from_slice(&contents)?)
    }

    /// Usernames must be present and unique (case-insensitively)
    pub fn validate(&self) -> YapResult<()> {
        let mut seen = HashSet::with_capacity(self.attestations.len());

        for attestation in &self.attestations {
            let username = normalize_username(&attestation.twitter_username);
            if username.is_empty() {
                return Err(YapError::ExportError(format!(
                    "Attestation {} has an empty username",
                    attestation.uid
                )));
            }
            if !seen.insert(username) {
                return Err(YapError::ExportError(format!(
                    "Duplicate username in export: {}",
                    attestation.twitter_username
                )));
            }
        }

        Ok(())
    }

    pub fn into_snapshot(self) -> DataSnapshot {
        DataSnapshot::new(
            self.attestations.into_iter().map(ScoreRecord::from).collect(),
            self.timestamp,
        )
    }
}

/// Whether the name record must be rewritten to point at `new_content_id`.
/// Publishing the same content twice is a no-op.
pub fn record_update_needed(current: Option<&str>, new_content_id: &str) -> bool {
    current.map(str::trim) != Some(new_content_id.trim())
}
