//! Serializable view of a running machine, for external viewers.

use super::machine::MachineStatus;
use crate::core::StateId;
use crate::registry::EntryInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Version identifier for the snapshot format
pub const SNAPSHOT_VERSION: u32 = 1;

/// Errors that can occur while encoding or decoding snapshots
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("Unsupported snapshot version {found}, supported: {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// One live region.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct RegionSnapshot<S: StateId> {
    pub region: String,
    /// Composite owning the region; `None` for the root region.
    pub owner: Option<S>,
    pub active: Option<S>,
    pub resources: Vec<EntryInfo>,
}

/// Point-in-time view of the active configuration.
///
/// Snapshots are for observation only: behaviors and resources are not
/// serializable, so a machine cannot be rebuilt from one.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct ConfigurationSnapshot<S: StateId> {
    /// Snapshot format version
    pub version: u32,

    /// Machine instance the snapshot was taken from
    pub machine: Uuid,

    pub taken_at: DateTime<Utc>,

    pub status: MachineStatus,

    /// Live regions, root first, in declaration order
    pub regions: Vec<RegionSnapshot<S>>,

    /// Names in the global data store, sorted
    pub globals: Vec<String>,
}

impl<S: StateId> ConfigurationSnapshot<S> {
    /// Active states of every live region.
    pub fn active_states(&self) -> Vec<&S> {
        self.regions
            .iter()
            .filter_map(|r| r.active.as_ref())
            .collect()
    }

    pub fn region(&self, name: &str) -> Option<&RegionSnapshot<S>> {
        self.regions.iter().find(|r| r.region == name)
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SnapshotError::SerializationFailed(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_str(json)
            .map_err(|e| SnapshotError::DeserializationFailed(e.to_string()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: snapshot.version,
                supported: SNAPSHOT_VERSION,
            });
        }
        Ok(snapshot)
    }
}
