//! Snapshot and connection models exposed to the display layer.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{RecordId, RosterRecord};

/// Full view of the roster mirror at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterSnapshot {
    /// Remote collection revision this snapshot reflects.
    pub revision: i64,
    pub generated_at: String,
    pub records: BTreeMap<RecordId, RosterRecord>,
    /// Records carrying a local edit the remote feed has not confirmed yet.
    pub pending: BTreeSet<RecordId>,
}

impl RosterSnapshot {
    /// Snapshot of a mirror that has never heard from the remote store.
    pub fn empty() -> Self {
        Self {
            revision: 0,
            generated_at: String::new(),
            records: BTreeMap::new(),
            pending: BTreeSet::new(),
        }
    }

    pub fn get(&self, id: &RecordId) -> Option<&RosterRecord> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Sort direction for the label ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// State of the subscription to the remote collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ConnectionStatus {
    /// Not subscribed.
    Idle,
    /// Receiving snapshots; `revision` is the last one applied.
    Live { revision: i64 },
    /// The feed ended; the mirror holds the last snapshot received.
    Interrupted { reason: String },
}

/// Connection report for the display layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub collection: String,
    pub status: ConnectionStatus,
    pub revision: i64,
    pub generated_at: String,
    pub record_count: usize,
    pub pending: Vec<RecordId>,
}
