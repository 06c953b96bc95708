//! Local mirror of the remote roster collection.
//!
//! The mirror keeps the last confirmed remote snapshot plus a set of pending
//! overlays for writes the remote store acknowledged but the feed has not yet
//! delivered. The published view is rebuilt from both after every change and
//! swapped in whole.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::watch;

use crate::models::{RecordId, RosterRecord, RosterSnapshot, Status};
use crate::remote::CollectionSnapshot;

/// Local edit waiting for the feed to catch up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Overlay {
    Status(Status),
    Removed,
}

#[derive(Debug, Clone, Copy)]
struct PendingOverlay {
    overlay: Overlay,
    /// Revision the remote store acknowledged the write at.
    ack_revision: i64,
}

pub(crate) struct Mirror {
    confirmed: BTreeMap<RecordId, RosterRecord>,
    revision: i64,
    generated_at: String,
    pending: HashMap<RecordId, PendingOverlay>,
    view: Arc<RosterSnapshot>,
    publisher: Option<watch::Sender<Arc<RosterSnapshot>>>,
    /// Bumped on every subscribe/unsubscribe; stale feed tasks compare against it.
    pub(crate) generation: u64,
}

impl Mirror {
    pub(crate) fn new() -> Self {
        Self {
            confirmed: BTreeMap::new(),
            revision: 0,
            generated_at: String::new(),
            pending: HashMap::new(),
            view: Arc::new(RosterSnapshot::empty()),
            publisher: None,
            generation: 0,
        }
    }

    pub(crate) fn view(&self) -> Arc<RosterSnapshot> {
        Arc::clone(&self.view)
    }

    /// Replace the confirmed records with a remote snapshot. Returns how many
    /// documents were dropped as malformed.
    pub(crate) fn apply_remote(&mut self, snapshot: &CollectionSnapshot) -> usize {
        let mut dropped = 0;
        let mut confirmed = BTreeMap::new();

        for doc in &snapshot.documents {
            match RosterRecord::from_document(&doc.id, &doc.fields) {
                Some(record) => {
                    confirmed.insert(record.id.clone(), record);
                }
                None => {
                    dropped += 1;
                    tracing::debug!(id = %doc.id, "Dropping malformed roster document");
                }
            }
        }

        self.confirmed = confirmed;
        self.revision = snapshot.revision;
        self.generated_at = snapshot.generated_at.clone();

        // A snapshot at or past the acknowledged revision already contains the
        // write (or whatever superseded it), so the overlay is settled.
        let revision = self.revision;
        self.pending.retain(|_, p| p.ack_revision > revision);

        self.rebuild();
        dropped
    }

    /// Record an acknowledged write ahead of its snapshot. Writes already
    /// covered by the mirror, writes to records it does not hold, and writes
    /// older than an overlay already pending for the record are ignored.
    pub(crate) fn overlay(&mut self, id: RecordId, overlay: Overlay, ack_revision: i64) {
        if ack_revision <= self.revision || !self.confirmed.contains_key(&id) {
            return;
        }
        if let Some(existing) = self.pending.get(&id) {
            if existing.ack_revision >= ack_revision {
                return;
            }
        }
        self.pending.insert(id, PendingOverlay { overlay, ack_revision });
        self.rebuild();
    }

    pub(crate) fn attach(&mut self, publisher: watch::Sender<Arc<RosterSnapshot>>) {
        publisher.send_replace(self.view());
        self.publisher = Some(publisher);
    }

    /// Drop the publisher, ending the snapshot stream.
    pub(crate) fn detach(&mut self) -> bool {
        self.publisher.take().is_some()
    }

    fn rebuild(&mut self) {
        let mut records = self.confirmed.clone();

        for (id, pending) in &self.pending {
            match pending.overlay {
                Overlay::Status(status) => {
                    if let Some(record) = records.get_mut(id) {
                        record.status = Some(status);
                    }
                }
                Overlay::Removed => {
                    records.remove(id);
                }
            }
        }

        self.view = Arc::new(RosterSnapshot {
            revision: self.revision,
            generated_at: self.generated_at.clone(),
            records,
            pending: self.pending.keys().cloned().collect(),
        });

        if let Some(publisher) = &self.publisher {
            publisher.send_replace(self.view());
        }
    }
}
