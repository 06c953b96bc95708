//! Synchronized roster store.
//!
//! Mirrors a remote check-in collection in memory and routes every mutation
//! through the shared-secret gate and the remote store. The mirror only changes
//! in reaction to remote snapshots or to writes the remote store acknowledged.

mod mirror;
mod view;

pub use view::filter_and_sort;

use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockWriteGuard};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::auth::SecretGate;
use crate::errors::{RemoteError, RosterError};
use crate::models::{ConnectionStatus, RecordId, RosterRecord, RosterSnapshot, Status};
use crate::remote::{ChangeFeed, CollectionSnapshot, RemoteCollection};
use mirror::{Mirror, Overlay};

/// Stream of roster snapshots for one subscription. Ends when the store
/// unsubscribes or the remote feed closes.
#[derive(Clone)]
pub struct SnapshotStream {
    rx: watch::Receiver<Arc<RosterSnapshot>>,
    primed: bool,
}

impl SnapshotStream {
    /// Next snapshot, starting with the mirror as it stood at subscription.
    /// Snapshots published faster than they are read are coalesced into the
    /// latest one.
    pub async fn next(&mut self) -> Option<Arc<RosterSnapshot>> {
        if !self.primed {
            self.primed = true;
            return Some(self.rx.borrow_and_update().clone());
        }
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

struct Shared<C> {
    collection: Arc<C>,
    gate: SecretGate,
    mirror: RwLock<Mirror>,
    connection: watch::Sender<ConnectionStatus>,
}

impl<C> Shared<C> {
    fn lock_mirror(&self) -> RwLockWriteGuard<'_, Mirror> {
        self.mirror.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a feed snapshot if `generation` is still the live subscription.
    fn apply_remote(&self, generation: u64, snapshot: &CollectionSnapshot) -> bool {
        let mut mirror = self.lock_mirror();
        if mirror.generation != generation {
            return false;
        }

        let dropped = mirror.apply_remote(snapshot);
        self.connection.send_replace(ConnectionStatus::Live {
            revision: snapshot.revision,
        });
        tracing::debug!(
            revision = snapshot.revision,
            documents = snapshot.documents.len(),
            dropped,
            "Applied roster snapshot"
        );
        true
    }

    fn interrupt(&self, generation: u64, reason: &str) {
        let mut mirror = self.lock_mirror();
        if mirror.generation != generation {
            return;
        }

        mirror.detach();
        self.connection.send_replace(ConnectionStatus::Interrupted {
            reason: reason.to_string(),
        });
        tracing::warn!("Roster subscription interrupted: {}", reason);
    }
}

/// Roster mirror bound to one remote collection.
pub struct RosterStore<C: RemoteCollection> {
    shared: Arc<Shared<C>>,
    feed_task: Mutex<Option<JoinHandle<()>>>,
}

impl<C: RemoteCollection> RosterStore<C> {
    pub fn new(collection: Arc<C>, gate: SecretGate) -> Self {
        let (connection, _) = watch::channel(ConnectionStatus::Idle);
        Self {
            shared: Arc::new(Shared {
                collection,
                gate,
                mirror: RwLock::new(Mirror::new()),
                connection,
            }),
            feed_task: Mutex::new(None),
        }
    }

    /// Open the remote feed and start mirroring it. Replaces any existing
    /// subscription, whose stream then ends.
    pub async fn subscribe(&self) -> Result<SnapshotStream, RemoteError> {
        let feed = match self.shared.collection.watch().await {
            Ok(feed) => feed,
            Err(e) => {
                self.shared.connection.send_replace(ConnectionStatus::Interrupted {
                    reason: e.to_string(),
                });
                return Err(e);
            }
        };

        let mut task = self.feed_task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = task.take() {
            previous.abort();
        }

        let (tx, rx) = watch::channel(Arc::new(RosterSnapshot::empty()));
        let generation = {
            let mut mirror = self.shared.lock_mirror();
            mirror.generation += 1;
            mirror.attach(tx);
            mirror.generation
        };

        *task = Some(tokio::spawn(run_feed(
            Arc::clone(&self.shared),
            generation,
            feed,
        )));
        tracing::info!(generation, "Roster subscription opened");

        Ok(SnapshotStream { rx, primed: false })
    }

    /// Stop mirroring. Idempotent; a no-op when never subscribed.
    pub fn unsubscribe(&self) {
        let task = self
            .feed_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let detached = {
            let mut mirror = self.shared.lock_mirror();
            mirror.generation += 1;
            mirror.detach()
        };

        if let Some(task) = task {
            task.abort();
        }

        self.shared.connection.send_if_modified(|status| {
            let changed = *status != ConnectionStatus::Idle;
            *status = ConnectionStatus::Idle;
            changed
        });

        if detached {
            tracing::info!("Roster subscription closed");
        }
    }

    /// Current mirror, including acknowledged writes still awaiting their snapshot.
    pub fn current(&self) -> Arc<RosterSnapshot> {
        self.shared
            .mirror
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .view()
    }

    pub fn connection(&self) -> ConnectionStatus {
        self.shared.connection.borrow().clone()
    }

    /// Watch connection status changes.
    pub fn connection_changes(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.connection.subscribe()
    }

    /// Create a checked-in record. The mirror picks it up from the feed.
    pub async fn add_record(
        &self,
        label: &str,
        note: &str,
        secret: &str,
    ) -> Result<RecordId, RosterError> {
        self.check_secret(secret, "add")?;

        let id = RecordId::generate();
        let fields = RosterRecord::new_document(label, note, Status::CheckedIn);
        let ack = self
            .shared
            .collection
            .set_document(id.as_str(), fields)
            .await
            .map_err(|e| write_failed("add", &id, e))?;

        tracing::info!(id = %id, revision = ack.revision, "Roster record added");
        Ok(id)
    }

    /// Advance a record to its next status.
    pub async fn cycle_status(&self, id: &RecordId, secret: &str) -> Result<Status, RosterError> {
        self.check_secret(secret, "cycle")?;

        let current = self
            .current()
            .get(id)
            .map(|r| r.status)
            .ok_or_else(|| RosterError::NotFound(id.clone()))?;
        let next = Status::next_from(current);

        let ack = self
            .shared
            .collection
            .merge_document(id.as_str(), RosterRecord::status_patch(next))
            .await
            .map_err(|e| write_failed("cycle", id, e))?;

        self.shared
            .lock_mirror()
            .overlay(id.clone(), Overlay::Status(next), ack.revision);

        tracing::info!(id = %id, from = ?current, to = %next, revision = ack.revision, "Roster status cycled");
        Ok(next)
    }

    /// Delete a record from the remote collection.
    pub async fn delete_record(&self, id: &RecordId, secret: &str) -> Result<(), RosterError> {
        self.check_secret(secret, "delete")?;

        let ack = self
            .shared
            .collection
            .delete_document(id.as_str())
            .await
            .map_err(|e| write_failed("delete", id, e))?;

        self.shared
            .lock_mirror()
            .overlay(id.clone(), Overlay::Removed, ack.revision);

        tracing::info!(id = %id, revision = ack.revision, "Roster record deleted");
        Ok(())
    }

    fn check_secret(&self, secret: &str, operation: &str) -> Result<(), RosterError> {
        if self.shared.gate.allows(secret) {
            Ok(())
        } else {
            tracing::warn!(operation, "Rejected roster mutation: incorrect shared secret");
            Err(RosterError::Auth)
        }
    }
}

impl<C: RemoteCollection> Drop for RosterStore<C> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

fn write_failed(operation: &str, id: &RecordId, err: RemoteError) -> RosterError {
    tracing::error!(operation, id = %id, "Roster write failed: {}", err);
    RosterError::Write(err)
}

async fn run_feed<C>(shared: Arc<Shared<C>>, generation: u64, mut feed: ChangeFeed) {
    loop {
        let snapshot = feed.borrow_and_update().clone();
        if !shared.apply_remote(generation, &snapshot) {
            return;
        }

        if feed.changed().await.is_err() {
            shared.interrupt(generation, "remote change feed closed");
            return;
        }
    }
}
