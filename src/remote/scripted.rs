//! Test collection whose feed and failures are driven by the test.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;
use tokio::sync::watch;

use super::{ChangeFeed, CollectionSnapshot, Fields, RemoteCollection, RemoteDocument, WriteAck};
use crate::errors::RemoteError;

/// A write the store issued against the collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    Set(String, Fields),
    Merge(String, Fields),
    Delete(String),
}

/// In-memory collection that only publishes when the test says so.
pub struct ScriptedCollection {
    feed: Mutex<Option<watch::Sender<Arc<CollectionSnapshot>>>>,
    revision: AtomicI64,
    fail_writes: AtomicBool,
    writes: Mutex<Vec<Write>>,
}

impl ScriptedCollection {
    pub fn new() -> Self {
        let (feed, _) = watch::channel(Arc::new(CollectionSnapshot {
            revision: 0,
            generated_at: String::new(),
            documents: Vec::new(),
        }));
        Self {
            feed: Mutex::new(Some(feed)),
            revision: AtomicI64::new(0),
            fail_writes: AtomicBool::new(false),
            writes: Mutex::new(Vec::new()),
        }
    }

    /// Publish a snapshot at `revision`.
    pub fn publish(&self, revision: i64, documents: Vec<RemoteDocument>) {
        self.revision.fetch_max(revision, Ordering::SeqCst);
        if let Some(feed) = self.feed.lock().unwrap().as_ref() {
            feed.send_replace(Arc::new(CollectionSnapshot {
                revision,
                generated_at: format!("rev-{}", revision),
                documents,
            }));
        }
    }

    /// Drop the feed sender, ending every open feed.
    pub fn close_feed(&self) {
        self.feed.lock().unwrap().take();
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().unwrap().clone()
    }

    pub fn revision(&self) -> i64 {
        self.revision.load(Ordering::SeqCst)
    }

    fn record(&self, write: Write) -> Result<WriteAck, RemoteError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RemoteError::Database("permission denied".to_string()));
        }
        self.writes.lock().unwrap().push(write);
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(WriteAck { revision })
    }
}

impl RemoteCollection for ScriptedCollection {
    async fn watch(&self) -> Result<ChangeFeed, RemoteError> {
        match self.feed.lock().unwrap().as_ref() {
            Some(feed) => Ok(feed.subscribe()),
            None => Err(RemoteError::Closed),
        }
    }

    async fn set_document(&self, id: &str, fields: Fields) -> Result<WriteAck, RemoteError> {
        self.record(Write::Set(id.to_string(), fields))
    }

    async fn merge_document(&self, id: &str, fields: Fields) -> Result<WriteAck, RemoteError> {
        self.record(Write::Merge(id.to_string(), fields))
    }

    async fn delete_document(&self, id: &str) -> Result<WriteAck, RemoteError> {
        self.record(Write::Delete(id.to_string()))
    }
}

/// Well-formed roster document.
pub fn doc(id: &str, label: &str, status: &str) -> RemoteDocument {
    RemoteDocument {
        id: id.to_string(),
        fields: json!({
            "classroomNumber": label,
            "information": format!("note for {}", label),
            "status": status,
        })
        .as_object()
        .cloned()
        .unwrap_or_default(),
    }
}
