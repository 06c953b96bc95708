//! Remote document collection contract.
//!
//! A collection is addressed by document key and pushes full snapshots of
//! itself to every watcher after each committed change. Any store meeting this
//! contract can back the roster.

use std::future::Future;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::watch;

use crate::errors::RemoteError;

/// Field map of one document.
pub type Fields = Map<String, Value>;

/// One document as it exists in the remote collection.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDocument {
    pub id: String,
    pub fields: Fields,
}

/// Complete contents of a collection at one revision.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSnapshot {
    pub revision: i64,
    pub generated_at: String,
    pub documents: Vec<RemoteDocument>,
}

/// Acknowledgment of a committed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteAck {
    /// Collection revision produced by the write.
    pub revision: i64,
}

/// Push feed of collection snapshots. Always holds the latest one; the sender
/// going away ends the feed.
pub type ChangeFeed = watch::Receiver<Arc<CollectionSnapshot>>;

/// A remote document collection with a change feed.
pub trait RemoteCollection: Send + Sync + 'static {
    /// Open a change feed positioned at the current snapshot.
    fn watch(&self) -> impl Future<Output = Result<ChangeFeed, RemoteError>> + Send;

    /// Overwrite the document under `id` with exactly `fields`.
    fn set_document(
        &self,
        id: &str,
        fields: Fields,
    ) -> impl Future<Output = Result<WriteAck, RemoteError>> + Send;

    /// Merge `fields` into the document under `id`, creating it if absent.
    fn merge_document(
        &self,
        id: &str,
        fields: Fields,
    ) -> impl Future<Output = Result<WriteAck, RemoteError>> + Send;

    /// Remove the document under `id`. Absent documents are not an error.
    fn delete_document(&self, id: &str) -> impl Future<Output = Result<WriteAck, RemoteError>> + Send;
}

#[cfg(test)]
pub(crate) mod scripted;
