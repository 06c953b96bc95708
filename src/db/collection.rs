//! SQLite-backed document collection with a push change feed.
//!
//! Every write bumps the shared revision in the same transaction, then the
//! collection reloads itself and publishes the new snapshot to all watchers.

use std::sync::Arc;

use chrono::Utc;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tokio::sync::watch;

use crate::errors::RemoteError;
use crate::remote::{ChangeFeed, CollectionSnapshot, Fields, RemoteCollection, RemoteDocument, WriteAck};

/// Document collection stored in the `documents` table.
pub struct SqliteCollection {
    pool: SqlitePool,
    name: String,
    feed: watch::Sender<Arc<CollectionSnapshot>>,
}

impl SqliteCollection {
    /// Open the collection and load its current snapshot.
    pub async fn open(pool: SqlitePool, name: impl Into<String>) -> Result<Self, RemoteError> {
        let name = name.into();
        let initial = load_snapshot(&pool, &name).await?;
        tracing::info!(
            collection = %name,
            revision = initial.revision,
            "Opened collection with {} documents",
            initial.documents.len()
        );

        let (feed, _) = watch::channel(Arc::new(initial));
        Ok(Self { pool, name, feed })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reload the collection and push the snapshot to watchers. Snapshots
    /// older than the one already published are discarded.
    pub async fn refresh(&self) -> Result<i64, RemoteError> {
        let snapshot = Arc::new(load_snapshot(&self.pool, &self.name).await?);
        let revision = snapshot.revision;

        self.feed.send_if_modified(move |current| {
            if snapshot.revision > current.revision {
                *current = snapshot;
                true
            } else {
                false
            }
        });

        Ok(revision)
    }

    /// Publish after a committed write. The write already succeeded, so a
    /// failed reload is logged rather than returned.
    async fn publish(&self) {
        if let Err(e) = self.refresh().await {
            tracing::error!(collection = %self.name, "Failed to publish snapshot: {}", e);
        }
    }
}

impl RemoteCollection for SqliteCollection {
    async fn watch(&self) -> Result<ChangeFeed, RemoteError> {
        if self.pool.is_closed() {
            return Err(RemoteError::Closed);
        }
        Ok(self.feed.subscribe())
    }

    async fn set_document(&self, id: &str, fields: Fields) -> Result<WriteAck, RemoteError> {
        let data = serde_json::to_string(&fields)?;
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO documents (collection, id, data, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT (collection, id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
        )
        .bind(&self.name)
        .bind(id)
        .bind(&data)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
        let revision = increment_revision(&mut tx).await?;
        tx.commit().await?;

        tracing::debug!(collection = %self.name, id, revision, "Document set");
        self.publish().await;
        Ok(WriteAck { revision })
    }

    async fn merge_document(&self, id: &str, fields: Fields) -> Result<WriteAck, RemoteError> {
        let data = serde_json::to_string(&fields)?;
        let now = Utc::now().to_rfc3339();

        // json_patch merges object members and leaves unset fields alone.
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO documents (collection, id, data, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT (collection, id) DO UPDATE SET
                data = json_patch(documents.data, excluded.data),
                updated_at = excluded.updated_at",
        )
        .bind(&self.name)
        .bind(id)
        .bind(&data)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
        let revision = increment_revision(&mut tx).await?;
        tx.commit().await?;

        tracing::debug!(collection = %self.name, id, revision, "Document merged");
        self.publish().await;
        Ok(WriteAck { revision })
    }

    async fn delete_document(&self, id: &str) -> Result<WriteAck, RemoteError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(&self.name)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let revision = increment_revision(&mut tx).await?;
        tx.commit().await?;

        tracing::debug!(
            collection = %self.name,
            id,
            revision,
            removed = result.rows_affected(),
            "Document deleted"
        );
        self.publish().await;
        Ok(WriteAck { revision })
    }
}

/// Increment the revision ID inside a write transaction and return the new value.
async fn increment_revision(tx: &mut Transaction<'_, Sqlite>) -> Result<i64, RemoteError> {
    let now = Utc::now().to_rfc3339();
    sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
        .bind(&now)
        .execute(&mut **tx)
        .await?;

    let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
        .fetch_one(&mut **tx)
        .await?;
    Ok(row.get("revision_id"))
}

/// Read the revision and every document of a collection in one transaction.
async fn load_snapshot(pool: &SqlitePool, collection: &str) -> Result<CollectionSnapshot, RemoteError> {
    let mut tx = pool.begin().await?;

    let meta = sqlx::query("SELECT revision_id, generated_at FROM meta WHERE id = 1")
        .fetch_one(&mut *tx)
        .await?;

    let rows = sqlx::query("SELECT id, data FROM documents WHERE collection = ? ORDER BY id")
        .bind(collection)
        .fetch_all(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(CollectionSnapshot {
        revision: meta.get("revision_id"),
        generated_at: meta.get("generated_at"),
        documents: rows.iter().map(document_from_row).collect(),
    })
}

fn document_from_row(row: &sqlx::sqlite::SqliteRow) -> RemoteDocument {
    let id: String = row.get("id");
    let data: String = row.get("data");

    // Bodies that are not JSON objects surface as empty documents.
    let fields = match serde_json::from_str(&data) {
        Ok(serde_json::Value::Object(fields)) => fields,
        _ => {
            tracing::debug!(id = %id, "Document body is not a JSON object");
            Fields::new()
        }
    };

    RemoteDocument { id, fields }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use serde_json::json;
    use tempfile::TempDir;

    async fn open_collection(name: &str) -> (SqliteCollection, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("test.sqlite")).await.unwrap();
        let collection = SqliteCollection::open(pool, name).await.unwrap();
        (collection, temp_dir)
    }

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_writes_publish_snapshots() {
        let (collection, _dir) = open_collection("Classrooms").await;
        let mut feed = collection.watch().await.unwrap();
        assert!(feed.borrow_and_update().documents.is_empty());

        let ack = collection
            .set_document("doc1", fields(json!({ "classroomNumber": "A101" })))
            .await
            .unwrap();

        feed.changed().await.unwrap();
        let snapshot = feed.borrow_and_update().clone();
        assert_eq!(snapshot.revision, ack.revision);
        assert_eq!(snapshot.documents.len(), 1);
        assert_eq!(snapshot.documents[0].id, "doc1");
        assert_eq!(snapshot.documents[0].fields["classroomNumber"], "A101");
    }

    #[tokio::test]
    async fn test_merge_preserves_unset_fields() {
        let (collection, _dir) = open_collection("Classrooms").await;
        collection
            .set_document(
                "doc1",
                fields(json!({ "classroomNumber": "A101", "information": "x", "status": "CheckedIn" })),
            )
            .await
            .unwrap();

        collection
            .merge_document("doc1", fields(json!({ "status": "CheckedOut" })))
            .await
            .unwrap();

        let feed = collection.watch().await.unwrap();
        let snapshot = feed.borrow().clone();
        let doc = &snapshot.documents[0].fields;
        assert_eq!(doc["classroomNumber"], "A101");
        assert_eq!(doc["information"], "x");
        assert_eq!(doc["status"], "CheckedOut");
    }

    #[tokio::test]
    async fn test_merge_creates_missing_document() {
        let (collection, _dir) = open_collection("Classrooms").await;
        collection
            .merge_document("ghost", fields(json!({ "status": "CheckedIn" })))
            .await
            .unwrap();

        let snapshot = collection.watch().await.unwrap().borrow().clone();
        assert_eq!(snapshot.documents.len(), 1);
        assert_eq!(snapshot.documents[0].fields.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent_and_bumps_revision() {
        let (collection, _dir) = open_collection("Classrooms").await;
        let set = collection.set_document("doc1", Fields::new()).await.unwrap();
        let first = collection.delete_document("doc1").await.unwrap();
        let second = collection.delete_document("doc1").await.unwrap();

        assert!(first.revision > set.revision);
        assert!(second.revision > first.revision);

        let snapshot = collection.watch().await.unwrap().borrow().clone();
        assert!(snapshot.documents.is_empty());
        assert_eq!(snapshot.revision, second.revision);
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("test.sqlite")).await.unwrap();
        let rooms = SqliteCollection::open(pool.clone(), "Classrooms").await.unwrap();
        let events = SqliteCollection::open(pool, "Events").await.unwrap();

        events.set_document("e1", Fields::new()).await.unwrap();
        rooms.refresh().await.unwrap();

        let snapshot = rooms.watch().await.unwrap().borrow().clone();
        assert!(snapshot.documents.is_empty());
        assert_eq!(rooms.name(), "Classrooms");
    }

    #[tokio::test]
    async fn test_non_object_bodies_surface_as_empty_documents() {
        let (collection, _dir) = open_collection("Classrooms").await;
        sqlx::query(
            "INSERT INTO documents (collection, id, data, updated_at) VALUES ('Classrooms', 'bad', '[1,2]', '')",
        )
        .execute(&collection.pool)
        .await
        .unwrap();
        sqlx::query("UPDATE meta SET revision_id = revision_id + 1 WHERE id = 1")
            .execute(&collection.pool)
            .await
            .unwrap();

        collection.refresh().await.unwrap();
        let snapshot = collection.watch().await.unwrap().borrow().clone();
        assert_eq!(snapshot.documents.len(), 1);
        assert!(snapshot.documents[0].fields.is_empty());
    }
}
