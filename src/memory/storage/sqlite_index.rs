//! `SQLite` vector index: vectors stored as JSON, brute-force kNN scan.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;
use tracing::warn;

use crate::memory::core::errors::{MemoryError, MemoryResult};
use crate::memory::core::ids::MemoryId;
use crate::memory::core::record::Metadata;
use crate::memory::storage::vector_index::{
    IndexHit, StoreFuture, StoredDocument, VectorCollection, VectorIndex, check_dims, nearest,
    squared_l2,
};

const COLLECTIONS_TABLE: &str = "vector_collections";
const ENTRIES_TABLE: &str = "vector_entries";

/// Vector index persisted in one `SQLite` database.
#[derive(Clone)]
pub struct SqliteVectorIndex {
    conn: Connection,
}

impl SqliteVectorIndex {
    /// Open (or create) the index at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> MemoryResult<Self> {
        let conn = Connection::open(path.as_ref()).await?;
        Self::init(conn).await
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the database cannot be created.
    pub async fn open_in_memory() -> MemoryResult<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> MemoryResult<Self> {
        conn.call(|conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {COLLECTIONS_TABLE} (
                    name TEXT PRIMARY KEY,
                    ndims INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS {ENTRIES_TABLE} (
                    collection TEXT NOT NULL,
                    id TEXT NOT NULL,
                    vector_json TEXT NOT NULL,
                    document TEXT NOT NULL,
                    metadata_json TEXT NOT NULL,
                    PRIMARY KEY (collection, id)
                );"
            ))?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }
}

impl VectorIndex for SqliteVectorIndex {
    fn open_collection<'a>(
        &'a self,
        name: &'a str,
        ndims: usize,
    ) -> StoreFuture<'a, MemoryResult<Arc<dyn VectorCollection>>> {
        Box::pin(async move {
            let collection = name.to_string();
            let requested = i64::try_from(ndims)
                .map_err(|_| MemoryError::InvalidConfig(format!("ndims too large: {ndims}")))?;
            let stored: i64 = self
                .conn
                .call(move |conn| {
                    conn.execute(
                        &format!(
                            "INSERT INTO {COLLECTIONS_TABLE} (name, ndims) VALUES (?1, ?2)
                             ON CONFLICT(name) DO NOTHING"
                        ),
                        rusqlite::params![collection, requested],
                    )?;
                    let stored = conn.query_row(
                        &format!("SELECT ndims FROM {COLLECTIONS_TABLE} WHERE name = ?1"),
                        rusqlite::params![collection],
                        |row| row.get(0),
                    )?;
                    Ok(stored)
                })
                .await?;

            if stored != requested {
                return Err(MemoryError::Index(format!(
                    "collection {name} has {stored} dimensions, requested {ndims}"
                )));
            }
            Ok(Arc::new(SqliteCollection {
                conn: self.conn.clone(),
                name: name.to_string(),
                ndims,
            }) as Arc<dyn VectorCollection>)
        })
    }
}

/// One collection inside a [`SqliteVectorIndex`].
pub struct SqliteCollection {
    conn: Connection,
    name: String,
    ndims: usize,
}

type EntryRow = (String, String, String, String);

impl SqliteCollection {
    fn decode_row(&self, (id, vector_json, document, metadata_json): EntryRow) -> Option<(StoredDocument, Vec<f64>)> {
        let decoded = MemoryId::from_str(&id)
            .map_err(|err| err.to_string())
            .and_then(|id| {
                let vector: Vec<f64> =
                    serde_json::from_str(&vector_json).map_err(|err| err.to_string())?;
                let metadata: Metadata =
                    serde_json::from_str(&metadata_json).unwrap_or_default();
                Ok((
                    StoredDocument {
                        id,
                        document,
                        metadata,
                    },
                    vector,
                ))
            });
        match decoded {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(collection = %self.name, %id, %err, "skipping unreadable vector entry");
                None
            }
        }
    }

    async fn load_rows(&self) -> MemoryResult<Vec<EntryRow>> {
        let collection = self.name.clone();
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT id, vector_json, document, metadata_json FROM {ENTRIES_TABLE}
                     WHERE collection = ?1 ORDER BY id"
                ))?;
                let rows = stmt
                    .query_map(rusqlite::params![collection], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                    })?
                    .collect::<Result<Vec<EntryRow>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }
}

impl VectorCollection for SqliteCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn ndims(&self) -> usize {
        self.ndims
    }

    fn upsert(&self, entry: StoredDocument, vector: Vec<f64>) -> StoreFuture<'_, MemoryResult<()>> {
        Box::pin(async move {
            check_dims(&self.name, self.ndims, &vector)?;
            let collection = self.name.clone();
            let id = entry.id.to_string();
            let vector_json = serde_json::to_string(&vector)?;
            let metadata_json = serde_json::to_string(&entry.metadata)?;
            let document = entry.document;
            self.conn
                .call(move |conn| {
                    conn.execute(
                        &format!(
                            "INSERT INTO {ENTRIES_TABLE} (collection, id, vector_json, document, metadata_json)
                             VALUES (?1, ?2, ?3, ?4, ?5)
                             ON CONFLICT(collection, id) DO UPDATE SET
                                vector_json = excluded.vector_json,
                                document = excluded.document,
                                metadata_json = excluded.metadata_json"
                        ),
                        rusqlite::params![collection, id, vector_json, document, metadata_json],
                    )?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }

    fn query<'a>(&'a self, vector: &'a [f64], k: usize) -> StoreFuture<'a, MemoryResult<Vec<IndexHit>>> {
        Box::pin(async move {
            check_dims(&self.name, self.ndims, vector)?;
            let hits = self
                .load_rows()
                .await?
                .into_iter()
                .filter_map(|row| self.decode_row(row))
                .filter(|(_, stored)| stored.len() == self.ndims)
                .map(|(entry, stored)| IndexHit {
                    distance: squared_l2(&stored, vector),
                    entry,
                })
                .collect();
            Ok(nearest(hits, k))
        })
    }

    fn update_metadata(&self, id: MemoryId, partial: Metadata) -> StoreFuture<'_, MemoryResult<()>> {
        Box::pin(async move {
            let collection = self.name.clone();
            let id = id.to_string();
            self.conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    let current: Option<String> = tx
                        .query_row(
                            &format!(
                                "SELECT metadata_json FROM {ENTRIES_TABLE} WHERE collection = ?1 AND id = ?2"
                            ),
                            rusqlite::params![collection, id],
                            |row| row.get(0),
                        )
                        .optional()?;
                    if let Some(current) = current {
                        let mut metadata: Metadata =
                            serde_json::from_str(&current).unwrap_or_default();
                        metadata.extend(partial);
                        let merged = serde_json::Value::Object(metadata).to_string();
                        tx.execute(
                            &format!(
                                "UPDATE {ENTRIES_TABLE} SET metadata_json = ?3 WHERE collection = ?1 AND id = ?2"
                            ),
                            rusqlite::params![collection, id, merged],
                        )?;
                    }
                    tx.commit()?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }

    fn get_all(&self) -> StoreFuture<'_, MemoryResult<Vec<StoredDocument>>> {
        Box::pin(async move {
            Ok(self
                .load_rows()
                .await?
                .into_iter()
                .filter_map(|row| self.decode_row(row))
                .map(|(entry, _)| entry)
                .collect())
        })
    }

    fn delete(&self, ids: Vec<MemoryId>) -> StoreFuture<'_, MemoryResult<usize>> {
        Box::pin(async move {
            let collection = self.name.clone();
            let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
            let removed = self
                .conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    let mut removed = 0;
                    {
                        let mut stmt = tx.prepare(&format!(
                            "DELETE FROM {ENTRIES_TABLE} WHERE collection = ?1 AND id = ?2"
                        ))?;
                        for id in &ids {
                            removed += stmt.execute(rusqlite::params![collection, id])?;
                        }
                    }
                    tx.commit()?;
                    Ok(removed)
                })
                .await?;
            Ok(removed)
        })
    }

    fn count(&self) -> StoreFuture<'_, MemoryResult<usize>> {
        Box::pin(async move {
            let collection = self.name.clone();
            let count: i64 = self
                .conn
                .call(move |conn| {
                    let count = conn.query_row(
                        &format!("SELECT COUNT(*) FROM {ENTRIES_TABLE} WHERE collection = ?1"),
                        rusqlite::params![collection],
                        |row| row.get(0),
                    )?;
                    Ok(count)
                })
                .await?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
    }
}
