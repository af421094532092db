//! Persistence of emotion profiles between turns.
//!
//! A turn loads the profile, mutates it and saves it back. Two concurrent turns
//! for the same user are not isolated from each other: the later save wins.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use chrono::Utc;
use dashmap::DashMap;
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use crate::emotion::mode::EmotionMode;
use crate::emotion::profile::EmotionProfile;
use crate::memory::core::errors::MemoryResult;
use crate::memory::core::ids::UserId;

/// Boxed future type for profile store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Load/save contract for per-user emotion profiles.
pub trait ProfileStore: Send + Sync {
    /// Load a user's profile, or the default profile if none was saved.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn load_profile<'a>(&'a self, user: &'a UserId) -> StoreFuture<'a, MemoryResult<EmotionProfile>>;
    /// Persist a user's profile, replacing any previous one.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn save_profile<'a>(
        &'a self,
        user: &'a UserId,
        profile: EmotionProfile,
    ) -> StoreFuture<'a, MemoryResult<()>>;
}

/// Process-local profile store.
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: DashMap<UserId, EmotionProfile>,
}

impl InMemoryProfileStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileStore for InMemoryProfileStore {
    fn load_profile<'a>(&'a self, user: &'a UserId) -> StoreFuture<'a, MemoryResult<EmotionProfile>> {
        Box::pin(async move {
            Ok(self
                .profiles
                .get(user)
                .map(|entry| *entry.value())
                .unwrap_or_default())
        })
    }

    fn save_profile<'a>(
        &'a self,
        user: &'a UserId,
        profile: EmotionProfile,
    ) -> StoreFuture<'a, MemoryResult<()>> {
        Box::pin(async move {
            self.profiles.insert(user.clone(), profile);
            Ok(())
        })
    }
}

/// `SQLite` implementation of the profile store.
pub struct SqliteProfileStore {
    conn: Connection,
    table: String,
}

impl SqliteProfileStore {
    /// Default table name.
    pub const DEFAULT_TABLE: &'static str = "emotion_profiles";

    /// Open (or create) the profile table in the database at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> MemoryResult<Self> {
        let conn = Connection::open(path.as_ref()).await?;
        Self::with_connection(conn, Self::DEFAULT_TABLE).await
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the database cannot be created.
    pub async fn open_in_memory() -> MemoryResult<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::with_connection(conn, Self::DEFAULT_TABLE).await
    }

    async fn with_connection(conn: Connection, table: &str) -> MemoryResult<Self> {
        let table = table.to_string();
        let table_name = table.clone();
        conn.call(move |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table_name} (
                    user_id TEXT PRIMARY KEY,
                    mode TEXT NOT NULL,
                    affection INTEGER NOT NULL,
                    heat INTEGER NOT NULL,
                    sleepy INTEGER NOT NULL,
                    envy INTEGER NOT NULL,
                    stress INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                )"
            ))?;
            Ok(())
        })
        .await?;
        Ok(Self { conn, table })
    }
}

type ProfileRow = (String, i64, i64, i64, i64, i64);

impl ProfileStore for SqliteProfileStore {
    fn load_profile<'a>(&'a self, user: &'a UserId) -> StoreFuture<'a, MemoryResult<EmotionProfile>> {
        Box::pin(async move {
            let table = self.table.clone();
            let user_id = user.as_str().to_string();
            let row: Option<ProfileRow> = self
                .conn
                .call(move |conn| {
                    let row = conn
                        .query_row(
                            &format!(
                                "SELECT mode, affection, heat, sleepy, envy, stress FROM {table} WHERE user_id = ?1"
                            ),
                            rusqlite::params![user_id],
                            |row| {
                                Ok((
                                    row.get(0)?,
                                    row.get(1)?,
                                    row.get(2)?,
                                    row.get(3)?,
                                    row.get(4)?,
                                    row.get(5)?,
                                ))
                            },
                        )
                        .optional()?;
                    Ok(row)
                })
                .await?;

            Ok(row.map_or_else(EmotionProfile::default, |row| {
                let (mode, affection, heat, sleepy, envy, stress) = row;
                EmotionProfile::from_values(
                    EmotionMode::parse_lenient(&mode),
                    affection,
                    heat,
                    sleepy,
                    envy,
                    stress,
                )
            }))
        })
    }

    fn save_profile<'a>(
        &'a self,
        user: &'a UserId,
        profile: EmotionProfile,
    ) -> StoreFuture<'a, MemoryResult<()>> {
        Box::pin(async move {
            let table = self.table.clone();
            let user_id = user.as_str().to_string();
            let updated_at = Utc::now().timestamp_millis();
            self.conn
                .call(move |conn| {
                    conn.execute(
                        &format!(
                            "INSERT INTO {table} (user_id, mode, affection, heat, sleepy, envy, stress, updated_at)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                             ON CONFLICT(user_id) DO UPDATE SET
                                mode = excluded.mode,
                                affection = excluded.affection,
                                heat = excluded.heat,
                                sleepy = excluded.sleepy,
                                envy = excluded.envy,
                                stress = excluded.stress,
                                updated_at = excluded.updated_at"
                        ),
                        rusqlite::params![
                            user_id,
                            profile.mode().as_str(),
                            profile.affection(),
                            profile.heat(),
                            profile.sleepy(),
                            profile.envy(),
                            profile.stress(),
                            updated_at
                        ],
                    )?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_defaults_then_roundtrip() {
        let store = InMemoryProfileStore::new();
        let user = UserId::new("alice@example.com").unwrap();
        assert_eq!(store.load_profile(&user).await.unwrap(), EmotionProfile::default());

        let saved = EmotionProfile::from_values(EmotionMode::S4, 80, 12, 30, 65, 5);
        store.save_profile(&user, saved).await.unwrap();
        assert_eq!(store.load_profile(&user).await.unwrap(), saved);
    }

    #[tokio::test]
    async fn test_sqlite_upsert_replaces_row() {
        let store = SqliteProfileStore::open_in_memory().await.unwrap();
        let user = UserId::new("bob").unwrap();
        assert_eq!(store.load_profile(&user).await.unwrap(), EmotionProfile::default());

        let first = EmotionProfile::from_values(EmotionMode::S2, 60, 1, 20, 0, 10);
        let second = EmotionProfile::from_values(EmotionMode::Idle, 40, 90, 0, 3, 100);
        store.save_profile(&user, first).await.unwrap();
        store.save_profile(&user, second).await.unwrap();
        assert_eq!(store.load_profile(&user).await.unwrap(), second);
    }
}
