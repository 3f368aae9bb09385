//! SQLite Story Store
//!
//! Stores profiles, stories, views, likes and direct messages in a single
//! SQLite database. Uniqueness of (story, viewer) and (story, user) is
//! enforced by primary keys, so view upserts and like toggles stay
//! idempotent under repeated or racing calls.
//!
//! rusqlite is synchronous, so every statement batch runs on tokio's blocking
//! pool with the connection locked for the duration of the batch.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use super::{StoreError, StoreResult, StoryChange, StoryStore};
use crate::story::{
    Id, MediaKind, Message, NewStory, Profile, ReplyRequest, Story, ViewerEntry,
    DEFAULT_STORY_LIFETIME_HOURS,
};

const IN_MEMORY: &str = ":memory:";

/// Configuration for the SQLite store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database file, or `:memory:`
    pub path: PathBuf,
    /// Lifetime given to stories published without an override
    pub story_lifetime_hours: i64,
    /// Capacity of the change broadcast channel
    pub change_capacity: usize,
}

impl StoreConfig {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// A private, non-persistent database
    pub fn in_memory() -> Self {
        Self::new(IN_MEMORY)
    }

    /// Builder method: set default story lifetime
    pub fn story_lifetime_hours(mut self, hours: i64) -> Self {
        self.story_lifetime_hours = hours;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(IN_MEMORY),
            story_lifetime_hours: DEFAULT_STORY_LIFETIME_HOURS,
            change_capacity: 256,
        }
    }
}

/// SQLite-backed [`StoryStore`]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    config: StoreConfig,
    changes: broadcast::Sender<StoryChange>,
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS profiles (
        id TEXT PRIMARY KEY,
        display_name TEXT NOT NULL,
        avatar_url TEXT
    );

    CREATE TABLE IF NOT EXISTS stories (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        content TEXT,
        media_url TEXT,
        media_kind TEXT,
        background TEXT,
        expires_at INTEGER NOT NULL,
        created_at INTEGER NOT NULL,
        view_count INTEGER NOT NULL DEFAULT 0,
        duration_secs INTEGER
    );
    CREATE INDEX IF NOT EXISTS idx_stories_expires ON stories(expires_at);
    CREATE INDEX IF NOT EXISTS idx_stories_user ON stories(user_id);

    CREATE TABLE IF NOT EXISTS story_views (
        story_id TEXT NOT NULL REFERENCES stories(id) ON DELETE CASCADE,
        viewer_id TEXT NOT NULL,
        viewed_at INTEGER NOT NULL,
        PRIMARY KEY (story_id, viewer_id)
    );

    CREATE TABLE IF NOT EXISTS story_likes (
        story_id TEXT NOT NULL REFERENCES stories(id) ON DELETE CASCADE,
        user_id TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        PRIMARY KEY (story_id, user_id)
    );

    CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY,
        kind TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS conversation_members (
        conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
        user_id TEXT NOT NULL,
        PRIMARY KEY (conversation_id, user_id)
    );

    CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
        sender_id TEXT NOT NULL,
        content TEXT NOT NULL,
        story_id TEXT,
        attachment_url TEXT,
        created_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, created_at);
";

const STORY_COLUMNS: &str = "id, user_id, content, media_url, media_kind, background, \
                             expires_at, created_at, view_count, duration_secs";

impl SqliteStore {
    /// Create or open a store
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        let conn = if config.path.as_os_str() == IN_MEMORY {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = config.path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let conn = Connection::open_with_flags(
                &config.path,
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                ",
            )?;
            conn
        };

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;

        let (changes, _) = broadcast::channel(config.change_capacity);

        tracing::info!(path = ?config.path, "Story store opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            config,
            changes,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Messages of a conversation, oldest first
    pub async fn messages(&self, conversation_id: &str) -> StoreResult<Vec<Message>> {
        let conversation_id = conversation_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, conversation_id, sender_id, content, story_id, attachment_url, created_at
                 FROM messages WHERE conversation_id = ? ORDER BY created_at ASC, rowid ASC",
            )?;
            let rows = stmt.query_map(params![conversation_id], |row| {
                Ok(Message {
                    id: row.get(0)?,
                    conversation_id: row.get(1)?,
                    sender_id: row.get(2)?,
                    content: row.get(3)?,
                    story_id: row.get(4)?,
                    attachment_url: row.get(5)?,
                    created_at: datetime_column(row, 6)?,
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    /// The direct conversation between two users, if one exists
    pub async fn direct_conversation(&self, a: &str, b: &str) -> StoreResult<Option<Id>> {
        let (a, b) = (a.to_string(), b.to_string());
        self.with_conn(move |conn| Ok(find_direct_conversation(conn, &a, &b)?))
            .await
    }

    /// Look up a single story by id
    pub async fn story(&self, story_id: &str) -> StoreResult<Story> {
        let story_id = story_id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM stories WHERE id = ?", STORY_COLUMNS),
                params![story_id],
                story_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::StoryNotFound(story_id.clone()))
        })
        .await
    }

    /// Run `op` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, op: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            op(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("store task failed: {}", e)))?
    }

    fn publish(&self, change: StoryChange) {
        // No receivers is fine
        let _ = self.changes.send(change);
    }
}

#[async_trait]
impl StoryStore for SqliteStore {
    async fn upsert_view(&self, story_id: &str, viewer_id: &str) -> StoreResult<()> {
        let now = Utc::now().timestamp_millis();
        let (sid, vid) = (story_id.to_string(), viewer_id.to_string());
        let inserted = self
            .with_conn(move |conn| {
                let tx = conn.transaction()?;

                let exists = tx
                    .query_row("SELECT 1 FROM stories WHERE id = ?", params![sid], |_| Ok(()))
                    .optional()?
                    .is_some();
                if !exists {
                    return Err(StoreError::StoryNotFound(sid));
                }

                let seen_before = tx
                    .query_row(
                        "SELECT 1 FROM story_views WHERE story_id = ? AND viewer_id = ?",
                        params![sid, vid],
                        |_| Ok(()),
                    )
                    .optional()?
                    .is_some();

                tx.execute(
                    "INSERT INTO story_views (story_id, viewer_id, viewed_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT (story_id, viewer_id) DO UPDATE SET viewed_at = excluded.viewed_at",
                    params![sid, vid, now],
                )?;
                tx.execute(
                    "UPDATE stories SET view_count =
                        (SELECT COUNT(*) FROM story_views WHERE story_id = ?1)
                     WHERE id = ?1",
                    params![sid],
                )?;
                tx.commit()?;
                Ok(!seen_before)
            })
            .await?;

        if inserted {
            tracing::debug!(story_id, viewer_id, "Story view recorded");
            self.publish(StoryChange::Viewed {
                story_id: story_id.to_string(),
                viewer_id: viewer_id.to_string(),
            });
        }
        Ok(())
    }

    async fn toggle_like(&self, story_id: &str, user_id: &str) -> StoreResult<bool> {
        let (sid, uid) = (story_id.to_string(), user_id.to_string());
        let liked = self
            .with_conn(move |conn| {
                let tx = conn.transaction()?;
                let removed = tx.execute(
                    "DELETE FROM story_likes WHERE story_id = ? AND user_id = ?",
                    params![sid, uid],
                )?;
                let liked = if removed == 0 {
                    tx.execute(
                        "INSERT INTO story_likes (story_id, user_id, created_at) VALUES (?, ?, ?)",
                        params![sid, uid, Utc::now().timestamp_millis()],
                    )
                    .map_err(|e| match e {
                        rusqlite::Error::SqliteFailure(f, _)
                            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
                        {
                            StoreError::StoryNotFound(sid.clone())
                        }
                        other => other.into(),
                    })?;
                    true
                } else {
                    false
                };
                tx.commit()?;
                Ok(liked)
            })
            .await?;

        tracing::debug!(story_id, user_id, liked, "Story like toggled");
        self.publish(StoryChange::LikeToggled {
            story_id: story_id.to_string(),
            user_id: user_id.to_string(),
            liked,
        });
        Ok(liked)
    }

    async fn is_liked(&self, story_id: &str, user_id: &str) -> StoreResult<bool> {
        let (sid, uid) = (story_id.to_string(), user_id.to_string());
        self.with_conn(move |conn| {
            let liked = conn
                .query_row(
                    "SELECT 1 FROM story_likes WHERE story_id = ? AND user_id = ?",
                    params![sid, uid],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            Ok(liked)
        })
        .await
    }

    async fn fetch_viewers(&self, story_id: &str) -> StoreResult<Vec<ViewerEntry>> {
        let sid = story_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT v.viewer_id, v.viewed_at, p.display_name, p.avatar_url,
                        EXISTS (SELECT 1 FROM story_likes l
                                WHERE l.story_id = v.story_id AND l.user_id = v.viewer_id)
                 FROM story_views v
                 LEFT JOIN profiles p ON p.id = v.viewer_id
                 WHERE v.story_id = ?
                 ORDER BY v.viewed_at DESC",
            )?;
            let rows = stmt.query_map(params![sid], |row| {
                let viewer_id: String = row.get(0)?;
                let display_name: Option<String> = row.get(2)?;
                let profile = Profile {
                    id: viewer_id.clone(),
                    display_name: display_name.unwrap_or_else(|| "Unknown user".to_string()),
                    avatar_url: row.get(3)?,
                };
                Ok(ViewerEntry {
                    viewer_id,
                    viewed_at: datetime_column(row, 1)?,
                    liked: row.get(4)?,
                    profile,
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn delete_story(&self, story_id: &str, owner_id: &str) -> StoreResult<bool> {
        let (sid, oid) = (story_id.to_string(), owner_id.to_string());
        let removed = self
            .with_conn(move |conn| {
                let owner: Option<String> = conn
                    .query_row("SELECT user_id FROM stories WHERE id = ?", params![sid], |row| {
                        row.get(0)
                    })
                    .optional()?;
                match owner {
                    None => Ok(false),
                    Some(owner) if owner != oid => Err(StoreError::Forbidden(format!(
                        "story {} belongs to another user",
                        sid
                    ))),
                    Some(_) => {
                        conn.execute(
                            "DELETE FROM stories WHERE id = ? AND user_id = ?",
                            params![sid, oid],
                        )?;
                        Ok(true)
                    }
                }
            })
            .await
            .map_err(|e| {
                tracing::warn!(story_id, owner_id, error = %e, "Story delete failed");
                e
            })?;

        if !removed {
            tracing::warn!(story_id, owner_id, "Story not deleted: missing");
            return Ok(false);
        }

        tracing::info!(story_id, owner_id, "Story deleted");
        self.publish(StoryChange::Deleted {
            story_id: story_id.to_string(),
            user_id: owner_id.to_string(),
        });
        Ok(true)
    }

    async fn send_reply(&self, reply: &ReplyRequest) -> StoreResult<Id> {
        let text = reply.text.trim().to_string();
        if text.is_empty() {
            return Err(StoreError::Invalid("reply text is empty".to_string()));
        }
        if reply.viewer_id == reply.owner_id {
            return Err(StoreError::Invalid("cannot reply to your own story".to_string()));
        }

        let now = Utc::now().timestamp_millis();
        let reply = reply.clone();
        let story_id = reply.story_id.clone();
        let (message_id, conversation_id) = self
            .with_conn(move |conn| {
                let tx = conn.transaction()?;

                let conversation_id =
                    match find_direct_conversation(&tx, &reply.viewer_id, &reply.owner_id)? {
                        Some(id) => id,
                        None => {
                            let id = Uuid::new_v4().to_string();
                            tx.execute(
                                "INSERT INTO conversations (id, kind, created_at, updated_at)
                                 VALUES (?, 'direct', ?, ?)",
                                params![id, now, now],
                            )?;
                            for member in [&reply.viewer_id, &reply.owner_id] {
                                tx.execute(
                                    "INSERT INTO conversation_members (conversation_id, user_id)
                                     VALUES (?, ?)",
                                    params![id, member],
                                )?;
                            }
                            tracing::debug!(conversation_id = %id, "Direct conversation created");
                            id
                        }
                    };

                let message_id = Uuid::new_v4().to_string();
                tx.execute(
                    "INSERT INTO messages
                        (id, conversation_id, sender_id, content, story_id, attachment_url, created_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                    params![
                        message_id,
                        conversation_id,
                        reply.viewer_id,
                        text,
                        reply.story_id,
                        reply.media_url,
                        now
                    ],
                )?;
                tx.execute(
                    "UPDATE conversations SET updated_at = ? WHERE id = ?",
                    params![now, conversation_id],
                )?;
                tx.commit()?;
                Ok((message_id, conversation_id))
            })
            .await?;

        tracing::info!(
            story_id = %story_id,
            conversation_id = %conversation_id,
            "Story reply sent"
        );
        Ok(message_id)
    }

    async fn publish_story(&self, story: NewStory) -> StoreResult<Story> {
        if story.content.as_deref().map(str::trim).unwrap_or("").is_empty()
            && story.media_url.is_none()
        {
            return Err(StoreError::Invalid(
                "a story needs text content or media".to_string(),
            ));
        }

        let created_at = Utc::now();
        let lifetime = story
            .lifetime
            .unwrap_or_else(|| Duration::hours(self.config.story_lifetime_hours));
        let record = Story {
            id: Uuid::new_v4().to_string(),
            user_id: story.user_id,
            content: story.content,
            media_url: story.media_url,
            media_kind: story.media_kind,
            background: story.background,
            expires_at: created_at + lifetime,
            created_at,
            view_count: 0,
            duration_secs: story.duration_secs,
        };

        let row = record.clone();
        self.with_conn(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO stories ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    STORY_COLUMNS
                ),
                params![
                    row.id,
                    row.user_id,
                    row.content,
                    row.media_url,
                    row.media_kind.map(|k| k.as_str()),
                    row.background,
                    row.expires_at.timestamp_millis(),
                    row.created_at.timestamp_millis(),
                    row.view_count,
                    row.duration_secs
                ],
            )?;
            Ok(())
        })
        .await?;

        tracing::info!(story_id = %record.id, user_id = %record.user_id, "Story published");
        self.publish(StoryChange::Published {
            story_id: record.id.clone(),
            user_id: record.user_id.clone(),
        });
        Ok(record)
    }

    async fn upsert_profile(&self, profile: &Profile) -> StoreResult<()> {
        let profile = profile.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO profiles (id, display_name, avatar_url) VALUES (?1, ?2, ?3)
                 ON CONFLICT (id) DO UPDATE SET
                    display_name = excluded.display_name,
                    avatar_url = excluded.avatar_url",
                params![profile.id, profile.display_name, profile.avatar_url],
            )?;
            Ok(())
        })
        .await
    }

    async fn profiles(&self, ids: &[Id]) -> StoreResult<Vec<Profile>> {
        let ids = ids.to_vec();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare_cached("SELECT id, display_name, avatar_url FROM profiles WHERE id = ?")?;
            let mut profiles = Vec::with_capacity(ids.len());
            for id in &ids {
                let profile = stmt
                    .query_row(params![id], |row| {
                        Ok(Profile {
                            id: row.get(0)?,
                            display_name: row.get(1)?,
                            avatar_url: row.get(2)?,
                        })
                    })
                    .optional()?;
                if let Some(profile) = profile {
                    profiles.push(profile);
                }
            }
            Ok(profiles)
        })
        .await
    }

    async fn active_stories(&self, now: DateTime<Utc>) -> StoreResult<Vec<Story>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {} FROM stories WHERE expires_at > ? ORDER BY created_at DESC",
                STORY_COLUMNS
            ))?;
            let rows = stmt.query_map(params![now.timestamp_millis()], story_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let count = self
            .with_conn(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM stories WHERE expires_at <= ?",
                    params![now.timestamp_millis()],
                )?)
            })
            .await?;

        if count > 0 {
            tracing::info!(count, "Expired stories purged");
            self.publish(StoryChange::Expired { count });
        }
        Ok(count)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoryChange> {
        self.changes.subscribe()
    }
}

fn find_direct_conversation(conn: &Connection, a: &str, b: &str) -> rusqlite::Result<Option<Id>> {
    conn.query_row(
        "SELECT c.id FROM conversations c
         JOIN conversation_members ma ON ma.conversation_id = c.id AND ma.user_id = ?1
         JOIN conversation_members mb ON mb.conversation_id = c.id AND mb.user_id = ?2
         WHERE c.kind = 'direct'
         ORDER BY c.created_at ASC
         LIMIT 1",
        params![a, b],
        |row| row.get(0),
    )
    .optional()
}

fn datetime_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let millis: i64 = row.get(idx)?;
    DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, millis))
}

fn story_from_row(row: &Row<'_>) -> rusqlite::Result<Story> {
    let media_kind: Option<String> = row.get(4)?;
    let duration_secs: Option<i64> = row.get(9)?;
    let view_count: i64 = row.get(8)?;
    Ok(Story {
        id: row.get(0)?,
        user_id: row.get(1)?,
        content: row.get(2)?,
        media_url: row.get(3)?,
        media_kind: media_kind.as_deref().and_then(MediaKind::parse),
        background: row.get(5)?,
        expires_at: datetime_column(row, 6)?,
        created_at: datetime_column(row, 7)?,
        view_count: u32::try_from(view_count).unwrap_or(0),
        duration_secs: duration_secs.and_then(|d| u32::try_from(d).ok()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn store_with_story() -> (SqliteStore, Story) {
        let store = SqliteStore::open(StoreConfig::in_memory()).unwrap();
        store
            .upsert_profile(&Profile::new("alice", "Alice"))
            .await
            .unwrap();
        store
            .upsert_profile(&Profile::new("bob", "Bob").avatar("bob.png"))
            .await
            .unwrap();
        let story = store
            .publish_story(NewStory::media("alice", MediaKind::Image, "a.jpg"))
            .await
            .unwrap();
        (store, story)
    }

    #[tokio::test]
    async fn test_upsert_view_is_idempotent() {
        let (store, story) = store_with_story().await;

        store.upsert_view(&story.id, "bob").await.unwrap();
        store.upsert_view(&story.id, "bob").await.unwrap();

        let viewers = store.fetch_viewers(&story.id).await.unwrap();
        assert_eq!(viewers.len(), 1);
        assert_eq!(store.story(&story.id).await.unwrap().view_count, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_views_share_the_connection() {
        let (store, story) = store_with_story().await;
        let store = Arc::new(store);

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                let story_id = story.id.clone();
                tokio::spawn(async move {
                    store
                        .upsert_view(&story_id, &format!("viewer{}", i % 4))
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(store.story(&story.id).await.unwrap().view_count, 4);
        assert_eq!(store.fetch_viewers(&story.id).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_upsert_view_missing_story() {
        let store = SqliteStore::open(StoreConfig::in_memory()).unwrap();
        let err = store.upsert_view("nope", "bob").await.unwrap_err();
        assert!(matches!(err, StoreError::StoryNotFound(_)));
    }

    #[tokio::test]
    async fn test_toggle_like_round_trip() {
        let (store, story) = store_with_story().await;

        assert!(!store.is_liked(&story.id, "bob").await.unwrap());
        assert!(store.toggle_like(&story.id, "bob").await.unwrap());
        assert!(store.is_liked(&story.id, "bob").await.unwrap());
        assert!(!store.toggle_like(&story.id, "bob").await.unwrap());
        assert!(!store.is_liked(&story.id, "bob").await.unwrap());
    }

    #[tokio::test]
    async fn test_toggle_like_missing_story() {
        let store = SqliteStore::open(StoreConfig::in_memory()).unwrap();
        assert!(store.toggle_like("nope", "bob").await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_viewers_enriched_and_sorted() {
        let (store, story) = store_with_story().await;

        store.upsert_view(&story.id, "carol").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.upsert_view(&story.id, "bob").await.unwrap();
        store.toggle_like(&story.id, "bob").await.unwrap();

        let viewers = store.fetch_viewers(&story.id).await.unwrap();
        assert_eq!(viewers.len(), 2);
        assert_eq!(viewers[0].viewer_id, "bob");
        assert!(viewers[0].liked);
        assert_eq!(viewers[0].profile.display_name, "Bob");
        assert_eq!(viewers[0].profile.avatar_url.as_deref(), Some("bob.png"));
        assert_eq!(viewers[1].viewer_id, "carol");
        assert!(!viewers[1].liked);
        assert_eq!(viewers[1].profile.display_name, "Unknown user");
    }

    #[tokio::test]
    async fn test_fetch_viewers_empty() {
        let (store, story) = store_with_story().await;
        assert!(store.fetch_viewers(&story.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_story_owner_only_and_cascades() {
        let (store, story) = store_with_story().await;
        store.upsert_view(&story.id, "bob").await.unwrap();
        store.toggle_like(&story.id, "bob").await.unwrap();

        assert!(matches!(
            store.delete_story(&story.id, "bob").await,
            Err(StoreError::Forbidden(_))
        ));
        assert!(store.delete_story(&story.id, "alice").await.unwrap());
        assert!(!store.delete_story(&story.id, "alice").await.unwrap());
        assert!(store.fetch_viewers(&story.id).await.unwrap().is_empty());
        assert!(!store.is_liked(&story.id, "bob").await.unwrap());
        assert!(matches!(
            store.story(&story.id).await,
            Err(StoreError::StoryNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_send_reply_reuses_conversation() {
        let (store, story) = store_with_story().await;
        let reply = ReplyRequest {
            viewer_id: "bob".into(),
            owner_id: "alice".into(),
            text: "  nice!  ".into(),
            story_id: story.id.clone(),
            media_url: story.media_url.clone(),
        };

        store.send_reply(&reply).await.unwrap();
        store.send_reply(&reply).await.unwrap();

        let conversation = store
            .direct_conversation("alice", "bob")
            .await
            .unwrap()
            .expect("conversation created");
        let messages = store.messages(&conversation).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "nice!");
        assert_eq!(messages[0].story_id.as_deref(), Some(story.id.as_str()));
        assert_eq!(messages[0].attachment_url.as_deref(), Some("a.jpg"));
        assert_eq!(messages[0].sender_id, "bob");
    }

    #[tokio::test]
    async fn test_send_reply_rejects_empty_text() {
        let (store, story) = store_with_story().await;
        let reply = ReplyRequest {
            viewer_id: "bob".into(),
            owner_id: "alice".into(),
            text: "   ".into(),
            story_id: story.id,
            media_url: None,
        };
        assert!(matches!(
            store.send_reply(&reply).await,
            Err(StoreError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_active_stories_and_purge() {
        let store = SqliteStore::open(StoreConfig::in_memory()).unwrap();
        let live = store
            .publish_story(NewStory::text("alice", "still here"))
            .await
            .unwrap();
        store
            .publish_story(NewStory::text("alice", "gone").lifetime(Duration::seconds(-1)))
            .await
            .unwrap();

        let active = store.active_stories(Utc::now()).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, live.id);

        assert_eq!(store.purge_expired(Utc::now()).await.unwrap(), 1);
        assert_eq!(store.purge_expired(Utc::now()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_publish_requires_content() {
        let store = SqliteStore::open(StoreConfig::in_memory()).unwrap();
        let err = store
            .publish_story(NewStory::text("alice", " "))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_changes_are_broadcast() {
        let (store, story) = store_with_story().await;
        let mut rx = store.subscribe();

        store.upsert_view(&story.id, "bob").await.unwrap();
        store.upsert_view(&story.id, "bob").await.unwrap();
        store.delete_story(&story.id, "alice").await.unwrap();

        assert!(matches!(rx.recv().await.unwrap(), StoryChange::Viewed { .. }));
        let next = rx.recv().await.unwrap();
        assert!(matches!(next, StoryChange::Deleted { .. }));
        assert!(next.affects_groups());
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("stories.db");

        let id = {
            let store = SqliteStore::open(StoreConfig::new(&path)).unwrap();
            store
                .publish_story(NewStory::text("alice", "persist me").duration(8))
                .await
                .unwrap()
                .id
        };

        let store = SqliteStore::open(StoreConfig::new(&path)).unwrap();
        let story = store.story(&id).await.unwrap();
        assert_eq!(story.content.as_deref(), Some("persist me"));
        assert_eq!(story.duration_secs, Some(8));
        assert_eq!(story.media_kind, Some(MediaKind::Text));
    }
}
