//! Story Store
//!
//! The persistence contract the player and the story bar talk to:
//!
//! - **upsert_view**: idempotent on (story, viewer)
//! - **toggle_like**: insert-or-delete on (story, user)
//! - **fetch_viewers**: profile-enriched distinct viewers, newest first
//! - **delete_story**: owner-only removal, cascading to views and likes
//! - **send_reply**: reuse or create a direct conversation and append a message
//!
//! Mutations are announced on a broadcast channel as typed [`StoryChange`]
//! events, so containers re-fetch from a message stream rather than from
//! callbacks closing over their state.
//!
//! # Example
//!
//! ```rust,no_run
//! use storyreel::store::{SqliteStore, StoreConfig, StoryStore};
//! use storyreel::story::NewStory;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = SqliteStore::open(StoreConfig::new("./stories.db"))?;
//!     let story = store.publish_story(NewStory::text("alice", "hi")).await?;
//!     store.upsert_view(&story.id, "bob").await?;
//!     let viewers = store.fetch_viewers(&story.id).await?;
//!     println!("{} viewers", viewers.len());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::story::{Id, NewStory, Profile, ReplyRequest, Story, ViewerEntry};

pub use error::{StoreError, StoreResult};
pub use sqlite::{SqliteStore, StoreConfig};

/// A change to story data, published after the mutation commits
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoryChange {
    Published { story_id: Id, user_id: Id },
    Deleted { story_id: Id, user_id: Id },
    Viewed { story_id: Id, viewer_id: Id },
    LikeToggled { story_id: Id, user_id: Id, liked: bool },
    Expired { count: usize },
}

impl StoryChange {
    /// Whether the set of active stories (and so the story bar) changed
    pub fn affects_groups(&self) -> bool {
        matches!(
            self,
            StoryChange::Published { .. } | StoryChange::Deleted { .. } | StoryChange::Expired { .. }
        )
    }
}

/// Persistence operations used by the story player and story bar
#[async_trait]
pub trait StoryStore: Send + Sync {
    /// Record that `viewer_id` has seen the story; repeated calls collapse to one row
    async fn upsert_view(&self, story_id: &str, viewer_id: &str) -> StoreResult<()>;

    /// Flip the like on (story, user); returns whether the story is now liked
    async fn toggle_like(&self, story_id: &str, user_id: &str) -> StoreResult<bool>;

    /// Whether (story, user) currently holds a like
    async fn is_liked(&self, story_id: &str, user_id: &str) -> StoreResult<bool>;

    /// Distinct viewers of a story, most recent view first
    async fn fetch_viewers(&self, story_id: &str) -> StoreResult<Vec<ViewerEntry>>;

    /// Delete a story owned by `owner_id`
    ///
    /// Returns false if the story does not exist and
    /// [`StoreError::Forbidden`] if someone else owns it.
    async fn delete_story(&self, story_id: &str, owner_id: &str) -> StoreResult<bool>;

    /// Deliver a story reply as a direct message; returns the message id
    async fn send_reply(&self, reply: &ReplyRequest) -> StoreResult<Id>;

    /// Publish a new story
    async fn publish_story(&self, story: NewStory) -> StoreResult<Story>;

    /// Create or update a profile
    async fn upsert_profile(&self, profile: &Profile) -> StoreResult<()>;

    /// Load profiles by id; missing ids are skipped
    async fn profiles(&self, ids: &[Id]) -> StoreResult<Vec<Profile>>;

    /// All stories still active at `now`, newest first
    async fn active_stories(&self, now: DateTime<Utc>) -> StoreResult<Vec<Story>>;

    /// Remove stories that expired before `now`; returns how many were removed
    async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize>;

    /// Subscribe to change events
    fn subscribe(&self) -> broadcast::Receiver<StoryChange>;
}
