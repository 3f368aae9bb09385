//! # Storyreel
//!
//! Ephemeral story playback for a campus social feed: an auto-advancing,
//! full-screen story player plus the story store it records views, likes
//! and replies into.
//!
//! ## Features
//!
//! - **Playback engine**: timer-driven auto-advance, pause/resume, tap and
//!   drag navigation across users and their stories
//! - **Stale-safe side effects**: every async result is tagged with the story
//!   entry it belongs to and dropped if that entry is gone
//! - **Optimistic likes**: applied locally, compensated on failure
//! - **Story store**: SQLite-backed views, likes, deletion and story replies
//! - **Story bar**: user-story-groups refreshed from a typed change feed
//!
//! ## Modules
//!
//! - [`story`]: Story records
//! - [`store`]: Persistence contract and SQLite store
//! - [`feed`]: Grouping and the story bar
//! - [`playback`]: Player state machine and its tokio runtime
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use storyreel::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(SqliteStore::open(StoreConfig::new("./stories.db"))?);
//!     store.publish_story(NewStory::text("alice", "Library is open late tonight")).await?;
//!
//!     let mut bar = StoryBar::new(store.clone(), "bob");
//!     let groups = bar.refresh().await?.to_vec();
//!
//!     let (player, initial) = StoryPlayer::open("bob", groups, 0, PlaybackConfig::default());
//!     let (runtime, _handle, _output) = PlayerRuntime::new(store);
//!     let player = runtime.run(player, initial).await;
//!     assert!(player.is_closed());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod feed;
pub mod playback;
pub mod store;
pub mod story;

// Re-export top-level types for convenience
pub use story::{
    Id, MediaKind, NewStory, Profile, ReplyRequest, Story, UserStoryGroup, ViewerEntry,
};

pub use store::{SqliteStore, StoreConfig, StoreError, StoreResult, StoryChange, StoryStore};

pub use feed::{group_active_stories, StoryBar};

pub use playback::{
    Completion, Cursor, Effect, Notice, NoticeKind, PlayerEvent, PlayerHandle, PlayerOutput,
    PlayerRuntime, StoryPlayer, TapZone, ViewerSheet,
};

pub use config::{generate_default_config, Config, ConfigError, LoggingConfig, PlaybackConfig};
