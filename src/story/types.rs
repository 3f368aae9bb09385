//! Core data types for stories
//!
//! This module defines the records the playback engine reads and the
//! side-effect records it produces:
//! - `Story`: An ephemeral media or text post
//! - `UserStoryGroup`: One user's active stories, in playback order
//! - `ViewerEntry`: A profile-enriched view row shown to the story owner

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a story, user, conversation or message
pub type Id = String;

/// Default lifetime of a freshly published story
pub const DEFAULT_STORY_LIFETIME_HOURS: i64 = 24;

/// What a story displays
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Text,
}

impl MediaKind {
    /// Parse the stored column value
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "image" => Some(MediaKind::Image),
            "video" => Some(MediaKind::Video),
            "text" => Some(MediaKind::Text),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Text => "text",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ephemeral story
///
/// Only eligible for display while `now < expires_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Story {
    pub id: Id,
    /// Owning user
    pub user_id: Id,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub media_kind: Option<MediaKind>,
    /// Background style for text stories (CSS gradient, color name, ...)
    #[serde(default)]
    pub background: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub view_count: u32,
    /// Display duration in seconds; the player default applies when absent
    #[serde(default)]
    pub duration_secs: Option<u32>,
}

impl Story {
    /// Check if the story can still be shown at `now`
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Video stories wait for the media's measured duration before playing
    pub fn is_video(&self) -> bool {
        self.media_kind == Some(MediaKind::Video)
    }
}

/// Fields needed to publish a new story
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewStory {
    pub user_id: Id,
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub media_kind: Option<MediaKind>,
    pub background: Option<String>,
    pub duration_secs: Option<u32>,
    /// Lifetime override; defaults to the store's configured lifetime
    pub lifetime: Option<Duration>,
}

impl NewStory {
    /// A plain text story
    pub fn text(user_id: impl Into<Id>, content: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            content: Some(content.into()),
            media_kind: Some(MediaKind::Text),
            ..Default::default()
        }
    }

    /// A story backed by an uploaded image or video
    pub fn media(user_id: impl Into<Id>, kind: MediaKind, url: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            media_url: Some(url.into()),
            media_kind: Some(kind),
            ..Default::default()
        }
    }

    /// Builder method: set display duration
    pub fn duration(mut self, secs: u32) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    /// Builder method: set background style
    pub fn background(mut self, background: impl Into<String>) -> Self {
        self.background = Some(background.into());
        self
    }

    /// Builder method: override lifetime
    pub fn lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = Some(lifetime);
        self
    }
}

/// Public profile fields shown in story headers and viewer lists
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub id: Id,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl Profile {
    pub fn new(id: impl Into<Id>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            avatar_url: None,
        }
    }

    /// Builder method: set avatar
    pub fn avatar(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }

    /// Placeholder used when a user has no profile row
    pub fn unknown(id: impl Into<Id>) -> Self {
        Self::new(id, "Unknown user")
    }
}

/// One row of the owner's "viewers" sheet
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewerEntry {
    pub viewer_id: Id,
    pub viewed_at: DateTime<Utc>,
    /// Whether this viewer also liked the story
    pub liked: bool,
    pub profile: Profile,
}

/// Sort viewer rows most-recent-view first
pub fn sort_viewers(viewers: &mut [ViewerEntry]) {
    viewers.sort_by(|a, b| b.viewed_at.cmp(&a.viewed_at));
}

/// One user's active stories in playback order (oldest first)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserStoryGroup {
    pub user_id: Id,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub stories: Vec<Story>,
}

impl UserStoryGroup {
    pub fn new(profile: &Profile, stories: Vec<Story>) -> Self {
        Self {
            user_id: profile.id.clone(),
            display_name: profile.display_name.clone(),
            avatar_url: profile.avatar_url.clone(),
            stories,
        }
    }

    pub fn len(&self) -> usize {
        self.stories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }

    /// Creation time of the newest story in the group
    pub fn latest(&self) -> Option<DateTime<Utc>> {
        self.stories.iter().map(|s| s.created_at).max()
    }
}

/// A reply to a story, delivered as a direct message to its owner
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplyRequest {
    pub viewer_id: Id,
    pub owner_id: Id,
    pub text: String,
    /// Back reference to the story being replied to
    pub story_id: Id,
    /// Attachment preview carried on the message
    pub media_url: Option<String>,
}

/// A direct message as stored
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: Id,
    pub conversation_id: Id,
    pub sender_id: Id,
    pub content: String,
    #[serde(default)]
    pub story_id: Option<Id>,
    #[serde(default)]
    pub attachment_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn story_expiring(expires_at: DateTime<Utc>) -> Story {
        Story {
            id: "s1".into(),
            user_id: "u1".into(),
            content: Some("hello".into()),
            media_url: None,
            media_kind: Some(MediaKind::Text),
            background: None,
            expires_at,
            created_at: expires_at - Duration::hours(24),
            view_count: 0,
            duration_secs: None,
        }
    }

    #[test]
    fn test_story_active_until_expiry() {
        let now = Utc::now();
        let story = story_expiring(now + Duration::seconds(1));
        assert!(story.is_active(now));
        assert!(!story.is_active(now + Duration::seconds(1)));
    }

    #[test]
    fn test_media_kind_parse() {
        assert_eq!(MediaKind::parse("video"), Some(MediaKind::Video));
        assert_eq!(MediaKind::parse("gif"), None);
        assert_eq!(MediaKind::Image.to_string(), "image");
    }

    #[test]
    fn test_sort_viewers_most_recent_first() {
        let now = Utc::now();
        let mut viewers = vec![
            ViewerEntry {
                viewer_id: "old".into(),
                viewed_at: now - Duration::minutes(5),
                liked: false,
                profile: Profile::unknown("old"),
            },
            ViewerEntry {
                viewer_id: "new".into(),
                viewed_at: now,
                liked: true,
                profile: Profile::unknown("new"),
            },
        ];
        sort_viewers(&mut viewers);
        assert_eq!(viewers[0].viewer_id, "new");
    }
}
