//! Story records shared by the store, the story bar and the player

pub mod types;

pub use types::{
    sort_viewers, Id, MediaKind, Message, NewStory, Profile, ReplyRequest, Story, UserStoryGroup,
    ViewerEntry, DEFAULT_STORY_LIFETIME_HOURS,
};
