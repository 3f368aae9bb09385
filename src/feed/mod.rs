//! Story feed: deriving and refreshing user-story-groups
//!
//! - **grouping**: active stories → per-user groups in playback order
//! - **bar**: holds the current groups and reloads them on store changes

pub mod bar;
pub mod grouping;

pub use bar::StoryBar;
pub use grouping::{group_active_stories, group_index};
