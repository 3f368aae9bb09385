//! Story Playback Engine
//!
//! This module provides full-screen story playback:
//!
//! - **cursor**: (user index, story index) navigation
//! - **progress**: per-story progress clock and duration resolution
//! - **gesture**: tap zones and drag classification
//! - **events**: player input, effects and async completions
//! - **player**: the playback state machine
//! - **runtime**: tokio driver running effects against a story store
//!
//! # Architecture
//!
//! ```text
//! Input:
//!   Gesture / Tick / Completion → StoryPlayer::handle → Effects
//!
//! Effects:
//!   ArmTimer → tick task → Tick
//!   RecordView / ToggleLike / ... → StoryStore → Completion (tag-checked)
//! ```

pub mod cursor;
pub mod events;
pub mod gesture;
pub mod player;
pub mod progress;
pub mod runtime;

pub use cursor::{Cursor, Step};
pub use events::{Completion, Effect, Notice, NoticeKind, PlayerEvent, RequestTag};
pub use gesture::{DragAction, DragThresholds, TapZone};
pub use player::{PauseState, StoryPlayer, ViewerSheet};
pub use progress::{Progress, StoryDuration};
pub use runtime::{PlayerHandle, PlayerOutput, PlayerRuntime};
