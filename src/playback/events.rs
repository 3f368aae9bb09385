//! Player Message Types
//!
//! Everything that reaches the player is a [`PlayerEvent`]; everything the
//! player wants done is an [`Effect`]. Async results come back as
//! [`Completion`]s tagged with the request that started them.

use serde::Serialize;
use std::time::Duration;

use super::gesture::TapZone;
use crate::store::StoreResult;
use crate::story::{Id, ReplyRequest, UserStoryGroup, ViewerEntry};

/// Identity of the story entry a request was issued for
///
/// `epoch` increases every time a story is entered, so a result is only
/// applied if the same entry is still on screen.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestTag {
    pub story_id: Id,
    pub epoch: u64,
}

/// Input to the player
#[derive(Debug)]
pub enum PlayerEvent {
    /// Replace the group list and restart at `start_user`
    Reload {
        groups: Vec<UserStoryGroup>,
        start_user: usize,
    },
    /// Timer tick from the timer armed with `generation`
    Tick { generation: u64 },
    /// The media element reported its playback length
    MediaDurationLoaded { story_id: Id, duration: Duration },
    Tap(TapZone),
    /// Tap at `x` on a card `width` wide; resolved to a [`TapZone`]
    TapAt { x: f64, width: f64 },
    Next,
    Previous,
    PointerDown { x: f64, y: f64 },
    PointerUp { x: f64, y: f64 },
    PointerCancel,
    TogglePause,
    ReplyFocus(bool),
    ReplyInput(String),
    SubmitReply,
    ToggleLike,
    OpenViewers,
    CloseViewers,
    DeleteStory,
    Close,
    Completed(Completion),
}

/// Result of an effect, fed back to the player
#[derive(Debug)]
pub enum Completion {
    ViewRecorded {
        story_id: Id,
        result: StoreResult<()>,
    },
    LikeStatus {
        tag: RequestTag,
        result: StoreResult<bool>,
    },
    LikeToggled {
        tag: RequestTag,
        result: StoreResult<bool>,
    },
    Viewers {
        tag: RequestTag,
        result: StoreResult<Vec<ViewerEntry>>,
    },
    Deleted {
        tag: RequestTag,
        result: StoreResult<bool>,
    },
    ReplySent {
        tag: RequestTag,
        text: String,
        result: StoreResult<Id>,
    },
}

/// Work requested by the player
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Start a recurring tick; any previous timer must be torn down
    ArmTimer { generation: u64, period: Duration },
    /// Tear down the running timer
    DisarmTimer,
    RecordView { story_id: Id, viewer_id: Id },
    FetchLikeStatus { tag: RequestTag, user_id: Id },
    ToggleLike { tag: RequestTag, user_id: Id },
    FetchViewers { tag: RequestTag },
    DeleteStory { tag: RequestTag, owner_id: Id },
    SendReply { tag: RequestTag, reply: ReplyRequest },
    Notify(Notice),
    /// Ask the caller to recompute its group list
    Refresh,
    /// Terminal: the player is done
    Close,
}

/// Severity of a transient notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
}

/// Transient user-facing notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }
}
