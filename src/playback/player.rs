//! Story Player
//!
//! Immersive, auto-advancing playback over a list of user-story-groups.
//!
//! The player is a reducer: [`StoryPlayer::handle`] applies one
//! [`PlayerEvent`] to the transient playback state and returns the
//! [`Effect`]s to run. It performs no I/O and never blocks on a request, so
//! gestures always apply against current state; async results come back as
//! [`Completion`]s and are discarded when the story entry they were issued
//! for is no longer on screen.
//!
//! # Timer
//!
//! Whenever the story entry, the pause state or the measured media duration
//! changes, the current timer generation is retired and a new one is armed
//! (or none, while paused or waiting for a video's length). Ticks from
//! retired generations are ignored.

use chrono::Utc;
use std::time::Duration;

use super::cursor::{Cursor, Step};
use super::events::{Completion, Effect, Notice, PlayerEvent, RequestTag};
use super::gesture::{DragAction, TapZone};
use super::progress::{Progress, StoryDuration};
use crate::config::PlaybackConfig;
use crate::story::{sort_viewers, Id, ReplyRequest, Story, UserStoryGroup, ViewerEntry};

/// Why playback is currently held
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PauseState {
    /// Explicit pause button
    pub toggled: bool,
    /// Pointer or touch held down on the card
    pub held: bool,
    /// Reply field has focus
    pub reply_focus: bool,
    /// Owner's viewer sheet is open
    pub viewers_open: bool,
    /// A reply is on its way to the store
    pub sending: bool,
}

impl PauseState {
    pub fn is_paused(&self) -> bool {
        self.toggled || self.held || self.reply_focus || self.viewers_open || self.sending
    }
}

/// Owner's list of who has seen the current story
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ViewerSheet {
    #[default]
    Closed,
    Loading,
    /// Loaded rows, newest view first; empty is the "no viewers yet" state
    Loaded(Vec<ViewerEntry>),
    Failed,
}

/// An optimistic local change and the value that undoes it
#[derive(Debug, Clone)]
struct Optimistic<T> {
    tag: RequestTag,
    previous: T,
}

impl<T> Optimistic<T> {
    fn compensate(self) -> T {
        self.previous
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TimerKey {
    epoch: u64,
    running: bool,
    duration: Option<Duration>,
}

/// Transient playback state for one viewer
pub struct StoryPlayer {
    viewer_id: Id,
    config: PlaybackConfig,
    groups: Vec<UserStoryGroup>,
    cursor: Cursor,
    progress: Progress,
    pause: PauseState,
    /// Measured length of the current video
    measured: Option<Duration>,
    /// Like status of the current story; `None` until fetched
    liked: Option<bool>,
    pending_like: Option<Optimistic<Option<bool>>>,
    pending_delete: Option<RequestTag>,
    pending_reply: Option<RequestTag>,
    viewers: ViewerSheet,
    reply_draft: String,
    press_origin: Option<(f64, f64)>,
    /// Increases on every story entry
    epoch: u64,
    generation: u64,
    timer: Option<TimerKey>,
    closed: bool,
}

impl StoryPlayer {
    /// Open the player on `start_user`'s first story
    ///
    /// Returns the effects of entering the first story; with no groups the
    /// player closes immediately.
    pub fn open(
        viewer_id: impl Into<Id>,
        groups: Vec<UserStoryGroup>,
        start_user: usize,
        config: PlaybackConfig,
    ) -> (Self, Vec<Effect>) {
        let mut player = Self {
            viewer_id: viewer_id.into(),
            config,
            groups: Vec::new(),
            cursor: Cursor::default(),
            progress: Progress::default(),
            pause: PauseState::default(),
            measured: None,
            liked: None,
            pending_like: None,
            pending_delete: None,
            pending_reply: None,
            viewers: ViewerSheet::Closed,
            reply_draft: String::new(),
            press_origin: None,
            epoch: 0,
            generation: 0,
            timer: None,
            closed: false,
        };
        let mut effects = Vec::new();
        player.reload(groups, start_user, &mut effects);
        player.sync_timer(&mut effects);
        (player, effects)
    }

    pub fn viewer_id(&self) -> &str {
        &self.viewer_id
    }

    pub fn groups(&self) -> &[UserStoryGroup] {
        &self.groups
    }

    pub fn user_index(&self) -> usize {
        self.cursor.user
    }

    pub fn story_index(&self) -> usize {
        self.cursor.story
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Elapsed share of the current story, 0 to 100
    pub fn progress(&self) -> f64 {
        self.progress.value()
    }

    pub fn pause_state(&self) -> PauseState {
        self.pause
    }

    pub fn is_paused(&self) -> bool {
        self.pause.is_paused()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn liked(&self) -> Option<bool> {
        self.liked
    }

    pub fn viewer_sheet(&self) -> &ViewerSheet {
        &self.viewers
    }

    pub fn reply_draft(&self) -> &str {
        &self.reply_draft
    }

    /// Counter that changes every time a story is entered
    pub fn entry_epoch(&self) -> u64 {
        self.epoch
    }

    /// Generation of the running timer, if one is armed
    pub fn timer_generation(&self) -> Option<u64> {
        self.timer.filter(|t| t.running).map(|_| self.generation)
    }

    pub fn current_group(&self) -> Option<&UserStoryGroup> {
        if self.closed {
            return None;
        }
        self.groups.get(self.cursor.user)
    }

    pub fn current_story(&self) -> Option<&Story> {
        self.current_group()
            .and_then(|g| g.stories.get(self.cursor.story))
    }

    /// Whether the viewer owns the story on screen
    pub fn is_owner(&self) -> bool {
        self.current_story()
            .map(|s| s.user_id == self.viewer_id)
            .unwrap_or(false)
    }

    /// Duration of the story on screen
    pub fn duration(&self) -> Option<StoryDuration> {
        self.current_story()
            .map(|s| StoryDuration::resolve(s, self.measured, self.config.default_duration()))
    }

    /// Apply one event
    pub fn handle(&mut self, event: PlayerEvent) -> Vec<Effect> {
        let mut effects = Vec::new();

        if let PlayerEvent::Reload { groups, start_user } = event {
            self.reload(groups, start_user, &mut effects);
            self.sync_timer(&mut effects);
            return effects;
        }

        if self.closed {
            if let PlayerEvent::Completed(completion) = event {
                tracing::debug!(?completion, "Completion after close ignored");
            }
            return effects;
        }

        match event {
            PlayerEvent::Reload { .. } => {}
            PlayerEvent::Tick { generation } => self.on_tick(generation, &mut effects),
            PlayerEvent::MediaDurationLoaded { story_id, duration } => {
                self.on_media_duration(&story_id, duration)
            }
            PlayerEvent::Tap(zone) => self.on_tap(zone, &mut effects),
            PlayerEvent::TapAt { x, width } => {
                let zone = TapZone::from_position(x, width, self.config.tap_zone_fraction);
                self.on_tap(zone, &mut effects)
            }
            PlayerEvent::Previous => self.retreat_story(&mut effects),
            PlayerEvent::Next => self.advance_story(&mut effects),
            PlayerEvent::PointerDown { x, y } => {
                self.press_origin = Some((x, y));
                self.pause.held = true;
            }
            PlayerEvent::PointerUp { x, y } => self.on_pointer_up(x, y, &mut effects),
            PlayerEvent::PointerCancel => {
                self.press_origin = None;
                self.pause.held = false;
            }
            PlayerEvent::TogglePause => self.pause.toggled = !self.pause.toggled,
            PlayerEvent::ReplyFocus(focused) => {
                self.pause.reply_focus = focused && !self.is_owner();
            }
            PlayerEvent::ReplyInput(text) => {
                if !self.is_owner() {
                    self.reply_draft = text;
                }
            }
            PlayerEvent::SubmitReply => self.submit_reply(&mut effects),
            PlayerEvent::ToggleLike => self.toggle_like(&mut effects),
            PlayerEvent::OpenViewers => self.open_viewers(&mut effects),
            PlayerEvent::CloseViewers => {
                self.viewers = ViewerSheet::Closed;
                self.pause.viewers_open = false;
            }
            PlayerEvent::DeleteStory => self.request_delete(&mut effects),
            PlayerEvent::Close => self.close(&mut effects),
            PlayerEvent::Completed(completion) => self.on_completion(completion, &mut effects),
        }

        self.sync_timer(&mut effects);
        effects
    }

    fn reload(&mut self, groups: Vec<UserStoryGroup>, start_user: usize, effects: &mut Vec<Effect>) {
        let now = Utc::now();
        self.groups = groups
            .into_iter()
            .map(|mut g| {
                g.stories.retain(|s| s.is_active(now));
                g
            })
            .filter(|g| !g.is_empty())
            .collect();
        self.closed = false;
        self.pause = PauseState::default();
        self.pending_like = None;
        self.pending_delete = None;
        self.pending_reply = None;
        self.reply_draft.clear();
        self.press_origin = None;

        match Cursor::start(&self.groups, start_user) {
            Some(cursor) => {
                tracing::debug!(
                    groups = self.groups.len(),
                    start_user = cursor.user,
                    "Story player opened"
                );
                self.enter(cursor, effects);
            }
            None => {
                tracing::debug!("No stories to play");
                self.close(effects);
            }
        }
    }

    /// Make `cursor` the story on screen and fire its entry side effects
    fn enter(&mut self, cursor: Cursor, effects: &mut Vec<Effect>) {
        self.cursor = cursor;
        self.epoch += 1;
        self.progress.reset();
        self.measured = None;
        self.liked = None;
        self.pending_like = None;
        self.viewers = ViewerSheet::Closed;
        self.pause.viewers_open = false;

        let Some(story) = self.current_story() else {
            return;
        };
        let story_id = story.id.clone();

        // Owners viewing their own story record nothing and have no reply field
        if self.is_owner() {
            self.pause.reply_focus = false;
            return;
        }

        effects.push(Effect::RecordView {
            story_id,
            viewer_id: self.viewer_id.clone(),
        });
        effects.push(Effect::FetchLikeStatus {
            tag: self.tag(),
            user_id: self.viewer_id.clone(),
        });
    }

    fn tag(&self) -> RequestTag {
        RequestTag {
            story_id: self
                .current_story()
                .map(|s| s.id.clone())
                .unwrap_or_default(),
            epoch: self.epoch,
        }
    }

    fn is_current(&self, tag: &RequestTag) -> bool {
        !self.closed && tag.epoch == self.epoch && self.tag().story_id == tag.story_id
    }

    fn advance_story(&mut self, effects: &mut Vec<Effect>) {
        match self.cursor.advance_story(&self.groups) {
            Step::Moved(next) => self.enter(next, effects),
            Step::End => self.close(effects),
        }
    }

    fn retreat_story(&mut self, effects: &mut Vec<Effect>) {
        if let Some(prev) = self.cursor.retreat_story(&self.groups) {
            self.enter(prev, effects);
        }
    }

    /// Terminal transition; fires close and refresh exactly once
    fn close(&mut self, effects: &mut Vec<Effect>) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.viewers = ViewerSheet::Closed;
        tracing::debug!(viewer_id = %self.viewer_id, "Story player closed");
        effects.push(Effect::Close);
        effects.push(Effect::Refresh);
    }

    fn on_tick(&mut self, generation: u64, effects: &mut Vec<Effect>) {
        if generation != self.generation || self.timer_generation().is_none() {
            return;
        }
        if self.pause.is_paused() {
            return;
        }
        let Some(StoryDuration::Known(duration)) = self.duration() else {
            return;
        };
        if self.progress.tick(duration, self.config.tick_interval()) {
            self.advance_story(effects);
        }
    }

    fn on_media_duration(&mut self, story_id: &str, duration: Duration) {
        let Some(story) = self.current_story() else {
            return;
        };
        if story.id != story_id || !story.is_video() {
            return;
        }
        // A zero-length report would make every tick complete the story
        self.measured = Some(duration.max(self.config.tick_interval()));
    }

    fn on_tap(&mut self, zone: TapZone, effects: &mut Vec<Effect>) {
        match zone {
            TapZone::Left => self.retreat_story(effects),
            TapZone::Right => self.advance_story(effects),
            TapZone::Middle => {}
        }
    }

    fn on_pointer_up(&mut self, x: f64, y: f64, effects: &mut Vec<Effect>) {
        self.pause.held = false;
        let Some((x0, y0)) = self.press_origin.take() else {
            return;
        };
        match DragAction::classify(x - x0, y - y0, self.config.drag_thresholds()) {
            DragAction::Previous => self.retreat_story(effects),
            DragAction::Next => self.advance_story(effects),
            DragAction::Dismiss => self.close(effects),
            DragAction::None => {}
        }
    }

    fn toggle_like(&mut self, effects: &mut Vec<Effect>) {
        if self.is_owner() || self.pending_like.is_some() || self.current_story().is_none() {
            return;
        }
        let tag = self.tag();
        let previous = self.liked;
        self.liked = Some(!previous.unwrap_or(false));
        self.pending_like = Some(Optimistic {
            tag: tag.clone(),
            previous,
        });
        effects.push(Effect::ToggleLike {
            tag,
            user_id: self.viewer_id.clone(),
        });
    }

    fn open_viewers(&mut self, effects: &mut Vec<Effect>) {
        if !self.is_owner() {
            return;
        }
        self.viewers = ViewerSheet::Loading;
        self.pause.viewers_open = true;
        effects.push(Effect::FetchViewers { tag: self.tag() });
    }

    fn request_delete(&mut self, effects: &mut Vec<Effect>) {
        if !self.is_owner() || self.pending_delete.is_some() {
            return;
        }
        let tag = self.tag();
        self.pending_delete = Some(tag.clone());
        effects.push(Effect::DeleteStory {
            tag,
            owner_id: self.viewer_id.clone(),
        });
    }

    fn submit_reply(&mut self, effects: &mut Vec<Effect>) {
        if self.is_owner() || self.pending_reply.is_some() {
            return;
        }
        let Some(story) = self.current_story() else {
            return;
        };
        if self.reply_draft.trim().is_empty() {
            return;
        }

        let reply = ReplyRequest {
            viewer_id: self.viewer_id.clone(),
            owner_id: story.user_id.clone(),
            text: self.reply_draft.trim().to_string(),
            story_id: story.id.clone(),
            media_url: story.media_url.clone(),
        };
        let tag = self.tag();

        self.reply_draft.clear();
        self.pending_reply = Some(tag.clone());
        self.pause.sending = true;
        effects.push(Effect::SendReply { tag, reply });
    }

    fn on_completion(&mut self, completion: Completion, effects: &mut Vec<Effect>) {
        match completion {
            Completion::ViewRecorded { story_id, result } => {
                if let Err(e) = result {
                    tracing::debug!(story_id = %story_id, error = %e, "Story view not recorded");
                }
            }

            Completion::LikeStatus { tag, result } => {
                if !self.is_current(&tag) || self.pending_like.is_some() {
                    return;
                }
                match result {
                    Ok(liked) => self.liked = Some(liked),
                    Err(e) => {
                        tracing::debug!(story_id = %tag.story_id, error = %e, "Like status unavailable");
                        self.liked = Some(false);
                    }
                }
            }

            Completion::LikeToggled { tag, result } => {
                let pending = match self.pending_like.take() {
                    Some(p) if p.tag == tag => p,
                    other => {
                        // Issued for a story entry that is gone
                        self.pending_like = other;
                        if let Err(e) = result {
                            tracing::warn!(story_id = %tag.story_id, error = %e, "Stale like toggle failed");
                            effects.push(Notice::error("Could not update like").into());
                        }
                        return;
                    }
                };
                match result {
                    Ok(liked) => self.liked = Some(liked),
                    Err(e) => {
                        tracing::warn!(story_id = %tag.story_id, error = %e, "Like toggle failed");
                        self.liked = pending.compensate();
                        effects.push(Notice::error("Could not update like").into());
                    }
                }
            }

            Completion::Viewers { tag, result } => {
                if !self.is_current(&tag) || !self.pause.viewers_open {
                    return;
                }
                match result {
                    Ok(mut viewers) => {
                        sort_viewers(&mut viewers);
                        self.viewers = ViewerSheet::Loaded(viewers);
                    }
                    Err(e) => {
                        tracing::warn!(story_id = %tag.story_id, error = %e, "Viewer list failed");
                        self.viewers = ViewerSheet::Failed;
                        effects.push(Notice::error("Could not load viewers").into());
                    }
                }
            }

            Completion::Deleted { tag, result } => {
                if self.pending_delete.as_ref() == Some(&tag) {
                    self.pending_delete = None;
                }
                match result {
                    Ok(true) => {
                        effects.push(Notice::success("Story deleted").into());
                        self.remove_story(&tag.story_id, effects);
                    }
                    Ok(false) => {
                        effects.push(Notice::error("Could not delete story").into());
                    }
                    Err(e) => {
                        tracing::warn!(story_id = %tag.story_id, error = %e, "Story delete failed");
                        effects.push(Notice::error("Could not delete story").into());
                    }
                }
            }

            Completion::ReplySent { tag, text, result } => {
                if self.pending_reply.as_ref() == Some(&tag) {
                    self.pending_reply = None;
                    self.pause.sending = false;
                }
                match result {
                    Ok(_) => effects.push(Notice::success("Reply sent").into()),
                    Err(e) => {
                        tracing::warn!(story_id = %tag.story_id, error = %e, "Story reply failed");
                        let still_shown = self
                            .current_story()
                            .map(|s| s.id == tag.story_id)
                            .unwrap_or(false);
                        if still_shown && self.reply_draft.is_empty() {
                            self.reply_draft = text;
                        }
                        effects.push(Notice::error("Could not send reply").into());
                    }
                }
            }
        }
    }

    /// Drop a deleted story from the local groups and keep the cursor valid
    fn remove_story(&mut self, story_id: &str, effects: &mut Vec<Effect>) {
        let found = self.groups.iter().enumerate().find_map(|(u, g)| {
            g.stories
                .iter()
                .position(|s| s.id == story_id)
                .map(|s| Cursor::new(u, s))
        });
        let Some(at) = found else {
            return;
        };

        let was_current = at == self.cursor;
        self.groups[at.user].stories.remove(at.story);
        let group_emptied = self.groups[at.user].is_empty();
        if group_emptied {
            self.groups.remove(at.user);
        }

        if was_current {
            if group_emptied {
                if at.user < self.groups.len() {
                    self.enter(Cursor::new(at.user, 0), effects);
                } else {
                    self.close(effects);
                    return;
                }
            } else {
                self.enter(Cursor::new(at.user, at.story.saturating_sub(1)), effects);
            }
        } else if group_emptied && at.user < self.cursor.user {
            self.cursor.user -= 1;
        } else if at.user == self.cursor.user && at.story < self.cursor.story {
            self.cursor.story -= 1;
        }

        effects.push(Effect::Refresh);
    }

    /// Retire the old timer generation when anything it depends on changed
    fn sync_timer(&mut self, effects: &mut Vec<Effect>) {
        let duration = self.duration().and_then(|d| d.known());
        let running = !self.closed && !self.pause.is_paused() && duration.is_some();
        let key = TimerKey {
            epoch: self.epoch,
            running,
            duration,
        };
        if self.timer == Some(key) {
            return;
        }

        let was_running = self.timer.map(|t| t.running).unwrap_or(false);
        self.generation += 1;
        self.timer = Some(key);

        if running {
            effects.push(Effect::ArmTimer {
                generation: self.generation,
                period: self.config.tick_interval(),
            });
        } else if was_running {
            effects.push(Effect::DisarmTimer);
        }
    }
}

impl From<Notice> for Effect {
    fn from(notice: Notice) -> Self {
        Effect::Notify(notice)
    }
}
