//! Player Runtime
//!
//! Drives a [`StoryPlayer`] on tokio. Events arrive on an unbounded inbox;
//! store effects run in spawned tasks and report back through the same inbox
//! as completions, so the player never waits on I/O. Each armed timer
//! generation gets its own tick task, aborted when the player re-arms or
//! disarms.
//!
//! The runtime itself only holds a weak reference to its inbox. Once every
//! [`PlayerHandle`] is dropped and no store task is in flight, [`run`]
//! returns even if the player never closed.
//!
//! [`run`]: PlayerRuntime::run

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::events::{Completion, Effect, Notice, PlayerEvent};
use super::player::StoryPlayer;
use crate::store::StoryStore;
use crate::story::Story;

/// What the runtime reports to its owner
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerOutput {
    /// A story is now on screen
    Entered {
        user_index: usize,
        story_index: usize,
        story: Story,
    },
    Notice(Notice),
    /// Recompute the story groups
    Refresh,
    Closed,
}

/// Handle for feeding events into a running player
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    sender: mpsc::UnboundedSender<PlayerEvent>,
}

impl PlayerHandle {
    /// Send an event; returns false once the player has stopped
    pub fn send(&self, event: PlayerEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}

/// Runs a player against a store
pub struct PlayerRuntime {
    store: Arc<dyn StoryStore>,
    inbox_tx: mpsc::WeakUnboundedSender<PlayerEvent>,
    inbox_rx: mpsc::UnboundedReceiver<PlayerEvent>,
    output: mpsc::UnboundedSender<PlayerOutput>,
    timer: Option<JoinHandle<()>>,
}

impl PlayerRuntime {
    /// Create a runtime, a handle for input and a receiver for output
    pub fn new(
        store: Arc<dyn StoryStore>,
    ) -> (Self, PlayerHandle, mpsc::UnboundedReceiver<PlayerOutput>) {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (output, output_rx) = mpsc::unbounded_channel();
        let runtime = Self {
            store,
            inbox_tx: inbox_tx.downgrade(),
            inbox_rx,
            output,
            timer: None,
        };
        let handle = PlayerHandle { sender: inbox_tx };
        (runtime, handle, output_rx)
    }

    /// Run until the player closes or every handle is gone
    ///
    /// `initial` are the effects returned by [`StoryPlayer::open`].
    pub async fn run(mut self, mut player: StoryPlayer, initial: Vec<Effect>) -> StoryPlayer {
        let mut shown = None;
        self.announce(&player, &mut shown);
        if self.execute(initial) {
            return player;
        }

        while let Some(event) = self.inbox_rx.recv().await {
            let effects = player.handle(event);
            self.announce(&player, &mut shown);
            if self.execute(effects) {
                break;
            }
        }

        if !player.is_closed() {
            tracing::debug!(viewer_id = %player.viewer_id(), "Player input closed; stopping");
        }
        self.stop_timer();
        player
    }

    /// Spawn [`run`](Self::run) as a task
    pub fn spawn(self, player: StoryPlayer, initial: Vec<Effect>) -> JoinHandle<StoryPlayer> {
        tokio::spawn(self.run(player, initial))
    }

    fn announce(&self, player: &StoryPlayer, shown: &mut Option<u64>) {
        let epoch = player.entry_epoch();
        if *shown == Some(epoch) {
            return;
        }
        if let Some(story) = player.current_story() {
            *shown = Some(epoch);
            let _ = self.output.send(PlayerOutput::Entered {
                user_index: player.user_index(),
                story_index: player.story_index(),
                story: story.clone(),
            });
        }
    }

    /// Execute effects; returns true when the player has closed
    fn execute(&mut self, effects: Vec<Effect>) -> bool {
        let mut closed = false;
        for effect in effects {
            match effect {
                Effect::ArmTimer { generation, period } => self.arm_timer(generation, period),
                Effect::DisarmTimer => self.stop_timer(),
                Effect::RecordView {
                    story_id,
                    viewer_id,
                } => {
                    self.spawn_store(move |store| async move {
                        let result = store.upsert_view(&story_id, &viewer_id).await;
                        Completion::ViewRecorded { story_id, result }
                    });
                }
                Effect::FetchLikeStatus { tag, user_id } => {
                    self.spawn_store(move |store| async move {
                        let result = store.is_liked(&tag.story_id, &user_id).await;
                        Completion::LikeStatus { tag, result }
                    });
                }
                Effect::ToggleLike { tag, user_id } => {
                    self.spawn_store(move |store| async move {
                        let result = store.toggle_like(&tag.story_id, &user_id).await;
                        Completion::LikeToggled { tag, result }
                    });
                }
                Effect::FetchViewers { tag } => {
                    self.spawn_store(move |store| async move {
                        let result = store.fetch_viewers(&tag.story_id).await;
                        Completion::Viewers { tag, result }
                    });
                }
                Effect::DeleteStory { tag, owner_id } => {
                    self.spawn_store(move |store| async move {
                        let result = store.delete_story(&tag.story_id, &owner_id).await;
                        Completion::Deleted { tag, result }
                    });
                }
                Effect::SendReply { tag, reply } => {
                    self.spawn_store(move |store| async move {
                        let result = store.send_reply(&reply).await;
                        Completion::ReplySent {
                            tag,
                            text: reply.text,
                            result,
                        }
                    });
                }
                Effect::Notify(notice) => {
                    let _ = self.output.send(PlayerOutput::Notice(notice));
                }
                Effect::Refresh => {
                    let _ = self.output.send(PlayerOutput::Refresh);
                }
                Effect::Close => {
                    self.stop_timer();
                    closed = true;
                }
            }
        }

        // Close is reported after its paired refresh
        if closed {
            let _ = self.output.send(PlayerOutput::Closed);
        }
        closed
    }

    fn spawn_store<F, Fut>(&self, op: F)
    where
        F: FnOnce(Arc<dyn StoryStore>) -> Fut,
        Fut: std::future::Future<Output = Completion> + Send + 'static,
    {
        let Some(inbox) = self.inbox_tx.upgrade() else {
            tracing::debug!("Player input closed; store effect dropped");
            return;
        };
        let fut = op(Arc::clone(&self.store));
        tokio::spawn(async move {
            let completion = fut.await;
            // The player may have closed in the meantime
            let _ = inbox.send(PlayerEvent::Completed(completion));
        });
    }

    fn arm_timer(&mut self, generation: u64, period: Duration) {
        self.stop_timer();
        let inbox = self.inbox_tx.clone();
        self.timer = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick fires immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(inbox) = inbox.upgrade() else {
                    break;
                };
                if inbox.send(PlayerEvent::Tick { generation }).is_err() {
                    break;
                }
            }
        }));
        tracing::trace!(generation, "Story timer armed");
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for PlayerRuntime {
    fn drop(&mut self) {
        self.stop_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlaybackConfig;
    use crate::feed::StoryBar;
    use crate::store::{SqliteStore, StoreConfig};
    use crate::story::{NewStory, Profile};
    use tokio::time::Instant;

    async fn seeded() -> Arc<SqliteStore> {
        let store = Arc::new(SqliteStore::open(StoreConfig::in_memory()).unwrap());
        store
            .upsert_profile(&Profile::new("alice", "Alice"))
            .await
            .unwrap();
        store
            .publish_story(NewStory::text("alice", "first"))
            .await
            .unwrap();
        store
    }

    #[tokio::test(start_paused = true)]
    async fn test_plays_to_close_on_timer() {
        let store = seeded().await;
        let mut bar = StoryBar::new(store.clone(), "carol");
        let groups = bar.refresh().await.unwrap().to_vec();
        let story_id = groups[0].stories[0].id.clone();

        let (player, initial) = StoryPlayer::open("carol", groups, 0, PlaybackConfig::default());
        let (runtime, _handle, mut output) = PlayerRuntime::new(store.clone());

        let started = Instant::now();
        let player = runtime.run(player, initial).await;
        let elapsed = started.elapsed();

        assert!(player.is_closed());
        assert!(
            elapsed >= Duration::from_millis(4850) && elapsed <= Duration::from_millis(5150),
            "closed after {:?}",
            elapsed
        );
        match output.recv().await {
            Some(PlayerOutput::Entered { story, .. }) => assert_eq!(story.id, story_id),
            other => panic!("expected entry, got {:?}", other),
        }
        assert_eq!(output.recv().await, Some(PlayerOutput::Refresh));
        assert_eq!(output.recv().await, Some(PlayerOutput::Closed));

        // The view task may still be finishing
        tokio::time::sleep(Duration::from_millis(10)).await;
        let viewers = store.fetch_viewers(&story_id).await.unwrap();
        assert_eq!(viewers.len(), 1);
        assert_eq!(viewers[0].viewer_id, "carol");
    }

    #[tokio::test(start_paused = true)]
    async fn test_like_and_close_through_handle() {
        let store = seeded().await;
        let mut bar = StoryBar::new(store.clone(), "carol");
        let groups = bar.refresh().await.unwrap().to_vec();
        let story_id = groups[0].stories[0].id.clone();

        let (player, initial) = StoryPlayer::open("carol", groups, 0, PlaybackConfig::default());
        let (runtime, handle, _output) = PlayerRuntime::new(store.clone());
        let task = runtime.spawn(player, initial);

        assert!(handle.send(PlayerEvent::TogglePause));
        assert!(handle.send(PlayerEvent::ToggleLike));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(store.is_liked(&story_id, "carol").await.unwrap());

        assert!(handle.send(PlayerEvent::Close));
        let player = task.await.unwrap();
        assert!(player.is_closed());
        assert_eq!(player.liked(), Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_once_handles_are_dropped() {
        let store = seeded().await;
        let mut bar = StoryBar::new(store.clone(), "carol");
        let groups = bar.refresh().await.unwrap().to_vec();

        let (player, initial) = StoryPlayer::open("carol", groups, 0, PlaybackConfig::default());
        let (runtime, handle, output) = PlayerRuntime::new(store.clone());
        let task = runtime.spawn(player, initial);

        assert!(handle.send(PlayerEvent::TogglePause));
        drop(handle);
        drop(output);

        let player = tokio::time::timeout(Duration::from_secs(3600), task)
            .await
            .expect("runtime kept running without input")
            .unwrap();
        assert!(!player.is_closed());
        assert!(player.is_paused());
    }
}
