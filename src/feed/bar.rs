//! Story Bar
//!
//! Keeps the list of user-story-groups current. Change events arrive as typed
//! messages from the store's subscription and are reduced into a reload
//! decision; nothing here closes over caller state.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use super::grouping::{group_active_stories, group_index};
use crate::store::{StoreResult, StoryChange, StoryStore};
use crate::story::{Id, UserStoryGroup};

/// The signed-in user's view of everyone's active stories
pub struct StoryBar {
    store: Arc<dyn StoryStore>,
    viewer_id: Id,
    groups: Vec<UserStoryGroup>,
}

impl StoryBar {
    pub fn new(store: Arc<dyn StoryStore>, viewer_id: impl Into<Id>) -> Self {
        Self {
            store,
            viewer_id: viewer_id.into(),
            groups: Vec::new(),
        }
    }

    pub fn viewer_id(&self) -> &str {
        &self.viewer_id
    }

    /// Current groups; empty means "no stories" rather than an error
    pub fn groups(&self) -> &[UserStoryGroup] {
        &self.groups
    }

    /// Index of a user's group, for opening the player on it
    pub fn index_of(&self, user_id: &str) -> Option<usize> {
        group_index(&self.groups, user_id)
    }

    /// Re-fetch active stories and recompute the groups
    pub async fn refresh(&mut self) -> StoreResult<&[UserStoryGroup]> {
        let now = Utc::now();
        let stories = self.store.active_stories(now).await?;

        let mut user_ids: Vec<Id> = stories.iter().map(|s| s.user_id.clone()).collect();
        user_ids.sort();
        user_ids.dedup();
        let profiles = self.store.profiles(&user_ids).await?;

        self.groups = group_active_stories(stories, &profiles, Some(&self.viewer_id), now);

        tracing::debug!(
            viewer_id = %self.viewer_id,
            groups = self.groups.len(),
            "Story bar refreshed"
        );
        Ok(&self.groups)
    }

    /// Decide whether a change event requires a reload
    pub fn needs_reload(&self, change: &StoryChange) -> bool {
        change.affects_groups()
    }

    /// Follow store changes, pushing fresh groups to `updates` after each
    /// relevant change. Ends when either channel closes.
    pub fn watch(
        mut self,
        mut changes: broadcast::Receiver<StoryChange>,
        updates: mpsc::Sender<Vec<UserStoryGroup>>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let reload = match changes.recv().await {
                    Ok(change) => self.needs_reload(&change),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Story change feed lagged, reloading");
                        true
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                if !reload {
                    continue;
                }

                match self.refresh().await {
                    Ok(groups) => {
                        if updates.send(groups.to_vec()).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Story bar refresh failed");
                    }
                }
            }
            tracing::debug!("Story bar watcher stopped");
        })
    }
}
