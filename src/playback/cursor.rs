//! Navigation over (user index, story index)
//!
//! Pure functions of the group list; the player owns the current cursor.

use crate::story::UserStoryGroup;

/// Position of the story on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub user: usize,
    pub story: usize,
}

/// Result of moving forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Moved(Cursor),
    /// Past the last story of the last user
    End,
}

impl Cursor {
    pub fn new(user: usize, story: usize) -> Self {
        Self { user, story }
    }

    /// First story of the requested user, clamped into range
    ///
    /// Returns `None` when there is nothing to play.
    pub fn start(groups: &[UserStoryGroup], start_user: usize) -> Option<Self> {
        if groups.is_empty() {
            return None;
        }
        Some(Self::new(start_user.min(groups.len() - 1), 0))
    }

    /// Whether the cursor points at an existing story
    pub fn is_valid(&self, groups: &[UserStoryGroup]) -> bool {
        groups
            .get(self.user)
            .map(|g| self.story < g.stories.len())
            .unwrap_or(false)
    }

    /// Next story of this user, or the next user
    pub fn advance_story(self, groups: &[UserStoryGroup]) -> Step {
        let count = groups.get(self.user).map(|g| g.stories.len()).unwrap_or(0);
        if self.story + 1 < count {
            Step::Moved(Self::new(self.user, self.story + 1))
        } else {
            self.advance_user(groups)
        }
    }

    /// First story of the next user
    pub fn advance_user(self, groups: &[UserStoryGroup]) -> Step {
        if self.user + 1 < groups.len() {
            Step::Moved(Self::new(self.user + 1, 0))
        } else {
            Step::End
        }
    }

    /// Previous story, or the last story of the previous user
    ///
    /// Returns `None` at the very first story.
    pub fn retreat_story(self, groups: &[UserStoryGroup]) -> Option<Self> {
        if self.story > 0 {
            return Some(Self::new(self.user, self.story - 1));
        }
        if self.user > 0 {
            let prev = self.user - 1;
            let last = groups
                .get(prev)
                .map(|g| g.stories.len().saturating_sub(1))
                .unwrap_or(0);
            return Some(Self::new(prev, last));
        }
        None
    }
}
