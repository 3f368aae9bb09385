//! Derive user-story-groups from raw story rows

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::story::{Profile, Story, UserStoryGroup};

/// Group active stories by owner
///
/// Expired stories are dropped. Within a group stories play oldest first;
/// groups are ordered by their newest story, and the viewer's own group (if
/// any) is pinned to the front.
pub fn group_active_stories(
    stories: Vec<Story>,
    profiles: &[Profile],
    viewer_id: Option<&str>,
    now: DateTime<Utc>,
) -> Vec<UserStoryGroup> {
    let profiles: HashMap<&str, &Profile> = profiles.iter().map(|p| (p.id.as_str(), p)).collect();

    let mut by_user: HashMap<String, Vec<Story>> = HashMap::new();
    for story in stories.into_iter().filter(|s| s.is_active(now)) {
        by_user.entry(story.user_id.clone()).or_default().push(story);
    }

    let mut groups: Vec<UserStoryGroup> = by_user
        .into_iter()
        .map(|(user_id, mut stories)| {
            stories.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
            let profile = profiles
                .get(user_id.as_str())
                .map(|p| (*p).clone())
                .unwrap_or_else(|| Profile::unknown(user_id.clone()));
            UserStoryGroup::new(&profile, stories)
        })
        .collect();

    groups.sort_by(|a, b| {
        let own_a = viewer_id == Some(a.user_id.as_str());
        let own_b = viewer_id == Some(b.user_id.as_str());
        own_b
            .cmp(&own_a)
            .then_with(|| b.latest().cmp(&a.latest()))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });

    groups
}

/// Position of a user's group, for opening the player on it
pub fn group_index(groups: &[UserStoryGroup], user_id: &str) -> Option<usize> {
    groups.iter().position(|g| g.user_id == user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::MediaKind;
    use chrono::Duration;

    fn story(id: &str, user: &str, age_mins: i64, now: DateTime<Utc>) -> Story {
        let created_at = now - Duration::minutes(age_mins);
        Story {
            id: id.into(),
            user_id: user.into(),
            content: Some(id.into()),
            media_url: None,
            media_kind: Some(MediaKind::Text),
            background: None,
            expires_at: created_at + Duration::hours(24),
            created_at,
            view_count: 0,
            duration_secs: None,
        }
    }

    #[test]
    fn test_groups_play_oldest_first() {
        let now = Utc::now();
        // Fetched newest first, as the store returns them
        let stories = vec![story("a2", "alice", 1, now), story("a1", "alice", 10, now)];
        let groups = group_active_stories(stories, &[Profile::new("alice", "Alice")], None, now);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].display_name, "Alice");
        let ids: Vec<_> = groups[0].stories.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["a1", "a2"]);
    }

    #[test]
    fn test_groups_drop_expired_and_order_by_recency() {
        let now = Utc::now();
        let mut expired = story("old", "carol", 30, now);
        expired.expires_at = now;
        let stories = vec![
            story("b1", "bob", 1, now),
            story("a1", "alice", 20, now),
            expired,
        ];
        let groups = group_active_stories(stories, &[], None, now);

        let users: Vec<_> = groups.iter().map(|g| g.user_id.as_str()).collect();
        assert_eq!(users, ["bob", "alice"]);
        assert_eq!(groups[0].display_name, "Unknown user");
    }

    #[test]
    fn test_viewer_group_pinned_first() {
        let now = Utc::now();
        let stories = vec![story("b1", "bob", 1, now), story("a1", "alice", 20, now)];
        let groups = group_active_stories(stories, &[], Some("alice"), now);

        assert_eq!(groups[0].user_id, "alice");
        assert_eq!(group_index(&groups, "bob"), Some(1));
        assert_eq!(group_index(&groups, "dave"), None);
    }
}
