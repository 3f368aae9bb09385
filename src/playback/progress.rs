//! Progress clock for the active story
//!
//! Progress runs from 0 to 100. Each tick adds `100 * tick / duration`, so a
//! 5 s story with a 100 ms tick completes after exactly 50 ticks.

use std::time::Duration;

use crate::story::Story;

/// Progress value at which a story is complete
pub const COMPLETE: f64 = 100.0;

// Absorbs float drift for durations that are not a multiple of the tick
const EPSILON: f64 = 1e-9;

/// How long the active story should play
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoryDuration {
    Known(Duration),
    /// Video whose playback length has not been measured yet
    Pending,
}

impl StoryDuration {
    /// Resolve the duration for a story
    ///
    /// Videos always wait for their measured length, even when a duration is
    /// declared on the story. Everything else uses the declared duration or
    /// the default.
    pub fn resolve(story: &Story, measured: Option<Duration>, default: Duration) -> Self {
        if story.is_video() {
            return match measured {
                Some(d) => StoryDuration::Known(d),
                None => StoryDuration::Pending,
            };
        }
        match story.duration_secs {
            Some(secs) if secs > 0 => StoryDuration::Known(Duration::from_secs(secs as u64)),
            _ => StoryDuration::Known(default),
        }
    }

    pub fn known(&self) -> Option<Duration> {
        match self {
            StoryDuration::Known(d) => Some(*d),
            StoryDuration::Pending => None,
        }
    }
}

/// Elapsed fraction of the active story
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Progress {
    value: f64,
}

impl Progress {
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
    }

    /// Increment applied per tick
    pub fn step(duration: Duration, tick: Duration) -> f64 {
        let duration_ms = duration.as_millis().max(1) as f64;
        COMPLETE * tick.as_millis() as f64 / duration_ms
    }

    /// Advance by one tick; returns true once the story is complete
    pub fn tick(&mut self, duration: Duration, tick: Duration) -> bool {
        self.value = (self.value + Self::step(duration, tick)).min(COMPLETE);
        self.value >= COMPLETE - EPSILON
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::MediaKind;
    use chrono::Utc;

    const TICK: Duration = Duration::from_millis(100);

    fn story(kind: MediaKind, duration_secs: Option<u32>) -> Story {
        let now = Utc::now();
        Story {
            id: "s".into(),
            user_id: "u".into(),
            content: None,
            media_url: Some("m".into()),
            media_kind: Some(kind),
            background: None,
            expires_at: now + chrono::Duration::hours(1),
            created_at: now,
            view_count: 0,
            duration_secs,
        }
    }

    #[test]
    fn test_five_second_story_completes_in_fifty_ticks() {
        let mut progress = Progress::default();
        let duration = Duration::from_secs(5);
        let ticks = (1..=60)
            .find(|_| progress.tick(duration, TICK))
            .expect("story should complete");
        assert_eq!(ticks, 50);
        assert_eq!(progress.value(), COMPLETE);
    }

    #[test]
    fn test_uneven_duration_completes() {
        let mut progress = Progress::default();
        let duration = Duration::from_millis(3333);
        let ticks = (1..=100).find(|_| progress.tick(duration, TICK)).unwrap();
        assert_eq!(ticks, 34);
    }

    #[test]
    fn test_resolve_durations() {
        let default = Duration::from_secs(5);
        assert_eq!(
            StoryDuration::resolve(&story(MediaKind::Image, None), None, default),
            StoryDuration::Known(default)
        );
        assert_eq!(
            StoryDuration::resolve(&story(MediaKind::Text, Some(8)), None, default),
            StoryDuration::Known(Duration::from_secs(8))
        );
        assert_eq!(
            StoryDuration::resolve(&story(MediaKind::Video, Some(8)), None, default),
            StoryDuration::Pending
        );
        assert_eq!(
            StoryDuration::resolve(
                &story(MediaKind::Video, None),
                Some(Duration::from_millis(12_500)),
                default
            ),
            StoryDuration::Known(Duration::from_millis(12_500))
        );
    }
}
