//! Change detection: decides which events a new reading deserves.

use crate::event::PlayerEvent;
use crate::state::{LyricsState, ProgressSample, TrackState};

/// Events for a full re-extraction. Without a previous state, or when any
/// field outside the time/progress/play slice changed, the whole snapshot is
/// sent; otherwise only the partial events whose values changed.
pub fn diff_snapshot(prev: Option<&TrackState>, next: &TrackState) -> Vec<PlayerEvent> {
    let Some(prev) = prev else {
        return vec![PlayerEvent::TrackUpdated(next.clone())];
    };
    let identity_changed = prev.title != next.title
        || prev.artist != next.artist
        || prev.cover_art_url != next.cover_art_url
        || prev.is_liked != next.is_liked
        || prev.is_shuffled != next.is_shuffled
        || prev.repeat_mode != next.repeat_mode;
    if identity_changed {
        return vec![PlayerEvent::TrackUpdated(next.clone())];
    }
    let mut events = Vec::new();
    events.extend(diff_progress(prev, &next.progress_sample()));
    events.extend(diff_play_state(prev, next.is_playing));
    events
}

pub fn diff_progress(prev: &TrackState, sample: &ProgressSample) -> Option<PlayerEvent> {
    (prev.progress_sample() != *sample).then(|| PlayerEvent::ProgressUpdated(sample.clone()))
}

pub fn diff_play_state(prev: &TrackState, is_playing: bool) -> Option<PlayerEvent> {
    (prev.is_playing != is_playing).then_some(PlayerEvent::PlayStateUpdated { is_playing })
}

/// Lyrics are re-emitted only when the resolved current line text changes;
/// the index alone is not stable across re-renders.
#[derive(Debug, Default)]
pub struct LyricsDeduper {
    last_emitted: Option<Option<String>>,
}

impl LyricsDeduper {
    /// Whether `lyrics` should be emitted; records it if so.
    pub fn admit(&mut self, lyrics: Option<&LyricsState>) -> bool {
        let key = lyrics.and_then(|l| l.current_line_text.clone());
        if self.last_emitted.as_ref() == Some(&key) {
            return false;
        }
        self.last_emitted = Some(key);
        true
    }

    /// Forget the last emission so the next reading is always sent.
    pub fn reset(&mut self) {
        self.last_emitted = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RepeatMode;

    fn playing_at(progress: f64, current: &str) -> TrackState {
        TrackState {
            title: "Song".into(),
            artist: "Band".into(),
            current_time: current.into(),
            remaining_time: "2:00".into(),
            progress_percent: progress,
            is_playing: true,
            ..TrackState::default()
        }
    }

    #[test]
    fn first_reading_is_a_full_snapshot() {
        let events = diff_snapshot(None, &TrackState::default());
        assert!(matches!(events.as_slice(), [PlayerEvent::TrackUpdated(_)]));
    }

    #[test]
    fn identical_readings_emit_nothing() {
        let a = playing_at(10.0, "0:12");
        assert!(diff_snapshot(Some(&a), &a.clone()).is_empty());
    }

    #[test]
    fn repeated_progress_reads_emit_once_per_value() {
        let mut last = playing_at(10.0, "0:12");
        let mut emitted = 0;
        for (p, t) in [(11.0, "0:13"), (11.0, "0:13"), (11.0, "0:13"), (12.0, "0:14"), (12.0, "0:14")] {
            let next = playing_at(p, t);
            let events = diff_snapshot(Some(&last), &next);
            assert!(events.iter().all(|e| matches!(e, PlayerEvent::ProgressUpdated(_))));
            emitted += events.len();
            last = next;
        }
        assert_eq!(emitted, 2);
    }

    #[test]
    fn play_flip_is_partial_and_metadata_change_is_full() {
        let a = playing_at(10.0, "0:12");
        let paused = TrackState { is_playing: false, ..a.clone() };
        assert_eq!(
            diff_snapshot(Some(&a), &paused),
            vec![PlayerEvent::PlayStateUpdated { is_playing: false }]
        );
        let repeat = TrackState { repeat_mode: RepeatMode::One, ..a.clone() };
        assert!(matches!(diff_snapshot(Some(&a), &repeat).as_slice(), [PlayerEvent::TrackUpdated(_)]));
    }

    fn lyrics(index: usize, text: &str) -> LyricsState {
        LyricsState {
            lines: vec!["a".into(), "b".into(), "b".into()],
            current_line_index: Some(index),
            current_line_text: Some(text.into()),
            is_available: true,
        }
    }

    #[test]
    fn lyrics_index_change_with_same_text_is_suppressed() {
        let mut dedup = LyricsDeduper::default();
        assert!(dedup.admit(Some(&lyrics(1, "b"))));
        assert!(!dedup.admit(Some(&lyrics(2, "b"))));
        assert!(dedup.admit(Some(&lyrics(0, "a"))));
        assert!(!dedup.admit(Some(&lyrics(0, "a"))));
    }

    #[test]
    fn lyrics_reset_forces_next_emission() {
        let mut dedup = LyricsDeduper::default();
        assert!(dedup.admit(None));
        assert!(!dedup.admit(None));
        dedup.reset();
        assert!(dedup.admit(None));
    }
}
