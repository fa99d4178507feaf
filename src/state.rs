// state.rs: State data structures for the mirrored player

use crate::lifecycle::LinkState;
use serde::{Deserialize, Serialize};

pub const UNKNOWN_TITLE: &str = "No track playing";
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const ZERO_TIME: &str = "0:00";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    None,
    One,
    All,
}

impl RepeatMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RepeatMode::None => "none",
            RepeatMode::One => "one",
            RepeatMode::All => "all",
        }
    }
}

/// Normalized snapshot of the page's now-playing state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackState {
    pub title: String,
    pub artist: String,
    pub cover_art_url: Option<String>,
    pub current_time: String,
    pub remaining_time: String,
    /// Derived from `current_time + remaining_time`.
    pub duration: String,
    /// 0..=100, read independently of the time strings.
    pub progress_percent: f64,
    pub is_playing: bool,
    pub is_liked: bool,
    pub is_shuffled: bool,
    pub repeat_mode: RepeatMode,
}

impl Default for TrackState {
    fn default() -> Self {
        Self {
            title: UNKNOWN_TITLE.to_string(),
            artist: UNKNOWN_ARTIST.to_string(),
            cover_art_url: None,
            current_time: ZERO_TIME.to_string(),
            remaining_time: ZERO_TIME.to_string(),
            duration: ZERO_TIME.to_string(),
            progress_percent: 0.0,
            is_playing: false,
            is_liked: false,
            is_shuffled: false,
            repeat_mode: RepeatMode::None,
        }
    }
}

impl TrackState {
    /// Fixed, renderable state used when the page could not be read at all.
    pub fn placeholder() -> Self {
        Self {
            title: "Player unavailable".to_string(),
            artist: "Waiting for the page to recover".to_string(),
            ..Self::default()
        }
    }

    /// Title and artist identify a track for lyrics bookkeeping.
    pub fn same_track(&self, other: &TrackState) -> bool {
        self.title == other.title && self.artist == other.artist
    }

    pub fn progress_sample(&self) -> ProgressSample {
        ProgressSample {
            progress: self.progress_percent,
            current_time: self.current_time.clone(),
            remaining_time: self.remaining_time.clone(),
        }
    }

    pub fn apply_progress(&mut self, sample: &ProgressSample) {
        self.progress_percent = sample.progress;
        self.current_time = sample.current_time.clone();
        self.remaining_time = sample.remaining_time.clone();
    }
}

/// The time/progress slice of a [`TrackState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSample {
    pub progress: f64,
    pub current_time: String,
    pub remaining_time: String,
}

/// Lyrics as currently shown by the page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricsState {
    pub lines: Vec<String>,
    pub current_line_index: Option<usize>,
    pub current_line_text: Option<String>,
    pub is_available: bool,
}

/// Health of the connection to the page, as reported to the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub state: LinkState,
    pub is_healthy: bool,
    pub retry_count: u32,
    /// Epoch milliseconds.
    pub last_successful_connection: Option<u64>,
    pub time_since_last_success: Option<u64>,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            state: LinkState::Uninitialized,
            is_healthy: false,
            retry_count: 0,
            last_successful_connection: None,
            time_since_last_success: None,
        }
    }
}

impl ConnectionStatus {
    /// Refresh the derived age field against `now_ms`.
    pub fn at(mut self, now_ms: u64) -> Self {
        self.time_since_last_success = self.last_successful_connection.map(|t| now_ms.saturating_sub(t));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_state_serializes_camel_case() {
        let v = serde_json::to_value(TrackState::default()).unwrap();
        assert_eq!(v["title"], UNKNOWN_TITLE);
        assert_eq!(v["coverArtUrl"], serde_json::Value::Null);
        assert_eq!(v["repeatMode"], "none");
        assert_eq!(v["progressPercent"], 0.0);
    }

    #[test]
    fn status_age_is_derived_from_last_success() {
        let status = ConnectionStatus { last_successful_connection: Some(1_000), ..Default::default() };
        assert_eq!(status.at(4_500).time_since_last_success, Some(3_500));
        assert_eq!(ConnectionStatus::default().at(10).time_since_last_success, None);
    }
}
