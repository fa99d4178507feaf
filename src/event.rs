//! Push events from the observation layer to presentation sinks.

use crate::state::{LyricsState, ProgressSample, TrackState};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

const BUS_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum PlayerEvent {
    /// Full snapshot; replaces the sink's copy wholesale.
    TrackUpdated(TrackState),
    ProgressUpdated(ProgressSample),
    #[serde(rename_all = "camelCase")]
    PlayStateUpdated { is_playing: bool },
    /// `None` when the page has no lyrics panel.
    LyricsUpdated(Option<LyricsState>),
}

impl PlayerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PlayerEvent::TrackUpdated(_) => "trackUpdated",
            PlayerEvent::ProgressUpdated(_) => "progressUpdated",
            PlayerEvent::PlayStateUpdated { .. } => "playStateUpdated",
            PlayerEvent::LyricsUpdated(_) => "lyricsUpdated",
        }
    }
}

/// Broadcast bus. Remembers the last full snapshot so a sink that opens late
/// can start from it.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
    latest: Arc<Mutex<Option<TrackState>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.tx.receiver_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx, latest: Arc::new(Mutex::new(None)) }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Publish to every current subscriber. Having none is not an error.
    pub fn publish(&self, event: PlayerEvent) {
        {
            let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
            match &event {
                PlayerEvent::TrackUpdated(state) => *latest = Some(state.clone()),
                PlayerEvent::ProgressUpdated(sample) => {
                    if let Some(track) = latest.as_mut() {
                        track.apply_progress(sample);
                    }
                }
                PlayerEvent::PlayStateUpdated { is_playing } => {
                    if let Some(track) = latest.as_mut() {
                        track.is_playing = *is_playing;
                    }
                }
                PlayerEvent::LyricsUpdated(_) => {}
            }
        }
        tracing::trace!(event = event.name(), "Publishing");
        let _ = self.tx.send(event);
    }

    /// Latest known track state, with partial updates folded in.
    pub fn latest_track(&self) -> Option<TrackState> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn events_serialize_tagged() {
        let v = serde_json::to_value(PlayerEvent::PlayStateUpdated { is_playing: true }).unwrap();
        assert_eq!(v, json!({"event": "playStateUpdated", "data": {"isPlaying": true}}));
        let v = serde_json::to_value(PlayerEvent::LyricsUpdated(None)).unwrap();
        assert_eq!(v, json!({"event": "lyricsUpdated", "data": null}));
        let v = serde_json::to_value(PlayerEvent::ProgressUpdated(ProgressSample {
            progress: 12.5,
            current_time: "0:30".into(),
            remaining_time: "3:04".into(),
        }))
        .unwrap();
        assert_eq!(v["data"]["currentTime"], "0:30");
        assert_eq!(v["event"], "progressUpdated");
    }

    #[tokio::test]
    async fn latest_track_folds_partial_updates() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(PlayerEvent::PlayStateUpdated { is_playing: true });
        assert_eq!(bus.latest_track(), None);
        bus.publish(PlayerEvent::TrackUpdated(TrackState::default()));
        bus.publish(PlayerEvent::PlayStateUpdated { is_playing: true });
        assert!(bus.latest_track().unwrap().is_playing);
        assert_eq!(rx.recv().await.unwrap().name(), "playStateUpdated");
        assert_eq!(rx.recv().await.unwrap().name(), "trackUpdated");
    }
}
