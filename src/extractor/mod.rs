//! Best-effort extraction of the now-playing state from the host page.
//!
//! Every field is read independently through its own [`FieldChain`]; a miss
//! degrades to the field's default and an unreadable page degrades to
//! [`TrackState::placeholder`]. Nothing here returns an error to callers.

pub mod controls;
pub mod fields;
pub mod lyrics;
pub mod selectors;
pub mod strategy;
pub mod time;

pub use controls::Command;
pub use strategy::FieldChain;

use crate::dom::{Document, PageError, PageHandle, Selector};
use crate::state::{LyricsState, ProgressSample, TrackState, ZERO_TIME};
use controls::ControlChains;
use fields::FieldChains;
use lyrics::LyricsReader;
use std::sync::Arc;

struct Chains {
    fields: FieldChains,
    controls: ControlChains,
    lyrics: LyricsReader,
    ready: Option<Selector>,
    anchors: Vec<Selector>,
}

/// Reads and drives one page. Cheap to clone; clones share the page and the
/// compiled selector chains.
#[derive(Clone)]
pub struct Extractor {
    page: PageHandle,
    chains: Arc<Chains>,
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor").field("page", &self.page).finish_non_exhaustive()
    }
}

impl Extractor {
    pub fn new(page: PageHandle) -> Self {
        let chains = Chains {
            fields: FieldChains::default(),
            controls: ControlChains::default(),
            lyrics: LyricsReader::default(),
            ready: Selector::parse(selectors::PLAYER_ROOT).ok(),
            anchors: Selector::parse_all(&[selectors::PLAYER_ROOT, selectors::TRACK_INFO]),
        };
        Self { page, chains: Arc::new(chains) }
    }

    pub fn page(&self) -> &PageHandle {
        &self.page
    }

    pub(crate) fn lyrics_reader(&self) -> &LyricsReader {
        &self.chains.lyrics
    }

    /// Full snapshot. Never fails: an unreadable page yields the placeholder.
    pub fn extract(&self) -> TrackState {
        match self.try_extract() {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(error = %e, "Extraction failed, using placeholder");
                TrackState::placeholder()
            }
        }
    }

    /// All fields are read under one page lock, so they describe one moment.
    pub fn try_extract(&self) -> Result<TrackState, PageError> {
        self.page.read(|doc| self.snapshot(doc))
    }

    fn snapshot(&self, doc: &Document) -> TrackState {
        let f = &self.chains.fields;
        let defaults = TrackState::default();
        let current_time = f.current_time.resolve(doc).unwrap_or(defaults.current_time);
        let remaining_time = f.remaining_time.resolve(doc).unwrap_or(defaults.remaining_time);
        let duration = time::derive_duration(&current_time, &remaining_time)
            .unwrap_or_else(|| ZERO_TIME.to_string());
        TrackState {
            title: f.title.resolve(doc).unwrap_or(defaults.title),
            artist: f.artist.resolve(doc).unwrap_or(defaults.artist),
            cover_art_url: f.cover.resolve(doc),
            current_time,
            remaining_time,
            duration,
            progress_percent: f.progress.resolve(doc).unwrap_or(0.0),
            is_playing: f.playing.resolve(doc).unwrap_or(false),
            is_liked: f.liked.resolve(doc).unwrap_or(false),
            is_shuffled: f.shuffled.resolve(doc).unwrap_or(false),
            repeat_mode: f.repeat.resolve(doc).unwrap_or_default(),
        }
    }

    /// Raw progress percentage; 0 when unavailable.
    pub fn progress(&self) -> f64 {
        self.page
            .read(|doc| self.chains.fields.progress.resolve(doc))
            .ok()
            .flatten()
            .unwrap_or(0.0)
    }

    pub fn current_time(&self) -> String {
        self.page
            .read(|doc| self.chains.fields.current_time.resolve(doc))
            .ok()
            .flatten()
            .unwrap_or_else(|| ZERO_TIME.to_string())
    }

    /// Only the time/progress fields, for the sink's high-frequency tick.
    pub fn progress_sample(&self) -> ProgressSample {
        let f = &self.chains.fields;
        self.page
            .read(|doc| ProgressSample {
                progress: f.progress.resolve(doc).unwrap_or(0.0),
                current_time: f.current_time.resolve(doc).unwrap_or_else(|| ZERO_TIME.to_string()),
                remaining_time: f.remaining_time.resolve(doc).unwrap_or_else(|| ZERO_TIME.to_string()),
            })
            .unwrap_or_else(|_| TrackState::placeholder().progress_sample())
    }

    pub fn is_playing(&self) -> bool {
        self.page
            .read(|doc| self.chains.fields.playing.resolve(doc))
            .ok()
            .flatten()
            .unwrap_or(false)
    }

    /// `None` when the page has no lyrics panel (or cannot be read).
    pub fn get_lyrics(&self) -> Option<LyricsState> {
        self.page.read(|doc| self.chains.lyrics.read(doc)).ok().flatten()
    }

    /// The page has mounted its player shell.
    pub fn is_ready(&self) -> bool {
        self.page
            .read(|doc| {
                self.chains
                    .ready
                    .as_ref()
                    .is_some_and(|ready| doc.query_selector(ready).is_some())
            })
            .unwrap_or(false)
    }

    /// Every structural anchor the mirror depends on is present.
    pub fn has_anchors(&self) -> bool {
        self.page
            .read(|doc| {
                !self.chains.anchors.is_empty()
                    && self.chains.anchors.iter().all(|a| doc.query_selector(a).is_some())
            })
            .unwrap_or(false)
    }

    /// Relay `command` to the page. `false` when the control was not found
    /// or the page is gone.
    pub fn execute(&self, command: Command) -> bool {
        let done = self
            .page
            .write(|doc| self.chains.controls.run(doc, command))
            .unwrap_or(false);
        tracing::debug!(command = command.label(), done, "Command relayed");
        done
    }

    pub fn toggle_play_pause(&self) -> bool {
        self.execute(Command::TogglePlayPause)
    }

    pub fn previous_track(&self) -> bool {
        self.execute(Command::PreviousTrack)
    }

    pub fn next_track(&self) -> bool {
        self.execute(Command::NextTrack)
    }

    pub fn toggle_like(&self) -> bool {
        self.execute(Command::ToggleLike)
    }

    pub fn toggle_shuffle(&self) -> bool {
        self.execute(Command::ToggleShuffle)
    }

    pub fn toggle_repeat(&self) -> bool {
        self.execute(Command::ToggleRepeat)
    }

    pub fn seek_to(&self, percent: f64) -> bool {
        self.execute(Command::SeekTo(percent))
    }
}
