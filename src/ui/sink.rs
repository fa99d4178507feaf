//! Mini-player state shared by the terminal view: what is showing, what the
//! keys do, and where on screen it goes. Nothing here touches the terminal.

use crate::event::PlayerEvent;
use crate::extractor::Command;
use crate::state::{ConnectionStatus, LyricsState, ProgressSample, TrackState};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::layout::Rect;
use std::time::{Duration, Instant};

pub const MIN_WIDTH: u16 = 32;
pub const MIN_HEIGHT: u16 = 9;
pub const STATUS_TTL: Duration = Duration::from_secs(3);
pub const TRANSITION: Duration = Duration::from_millis(300);
pub const SEEK_STEP: f64 = 5.0;

pub const LOADING: &str = "Loading lyrics...";
pub const NO_LYRICS: &str = "♪ No lyrics available";
pub const NO_LYRICS_HINT: &str = "Open lyrics on the player to enable them";

#[derive(Debug, Clone, PartialEq)]
pub enum LyricsPanel {
    Loading,
    Unavailable,
    /// The two fixed slots.
    Lines { current: String, next: Option<String> },
}

/// Two-slot lyrics view. A line change on an already rendered view updates
/// the slots in place and, when enabled, starts a short cross-fade.
#[derive(Debug)]
pub struct LyricsView {
    panel: LyricsPanel,
    last_index: Option<usize>,
    transition_started: Option<Instant>,
    transitions: bool,
}

impl LyricsView {
    pub fn new(transitions: bool) -> Self {
        Self { panel: LyricsPanel::Loading, last_index: None, transition_started: None, transitions }
    }

    pub fn panel(&self) -> &LyricsPanel {
        &self.panel
    }

    /// Back to the loading placeholder, e.g. when the panel is reopened.
    pub fn reset(&mut self) {
        self.panel = LyricsPanel::Loading;
        self.last_index = None;
        self.transition_started = None;
    }

    pub fn apply(&mut self, lyrics: Option<&LyricsState>, now: Instant) {
        let Some(lyrics) = lyrics.filter(|l| !l.lines.is_empty()) else {
            self.panel = LyricsPanel::Unavailable;
            self.last_index = None;
            self.transition_started = None;
            return;
        };
        let index = lyrics.current_line_index.filter(|&i| i < lyrics.lines.len()).unwrap_or(0);
        let current = lyrics.lines[index].clone();
        let next = lyrics.lines.get(index + 1).cloned();

        let changed = match &self.panel {
            LyricsPanel::Lines { current: shown, .. } => *shown != current || self.last_index != Some(index),
            _ => false,
        };
        if changed && self.transitions {
            self.transition_started = Some(now);
        }
        self.last_index = Some(index);
        self.panel = LyricsPanel::Lines { current, next };
    }

    /// How far the running cross-fade is, in `0.0..1.0`; `None` when settled.
    pub fn transition_progress(&self, now: Instant) -> Option<f32> {
        let started = self.transition_started?;
        let elapsed = now.saturating_duration_since(started);
        (elapsed < TRANSITION).then(|| elapsed.as_secs_f32() / TRANSITION.as_secs_f32())
    }

    /// When the running cross-fade ends, for scheduling the last redraw.
    pub fn transition_deadline(&self, now: Instant) -> Option<Instant> {
        self.transition_progress(now)?;
        self.transition_started.map(|t| t + TRANSITION)
    }
}

/// What a key press asks for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Command(Command),
    SeekBy(f64),
    ToggleLyrics,
    ToggleMiniPlayer,
    Quit,
}

pub fn action_for(key: KeyEvent) -> Option<Action> {
    let action = match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::Quit,
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char(' ') | KeyCode::Char('p') => Action::Command(Command::TogglePlayPause),
        KeyCode::Char('n') => Action::Command(Command::NextTrack),
        KeyCode::Char('b') => Action::Command(Command::PreviousTrack),
        KeyCode::Char('l') => Action::Command(Command::ToggleLike),
        KeyCode::Char('s') => Action::Command(Command::ToggleShuffle),
        KeyCode::Char('r') => Action::Command(Command::ToggleRepeat),
        KeyCode::Right => Action::SeekBy(SEEK_STEP),
        KeyCode::Left => Action::SeekBy(-SEEK_STEP),
        KeyCode::Char(d @ '0'..='9') => Action::Command(Command::SeekTo(f64::from(d as u8 - b'0') * 10.0)),
        KeyCode::Char('y') => Action::ToggleLyrics,
        KeyCode::Char('m') => Action::ToggleMiniPlayer,
        _ => return None,
    };
    Some(action)
}

/// The mini-player's local state.
#[derive(Debug)]
pub struct MiniPlayer {
    pub track: TrackState,
    pub open: bool,
    pub lyrics_open: bool,
    pub lyrics: LyricsView,
    pub connection: ConnectionStatus,
    pub should_exit: bool,
    status: Option<(String, Instant)>,
}

impl MiniPlayer {
    pub fn new(transitions: bool) -> Self {
        Self {
            track: TrackState::default(),
            open: false,
            lyrics_open: false,
            lyrics: LyricsView::new(transitions),
            connection: ConnectionStatus::default(),
            should_exit: false,
            status: None,
        }
    }

    pub fn apply(&mut self, event: &PlayerEvent, now: Instant) {
        match event {
            PlayerEvent::TrackUpdated(track) => {
                if !self.track.same_track(track) {
                    self.lyrics.reset();
                }
                self.track = track.clone();
            }
            PlayerEvent::ProgressUpdated(sample) => self.track.apply_progress(sample),
            PlayerEvent::PlayStateUpdated { is_playing } => self.track.is_playing = *is_playing,
            PlayerEvent::LyricsUpdated(lyrics) => {
                if self.lyrics_open {
                    self.lyrics.apply(lyrics.as_ref(), now);
                }
            }
        }
    }

    /// Fold in the once-a-second time/progress re-read.
    pub fn refresh_progress(&mut self, sample: &ProgressSample) {
        self.track.apply_progress(sample);
    }

    pub fn set_lyrics_open(&mut self, open: bool) {
        self.lyrics_open = open;
        if open {
            self.lyrics.reset();
        }
    }

    /// Target for a relative seek, clamped to the track.
    pub fn seek_target(&self, delta: f64) -> f64 {
        (self.track.progress_percent + delta).clamp(0.0, 100.0)
    }

    pub fn flash(&mut self, message: impl Into<String>, now: Instant) {
        self.status = Some((message.into(), now));
    }

    pub fn status_message(&self, now: Instant) -> Option<&str> {
        self.status
            .as_ref()
            .filter(|(_, at)| now.saturating_duration_since(*at) < STATUS_TTL)
            .map(|(m, _)| m.as_str())
    }
}

/// Where the mini-player goes: the requested size, never below the minimum,
/// centered in the terminal. `None` when the terminal itself is too small.
pub fn player_area(screen: Rect, width: u16, height: u16) -> Option<Rect> {
    if screen.width < MIN_WIDTH || screen.height < MIN_HEIGHT {
        return None;
    }
    let w = width.max(MIN_WIDTH).min(screen.width);
    let h = height.max(MIN_HEIGHT).min(screen.height);
    Some(Rect {
        x: screen.x + (screen.width - w) / 2,
        y: screen.y + (screen.height - h) / 2,
        width: w,
        height: h,
    })
}
