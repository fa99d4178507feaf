//! Change detection and observation: when to re-read the page and which
//! readings are worth publishing.

pub mod diff;
pub mod lyrics;
pub mod track;

pub use diff::{LyricsDeduper, diff_play_state, diff_progress, diff_snapshot};
pub use lyrics::LyricsObserver;
pub use track::TrackObserver;
