//! Candidate selector lists, most specific (current markup) first.

pub const PLAYER_ROOT: &str = ".player-wrapper";
pub const TRACK_INFO: &str = ".track-info";

pub const TITLE: &[&str] = &[
    ".track-info .info .action-title .trim span",
    ".action-title .trim span",
    ".track-info .info .d-block.action-title .trim span",
    ".player-section.track-info .info .trim span",
    ".main-player .track-info .action-title span",
    ".player-wrapper .track-info .action-title",
    "[data-testid='track-title']",
    "[data-cy='track-title']",
    ".track-title",
    ".song-title",
    ".current-track-title",
    ".player-track-title",
    ".now-playing-title",
    ".player-info .title",
    ".track-details .title",
    ".media-info .title",
    ".playback-info .title",
    ".mini-player .title",
    ".player [class*='title']",
    ".track-info [class*='title']",
    "[class*='player'] [class*='title']",
];

/// Structural heuristic for the title: text-bearing elements...
pub const TITLE_HEURISTIC_CANDIDATES: &str = "span, div, h1, h2, h3";
/// ...constrained to a plausible container.
pub const TITLE_HEURISTIC_CONTAINER: &str = ".track-info, .player, .main-player";

pub const ARTIST: &[&str] = &[
    ".track-info .info .action-artist .trim",
    ".action-artist .trim",
    ".d-block.action-artist .trim",
    ".player-section.track-info .info .action-artist .trim",
    "[data-testid='track-artist']",
    "[data-cy='track-artist']",
    ".track-artist",
    ".song-artist",
    ".current-track-artist",
    ".player-track-artist",
    ".now-playing-artist",
    ".player-info .artist",
    ".track-details .artist",
    ".media-info .artist",
    ".playback-info .artist",
    ".mini-player .artist",
    ".player [class*='artist']",
    ".track-info [class*='artist']",
    "[class*='player'] [class*='artist']",
];

pub const COVER: &[&str] = &[
    ".track-img-cntr .track-coverart",
    ".player-section.track-info .track-coverart",
    ".image-info-container .track-coverart",
    ".track-info .track-img-cntr .track-coverart",
    "[data-testid='track-image']",
    "[data-cy='track-image']",
    ".track-image",
    ".song-image",
    ".album-art",
    ".cover-art",
    ".track-cover",
    ".current-track-image",
    ".player-image",
    ".now-playing-image",
    ".player-info img",
    ".track-details img",
    ".media-info img",
    ".playback-info img",
    ".mini-player img",
    ".player [class*='image']",
    ".player [class*='cover']",
    ".track-info img",
    "[class*='player'] img",
];

/// Time readouts: the first is elapsed, the second remaining.
pub const TIME_READOUT: &str = ".duration-text";
pub const CURRENT_TIME: &[&str] = &["[data-testid='current-time']", ".current-time", ".time-elapsed"];
pub const REMAINING_TIME: &[&str] = &["[data-testid='remaining-time']", ".remaining-time", ".time-remaining"];

pub const PROGRESS_FILL: &[&str] = &[
    "anghami-buffer .fullsize.stream-controls.play.with-animation",
    ".fullsize.stream-controls.play.with-animation",
    "anghami-buffer .stream-controls.play",
    ".stream-controls.play.with-animation",
];
pub const PROGRESS_INDICATOR: &[&str] = &[r#".stream-controls.indicator[style*="left"]"#];

pub const PAUSE_ICON: &[&str] = &[
    r##".play-pause-cont .icon.pause use[xlink\:href="#all--pause-shape"]"##,
    ".player-controls .play-pause-cont .icon.pause",
    ".play-pause-cont anghami-icon.pause",
    ".main-player .play-pause-cont .pause",
];
pub const PLAY_ICON: &[&str] = &[
    r##".play-pause-cont .icon.play use[xlink\:href="#all--play"]"##,
    ".player-controls .play-pause-cont .icon.play",
    ".play-pause-cont anghami-icon.play",
    ".main-player .play-pause-cont .play",
];

pub const LIKED_ICON: &[&str] = &[".track-info-actions .icon.song.liked", r##"use[xlink\:href="#all--liked"]"##];
pub const LIKED_GLYPH: &str = "#all--liked";

pub const SHUFFLE_ICON: &[&str] = &[".icon.shuffle"];
pub const SHUFFLE_GLYPH: &[&str] = &[r##"use[xlink\:href="#all--scrub"]"##];
/// Inline accent colour the page uses for an active shuffle toggle.
pub const SHUFFLE_ACTIVE_COLOR: &str = "rgb(255, 107, 53)";

pub const REPEAT_ICON: &[&str] = &[r#".icon[title="repeat"]"#, r#"anghami-icon[title="repeat"]"#];
pub const REPEAT_TITLE_SVG: &[&str] = &[r#"svg[title="repeat"]"#];
pub const REPEAT_GLYPH: &[&str] = &[r##"use[xlink\:href="#all--repeat"]"##];
pub const REPEAT_ONE_GLYPH: &str = r##"use[xlink\:href="#all--repeat-one"]"##;

/// Closest-ancestor targets when a control is found via its glyph.
pub const ICON: &str = ".icon";
pub const ICON_ELEMENT: &str = "anghami-icon";

pub const PLAY_PAUSE_CONTROL: &[&str] = &[
    ".main-player .play-pause-cont anghami-icon",
    ".player-controls .play-pause-cont .icon.pause",
    ".player-controls .play-pause-cont .icon.play",
    ".play-pause-cont anghami-icon",
    ".player-controls .play-pause-cont",
];
pub const PREV_CONTROL: &[&str] = &[
    ".main-player .player-controls .icon.prev",
    ".player-controls anghami-icon.prev",
    ".play-prev-next .icon.prev",
    ".player-controls .prev",
];
pub const NEXT_CONTROL: &[&str] = &[
    ".main-player .player-controls .icon.next",
    ".player-controls anghami-icon.next",
    ".play-prev-next .icon.next",
    ".player-controls .next",
];
pub const LIKE_CONTROL: &[&str] = &[".track-info-actions .icon.song"];
pub const LIKE_GLYPH: &[&str] = &[r##"use[xlink\:href="#all--liked"], use[xlink\:href="#all--like"]"##];

pub const SEEK_BAR: &[&str] = &["anghami-buffer .cont", "anghami-buffer"];
/// Seek falls back to the parent of the full-size bar.
pub const SEEK_BAR_CHILD: &[&str] = &[".bar.fullsize"];

/// Observation scopes.
pub const PROGRESS_SCOPE: &str = "anghami-buffer";
pub const CONTROLS_SCOPE: &str = ".player-controls";

pub const LYRICS_CONTAINER: &[&str] = &[
    ".mini-lyrics-holder .lyrics",
    ".mini-lyrics .mini-lyrics-holder .lyrics",
    ".mini-lyrics .lyrics",
    "anghami-mini-lyrics .mini-lyrics-holder .lyrics",
    "anghami-mini-lyrics .lyrics",
    ".lyrics",
];
/// The mounted lyrics component, watched while lyrics are observed.
pub const LYRICS_COMPONENT: &[&str] = &[".mini-lyrics", "anghami-mini-lyrics"];
pub const LYRICS_HIGHLIGHT: &str = r#"span.arabic-textContent.highlighted, span.highlighted, span[class*="highlighted"], span[class*="current"], .highlighted"#;
