//! A scripted stand-in for the streaming site's player page.
//!
//! Builds the markup the selector lists target, reacts to the gestures the
//! mirror relays (clicks, seek presses), advances playback on a clock tick,
//! highlights lyric lines, and can tear down and remount its app shell the way
//! the real site does on client-side navigation.

use crate::dom::{Document, DomEvent, EventHandler, EventKind, NodeId, PageError, PageHandle, Rect};
use crate::extractor::time::to_time_string;
use crate::state::RepeatMode;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq)]
pub struct DemoTrack {
    pub title: &'static str,
    pub artist: &'static str,
    pub cover: &'static str,
    pub duration_secs: u64,
    pub lyrics: &'static [&'static str],
}

impl DemoTrack {
    pub fn duration_string(&self) -> String {
        to_time_string(self.duration_secs)
    }
}

static DEMO_TRACKS: &[DemoTrack] = &[
    DemoTrack {
        title: "Midnight Corniche",
        artist: "Nour Haddad",
        cover: "https://covers.example.net/corniche.jpg?size=320&amp;v=2",
        duration_secs: 214,
        lyrics: &[
            "Lights along the water",
            "Every window humming low",
            "We drove until the morning",
            "Nowhere else to go",
            "Midnight on the corniche",
            "Holding on to slow",
        ],
    },
    DemoTrack {
        title: "Paper Lanterns",
        artist: "The Cedar Line",
        cover: "https://covers.example.net/lanterns.jpg",
        duration_secs: 187,
        lyrics: &[],
    },
    DemoTrack {
        title: "Long Way Home",
        artist: "Layla Sarkis",
        cover: "https://covers.example.net/longway.jpg",
        duration_secs: 3725,
        lyrics: &[
            "Count the mile markers",
            "Count the passing stars",
            "Every road I know",
            "Leads back to where you are",
        ],
    },
];

pub fn demo_tracks() -> &'static [DemoTrack] {
    DEMO_TRACKS
}

/// A ready page with the demo playlist loaded and paused at 0:00.
pub fn demo_page() -> PageHandle {
    Simulator::new().page()
}

const SEEK_BAR_RECT: Rect = Rect { left: 20.0, top: 300.0, width: 360.0, height: 6.0 };
const SHELL_GAP: Duration = Duration::from_millis(1500);

struct Nodes {
    shell: NodeId,
    track_info: NodeId,
    info: NodeId,
    cover: NodeId,
    like_icon: NodeId,
    like_glyph: NodeId,
    shuffle_icon: NodeId,
    play_icon: NodeId,
    play_glyph: NodeId,
    prev: NodeId,
    next: NodeId,
    repeat_icon: NodeId,
    repeat_glyph: NodeId,
    current_text: NodeId,
    remaining_text: NodeId,
    seek_bar: NodeId,
    fill: NodeId,
    lyrics: Option<(NodeId, Vec<NodeId>)>,
}

struct PlayerScript {
    tracks: &'static [DemoTrack],
    index: usize,
    position: f64,
    playing: bool,
    liked: Vec<bool>,
    shuffled: bool,
    repeat: RepeatMode,
    nodes: Option<Nodes>,
}

impl PlayerScript {
    fn new(tracks: &'static [DemoTrack]) -> Self {
        Self {
            tracks,
            index: 0,
            position: 0.0,
            playing: false,
            liked: vec![false; tracks.len()],
            shuffled: false,
            repeat: RepeatMode::None,
            nodes: None,
        }
    }

    fn track(&self) -> &'static DemoTrack {
        &self.tracks[self.index]
    }

    fn duration(&self) -> f64 {
        self.track().duration_secs as f64
    }

    fn mount(&mut self, doc: &mut Document) {
        if self.nodes.is_some() {
            return;
        }
        let body = doc.body();
        let shell = doc.append_element(body, "div", &[("class", "app-shell")]);
        let wrapper = doc.append_element(shell, "div", &[("class", "player-wrapper")]);
        let main = doc.append_element(wrapper, "div", &[("class", "main-player")]);

        let track_info = doc.append_element(main, "div", &[("class", "player-section track-info")]);
        let img = doc.append_element(track_info, "div", &[("class", "track-img-cntr")]);
        let cover = doc.append_element(img, "div", &[("class", "track-coverart")]);
        let info = doc.append_element(track_info, "div", &[("class", "info")]);
        let actions = doc.append_element(track_info, "div", &[("class", "track-info-actions")]);
        let like_icon = doc.append_element(actions, "anghami-icon", &[("class", "icon song")]);
        let like_glyph = glyph(doc, like_icon, "#all--like");

        let controls = doc.append_element(main, "div", &[("class", "player-controls")]);
        let shuffle_icon = doc.append_element(controls, "anghami-icon", &[("class", "icon shuffle")]);
        glyph(doc, shuffle_icon, "#all--scrub");
        let prev_next = doc.append_element(controls, "div", &[("class", "play-prev-next")]);
        let prev = doc.append_element(prev_next, "anghami-icon", &[("class", "icon prev")]);
        let play_cont = doc.append_element(prev_next, "div", &[("class", "play-pause-cont")]);
        let play_icon = doc.append_element(play_cont, "anghami-icon", &[("class", "icon play")]);
        let play_glyph = glyph(doc, play_icon, "#all--play");
        let next = doc.append_element(prev_next, "anghami-icon", &[("class", "icon next")]);
        let repeat_icon =
            doc.append_element(controls, "anghami-icon", &[("class", "icon"), ("title", "repeat")]);
        let repeat_glyph = glyph(doc, repeat_icon, "#all--repeat");

        let stream = doc.append_element(main, "div", &[("class", "stream-wrapper")]);
        let current = doc.append_element(stream, "div", &[("class", "duration-text")]);
        let current_text = doc.append_text(current, "0:00");
        let buffer = doc.append_element(stream, "anghami-buffer", &[]);
        let seek_bar = doc.append_element(buffer, "div", &[("class", "cont")]);
        doc.set_rect(seek_bar, SEEK_BAR_RECT);
        doc.append_element(seek_bar, "div", &[("class", "bar fullsize")]);
        let fill = doc.append_element(
            seek_bar,
            "div",
            &[("class", "fullsize stream-controls play with-animation"), ("style", "width: 0%")],
        );
        let remaining = doc.append_element(stream, "div", &[("class", "duration-text")]);
        let remaining_text = doc.append_text(remaining, "0:00");

        self.nodes = Some(Nodes {
            shell,
            track_info,
            info,
            cover,
            like_icon,
            like_glyph,
            shuffle_icon,
            play_icon,
            play_glyph,
            prev,
            next,
            repeat_icon,
            repeat_glyph,
            current_text,
            remaining_text,
            seek_bar,
            fill,
            lyrics: None,
        });
        self.render_track(doc);
        self.render_controls(doc);
        self.render_time(doc);
    }

    fn unmount(&mut self, doc: &mut Document) {
        if let Some(nodes) = self.nodes.take() {
            doc.remove(nodes.shell);
        }
    }

    /// Track metadata is re-rendered wholesale, as a framework would.
    fn render_track(&mut self, doc: &mut Document) {
        let track = self.track();
        let liked = self.liked[self.index];
        let Some(nodes) = self.nodes.as_mut() else {
            return;
        };
        doc.remove(nodes.info);
        let info = doc.create_element("div", &[("class", "info")]);
        let title = doc.append_element(info, "div", &[("class", "d-block action-title")]);
        let trim = doc.append_element(title, "div", &[("class", "trim")]);
        let span = doc.append_element(trim, "span", &[]);
        doc.append_text(span, track.title);
        let artist = doc.append_element(info, "div", &[("class", "d-block action-artist")]);
        let trim = doc.append_element(artist, "div", &[("class", "trim")]);
        doc.append_text(trim, track.artist);
        doc.append_child(nodes.track_info, info);
        nodes.info = info;

        doc.set_attribute(
            nodes.cover,
            "style",
            &format!("background-image: url(\"{}\")", track.cover),
        );
        render_like(doc, nodes, liked);

        if let Some((component, _)) = nodes.lyrics.take() {
            doc.remove(component);
        }
        if !track.lyrics.is_empty() {
            let component = doc.append_element(nodes.shell, "anghami-mini-lyrics", &[("class", "mini-lyrics")]);
            let holder = doc.append_element(component, "div", &[("class", "mini-lyrics-holder")]);
            let lyrics = doc.append_element(holder, "div", &[("class", "lyrics")]);
            let lines = track
                .lyrics
                .iter()
                .map(|line| {
                    let span = doc.append_element(lyrics, "span", &[("class", "arabic-textContent")]);
                    doc.append_text(span, line);
                    span
                })
                .collect();
            nodes.lyrics = Some((component, lines));
        }
    }

    fn render_controls(&self, doc: &mut Document) {
        let Some(nodes) = self.nodes.as_ref() else {
            return;
        };
        let (class, glyph) = if self.playing { ("pause", "#all--pause-shape") } else { ("play", "#all--play") };
        doc.set_classes(nodes.play_icon, &["icon", class]);
        doc.set_attribute(nodes.play_glyph, "xlink:href", glyph);
        doc.toggle_class(nodes.shuffle_icon, "active", self.shuffled);
        let (classes, glyph): (&[&str], &str) = match self.repeat {
            RepeatMode::None => (&["icon"], "#all--repeat"),
            RepeatMode::All => (&["icon", "repeat-all"], "#all--repeat"),
            RepeatMode::One => (&["icon", "repeat-one"], "#all--repeat-one"),
        };
        doc.set_classes(nodes.repeat_icon, classes);
        doc.set_attribute(nodes.repeat_glyph, "xlink:href", glyph);
        render_like(doc, nodes, self.liked[self.index]);
    }

    fn render_time(&self, doc: &mut Document) {
        let Some(nodes) = self.nodes.as_ref() else {
            return;
        };
        let duration = self.duration();
        let elapsed = self.position.floor() as u64;
        let remaining = self.track().duration_secs.saturating_sub(elapsed);
        doc.set_text_content(nodes.current_text, &to_time_string(elapsed));
        doc.set_text_content(nodes.remaining_text, &to_time_string(remaining));
        let percent = if duration > 0.0 { self.position / duration * 100.0 } else { 0.0 };
        doc.set_attribute(nodes.fill, "style", &format!("width: {percent:.2}%"));

        if let Some((_, lines)) = &nodes.lyrics
            && !lines.is_empty()
        {
            let current = ((self.position / duration) * lines.len() as f64) as usize;
            let current = current.min(lines.len() - 1);
            for (i, &line) in lines.iter().enumerate() {
                doc.toggle_class(line, "highlighted", i == current);
            }
        }
    }

    fn change_track(&mut self, doc: &mut Document, index: usize) {
        self.index = index % self.tracks.len();
        self.position = 0.0;
        tracing::debug!(track = self.track().title, "Simulated page changed track");
        self.render_track(doc);
        self.render_time(doc);
    }

    fn next_index(&self) -> usize {
        if self.shuffled {
            (self.index + self.tracks.len() / 2 + 1) % self.tracks.len()
        } else {
            (self.index + 1) % self.tracks.len()
        }
    }

    fn advance(&mut self, doc: &mut Document, secs: f64) {
        if !self.playing {
            return;
        }
        self.position += secs;
        if self.position < self.duration() {
            self.render_time(doc);
            return;
        }
        match self.repeat {
            RepeatMode::One => {
                self.position = 0.0;
                self.render_time(doc);
            }
            RepeatMode::None if self.index + 1 == self.tracks.len() && !self.shuffled => {
                self.playing = false;
                self.position = 0.0;
                self.render_controls(doc);
                self.render_time(doc);
            }
            _ => self.change_track(doc, self.next_index()),
        }
    }

    fn on_event(&mut self, doc: &mut Document, target: NodeId, event: &DomEvent) {
        let Some(nodes) = self.nodes.as_ref() else {
            return;
        };
        let hit = |node: NodeId| target == node || doc.ancestors(target).contains(&node);
        if event.kind != EventKind::Click {
            return;
        }
        if hit(nodes.seek_bar) {
            let rect = doc.rect(nodes.seek_bar);
            if rect.width > 0.0 {
                let fraction = ((event.client_x - rect.left) / rect.width).clamp(0.0, 1.0);
                self.position = fraction * self.duration();
                self.render_time(doc);
            }
        } else if hit(nodes.play_icon) {
            self.playing = !self.playing;
            self.render_controls(doc);
        } else if hit(nodes.next) {
            let next = self.next_index();
            self.change_track(doc, next);
        } else if hit(nodes.prev) {
            if self.position > 3.0 {
                self.position = 0.0;
                self.render_time(doc);
            } else {
                let prev = (self.index + self.tracks.len() - 1) % self.tracks.len();
                self.change_track(doc, prev);
            }
        } else if hit(nodes.like_icon) {
            self.liked[self.index] = !self.liked[self.index];
            self.render_controls(doc);
        } else if hit(nodes.shuffle_icon) {
            self.shuffled = !self.shuffled;
            self.render_controls(doc);
        } else if hit(nodes.repeat_icon) {
            self.repeat = match self.repeat {
                RepeatMode::None => RepeatMode::All,
                RepeatMode::All => RepeatMode::One,
                RepeatMode::One => RepeatMode::None,
            };
            self.render_controls(doc);
        }
    }
}

fn glyph(doc: &mut Document, icon: NodeId, href: &str) -> NodeId {
    let svg = doc.append_element(icon, "svg", &[]);
    doc.append_element(svg, "use", &[("xlink:href", href)])
}

fn render_like(doc: &mut Document, nodes: &Nodes, liked: bool) {
    doc.toggle_class(nodes.like_icon, "liked", liked);
    doc.set_attribute(nodes.like_glyph, "xlink:href", if liked { "#all--liked" } else { "#all--like" });
}

fn lock(script: &Mutex<PlayerScript>) -> MutexGuard<'_, PlayerScript> {
    script.lock().unwrap_or_else(PoisonError::into_inner)
}

struct ScriptHandler(Arc<Mutex<PlayerScript>>);

impl EventHandler for ScriptHandler {
    fn handle(&mut self, doc: &mut Document, target: NodeId, event: &DomEvent) {
        lock(&self.0).on_event(doc, target, event);
    }
}

/// Driver for the simulated page. The page lock is always taken before the
/// script lock.
pub struct Simulator {
    page: PageHandle,
    script: Arc<Mutex<PlayerScript>>,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    pub fn new() -> Self {
        let script = Arc::new(Mutex::new(PlayerScript::new(DEMO_TRACKS)));
        let mut doc = Document::new();
        let root = doc.root();
        let html = doc.append_element(root, "html", &[]);
        doc.append_element(html, "body", &[]);
        doc.set_event_handler(Box::new(ScriptHandler(script.clone())));
        lock(&script).mount(&mut doc);
        Self { page: PageHandle::new(doc), script }
    }

    pub fn page(&self) -> PageHandle {
        self.page.clone()
    }

    /// Move playback forward by `secs` (no-op while paused).
    pub fn advance(&self, secs: f64) -> Result<(), PageError> {
        self.page.write(|doc| lock(&self.script).advance(doc, secs))
    }

    pub fn unmount_shell(&self) -> Result<(), PageError> {
        tracing::info!("Simulated page unmounting its app shell");
        self.page.write(|doc| lock(&self.script).unmount(doc))
    }

    pub fn mount_shell(&self) -> Result<(), PageError> {
        tracing::info!("Simulated page mounting its app shell");
        self.page.write(|doc| lock(&self.script).mount(doc))
    }

    /// Drive playback once a second, optionally reloading the app shell
    /// every `reload_every`.
    pub fn spawn(self, reload_every: Option<Duration>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(1));
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut reload = reload_every.map(|every| {
                tokio::time::interval_at(tokio::time::Instant::now() + every, every)
            });
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        if self.advance(1.0).is_err() {
                            break;
                        }
                    }
                    _ = async {
                        match reload.as_mut() {
                            Some(r) => { r.tick().await; }
                            None => futures_util::future::pending::<()>().await,
                        }
                    } => {
                        if self.unmount_shell().is_err() {
                            break;
                        }
                        tokio::time::sleep(SHELL_GAP).await;
                        if self.mount_shell().is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Simulator stopped");
        })
    }
}
