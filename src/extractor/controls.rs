//! Playback commands, relayed as synthetic user gestures on the page's own controls.

use super::selectors as sel;
use super::strategy::{FieldChain, closest_element, element, on_first_match};
use crate::dom::{Document, DomEvent, EventKind, NodeId};
use serde::{Deserialize, Serialize};

/// A control gesture the mini-player can send back to the page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "percent", rename_all = "camelCase")]
pub enum Command {
    TogglePlayPause,
    PreviousTrack,
    NextTrack,
    ToggleLike,
    ToggleShuffle,
    ToggleRepeat,
    /// Seek to a percentage (0–100) of the track.
    SeekTo(f64),
}

impl Command {
    pub fn label(&self) -> &'static str {
        match self {
            Command::TogglePlayPause => "play/pause",
            Command::PreviousTrack => "previous",
            Command::NextTrack => "next",
            Command::ToggleLike => "like",
            Command::ToggleShuffle => "shuffle",
            Command::ToggleRepeat => "repeat",
            Command::SeekTo(_) => "seek",
        }
    }
}

/// Locator chains for every control element.
#[derive(Debug)]
pub struct ControlChains {
    pub play_pause: FieldChain<NodeId>,
    pub previous: FieldChain<NodeId>,
    pub next: FieldChain<NodeId>,
    pub like: FieldChain<NodeId>,
    pub shuffle: FieldChain<NodeId>,
    pub repeat: FieldChain<NodeId>,
    pub seek_bar: FieldChain<NodeId>,
}

impl Default for ControlChains {
    fn default() -> Self {
        let icon_or_element = format!("{}, {}", sel::ICON_ELEMENT, sel::ICON);
        Self {
            play_pause: FieldChain::new("play_pause").extend(element(sel::PLAY_PAUSE_CONTROL)),
            previous: FieldChain::new("previous").extend(element(sel::PREV_CONTROL)),
            next: FieldChain::new("next").extend(element(sel::NEXT_CONTROL)),
            like: FieldChain::new("like")
                .extend(element(sel::LIKE_CONTROL))
                .extend(closest_element(sel::LIKE_GLYPH, sel::ICON)),
            shuffle: FieldChain::new("shuffle")
                .extend(element(sel::SHUFFLE_ICON))
                .extend(closest_element(sel::SHUFFLE_GLYPH, sel::ICON)),
            repeat: FieldChain::new("repeat")
                .extend(element(sel::REPEAT_ICON))
                .extend(closest_element(sel::REPEAT_TITLE_SVG, &icon_or_element))
                .extend(closest_element(sel::REPEAT_GLYPH, &icon_or_element)),
            seek_bar: FieldChain::new("seek_bar")
                .extend(element(sel::SEEK_BAR))
                .extend(on_first_match(sel::SEEK_BAR_CHILD, |doc, node| doc.parent_element(node))),
        }
    }
}

impl ControlChains {
    /// Locate and activate the control for `command`. Returns whether a
    /// control element was found.
    pub fn run(&self, doc: &mut Document, command: Command) -> bool {
        let chain = match command {
            Command::TogglePlayPause => &self.play_pause,
            Command::PreviousTrack => &self.previous,
            Command::NextTrack => &self.next,
            Command::ToggleLike => &self.like,
            Command::ToggleShuffle => &self.shuffle,
            Command::ToggleRepeat => &self.repeat,
            Command::SeekTo(percent) => return self.seek(doc, percent),
        };
        let Some(target) = chain.resolve(doc) else {
            tracing::debug!(control = chain.name(), "Control not found");
            return false;
        };
        doc.dispatch_event(target, DomEvent::click());
        true
    }

    /// Press/release/click at `percent` along the seek bar, using the bar's
    /// geometry as laid out right now.
    fn seek(&self, doc: &mut Document, percent: f64) -> bool {
        let Some(bar) = self.seek_bar.resolve(doc) else {
            tracing::debug!("Seek bar not found");
            return false;
        };
        let percent = if percent.is_finite() { percent.clamp(0.0, 100.0) } else { 0.0 };
        let rect = doc.rect(bar);
        let x = rect.left + rect.width * percent / 100.0;
        let y = rect.top + rect.height / 2.0;
        for kind in [EventKind::MouseDown, EventKind::MouseUp, EventKind::Click] {
            doc.dispatch_event(bar, DomEvent::at(kind, x, y));
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Rect;

    #[test]
    fn missing_controls_report_failure() {
        let mut doc = Document::new();
        let chains = ControlChains::default();
        assert!(!chains.run(&mut doc, Command::NextTrack));
        assert!(!chains.run(&mut doc, Command::SeekTo(50.0)));
        assert!(doc.event_log().is_empty());
    }

    #[test]
    fn glyph_locators_click_the_enclosing_icon() {
        let mut doc = Document::new();
        let root = doc.root();
        let icon = doc.append_element(root, "div", &[("class", "icon")]);
        let svg = doc.append_element(icon, "svg", &[]);
        doc.append_element(svg, "use", &[("xlink:href", "#all--like")]);
        assert!(ControlChains::default().run(&mut doc, Command::ToggleLike));
        assert_eq!(doc.event_log()[0].0, icon);
    }

    #[test]
    fn seek_targets_proportional_point_on_current_geometry() {
        let mut doc = Document::new();
        let root = doc.root();
        let buffer = doc.append_element(root, "anghami-buffer", &[]);
        let bar = doc.append_element(buffer, "div", &[("class", "cont")]);
        doc.set_rect(bar, Rect::new(100.0, 40.0, 200.0, 10.0));
        let chains = ControlChains::default();
        assert!(chains.run(&mut doc, Command::SeekTo(25.0)));
        let kinds: Vec<_> = doc.event_log().iter().map(|(n, e)| (*n, e.kind)).collect();
        assert_eq!(
            kinds,
            vec![(bar, EventKind::MouseDown), (bar, EventKind::MouseUp), (bar, EventKind::Click)]
        );
        assert_eq!(doc.event_log()[2].1.client_x, 150.0);
        assert_eq!(doc.event_log()[2].1.client_y, 45.0);

        doc.set_rect(bar, Rect::new(0.0, 0.0, 400.0, 20.0));
        assert!(chains.run(&mut doc, Command::SeekTo(250.0)));
        assert_eq!(doc.event_log()[5].1.client_x, 400.0);
    }

    #[test]
    fn commands_serialize_by_name() {
        let json = serde_json::to_value(Command::SeekTo(40.0)).unwrap();
        assert_eq!(json, serde_json::json!({"command": "seekTo", "percent": 40.0}));
        let back: Command = serde_json::from_str(r#"{"command":"toggleRepeat"}"#).unwrap();
        assert_eq!(back, Command::ToggleRepeat);
    }
}
