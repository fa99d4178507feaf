//! Per-field read rules for [`TrackState`](crate::state::TrackState).

use super::selectors as sel;
use super::strategy::{FieldChain, Strategy, closest_element, first_text, on_first_match, present};
use super::time::is_time_string;
use crate::dom::{Document, NodeId, Selector};
use crate::state::RepeatMode;
use once_cell::sync::Lazy;
use regex::Regex;

static CSS_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"url\(\s*["']?([^"')]+?)["']?\s*\)"#).unwrap());

/// Every field chain, built once per extractor.
#[derive(Debug)]
pub struct FieldChains {
    pub title: FieldChain<String>,
    pub artist: FieldChain<String>,
    pub cover: FieldChain<String>,
    pub current_time: FieldChain<String>,
    pub remaining_time: FieldChain<String>,
    pub progress: FieldChain<f64>,
    pub playing: FieldChain<bool>,
    pub liked: FieldChain<bool>,
    pub shuffled: FieldChain<bool>,
    pub repeat: FieldChain<RepeatMode>,
}

impl Default for FieldChains {
    fn default() -> Self {
        Self {
            title: FieldChain::new("title")
                .extend(first_text(sel::TITLE))
                .push(title_heuristic()),
            artist: FieldChain::new("artist").extend(first_text(sel::ARTIST)),
            cover: FieldChain::new("cover").extend(on_first_match(sel::COVER, cover_url)),
            current_time: FieldChain::new("current_time")
                .push(time_readout(0))
                .extend(time_text(sel::CURRENT_TIME)),
            remaining_time: FieldChain::new("remaining_time")
                .push(time_readout(1))
                .extend(time_text(sel::REMAINING_TIME)),
            progress: FieldChain::new("progress")
                .extend(on_first_match(sel::PROGRESS_FILL, |doc, node| style_percent(doc, node, "width")))
                .extend(on_first_match(sel::PROGRESS_INDICATOR, |doc, node| style_percent(doc, node, "left"))),
            playing: FieldChain::new("playing")
                .extend(present(sel::PAUSE_ICON, true))
                .extend(present(sel::PLAY_ICON, false)),
            liked: FieldChain::new("liked").extend(on_first_match(sel::LIKED_ICON, |doc, node| {
                let icon = if doc.tag(node) == Some("use") { icon_of(doc, node) } else { node };
                Some(
                    doc.has_class(icon, "liked")
                        || doc.attr(node, "xlink:href") == Some(sel::LIKED_GLYPH),
                )
            })),
            shuffled: FieldChain::new("shuffled")
                .extend(on_first_match(sel::SHUFFLE_ICON, |doc, node| Some(shuffle_active(doc, node))))
                .extend(on_first_match(sel::SHUFFLE_GLYPH, |doc, node| {
                    Some(shuffle_active(doc, icon_of(doc, node)))
                })),
            repeat: FieldChain::new("repeat")
                .extend(on_first_match(sel::REPEAT_ICON, |doc, node| Some(repeat_mode(doc, node))))
                .extend(
                    closest_element(sel::REPEAT_TITLE_SVG, &format!("{}, {}", sel::ICON_ELEMENT, sel::ICON))
                        .into_iter()
                        .map(|find| {
                            Box::new(move |doc: &Document| find(doc).map(|icon| repeat_mode(doc, icon)))
                                as Strategy<RepeatMode>
                        })
                        .collect(),
                )
                .extend(on_first_match(sel::REPEAT_GLYPH, |doc, node| {
                    Some(repeat_mode(doc, icon_of(doc, node)))
                })),
        }
    }
}

/// Last-resort title: a short text-bearing leaf inside a plausible container.
fn title_heuristic() -> impl Fn(&Document) -> Option<String> + Send + Sync + 'static {
    let candidates = Selector::parse(sel::TITLE_HEURISTIC_CANDIDATES).ok();
    let container = Selector::parse(sel::TITLE_HEURISTIC_CONTAINER).ok();
    move |doc: &Document| {
        let (candidates, container) = (candidates.as_ref()?, container.as_ref()?);
        doc.query_selector_all(candidates).into_iter().find_map(|node| {
            if doc.element_children(node).next().is_some() {
                return None;
            }
            let text = doc.text_content(node);
            let text = text.trim();
            let len = text.chars().count();
            if len <= 3 || len >= 100 || is_time_string(text) {
                return None;
            }
            doc.closest(node, container)?;
            Some(text.to_string())
        })
    }
}

/// The `index`th `.duration-text` readout, if it holds a time.
fn time_readout(index: usize) -> impl Fn(&Document) -> Option<String> + Send + Sync + 'static {
    let readout = Selector::parse(sel::TIME_READOUT).ok();
    move |doc: &Document| {
        let node = *doc.query_selector_all(readout.as_ref()?).get(index)?;
        checked_time(doc.text_content(node))
    }
}

fn time_text(selectors: &[&str]) -> Vec<Strategy<String>> {
    on_first_match(selectors, |doc, node| checked_time(doc.text_content(node)))
}

fn checked_time(text: String) -> Option<String> {
    let text = text.trim();
    is_time_string(text).then(|| text.to_string())
}

/// `background-image: url(...)` or an absolute `src`.
fn cover_url(doc: &Document, node: NodeId) -> Option<String> {
    if let Some(bg) = doc.style_property(node, "background-image")
        && let Some(caps) = CSS_URL_RE.captures(&bg)
    {
        let url = caps[1].replace("&amp;", "&");
        if !url.is_empty() {
            return Some(url);
        }
    }
    doc.attr(node, "src")
        .filter(|src| src.starts_with("http"))
        .map(str::to_string)
}

/// A `N%` inline style value, clamped to 0–100.
pub(crate) fn style_percent(doc: &Document, node: NodeId, property: &str) -> Option<f64> {
    let value = doc.style_property(node, property)?;
    let number: f64 = value.strip_suffix('%')?.trim().parse().ok()?;
    number.is_finite().then(|| number.clamp(0.0, 100.0))
}

/// Glyph `<use>` elements sit inside the actual icon element.
fn icon_of(doc: &Document, node: NodeId) -> NodeId {
    Selector::parse(sel::ICON)
        .ok()
        .and_then(|icon| doc.closest(node, &icon))
        .unwrap_or(node)
}

fn shuffle_active(doc: &Document, icon: NodeId) -> bool {
    doc.has_class(icon, "active")
        || doc.has_class(icon, "selected")
        || doc.style_property(icon, "color").as_deref() == Some(sel::SHUFFLE_ACTIVE_COLOR)
}

fn repeat_mode(doc: &Document, icon: NodeId) -> RepeatMode {
    let one_glyph = Selector::parse(sel::REPEAT_ONE_GLYPH)
        .ok()
        .and_then(|glyph| doc.query_within(icon, &glyph));
    if doc.has_class(icon, "repeat-one") || one_glyph.is_some() {
        RepeatMode::One
    } else if ["repeat-all", "active", "selected"].iter().any(|c| doc.has_class(icon, c)) {
        RepeatMode::All
    } else {
        RepeatMode::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body() -> (Document, NodeId) {
        let mut doc = Document::new();
        let root = doc.root();
        let body = doc.append_element(root, "body", &[]);
        (doc, body)
    }

    #[test]
    fn cover_reads_background_image_and_unescapes() {
        let (mut doc, body) = body();
        let art = doc.append_element(
            body,
            "div",
            &[
                ("class", "track-coverart"),
                ("style", r#"background-image: url("https://img.example/a.jpg?w=1&amp;h=2")"#),
            ],
        );
        let cntr = doc.append_element(body, "div", &[("class", "track-img-cntr")]);
        doc.append_child(cntr, art);
        let chains = FieldChains::default();
        assert_eq!(chains.cover.resolve(&doc).as_deref(), Some("https://img.example/a.jpg?w=1&h=2"));
    }

    #[test]
    fn cover_ignores_relative_src() {
        let (mut doc, body) = body();
        let player = doc.append_element(body, "div", &[("class", "player-info")]);
        doc.append_element(player, "img", &[("src", "/placeholder.png")]);
        assert_eq!(FieldChains::default().cover.resolve(&doc), None);
    }

    #[test]
    fn time_readouts_are_positional_and_validated() {
        let (mut doc, body) = body();
        let a = doc.append_element(body, "div", &[("class", "duration-text")]);
        doc.append_text(a, " 1:23 ");
        let b = doc.append_element(body, "div", &[("class", "duration-text")]);
        doc.append_text(b, "-2:37");
        let chains = FieldChains::default();
        assert_eq!(chains.current_time.resolve(&doc).as_deref(), Some("1:23"));
        assert_eq!(chains.remaining_time.resolve(&doc).as_deref(), Some("-2:37"));
        doc.set_text_content(a, "LIVE");
        assert_eq!(chains.current_time.resolve(&doc), None);
    }

    #[test]
    fn progress_falls_back_to_indicator_offset() {
        let (mut doc, body) = body();
        doc.append_element(body, "div", &[("class", "stream-controls indicator"), ("style", "left: 41.5%")]);
        assert_eq!(FieldChains::default().progress.resolve(&doc), Some(41.5));
        let buffer = doc.append_element(body, "anghami-buffer", &[]);
        doc.append_element(buffer, "div", &[("class", "stream-controls play"), ("style", "width: 140%")]);
        assert_eq!(FieldChains::default().progress.resolve(&doc), Some(100.0));
    }

    #[test]
    fn title_heuristic_needs_a_plausible_container() {
        let (mut doc, body) = body();
        let stray = doc.append_element(body, "h2", &[]);
        doc.append_text(stray, "Trending now");
        let chains = FieldChains::default();
        assert_eq!(chains.title.resolve(&doc), None);
        let player = doc.append_element(body, "div", &[("class", "main-player")]);
        let short = doc.append_element(player, "span", &[]);
        doc.append_text(short, "abc");
        let title = doc.append_element(player, "span", &[]);
        doc.append_text(title, "Ahwak");
        assert_eq!(chains.title.resolve(&doc).as_deref(), Some("Ahwak"));
    }

    #[test]
    fn shuffle_accent_colour_counts_as_active() {
        let (mut doc, body) = body();
        doc.append_element(body, "div", &[("class", "icon shuffle"), ("style", "color: rgb(255, 107, 53)")]);
        assert_eq!(FieldChains::default().shuffled.resolve(&doc), Some(true));
    }

    #[test]
    fn repeat_one_glyph_wins_over_active_class() {
        let (mut doc, body) = body();
        let icon = doc.append_element(body, "anghami-icon", &[("class", "icon active"), ("title", "repeat")]);
        let svg = doc.append_element(icon, "svg", &[]);
        let glyph = doc.append_element(svg, "use", &[("xlink:href", "#all--repeat")]);
        let chains = FieldChains::default();
        assert_eq!(chains.repeat.resolve(&doc), Some(RepeatMode::All));
        doc.set_attribute(glyph, "xlink:href", "#all--repeat-one");
        assert_eq!(chains.repeat.resolve(&doc), Some(RepeatMode::One));
    }
}
