//! Reading the page's mini-lyrics panel.

use super::selectors as sel;
use super::strategy::{FieldChain, element};
use crate::dom::{Document, NodeId, Selector};
use crate::state::LyricsState;

#[derive(Debug)]
pub struct LyricsReader {
    container: FieldChain<NodeId>,
    component: FieldChain<NodeId>,
    highlight: Option<Selector>,
}

impl Default for LyricsReader {
    fn default() -> Self {
        Self {
            container: FieldChain::new("lyrics_container").extend(element(sel::LYRICS_CONTAINER)),
            component: FieldChain::new("lyrics_component").extend(element(sel::LYRICS_COMPONENT)),
            highlight: Selector::parse(sel::LYRICS_HIGHLIGHT).ok(),
        }
    }
}

impl LyricsReader {
    pub fn container(&self, doc: &Document) -> Option<NodeId> {
        self.container.resolve(doc)
    }

    /// The mounted lyrics component (or, failing that, the container itself).
    pub fn observe_target(&self, doc: &Document) -> Option<NodeId> {
        self.component.resolve(doc).or_else(|| self.container(doc))
    }

    /// `None` when the page has no lyrics panel at all.
    pub fn read(&self, doc: &Document) -> Option<LyricsState> {
        let container = self.container(doc)?;
        let mut nodes = Vec::new();
        let mut lines = Vec::new();
        for node in doc.descendants(container) {
            if !doc.is_element(node) || doc.element_children(node).next().is_some() {
                continue;
            }
            let text = doc.text_content(node);
            let text = text.trim();
            if !text.is_empty() {
                nodes.push(node);
                lines.push(text.to_string());
            }
        }
        if lines.is_empty() {
            lines = br_separated_lines(doc, container);
        }

        let highlighted = self
            .highlight
            .as_ref()
            .and_then(|h| doc.query_within(container, h));
        let current_line_text = highlighted
            .map(|node| doc.text_content(node).trim().to_string())
            .filter(|t| !t.is_empty());
        let current_line_index = highlighted.and_then(|node| {
            nodes
                .iter()
                .position(|&n| n == node || doc.ancestors(n).contains(&node))
                .or_else(|| {
                    let text = current_line_text.as_deref()?;
                    lines.iter().position(|l| l == text)
                })
        });

        Some(LyricsState {
            is_available: !lines.is_empty(),
            lines,
            current_line_index,
            current_line_text,
        })
    }
}

/// Plain text broken by `<br>` elements, one line per run.
fn br_separated_lines(doc: &Document, container: NodeId) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for node in doc.descendants(container) {
        if let Some(text) = doc.text(node) {
            current.push_str(text);
        } else if doc.tag(node) == Some("br") {
            lines.push(std::mem::take(&mut current));
        }
    }
    lines.push(current);
    lines
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}
