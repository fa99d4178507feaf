//! Ordered extraction strategies, composed first-success-wins.

use crate::dom::{Document, NodeId, Selector};
use std::fmt;

/// One candidate way of reading a value from the page.
pub type Strategy<T> = Box<dyn Fn(&Document) -> Option<T> + Send + Sync>;

/// The strategies for a single field, most specific first.
pub struct FieldChain<T> {
    name: &'static str,
    strategies: Vec<Strategy<T>>,
}

impl<T> fmt::Debug for FieldChain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldChain")
            .field("name", &self.name)
            .field("strategies", &self.strategies.len())
            .finish()
    }
}

impl<T> FieldChain<T> {
    pub fn new(name: &'static str) -> Self {
        Self { name, strategies: Vec::new() }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn push(mut self, strategy: impl Fn(&Document) -> Option<T> + Send + Sync + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn extend(mut self, strategies: Vec<Strategy<T>>) -> Self {
        self.strategies.extend(strategies);
        self
    }

    /// Value from the first strategy that produces one.
    pub fn resolve(&self, doc: &Document) -> Option<T> {
        self.strategies.iter().enumerate().find_map(|(i, strategy)| {
            let value = strategy(doc)?;
            tracing::trace!(field = self.name, strategy = i, "Strategy matched");
            Some(value)
        })
    }
}

/// One strategy per selector: the first matching element, passed to `read`.
/// Invalid selectors are dropped with a warning.
pub fn on_first_match<T, F>(selectors: &[&str], read: F) -> Vec<Strategy<T>>
where
    T: 'static,
    F: Fn(&Document, NodeId) -> Option<T> + Clone + Send + Sync + 'static,
{
    Selector::parse_all(selectors)
        .into_iter()
        .map(|selector| {
            let read = read.clone();
            Box::new(move |doc: &Document| {
                let node = doc.query_selector(&selector)?;
                read(doc, node)
            }) as Strategy<T>
        })
        .collect()
}

/// Trimmed, non-empty text of the first element matching each selector.
pub fn first_text(selectors: &[&str]) -> Vec<Strategy<String>> {
    on_first_match(selectors, |doc, node| non_empty(doc.text_content(node)))
}

/// The first element matching each selector.
pub fn element(selectors: &[&str]) -> Vec<Strategy<NodeId>> {
    on_first_match(selectors, |_, node| Some(node))
}

/// The first element matching each selector, widened to its nearest
/// ancestor matching `container` (inclusive).
pub fn closest_element(selectors: &[&str], container: &str) -> Vec<Strategy<NodeId>> {
    let Ok(container) = Selector::parse(container) else {
        tracing::warn!(selector = container, "Invalid container selector");
        return Vec::new();
    };
    on_first_match(selectors, move |doc, node| doc.closest(node, &container))
}

/// Whether any element matches; `Some(value)` when one does.
pub fn present<T>(selectors: &[&str], value: T) -> Vec<Strategy<T>>
where
    T: Clone + Send + Sync + 'static,
{
    on_first_match(selectors, move |_, _| Some(value.clone()))
}

pub fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == text.len() {
        Some(text)
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        let mut doc = Document::new();
        let root = doc.root();
        let body = doc.append_element(root, "body", &[]);
        let info = doc.append_element(body, "div", &[("class", "track-info")]);
        let empty = doc.append_element(info, "span", &[("class", "title")]);
        doc.append_text(empty, "   ");
        let song = doc.append_element(info, "span", &[("class", "song-title")]);
        doc.append_text(song, "  Ya Tabtab  ");
        doc
    }

    #[test]
    fn first_success_wins_and_blank_text_falls_through() {
        let chain = FieldChain::new("title").extend(first_text(&[".missing", ".title", ".song-title"]));
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.resolve(&doc()).as_deref(), Some("Ya Tabtab"));
    }

    #[test]
    fn invalid_selectors_are_skipped() {
        let chain = FieldChain::new("title").extend(first_text(&["[unterminated", ".song-title"]));
        assert_eq!(chain.len(), 1);
        assert!(chain.resolve(&doc()).is_some());
    }

    #[test]
    fn custom_strategies_compose_with_selector_ones() {
        let chain = FieldChain::new("count")
            .extend(present(&[".nothing"], 1))
            .push(|doc: &Document| Some(doc.query_selector_all(&Selector::parse("span").ok()?).len()));
        assert_eq!(chain.resolve(&doc()), Some(2));
    }

    #[test]
    fn closest_widens_to_the_container() {
        let d = doc();
        let chain = FieldChain::new("info").extend(closest_element(&[".song-title"], ".track-info"));
        let info = chain.resolve(&d).unwrap();
        assert!(d.has_class(info, "track-info"));
    }
}
