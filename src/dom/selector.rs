//! CSS selectors for the extraction fallback chains.
//!
//! Selectors are parsed with `scraper`'s selector grammar and matched by the
//! `selectors` engine against the arena through [`NodeRef`], so the live
//! document and parsed HTML snapshots share one implementation.

use super::{Document, NodeId};
use scraper::error::SelectorErrorKind;
use scraper::selector::{CssLocalName, CssString, NonTSPseudoClass, Parser, PseudoElement, Simple};
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::matching::{self, ElementSelectorFlags, MatchingContext};
use selectors::parser::{ParseRelative, SelectorImpl, SelectorList};
use selectors::{Element, NthIndexCache, OpaqueElement};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid selector `{selector}`: {reason}")]
pub struct SelectorError {
    pub selector: String,
    pub reason: String,
}

/// A parsed selector list; matches when any alternative matches.
#[derive(Debug, Clone)]
pub struct Selector {
    source: String,
    list: SelectorList<Simple>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let mut input = cssparser::ParserInput::new(source);
        let mut parser = cssparser::Parser::new(&mut input);
        let list = SelectorList::parse(&Parser, &mut parser, ParseRelative::No).map_err(|e| SelectorError {
            selector: source.to_string(),
            reason: SelectorErrorKind::from(e).to_string(),
        })?;
        Ok(Self { source: source.to_string(), list })
    }

    /// Parse each source, dropping (and logging) any that fail.
    pub fn parse_all(sources: &[&str]) -> Vec<Self> {
        sources
            .iter()
            .filter_map(|s| match Self::parse(s) {
                Ok(sel) => Some(sel),
                Err(e) => {
                    tracing::warn!(selector = %s, error = %e, "Skipping invalid selector");
                    None
                }
            })
            .collect()
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub(crate) fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let element = NodeRef { doc, id: node };
        let mut nth_index_cache = NthIndexCache::default();
        let mut context = MatchingContext::new(
            matching::MatchingMode::Normal,
            None,
            &mut nth_index_cache,
            matching::QuirksMode::NoQuirks,
            matching::NeedsSelectorFlags::No,
            matching::IgnoreNthChildForInvalidation::No,
        );
        self.list
            .0
            .iter()
            .any(|s| matching::matches_selector(s, 0, None, &element, &mut context))
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

/// An element of a [`Document`], as seen by the selector engine.
#[derive(Clone, Copy)]
struct NodeRef<'a> {
    doc: &'a Document,
    id: NodeId,
}

impl std::fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{} #{}>", self.doc.tag(self.id).unwrap_or("?"), self.id)
    }
}

impl<'a> NodeRef<'a> {
    fn at(&self, id: NodeId) -> Self {
        Self { doc: self.doc, id }
    }

    fn sibling_element(&self, step: isize) -> Option<Self> {
        let siblings = self.doc.children(self.doc.parent(self.id)?);
        let pos = siblings.iter().position(|&c| c == self.id)?;
        let mut i = pos as isize + step;
        while let Some(&id) = usize::try_from(i).ok().and_then(|i| siblings.get(i)) {
            if self.doc.is_element(id) {
                return Some(self.at(id));
            }
            i += step;
        }
        None
    }
}

// The document carries no namespaces, pseudo-classes, shadow trees or parts.
impl Element for NodeRef<'_> {
    type Impl = Simple;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::new(&self.doc.nodes[self.id.index as usize])
    }

    fn parent_element(&self) -> Option<Self> {
        self.doc.parent_element(self.id).map(|p| self.at(p))
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        self.sibling_element(-1)
    }

    fn next_sibling_element(&self) -> Option<Self> {
        self.sibling_element(1)
    }

    fn first_element_child(&self) -> Option<Self> {
        self.doc.element_children(self.id).next().map(|c| self.at(c))
    }

    fn is_html_element_in_html_document(&self) -> bool {
        true
    }

    fn has_local_name(&self, local_name: &CssLocalName) -> bool {
        self.doc.tag(self.id) == Some(&*local_name.0)
    }

    fn has_namespace(&self, _ns: &<Simple as SelectorImpl>::BorrowedNamespaceUrl) -> bool {
        true
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.doc.tag(self.id) == other.doc.tag(other.id)
    }

    fn attr_matches(
        &self,
        _ns: &NamespaceConstraint<&<Simple as SelectorImpl>::NamespaceUrl>,
        local_name: &CssLocalName,
        operation: &AttrSelectorOperation<&CssString>,
    ) -> bool {
        self.doc
            .attr(self.id, &local_name.0)
            .is_some_and(|value| operation.eval_str(value))
    }

    fn match_non_ts_pseudo_class(&self, _pc: &NonTSPseudoClass, _context: &mut MatchingContext<Simple>) -> bool {
        false
    }

    fn match_pseudo_element(&self, _pe: &PseudoElement, _context: &mut MatchingContext<Simple>) -> bool {
        false
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        self.doc.tag(self.id) == Some("link")
    }

    fn is_html_slot_element(&self) -> bool {
        false
    }

    fn has_id(&self, id: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.doc
            .attr(self.id, "id")
            .is_some_and(|value| case_sensitivity.eq(id.0.as_bytes(), value.as_bytes()))
    }

    fn has_class(&self, name: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.doc
            .classes(self.id)
            .any(|c| case_sensitivity.eq(name.0.as_bytes(), c.as_bytes()))
    }

    fn imported_part(&self, _name: &CssLocalName) -> Option<CssLocalName> {
        None
    }

    fn is_part(&self, _name: &CssLocalName) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        !self
            .doc
            .children(self.id)
            .iter()
            .any(|&c| self.doc.is_element(c) || self.doc.text(c).is_some_and(|t| !t.is_empty()))
    }

    fn is_root(&self) -> bool {
        self.doc.parent(self.id) == Some(self.doc.root())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new();
        let root = doc.root();
        let player = doc.append_element(root, "div", &[("class", "main-player")]);
        let cont = doc.append_element(player, "div", &[("class", "play-pause-cont")]);
        let icon = doc.append_element(cont, "anghami-icon", &[("class", "icon pause"), ("title", "pause")]);
        let svg_use = doc.append_element(icon, "use", &[("xlink:href", "#all--pause-shape")]);
        (doc, cont, icon, svg_use)
    }

    fn first(doc: &Document, s: &str) -> Option<NodeId> {
        doc.query_selector(&Selector::parse(s).unwrap())
    }

    #[test]
    fn descendant_and_compound_classes() {
        let (doc, _, icon, _) = doc();
        assert_eq!(first(&doc, ".main-player .play-pause-cont .pause"), Some(icon));
        assert_eq!(first(&doc, ".play-pause-cont anghami-icon.pause"), Some(icon));
        assert_eq!(first(&doc, ".play-pause-cont anghami-icon.play"), None);
    }

    #[test]
    fn child_combinator_requires_direct_parent() {
        let (doc, cont, icon, _) = doc();
        assert_eq!(first(&doc, ".play-pause-cont > anghami-icon"), Some(icon));
        assert_eq!(first(&doc, ".main-player > anghami-icon"), None);
        assert_eq!(first(&doc, ".main-player > .play-pause-cont"), Some(cont));
    }

    #[test]
    fn escaped_attribute_names_and_operators() {
        let (doc, _, icon, svg_use) = doc();
        assert_eq!(first(&doc, r##".icon.pause use[xlink\:href="#all--pause-shape"]"##), Some(svg_use));
        assert_eq!(first(&doc, "[class*='paus']"), Some(icon));
        assert_eq!(first(&doc, "[title^=pau]"), Some(icon));
        assert_eq!(first(&doc, "[title$='se']"), Some(icon));
        assert_eq!(first(&doc, "[class~=icon]"), Some(icon));
        assert_eq!(first(&doc, "[class~=ico]"), None);
    }

    #[test]
    fn selector_list_returns_first_in_document_order() {
        let (doc, cont, _, _) = doc();
        assert_eq!(first(&doc, "anghami-icon, .play-pause-cont"), Some(cont));
    }

    #[test]
    fn sibling_and_structural_pseudo_classes() {
        let mut doc = Document::new();
        let root = doc.root();
        let list = doc.append_element(root, "ul", &[]);
        doc.append_text(list, "\n");
        let a = doc.append_element(list, "li", &[("class", "a")]);
        let b = doc.append_element(list, "li", &[("class", "b")]);
        assert_eq!(first(&doc, ".a + li"), Some(b));
        assert_eq!(first(&doc, "li:first-child"), Some(a));
        assert_eq!(first(&doc, "li:empty:last-child"), Some(b));
        assert_eq!(first(&doc, "ul:root"), Some(list));
    }

    #[test]
    fn invalid_selectors_are_rejected() {
        assert!(Selector::parse("   ").is_err());
        assert!(Selector::parse(".a ]").is_err());
        assert!(Selector::parse("a,").is_err());
        let err = Selector::parse("[").unwrap_err();
        assert_eq!(err.selector, "[");
        assert_eq!(Selector::parse_all(&[".ok", "[", "span"]).len(), 2);
    }
}
