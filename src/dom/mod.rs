//! In-process model of the host page.
//!
//! The mirror only needs a small slice of the DOM: element/text nodes with
//! attributes and inline style, layout rectangles for pointer gestures,
//! selector queries, mutation records and synthetic event dispatch. Nodes live
//! in an arena and are addressed by generational [`NodeId`]s. Removed subtrees
//! stay inspectable until [`Document::collect_detached`] returns their slots to
//! the free list; a stale id then resolves to nothing.

pub mod html;
pub mod page;
pub mod selector;

pub use page::{MutationSink, Notification, ObserveOptions, PageError, PageHandle, Subscription};
pub use selector::{Selector, SelectorError};

use page::ObserverRegistry;

/// Handle to a node inside a [`Document`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

const DOCUMENT_TAG: &str = "#document";
const EVENT_LOG_CAP: usize = 64;

/// Rendered geometry of an element, in window coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum NodeData {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        rect: Rect,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// What changed in a mutation record.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationKind {
    ChildList { added: Vec<NodeId>, removed: Vec<NodeId> },
    Attribute { name: String },
    CharacterData,
}

/// A single change observed on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub kind: MutationKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    MouseDown,
    MouseUp,
    Click,
}

/// Synthetic user-gesture event dispatched to an element.
#[derive(Debug, Clone, PartialEq)]
pub struct DomEvent {
    pub kind: EventKind,
    pub client_x: f64,
    pub client_y: f64,
}

impl DomEvent {
    pub fn click() -> Self {
        Self { kind: EventKind::Click, client_x: 0.0, client_y: 0.0 }
    }

    pub fn at(kind: EventKind, client_x: f64, client_y: f64) -> Self {
        Self { kind, client_x, client_y }
    }
}

/// The page's own scripts: reacts to dispatched events by mutating the document.
pub trait EventHandler: Send {
    fn handle(&mut self, doc: &mut Document, target: NodeId, event: &DomEvent);
}

/// Arena-backed document tree.
pub struct Document {
    nodes: Vec<Slot>,
    free: Vec<u32>,
    /// Roots that were created or removed since the last collection.
    detached: Vec<NodeId>,
    root: NodeId,
    pub(crate) observers: ObserverRegistry,
    handler: Option<Box<dyn EventHandler>>,
    event_log: Vec<(NodeId, DomEvent)>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.node_count())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Document {
    pub fn new() -> Self {
        let root = Node {
            data: NodeData::Element {
                tag: DOCUMENT_TAG.to_string(),
                attrs: Vec::new(),
                rect: Rect::default(),
            },
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![Slot { generation: 0, node: Some(root) }],
            free: Vec::new(),
            detached: Vec::new(),
            root: NodeId { index: 0, generation: 0 },
            observers: ObserverRegistry::default(),
            handler: None,
            event_log: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The `<body>` element, or the document root when there is none.
    pub fn body(&self) -> NodeId {
        self.descendants(self.root)
            .into_iter()
            .find(|&id| self.tag(id) == Some("body"))
            .unwrap_or(self.root)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Live nodes, attached or not.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// Slots ever allocated; freed slots are reused before this grows.
    pub fn arena_len(&self) -> usize {
        self.nodes.len()
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    // ------------------------------------------------------------------
    // Construction and mutation
    // ------------------------------------------------------------------

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let attrs = attrs
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
            .collect();
        self.push(NodeData::Element {
            tag: tag.to_ascii_lowercase(),
            attrs,
            rect: Rect::default(),
        })
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_string()))
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let node = Node { data, parent: None, children: Vec::new() };
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.nodes[index as usize];
                slot.node = Some(node);
                NodeId { index, generation: slot.generation }
            }
            None => {
                self.nodes.push(Slot { generation: 0, node: Some(node) });
                NodeId { index: (self.nodes.len() - 1) as u32, generation: 0 }
            }
        };
        self.detached.push(id);
        id
    }

    /// Free every subtree that is still detached, making its ids stale.
    /// [`PageHandle::write`] runs this once the write's closure returns.
    pub fn collect_detached(&mut self) -> usize {
        let mut reclaimed = 0;
        for top in std::mem::take(&mut self.detached) {
            if top == self.root || !self.contains(top) || self.parent(top).is_some() {
                continue;
            }
            let mut subtree = self.descendants(top);
            subtree.push(top);
            for id in subtree {
                let slot = &mut self.nodes[id.index as usize];
                slot.node = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index);
                reclaimed += 1;
            }
        }
        if reclaimed > 0 {
            tracing::trace!(reclaimed, live = self.node_count(), arena = self.arena_len(), "Reclaimed detached nodes");
        }
        reclaimed
    }

    /// Create an element and append it under `parent`.
    pub fn append_element(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let id = self.create_element(tag, attrs);
        self.append_child(parent, id);
        id
    }

    /// Create a text node and append it under `parent`.
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let id = self.create_text(text);
        self.append_child(parent, id);
        id
    }

    /// Append `child` under `parent`, moving it if already attached. A child
    /// that is `parent` or one of its ancestors is rejected.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if !self.contains(parent) || !self.contains(child) {
            return;
        }
        if parent == child || self.ancestors(parent).contains(&child) {
            tracing::warn!(%parent, %child, "Refusing to append a node under its own subtree");
            return;
        }
        if self.parent(child).is_some() {
            self.remove(child);
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.node_mut(parent) {
            node.children.push(child);
        }
        self.notify(
            parent,
            MutationKind::ChildList { added: vec![child], removed: Vec::new() },
        );
    }

    /// Detach `node` (and its subtree) from its parent.
    pub fn remove(&mut self, node: NodeId) {
        let Some(parent) = self.parent(node) else {
            return;
        };
        if let Some(p) = self.node_mut(parent) {
            p.children.retain(|&c| c != node);
        }
        if let Some(n) = self.node_mut(node) {
            n.parent = None;
        }
        self.detached.push(node);
        self.notify(
            parent,
            MutationKind::ChildList { added: Vec::new(), removed: vec![node] },
        );
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        let changed = match self.node_mut(node).map(|n| &mut n.data) {
            Some(NodeData::Element { attrs, .. }) => {
                match attrs.iter_mut().find(|(k, _)| *k == name) {
                    Some((_, v)) if v == value => false,
                    Some((_, v)) => {
                        *v = value.to_string();
                        true
                    }
                    None => {
                        attrs.push((name.clone(), value.to_string()));
                        true
                    }
                }
            }
            _ => false,
        };
        if changed {
            self.notify(node, MutationKind::Attribute { name });
        }
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
        let name = name.to_ascii_lowercase();
        let removed = match self.node_mut(node).map(|n| &mut n.data) {
            Some(NodeData::Element { attrs, .. }) => {
                let before = attrs.len();
                attrs.retain(|(k, _)| *k != name);
                attrs.len() != before
            }
            _ => false,
        };
        if removed {
            self.notify(node, MutationKind::Attribute { name });
        }
    }

    /// Replace the class list of an element.
    pub fn set_classes(&mut self, node: NodeId, classes: &[&str]) {
        self.set_attribute(node, "class", &classes.join(" "));
    }

    pub fn toggle_class(&mut self, node: NodeId, class: &str, on: bool) {
        let mut classes: Vec<String> = self.classes(node).map(str::to_string).collect();
        let present = classes.iter().any(|c| c == class);
        if present == on {
            return;
        }
        if on {
            classes.push(class.to_string());
        } else {
            classes.retain(|c| c != class);
        }
        self.set_attribute(node, "class", &classes.join(" "));
    }

    /// `textContent` setter. A lone text child is updated in place so the
    /// change is reported as character data rather than a child-list swap.
    pub fn set_text_content(&mut self, node: NodeId, text: &str) {
        if let Some(NodeData::Text(current)) = self.node_mut(node).map(|n| &mut n.data) {
            if current != text {
                *current = text.to_string();
                self.notify(node, MutationKind::CharacterData);
            }
            return;
        }
        if !self.is_element(node) {
            return;
        }
        let children = self.children(node).to_vec();
        if let [only] = children.as_slice()
            && let Some(NodeData::Text(current)) = self.node_mut(*only).map(|n| &mut n.data)
        {
            if current != text {
                *current = text.to_string();
                self.notify(*only, MutationKind::CharacterData);
            }
            return;
        }
        for child in children {
            self.remove(child);
        }
        if !text.is_empty() {
            self.append_text(node, text);
        }
    }

    /// Layout is owned by the host; it is not a DOM mutation.
    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        if let Some(NodeData::Element { rect: r, .. }) = self.node_mut(node).map(|n| &mut n.data) {
            *r = rect;
        }
    }

    fn notify(&mut self, target: NodeId, kind: MutationKind) {
        if self.observers.is_empty() {
            return;
        }
        let ancestors = self.ancestors(target);
        let record = MutationRecord { target, kind };
        self.observers.dispatch(&record, &ancestors);
    }

    // ------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------

    pub fn is_element(&self, node: NodeId) -> bool {
        matches!(self.node(node).map(|n| &n.data), Some(NodeData::Element { .. }))
    }

    /// Lowercase tag name of an element.
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match self.node(node).map(|n| &n.data) {
            Some(NodeData::Element { tag, .. }) => Some(tag.as_str()),
            _ => None,
        }
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        match self.node(node).map(|n| &n.data) {
            Some(NodeData::Element { attrs, .. }) => attrs
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn classes(&self, node: NodeId) -> impl Iterator<Item = &str> {
        self.attr(node, "class").unwrap_or_default().split_ascii_whitespace()
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.classes(node).any(|c| c == class)
    }

    /// Value of an inline style property, e.g. `width` from `style="width: 35%"`.
    pub fn style_property(&self, node: NodeId, property: &str) -> Option<String> {
        let style = self.attr(node, "style")?;
        style_declarations(style).into_iter().find_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            if name.trim().eq_ignore_ascii_case(property) {
                let value = value.trim();
                (!value.is_empty()).then(|| value.to_string())
            } else {
                None
            }
        })
    }

    pub fn rect(&self, node: NodeId) -> Rect {
        match self.node(node).map(|n| &n.data) {
            Some(NodeData::Element { rect, .. }) => *rect,
            _ => Rect::default(),
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).and_then(|n| n.parent)
    }

    /// Parent element, excluding the document root.
    pub fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        self.parent(node).filter(|&p| p != self.root && self.is_element(p))
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.node(node).map(|n| n.children.as_slice()).unwrap_or_default()
    }

    pub fn element_children(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(node).iter().copied().filter(|&c| self.is_element(c))
    }

    /// Raw text of a text node.
    pub fn text(&self, node: NodeId) -> Option<&str> {
        match self.node(node).map(|n| &n.data) {
            Some(NodeData::Text(t)) => Some(t.as_str()),
            _ => None,
        }
    }

    /// Concatenated text of all descendant text nodes (`textContent`).
    pub fn text_content(&self, node: NodeId) -> String {
        if let Some(t) = self.text(node) {
            return t.to_string();
        }
        let mut out = String::new();
        for id in self.descendants(node) {
            if let Some(t) = self.text(id) {
                out.push_str(t);
            }
        }
        out
    }

    /// Whether the node is attached to the document root.
    pub fn is_connected(&self, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(id) = cur {
            if id == self.root {
                return true;
            }
            cur = self.parent(id);
        }
        false
    }

    /// Ancestors of `node`, nearest first, excluding the node itself.
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = self.parent(node);
        while let Some(id) = cur {
            out.push(id);
            cur = self.parent(id);
        }
        out
    }

    /// Descendants of `node` in document (pre-)order, excluding the node itself.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    // ------------------------------------------------------------------
    // Selector queries
    // ------------------------------------------------------------------

    pub fn matches(&self, node: NodeId, selector: &Selector) -> bool {
        self.is_element(node) && node != self.root && selector.matches(self, node)
    }

    /// First element in document order matching `selector`.
    pub fn query_selector(&self, selector: &Selector) -> Option<NodeId> {
        self.query_within(self.root, selector)
    }

    pub fn query_selector_all(&self, selector: &Selector) -> Vec<NodeId> {
        self.query_all_within(self.root, selector)
    }

    /// First descendant of `scope` matching `selector`.
    pub fn query_within(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        self.descendants(scope).into_iter().find(|&id| self.matches(id, selector))
    }

    pub fn query_all_within(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|&id| self.matches(id, selector))
            .collect()
    }

    /// Nearest inclusive ancestor matching `selector`.
    pub fn closest(&self, node: NodeId, selector: &Selector) -> Option<NodeId> {
        let mut cur = Some(node);
        while let Some(id) = cur {
            if self.matches(id, selector) {
                return Some(id);
            }
            cur = self.parent(id);
        }
        None
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    pub fn set_event_handler(&mut self, handler: Box<dyn EventHandler>) {
        self.handler = Some(handler);
    }

    /// Dispatch a synthetic event to `target`, letting the host react.
    pub fn dispatch_event(&mut self, target: NodeId, event: DomEvent) {
        if !self.is_element(target) {
            return;
        }
        if self.event_log.len() == EVENT_LOG_CAP {
            self.event_log.remove(0);
        }
        self.event_log.push((target, event.clone()));
        if let Some(mut handler) = self.handler.take() {
            handler.handle(self, target, &event);
            // The handler may have installed a replacement; keep the newest.
            if self.handler.is_none() {
                self.handler = Some(handler);
            }
        }
    }

    /// Recently dispatched events, oldest first.
    pub fn event_log(&self) -> &[(NodeId, DomEvent)] {
        &self.event_log
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

/// Split an inline style on `;`, ignoring separators inside quotes or
/// parentheses (`url(...)` values may carry entity-escaped query strings).
fn style_declarations(style: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let (mut depth, mut quote, mut start) = (0usize, None, 0);
    for (i, c) in style.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                out.push(&style[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&style[start..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(s: &str) -> Selector {
        Selector::parse(s).unwrap()
    }

    fn sample() -> (Document, NodeId, NodeId) {
        let mut doc = Document::new();
        let root = doc.root();
        let body = doc.append_element(root, "body", &[]);
        let info = doc.append_element(body, "div", &[("class", "track-info")]);
        let title = doc.append_element(info, "span", &[("class", "title"), ("style", "width: 35%; left: 2%")]);
        doc.append_text(title, "Song");
        (doc, info, title)
    }

    #[test]
    fn text_content_concatenates_descendants() {
        let (mut doc, info, title) = sample();
        let extra = doc.append_element(info, "b", &[]);
        doc.append_text(extra, " Two");
        assert_eq!(doc.text_content(title), "Song");
        assert_eq!(doc.text_content(info), "Song Two");
    }

    #[test]
    fn style_property_reads_inline_declarations() {
        let (doc, _, title) = sample();
        assert_eq!(doc.style_property(title, "width").as_deref(), Some("35%"));
        assert_eq!(doc.style_property(title, "LEFT").as_deref(), Some("2%"));
        assert_eq!(doc.style_property(title, "color"), None);
    }

    #[test]
    fn style_separators_inside_urls_are_kept() {
        let (mut doc, _, title) = sample();
        doc.set_attribute(title, "style", "background-image: url(\"a?x=1&amp;y=2\"); width: 5%");
        assert_eq!(
            doc.style_property(title, "background-image").as_deref(),
            Some("url(\"a?x=1&amp;y=2\")")
        );
        assert_eq!(doc.style_property(title, "width").as_deref(), Some("5%"));
    }

    #[test]
    fn removed_nodes_leave_queries_but_stay_inspectable() {
        let (mut doc, info, title) = sample();
        assert_eq!(doc.query_selector(&sel(".title")), Some(title));
        doc.remove(info);
        assert_eq!(doc.query_selector(&sel(".title")), None);
        assert!(!doc.is_connected(title));
        assert!(doc.has_class(info, "track-info"));
    }

    #[test]
    fn appending_an_ancestor_under_its_descendant_is_rejected() {
        let (mut doc, info, title) = sample();
        let body = doc.parent(info).unwrap();
        doc.append_child(title, info);
        doc.append_child(info, info);
        assert_eq!(doc.parent(info), Some(body));
        assert_eq!(doc.ancestors(title).len(), 3);
        assert!(doc.is_connected(title));
    }

    #[test]
    fn moved_nodes_survive_collection() {
        let (mut doc, info, title) = sample();
        let body = doc.parent(info).unwrap();
        doc.collect_detached();
        doc.append_child(body, title);
        assert_eq!(doc.collect_detached(), 0);
        assert_eq!(doc.parent(title), Some(body));
    }

    #[test]
    fn rerendering_reuses_reclaimed_slots() {
        let (mut doc, info, _) = sample();
        doc.collect_detached();
        let mut current = doc.append_element(info, "div", &[("class", "info")]);
        doc.append_text(current, "v0");
        doc.collect_detached();
        let (live, arena) = (doc.node_count(), doc.arena_len());
        for i in 1..200 {
            doc.remove(current);
            current = doc.append_element(info, "div", &[("class", "info")]);
            doc.append_text(current, &format!("v{i}"));
            doc.collect_detached();
        }
        assert_eq!(doc.node_count(), live);
        assert!(doc.arena_len() <= arena + 2);
        assert_eq!(doc.text_content(current), "v199");
    }

    #[test]
    fn stale_ids_resolve_to_nothing() {
        let (mut doc, info, title) = sample();
        doc.remove(info);
        assert!(doc.collect_detached() >= 3);
        assert!(!doc.contains(title));
        assert_eq!(doc.tag(info), None);
        assert_eq!(doc.text_content(title), "");
        let reused = doc.create_element("p", &[]);
        assert_ne!(reused, info);
        assert_ne!(reused, title);
    }

    #[test]
    fn set_text_content_updates_lone_text_child_in_place() {
        let (mut doc, _, title) = sample();
        let text_node = doc.children(title)[0];
        doc.set_text_content(title, "Other");
        assert_eq!(doc.children(title), &[text_node]);
        assert_eq!(doc.text_content(title), "Other");
    }

    #[test]
    fn closest_includes_the_node_itself() {
        let (doc, info, title) = sample();
        assert_eq!(doc.closest(title, &sel(".title")), Some(title));
        assert_eq!(doc.closest(title, &sel(".track-info")), Some(info));
        assert_eq!(doc.closest(title, &sel(".missing")), None);
    }

    struct CountClicks(usize);

    impl EventHandler for CountClicks {
        fn handle(&mut self, doc: &mut Document, target: NodeId, event: &DomEvent) {
            if event.kind == EventKind::Click {
                self.0 += 1;
                doc.set_attribute(target, "data-clicks", &self.0.to_string());
            }
        }
    }

    #[test]
    fn dispatch_runs_host_handler_and_logs() {
        let (mut doc, _, title) = sample();
        doc.set_event_handler(Box::new(CountClicks(0)));
        doc.dispatch_event(title, DomEvent::click());
        doc.dispatch_event(title, DomEvent::click());
        assert_eq!(doc.attr(title, "data-clicks"), Some("2"));
        assert_eq!(doc.event_log().len(), 2);
    }
}
