//! Load an HTML snapshot of the player page into a [`Document`].

use super::{Document, NodeId};
use scraper::{ElementRef, Html};

/// Parse `source` as a full HTML document.
pub fn parse_document(source: &str) -> Document {
    let parsed = Html::parse_document(source);
    let mut doc = Document::new();
    let root = doc.root();
    copy_element(&mut doc, root, parsed.root_element());
    tracing::debug!(nodes = doc.descendants(root).len(), "Parsed HTML snapshot");
    doc
}

fn copy_element(doc: &mut Document, parent: NodeId, element: ElementRef<'_>) {
    let value = element.value();
    let mut attrs: Vec<(&str, &str)> = value.attrs().collect();
    // The HTML parser strips the `xlink:` prefix from SVG references; the
    // selector lists match on the prefixed name.
    if value.name() == "use"
        && let Some(&(_, href)) = attrs.iter().find(|(k, _)| *k == "href")
        && !attrs.iter().any(|(k, _)| *k == "xlink:href")
    {
        attrs.push(("xlink:href", href));
    }
    let id = doc.append_element(parent, value.name(), &attrs);
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            copy_element(doc, id, child_element);
        } else if let Some(text) = child.value().as_text() {
            let text: &str = text;
            if !text.is_empty() {
                doc.append_text(id, text);
            }
        }
    }
}
