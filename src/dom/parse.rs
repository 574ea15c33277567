//! Build the arena from `scraper`'s html5ever parse.

use ego_tree::NodeRef;
use scraper::{Html, Node};

use super::{Document, ElementData, NodeId, NodeKind};

pub(super) fn parse_document(html: &str) -> Document {
    let parsed = Html::parse_document(html);
    let mut doc = Document::default();

    // Explicit stack: deeply nested markup must not overflow the call stack.
    let root = doc.root();
    let mut stack: Vec<(NodeRef<'_, Node>, NodeId)> = parsed
        .tree
        .root()
        .children()
        .rev()
        .map(|child| (child, root))
        .collect();

    while let Some((node, parent)) = stack.pop() {
        let kind = match node.value() {
            Node::Document | Node::Fragment => {
                stack.extend(node.children().rev().map(|child| (child, parent)));
                continue;
            }
            Node::Doctype(doctype) => NodeKind::Doctype {
                name: doctype.name().to_string(),
                public_id: doctype.public_id().to_string(),
                system_id: doctype.system_id().to_string(),
            },
            Node::Comment(comment) => NodeKind::Comment((**comment).to_string()),
            Node::Text(text) => NodeKind::Text((**text).to_string()),
            Node::Element(element) => NodeKind::Element(ElementData {
                name: element.name().to_string(),
                attrs: element
                    .attrs()
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .collect(),
            }),
            _ => continue,
        };

        let id = doc.push(kind);
        doc.append_child(parent, id);
        stack.extend(node.children().rev().map(|child| (child, id)));
    }

    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doctype_and_comment_survive() {
        let doc = parse_document("<!DOCTYPE html><!-- top --><html><body>x</body></html>");
        let kinds: Vec<_> = doc
            .children(doc.root())
            .into_iter()
            .map(|id| doc.kind(id).clone())
            .collect();
        assert!(matches!(&kinds[0], NodeKind::Doctype { name, .. } if name == "html"));
        assert!(matches!(&kinds[1], NodeKind::Comment(c) if c == " top "));
    }

    #[test]
    fn test_deep_nesting_does_not_recurse() {
        let html = "<div>".repeat(5000);
        let doc = parse_document(&html);
        assert!(!doc.elements_by_tag("div").is_empty());
    }
}
