//! HTML serialization of the arena.
//!
//! Output re-parses to the same tree, so serializing twice through a parse is
//! a fixed point.

use super::{Document, NodeId, NodeKind};

/// Elements that never have children or an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose text content is written verbatim.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext", "noscript",
];

/// The parser drops one newline directly after these start tags.
const LEADING_NEWLINE_ELEMENTS: &[&str] = &["pre", "textarea", "listing"];

/// A pending step of the walk: emit a node, or close an element opened earlier.
enum Frame {
    Open(NodeId),
    Close(NodeId),
}

pub(super) fn serialize_document(doc: &Document) -> String {
    let mut out = String::new();

    // Explicit stack: nesting depth is bounded by the input, not the call stack.
    let mut stack: Vec<Frame> = doc
        .children(doc.root())
        .into_iter()
        .rev()
        .map(Frame::Open)
        .collect();

    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Close(id) => {
                if let Some(element) = doc.element(id) {
                    out.push_str("</");
                    out.push_str(element.name());
                    out.push('>');
                }
            }
            Frame::Open(id) => {
                if write_open(doc, id, &mut out) {
                    stack.push(Frame::Close(id));
                }
                if !matches!(doc.kind(id), NodeKind::Element(e) if is_void(e.name())) {
                    stack.extend(doc.children(id).into_iter().rev().map(Frame::Open));
                }
            }
        }
    }
    out
}

fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.iter().any(|t| name.eq_ignore_ascii_case(t))
}

/// Write everything of `id` that precedes its children. Returns whether an
/// end tag is owed.
fn write_open(doc: &Document, id: NodeId, out: &mut String) -> bool {
    match doc.kind(id) {
        NodeKind::Document => false,
        NodeKind::Doctype {
            name,
            public_id,
            system_id,
        } => {
            write_doctype(name, public_id, system_id, out);
            false
        }
        NodeKind::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
            false
        }
        NodeKind::Text(text) => {
            let raw = doc
                .parent(id)
                .and_then(|p| doc.element(p))
                .is_some_and(|e| RAW_TEXT_ELEMENTS.iter().any(|t| e.is(t)));
            if raw {
                out.push_str(text);
            } else {
                out.push_str(&html_escape::encode_text(text));
            }
            false
        }
        NodeKind::Element(element) => {
            out.push('<');
            out.push_str(element.name());
            for (name, value) in element.attrs() {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&html_escape::encode_double_quoted_attribute(value));
                out.push('"');
            }
            out.push('>');

            if is_void(element.name()) {
                return false;
            }

            if LEADING_NEWLINE_ELEMENTS.iter().any(|t| element.is(t))
                && let Some(first) = doc.first_child(id)
                && matches!(doc.kind(first), NodeKind::Text(t) if t.starts_with('\n'))
            {
                out.push('\n');
            }
            true
        }
    }
}

/// Public and system identifiers decide the rendering mode, so both survive.
fn write_doctype(name: &str, public_id: &str, system_id: &str, out: &mut String) {
    out.push_str("<!DOCTYPE ");
    out.push_str(name);
    if !public_id.is_empty() {
        out.push_str(" PUBLIC \"");
        out.push_str(public_id);
        out.push('"');
        if !system_id.is_empty() {
            out.push_str(" \"");
            out.push_str(system_id);
            out.push('"');
        }
    } else if !system_id.is_empty() {
        out.push_str(" SYSTEM \"");
        out.push_str(system_id);
        out.push('"');
    }
    out.push('>');
}

#[cfg(test)]
mod tests {
    use crate::dom::Document;

    fn roundtrip(html: &str) -> String {
        Document::parse(html).serialize()
    }

    #[test]
    fn test_serialization_is_a_fixed_point() {
        let inputs = [
            "<!DOCTYPE html><html><head><title>a &amp; b</title></head><body><p class=x>1 < 2</p></body></html>",
            "<p>unclosed<p>second<ul><li>one<li>two</ul>",
            "<pre>\n\nindented</pre><textarea>\nx</textarea>",
            "<script>if (a < b && c) { x = '</p>'; }</script><style>a > b { color: red }</style>",
            "<img src=\"a.png\" alt='say \"hi\"'><br><input disabled>",
        ];
        for input in inputs {
            let once = roundtrip(input);
            let twice = roundtrip(&once);
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_raw_text_not_escaped() {
        let out = roundtrip("<script>a < b && c</script>");
        assert!(out.contains("<script>a < b && c</script>"));
    }

    #[test]
    fn test_deeply_nested_elements_serialize() {
        let depth = 100_000;
        let mut doc = Document::parse("<html><head></head><body></body></html>");
        let mut parent = doc.elements_by_tag("body")[0];
        for _ in 0..depth {
            let span = doc.create_element("span", Vec::new());
            doc.append_child(parent, span);
            parent = span;
        }
        let text = doc.create_text("leaf");
        doc.append_child(parent, text);

        let out = doc.serialize();
        assert_eq!(out.matches("<span>").count(), depth);
        assert_eq!(out.matches("</span>").count(), depth);
        assert!(out.ends_with(&format!("leaf{}</body></html>", "</span>".repeat(depth))));
    }

    #[test]
    fn test_unclosed_markup_from_parser_serializes() {
        let html = format!("<body><img src=a.png>{}", "<span>".repeat(5000));
        let out = roundtrip(&html);
        assert_eq!(out.matches("</span>").count(), 5000);
    }

    #[test]
    fn test_legacy_doctype_keeps_identifiers() {
        let out = roundtrip(
            "<!DOCTYPE HTML PUBLIC \"-//W3C//DTD HTML 4.01 Transitional//EN\"><p>x</p>",
        );
        assert!(out.starts_with(
            "<!DOCTYPE html PUBLIC \"-//W3C//DTD HTML 4.01 Transitional//EN\"><html>"
        ));

        let out = roundtrip("<!DOCTYPE html SYSTEM \"about:legacy-compat\"><p>x</p>");
        assert!(out.starts_with("<!DOCTYPE html SYSTEM \"about:legacy-compat\"><html>"));

        let out = roundtrip("<!DOCTYPE html><p>x</p>");
        assert!(out.starts_with("<!DOCTYPE html><html>"));
    }

    #[test]
    fn test_attribute_order_follows_source() {
        let out = roundtrip("<link rel=stylesheet href=a.css media=print>");
        assert!(out.contains("<link rel=\"stylesheet\" href=\"a.css\" media=\"print\">"));
    }

    #[test]
    fn test_void_elements_have_no_end_tag() {
        let out = roundtrip("<body><img src=a.png><br></body>");
        assert!(out.contains("<img src=\"a.png\"><br>"));
        assert!(!out.contains("</img>"));
    }
}
