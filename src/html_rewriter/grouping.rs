//! Partitioning of `<link>` and `<script>` elements into concatenation groups.

use crate::dom::{Document, NodeId};
use crate::uri::Uri;

const JS_TYPES: [&str; 6] = [
    "text/javascript",
    "application/javascript",
    "application/x-javascript",
    "text/ecmascript",
    "application/ecmascript",
    "text/jscript",
];

/// Result of one step of the script scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptRun {
    /// Adjacent external scripts that may be fetched as one batch, with their
    /// resolved targets.
    Group(Vec<(NodeId, Uri)>),
    /// A script that must stay where it is and ends any open group.
    Boundary(NodeId),
}

/// A `<script>` the browser would execute as JavaScript.
#[must_use]
pub fn is_javascript(doc: &Document, script: NodeId) -> bool {
    let Some(element) = doc.element(script) else {
        return false;
    };
    match element.attr("type") {
        None => true,
        Some(kind) => {
            let kind = kind.trim().to_ascii_lowercase();
            kind.is_empty() || JS_TYPES.contains(&kind.as_str())
        }
    }
}

/// A `<link>` that always loads a stylesheet.
///
/// Alternate stylesheets are user-selectable and disabled by default, so they
/// never join a batch with the persistent ones.
#[must_use]
pub fn is_stylesheet_link(doc: &Document, link: NodeId) -> bool {
    let Some(element) = doc.element(link) else {
        return false;
    };
    let has_rel = |wanted: &str| {
        element.attr("rel").is_some_and(|rel| {
            rel.split_ascii_whitespace()
                .any(|token| token.eq_ignore_ascii_case(wanted))
        })
    };
    if has_rel("alternate") {
        return false;
    }
    let rel_stylesheet = has_rel("stylesheet");
    let css_type = element
        .attr("type")
        .is_some_and(|kind| kind.to_ascii_lowercase().contains("css"));
    rel_stylesheet || css_type
}

/// Whether `b` follows `a` with only comments and whitespace between them.
#[must_use]
pub fn are_adjacent(doc: &Document, a: NodeId, b: NodeId) -> bool {
    let mut cursor = doc.next_sibling(a);
    while let Some(node) = cursor {
        if node == b {
            return true;
        }
        if !doc.is_insignificant(node) {
            return false;
        }
        cursor = doc.next_sibling(node);
    }
    false
}

/// Linear scan of `scripts` (document order) into groups and boundaries.
///
/// `accept` returns the batch target for a script that may join a group, or
/// `None` when it must stay in place.
pub fn script_runs<F>(doc: &Document, scripts: &[NodeId], mut accept: F) -> Vec<ScriptRun>
where
    F: FnMut(NodeId) -> Option<Uri>,
{
    let mut runs = Vec::new();
    let mut open: Vec<(NodeId, Uri)> = Vec::new();

    for &script in scripts {
        match accept(script) {
            Some(target) => {
                if let Some(&(last, _)) = open.last()
                    && !are_adjacent(doc, last, script)
                {
                    runs.push(ScriptRun::Group(std::mem::take(&mut open)));
                }
                open.push((script, target));
            }
            None => {
                if !open.is_empty() {
                    runs.push(ScriptRun::Group(std::mem::take(&mut open)));
                }
                runs.push(ScriptRun::Boundary(script));
            }
        }
    }
    if !open.is_empty() {
        runs.push(ScriptRun::Group(open));
    }
    runs
}

/// Group `links` by `media` attribute in first-seen order. Links without a
/// `media` attribute share the empty key.
pub fn media_groups<T, F>(doc: &Document, links: &[NodeId], mut entry: F) -> Vec<(String, Vec<T>)>
where
    F: FnMut(NodeId) -> Option<T>,
{
    let mut groups: Vec<(String, Vec<T>)> = Vec::new();
    for &link in links {
        let Some(item) = entry(link) else {
            continue;
        };
        let media = doc
            .element(link)
            .and_then(|e| e.attr("media"))
            .unwrap_or_default()
            .trim()
            .to_string();
        match groups.iter_mut().find(|(key, _)| *key == media) {
            Some((_, items)) => items.push(item),
            None => groups.push((media, vec![item])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scripts(doc: &Document) -> Vec<NodeId> {
        doc.elements_by_tag("script")
            .into_iter()
            .filter(|&s| is_javascript(doc, s))
            .collect()
    }

    fn accept_src(doc: &Document) -> impl FnMut(NodeId) -> Option<Uri> + '_ {
        |node| {
            doc.element(node)
                .and_then(|e| e.attr("src"))
                .and_then(|src| Uri::parse(&format!("http://x.test/{src}")).ok())
        }
    }

    fn shape(runs: &[ScriptRun]) -> Vec<usize> {
        runs.iter()
            .map(|run| match run {
                ScriptRun::Group(items) => items.len(),
                ScriptRun::Boundary(_) => 0,
            })
            .collect()
    }

    #[test]
    fn test_inline_script_is_a_boundary() {
        let doc = Document::parse(
            "<body><script src=a.js></script>\n<!-- c --><script src=b.js></script><script>x()</script><script src=c.js></script></body>",
        );
        let list = scripts(&doc);
        let runs = script_runs(&doc, &list, accept_src(&doc));
        assert_eq!(shape(&runs), vec![2, 0, 1]);
    }

    #[test]
    fn test_intervening_element_splits_group() {
        let doc = Document::parse(
            "<body><script src=a.js></script><div></div><script src=b.js></script></body>",
        );
        let list = scripts(&doc);
        let runs = script_runs(&doc, &list, accept_src(&doc));
        assert_eq!(shape(&runs), vec![1, 1]);
    }

    #[test]
    fn test_non_javascript_types_are_skipped() {
        let doc = Document::parse(
            "<script type='text/template'>t</script><script type='application/javascript' src=a.js></script><script type=''></script>",
        );
        assert_eq!(scripts(&doc).len(), 2);
    }

    #[test]
    fn test_media_groups_keep_first_seen_order() {
        let doc = Document::parse(
            "<head><link rel=stylesheet href=a.css media=print><link rel=stylesheet href=b.css><link rel=stylesheet href=c.css media=print></head>",
        );
        let links = doc.elements_by_tag("link");
        let groups = media_groups(&doc, &links, Some);
        let keys: Vec<(&str, usize)> = groups.iter().map(|(k, v)| (k.as_str(), v.len())).collect();
        assert_eq!(keys, vec![("print", 2), ("", 1)]);
    }

    #[test]
    fn test_stylesheet_link_detection() {
        let doc = Document::parse(
            "<head><link rel='Alternate StyleSheet' href=a.css><link type=text/css href=b.css><link rel=icon href=c.ico><link rel=StyleSheet href=d.css><link rel=alternate type=text/css href=e.css></head>",
        );
        let links = doc.elements_by_tag("link");
        let detected: Vec<bool> = links.iter().map(|&l| is_stylesheet_link(&doc, l)).collect();
        assert_eq!(detected, vec![false, true, false, true, false]);
    }
}
