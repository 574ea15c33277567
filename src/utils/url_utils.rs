//! Link classification helpers shared by the rewriters.

/// Check whether a raw attribute or `url()` value names a fetchable resource.
///
/// Empty values, fragment-only references and non-network schemes (`data:`,
/// `javascript:`, `mailto:`, `tel:`, `about:`) are never proxied.
#[must_use]
pub fn is_proxyable_link(link: &str) -> bool {
    let link = link.trim();
    if link.is_empty() || link.starts_with('#') {
        return false;
    }

    let lower = link.get(..11).unwrap_or(link).to_ascii_lowercase();
    !["data:", "javascript:", "mailto:", "tel:", "about:", "blob:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}

/// Media type portion of a `Content-Type` value, lowercased.
#[must_use]
pub fn mime_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Whether a `Content-Type` denotes an HTML document the DOM rewriter may touch.
///
/// Plain text and generic XML are deliberately excluded.
#[must_use]
pub fn is_html_content_type(content_type: &str) -> bool {
    matches!(
        mime_type(content_type).as_str(),
        "text/html" | "application/xhtml+xml"
    )
}

#[must_use]
pub fn is_css_content_type(content_type: &str) -> bool {
    mime_type(content_type) == "text/css"
}
