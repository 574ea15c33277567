use std::sync::Arc;

use super::cache::{content_hash, CssCache, NoCssCache};
use super::stylesheet::{CssParseError, CssStyleSheet};
use crate::dom::{Document, NodeId};
use crate::link_rewriter::LinkRewriter;
use crate::uri::Uri;

/// An `@import` lifted out of a stylesheet, ready to become a `<link>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedImport {
    pub href: String,
    pub media: String,
}

/// Outcome of rewriting one `<style>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CssNodeRewrite {
    pub mutated: bool,
    pub imports: Vec<ExtractedImport>,
}

/// Rewrites `url()` references and `@import`s through a [`LinkRewriter`].
#[derive(Clone)]
pub struct CssRewriter {
    cache: Arc<dyn CssCache>,
}

impl std::fmt::Debug for CssRewriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CssRewriter").finish_non_exhaustive()
    }
}

impl Default for CssRewriter {
    fn default() -> Self {
        Self::new(Arc::new(NoCssCache))
    }
}

impl CssRewriter {
    #[must_use]
    pub fn new(cache: Arc<dyn CssCache>) -> Self {
        Self { cache }
    }

    /// Parse through the cache; the result is always a private copy.
    ///
    /// # Errors
    ///
    /// Returns [`CssParseError`] if `text` is not a well-formed stylesheet.
    pub fn parse(&self, text: &str) -> Result<CssStyleSheet, CssParseError> {
        let key = content_hash(text);
        if let Some(sheet) = self.cache.get(key) {
            log::trace!("CSS cache hit for {key:016x}");
            return Ok(sheet);
        }
        let sheet = CssStyleSheet::parse(text)?;
        self.cache.put(key, &sheet);
        Ok(sheet)
    }

    /// Rewrite every reference in `sheet`.
    ///
    /// With `extract_imports` the `@import`s are removed and returned with
    /// their rewritten URLs; otherwise they are rewritten in place.
    pub fn rewrite_sheet(
        &self,
        sheet: &mut CssStyleSheet,
        base: &Uri,
        link_rewriter: &dyn LinkRewriter,
        extract_imports: bool,
    ) -> Vec<ExtractedImport> {
        let mut extracted = Vec::new();
        if extract_imports {
            for import in sheet.take_imports() {
                match base.resolve_str(import.url()) {
                    Ok(resolved) => extracted.push(ExtractedImport {
                        href: link_rewriter.rewrite(resolved.as_str(), base),
                        media: import.media().to_string(),
                    }),
                    Err(e) => log::warn!("Dropping @import of malformed URL {:?}: {e}", import.url()),
                }
            }
        } else {
            for import in sheet.imports_mut() {
                let rewritten = link_rewriter.rewrite(import.url(), base);
                import.set_url(rewritten);
            }
        }

        for url in sheet.urls_mut() {
            let rewritten = link_rewriter.rewrite(url.value(), base);
            url.set_value(rewritten);
        }
        extracted
    }

    /// Rewrite the text of a `<style>` element in place.
    ///
    /// A stylesheet that fails to parse is logged and left untouched.
    pub fn rewrite_style_node(
        &self,
        doc: &mut Document,
        node: NodeId,
        base: &Uri,
        link_rewriter: &dyn LinkRewriter,
        extract_imports: bool,
    ) -> CssNodeRewrite {
        let text = doc.text_content(node);
        let mut sheet = match self.parse(&text) {
            Ok(sheet) => sheet,
            Err(e) => {
                log::warn!("Leaving malformed inline stylesheet unrewritten: {e}");
                return CssNodeRewrite::default();
            }
        };

        let had_imports = sheet.imports().next().is_some();
        let imports = self.rewrite_sheet(&mut sheet, base, link_rewriter, extract_imports);
        let mutated = sheet.is_modified() || (extract_imports && had_imports);
        if mutated {
            doc.set_text_content(node, sheet.to_css());
        }
        CssNodeRewrite { mutated, imports }
    }

    /// Rewrite a whole stylesheet body.
    ///
    /// # Errors
    ///
    /// Returns [`CssParseError`] when the body does not parse; callers serving
    /// it directly answer 400.
    pub fn rewrite_stylesheet(
        &self,
        text: &str,
        base: &Uri,
        link_rewriter: &dyn LinkRewriter,
    ) -> Result<String, CssParseError> {
        let mut sheet = self.parse(text)?;
        self.rewrite_sheet(&mut sheet, base, link_rewriter, false);
        if sheet.is_modified() {
            Ok(sheet.to_css())
        } else {
            Ok(text.to_string())
        }
    }
}
