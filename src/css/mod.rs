//! Stylesheet parsing, caching and reference rewriting.

mod cache;
mod rewriter;
mod stylesheet;

pub use cache::{content_hash, CssCache, LruCssCache, NoCssCache};
pub use rewriter::{CssNodeRewrite, CssRewriter, ExtractedImport};
pub use stylesheet::{
    CssComponent, CssImport, CssParseError, CssRule, CssStatement, CssStyleSheet, CssUrl,
};
