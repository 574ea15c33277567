//! Ordered chain of content rewriters sharing one [`MutableContent`].
//!
//! Stages run in registration order over the same parsed body, so a later
//! stage sees what an earlier one moved. The response is only re-serialized
//! when at least one stage reports a mutation; otherwise the caller gets back
//! the very same `Arc`.

mod css_stage;

pub use css_stage::CssContentRewriter;

use reqwest::StatusCode;
use reqwest::header::CONTENT_LENGTH;
use std::sync::Arc;

use crate::config::{FeatureConfigSource, RewriterConfig};
use crate::content::MutableContent;
use crate::css::CssRewriter;
use crate::html_rewriter::HtmlContentRewriter;
use crate::http::{HttpRequest, HttpResponse};
use crate::link_rewriter::RewriteTarget;
use crate::uri::{Uri, UriError};

/// A stage could not proceed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Rewriting failed ({status}): {message}")]
pub struct RewritingError {
    pub status: StatusCode,
    pub message: String,
}

impl RewritingError {
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// What a stage knows about the exchange it is rewriting.
#[derive(Debug, Clone, Copy)]
pub struct RewriteContext<'a> {
    pub request: &'a HttpRequest,
    pub response: &'a HttpResponse,
}

impl<'a> RewriteContext<'a> {
    #[must_use]
    pub fn new(request: &'a HttpRequest, response: &'a HttpResponse) -> Self {
        Self { request, response }
    }

    #[must_use]
    pub fn content_type(&self) -> &'a str {
        self.response.content_type()
    }

    /// Base for relative references in the body.
    #[must_use]
    pub fn content_base(&self) -> &'a Uri {
        self.request.content_base()
    }

    #[must_use]
    pub fn target(&self) -> RewriteTarget {
        RewriteTarget::from(self.request)
    }
}

/// One stage of the chain.
pub trait ContentRewriter: Send + Sync {
    /// Rewrite `content` in place. Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// Returns [`RewritingError`] when the stage cannot proceed at all.
    fn rewrite(
        &self,
        ctx: &RewriteContext<'_>,
        content: &mut MutableContent,
    ) -> Result<bool, RewritingError>;
}

pub struct RewriterRegistry {
    stages: Vec<Arc<dyn ContentRewriter>>,
    skip_empty: bool,
}

impl std::fmt::Debug for RewriterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RewriterRegistry")
            .field("stages", &self.stages.len())
            .field("skip_empty", &self.skip_empty)
            .finish()
    }
}

impl RewriterRegistry {
    #[must_use]
    pub fn new(stages: Vec<Arc<dyn ContentRewriter>>) -> Self {
        Self {
            stages,
            skip_empty: false,
        }
    }

    /// Chain for accelerated rendering: empty bodies pass straight through
    /// without building a tree.
    #[must_use]
    pub fn accelerated(stages: Vec<Arc<dyn ContentRewriter>>) -> Self {
        Self {
            stages,
            skip_empty: true,
        }
    }

    /// The HTML stage followed by the stylesheet stage.
    ///
    /// # Errors
    ///
    /// Returns [`UriError`] if the configured endpoint paths are not URIs.
    pub fn standard(
        config: &RewriterConfig,
        features: Arc<dyn FeatureConfigSource>,
        css_rewriter: CssRewriter,
    ) -> Result<Self, UriError> {
        let html = HtmlContentRewriter::new(config, Arc::clone(&features), css_rewriter.clone())?;
        let css = CssContentRewriter::new(config, features, css_rewriter)?;
        Ok(Self::new(vec![
            Arc::new(html) as Arc<dyn ContentRewriter>,
            Arc::new(css),
        ]))
    }

    #[must_use]
    pub fn with_stage(mut self, stage: Arc<dyn ContentRewriter>) -> Self {
        self.stages.push(stage);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage over `response`'s body.
    ///
    /// # Errors
    ///
    /// Propagates the first [`RewritingError`] raised by a stage.
    pub fn rewrite_response(
        &self,
        request: &HttpRequest,
        response: Arc<HttpResponse>,
    ) -> Result<Arc<HttpResponse>, RewritingError> {
        if self.skip_empty && response.body.is_empty() {
            return Ok(response);
        }

        let mut content = MutableContent::from_bytes(&response.body);
        let ctx = RewriteContext::new(request, &response);
        let mut mutated = false;
        for stage in &self.stages {
            mutated |= stage.rewrite(&ctx, &mut content)?;
        }

        if !mutated {
            return Ok(response);
        }

        log::debug!("Rewrote response for {}", request.uri);
        let mut rewritten = HttpResponse::clone(&response);
        rewritten.body = content.into_content().into_bytes();
        rewritten.headers.remove(CONTENT_LENGTH);
        Ok(Arc::new(rewritten))
    }
}
