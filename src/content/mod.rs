//! Response body shared by every stage of one rewrite chain run.
//!
//! The body is parsed into a [`Document`] at most once, on first structural
//! access. Stages that change the tree call [`MutableContent::document_changed`];
//! [`MutableContent::content`] then re-serializes exactly once, and reuses the
//! cached string until the tree is touched again.

use crate::dom::Document;

#[derive(Debug)]
pub struct MutableContent {
    content: String,
    document: Option<Document>,
    dirty: bool,
    parse_count: usize,
}

impl MutableContent {
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            document: None,
            dirty: false,
            parse_count: 0,
        }
    }

    /// Decode a byte body, replacing invalid UTF-8 sequences.
    #[must_use]
    pub fn from_bytes(body: &[u8]) -> Self {
        Self::new(String::from_utf8_lossy(body).into_owned())
    }

    /// Current text, serializing the tree first if it changed.
    pub fn content(&mut self) -> &str {
        if self.dirty
            && let Some(doc) = &self.document
        {
            self.content = doc.serialize();
            self.dirty = false;
        }
        &self.content
    }

    /// Replace the body wholesale; any parsed tree is discarded.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.document = None;
        self.dirty = false;
    }

    /// Parsed tree, parsing on first use.
    pub fn document(&mut self) -> &Document {
        self.document_mut()
    }

    /// Mutable parsed tree. Callers must report edits via
    /// [`document_changed`](Self::document_changed).
    pub fn document_mut(&mut self) -> &mut Document {
        if self.document.is_none() {
            self.parse_count += 1;
            log::trace!(
                "Parsing {} bytes of HTML (parse #{})",
                self.content.len(),
                self.parse_count
            );
        }
        self.document
            .get_or_insert_with(|| Document::parse(&self.content))
    }

    /// Raise the mutation flag.
    pub fn document_changed(&mut self) {
        if self.document.is_some() {
            self.dirty = true;
        }
    }

    #[must_use]
    pub fn is_parsed(&self) -> bool {
        self.document.is_some()
    }

    /// Whether the tree changed since the last serialization.
    #[must_use]
    pub fn has_pending_changes(&self) -> bool {
        self.dirty
    }

    /// How many times the body has been parsed.
    #[must_use]
    pub fn parse_count(&self) -> usize {
        self.parse_count
    }

    #[must_use]
    pub fn into_content(mut self) -> String {
        self.content();
        self.content
    }
}
