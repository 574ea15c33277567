//! Loss-free stylesheet model on top of `cssparser`'s tokenizer.
//!
//! A sheet is a list of top-level statements whose concatenated text is the
//! original input. Only two things are lifted out of the raw text: `@import`
//! statements and `url()` values. Everything else is kept verbatim, so
//! `to_css()` reproduces the input byte for byte until a URL is changed.

use cssparser::{ParseError, Parser, ParserInput, SourceLocation, Token};

/// Stylesheet that cannot be tokenized safely.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CssParseError {
    #[error("Malformed url() at line {line}, column {column}")]
    BadUrl { line: u32, column: u32 },

    #[error("Unterminated string at line {line}, column {column}")]
    BadString { line: u32, column: u32 },

    #[error("Unexpected '}}' at line {line}, column {column}")]
    UnexpectedClose { line: u32, column: u32 },

    #[error("Block opened at line {line}, column {column} is never closed")]
    UnclosedBlock { line: u32, column: u32 },

    #[error("@import at line {line}, column {column} has no valid URL")]
    InvalidImport { line: u32, column: u32 },
}

impl CssParseError {
    #[must_use]
    pub fn status(&self) -> reqwest::StatusCode {
        reqwest::StatusCode::BAD_REQUEST
    }
}

/// A `url()` reference. `raw` holds the original token text until the value
/// is changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssUrl {
    value: String,
    raw: Option<String>,
}

impl CssUrl {
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Replace the value. Setting the current value is a no-op.
    pub fn set_value(&mut self, value: impl Into<String>) {
        let value = value.into();
        if value != self.value {
            self.value = value;
            self.raw = None;
        }
    }

    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.raw.is_none()
    }

    fn write_css(&self, out: &mut String) {
        match &self.raw {
            Some(raw) => out.push_str(raw),
            None => write_url(&self.value, out),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssImport {
    leading: String,
    url: String,
    media: String,
    raw: Option<String>,
}

impl CssImport {
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Media query list, empty when the import applies to all media.
    #[must_use]
    pub fn media(&self) -> &str {
        &self.media
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        let url = url.into();
        if url != self.url {
            self.url = url;
            self.raw = None;
        }
    }

    fn write_css(&self, out: &mut String) {
        if let Some(raw) = &self.raw {
            out.push_str(raw);
            return;
        }
        out.push_str(&self.leading);
        out.push_str("@import ");
        write_url(&self.url, out);
        if !self.media.is_empty() {
            out.push(' ');
            out.push_str(&self.media);
        }
        out.push(';');
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CssComponent {
    Text(String),
    Url(CssUrl),
}

/// Any statement other than `@import`: a rule, an at-rule, or trailing trivia.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssRule {
    components: Vec<CssComponent>,
}

impl CssRule {
    #[must_use]
    pub fn components(&self) -> &[CssComponent] {
        &self.components
    }

    pub fn urls_mut(&mut self) -> impl Iterator<Item = &mut CssUrl> {
        self.components.iter_mut().filter_map(|c| match c {
            CssComponent::Url(url) => Some(url),
            CssComponent::Text(_) => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CssStatement {
    Import(CssImport),
    Rule(CssRule),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CssStyleSheet {
    statements: Vec<CssStatement>,
}

impl CssStyleSheet {
    /// Tokenize `text` into statements.
    ///
    /// # Errors
    ///
    /// Returns [`CssParseError`] for bad strings or URLs, unbalanced curly
    /// braces and `@import`s without a URL.
    pub fn parse(text: &str) -> Result<Self, CssParseError> {
        let mut input = ParserInput::new(text);
        let mut parser = Parser::new(&mut input);
        let mut walker = Walker::default();
        let mut spans: Vec<StatementSpan> = Vec::new();
        let mut current = PendingStatement::default();
        let mut stmt_start = 0;

        loop {
            let start = parser.position().byte_index();
            let location = parser.current_source_location();
            let token = match parser.next_including_whitespace_and_comments() {
                Ok(token) => token.clone(),
                Err(_) => break,
            };

            match &mut current {
                PendingStatement::Empty => {
                    if matches!(token, Token::WhiteSpace(_) | Token::Comment(_)) {
                        continue;
                    }
                    if let Token::AtKeyword(name) = &token
                        && name.eq_ignore_ascii_case("import")
                    {
                        current = PendingStatement::Import(PendingImport {
                            keyword_start: start,
                            location,
                            url: None,
                            url_end: 0,
                        });
                        continue;
                    }
                    current = PendingStatement::Rule;
                    if walker.rule_token(&mut parser, token, start, location)? {
                        spans.push(StatementSpan::rule(stmt_start, parser.position().byte_index()));
                        stmt_start = parser.position().byte_index();
                        current = PendingStatement::Empty;
                    }
                }
                PendingStatement::Rule => {
                    if walker.rule_token(&mut parser, token, start, location)? {
                        spans.push(StatementSpan::rule(stmt_start, parser.position().byte_index()));
                        stmt_start = parser.position().byte_index();
                        current = PendingStatement::Empty;
                    }
                }
                PendingStatement::Import(import) => {
                    if walker.import_token(&mut parser, import, token, start, location)? {
                        let end = parser.position().byte_index();
                        spans.push(StatementSpan::import(stmt_start, end, import)?);
                        stmt_start = end;
                        current = PendingStatement::Empty;
                    }
                }
            }
        }

        // Statement or trivia running to end of input
        if stmt_start < text.len() {
            match &current {
                PendingStatement::Import(import) => {
                    spans.push(StatementSpan::import(stmt_start, text.len(), import)?);
                }
                _ => spans.push(StatementSpan::rule(stmt_start, text.len())),
            }
        }

        Ok(Self {
            statements: assemble(text, spans, walker.urls),
        })
    }

    /// Serialize back to CSS text.
    #[must_use]
    pub fn to_css(&self) -> String {
        let mut out = String::new();
        for statement in &self.statements {
            match statement {
                CssStatement::Import(import) => import.write_css(&mut out),
                CssStatement::Rule(rule) => {
                    for component in &rule.components {
                        match component {
                            CssComponent::Text(text) => out.push_str(text),
                            CssComponent::Url(url) => url.write_css(&mut out),
                        }
                    }
                }
            }
        }
        out
    }

    #[must_use]
    pub fn statements(&self) -> &[CssStatement] {
        &self.statements
    }

    pub fn imports(&self) -> impl Iterator<Item = &CssImport> {
        self.statements.iter().filter_map(|s| match s {
            CssStatement::Import(import) => Some(import),
            CssStatement::Rule(_) => None,
        })
    }

    pub fn imports_mut(&mut self) -> impl Iterator<Item = &mut CssImport> {
        self.statements.iter_mut().filter_map(|s| match s {
            CssStatement::Import(import) => Some(import),
            CssStatement::Rule(_) => None,
        })
    }

    /// Remove every `@import` and return them in source order.
    pub fn take_imports(&mut self) -> Vec<CssImport> {
        let mut imports = Vec::new();
        self.statements.retain(|s| match s {
            CssStatement::Import(import) => {
                imports.push(import.clone());
                false
            }
            CssStatement::Rule(_) => true,
        });
        imports
    }

    /// Every `url()` outside `@import` statements.
    pub fn urls_mut(&mut self) -> impl Iterator<Item = &mut CssUrl> {
        self.statements
            .iter_mut()
            .filter_map(|s| match s {
                CssStatement::Rule(rule) => Some(rule),
                CssStatement::Import(_) => None,
            })
            .flat_map(CssRule::urls_mut)
    }

    /// Whether any statement differs from its source text.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.statements.iter().any(|s| match s {
            CssStatement::Import(import) => import.raw.is_none(),
            CssStatement::Rule(rule) => rule.components.iter().any(|c| match c {
                CssComponent::Url(url) => url.is_modified(),
                CssComponent::Text(_) => false,
            }),
        })
    }
}

fn write_url(value: &str, out: &mut String) {
    out.push_str("url(");
    // Writing into a String cannot fail
    let _ = cssparser::serialize_string(value, out);
    out.push(')');
}

#[derive(Debug, Default)]
enum PendingStatement {
    #[default]
    Empty,
    Rule,
    Import(PendingImport),
}

#[derive(Debug)]
struct PendingImport {
    keyword_start: usize,
    location: SourceLocation,
    url: Option<String>,
    url_end: usize,
}

#[derive(Debug)]
enum StatementSpan {
    Rule {
        start: usize,
        end: usize,
    },
    Import {
        start: usize,
        end: usize,
        keyword_start: usize,
        url: String,
        url_end: usize,
    },
}

impl StatementSpan {
    fn rule(start: usize, end: usize) -> Self {
        Self::Rule { start, end }
    }

    fn import(start: usize, end: usize, pending: &PendingImport) -> Result<Self, CssParseError> {
        let url = pending.url.clone().ok_or_else(|| CssParseError::InvalidImport {
            line: pending.location.line + 1,
            column: pending.location.column,
        })?;
        Ok(Self::Import {
            start,
            end,
            keyword_start: pending.keyword_start,
            url,
            url_end: pending.url_end,
        })
    }
}

/// A `url()` found while walking, as a byte range of the input.
#[derive(Debug)]
struct UrlSpan {
    start: usize,
    end: usize,
    value: String,
}

#[derive(Debug, Default)]
struct Walker {
    urls: Vec<UrlSpan>,
}

impl Walker {
    /// Handle one token of a rule statement. Returns true when the token
    /// ends the statement.
    fn rule_token<'i>(
        &mut self,
        parser: &mut Parser<'i, '_>,
        token: Token<'i>,
        start: usize,
        location: SourceLocation,
    ) -> Result<bool, CssParseError> {
        match token {
            Token::Semicolon => Ok(true),
            Token::CurlyBracketBlock => {
                self.nested(parser, location)?;
                Ok(true)
            }
            Token::CloseCurlyBracket => Err(CssParseError::UnexpectedClose {
                line: location.line + 1,
                column: location.column,
            }),
            other => {
                self.value_token(parser, other, start, location)?;
                Ok(false)
            }
        }
    }

    /// Handle one token inside an `@import` prelude. Returns true at the
    /// terminating semicolon.
    fn import_token<'i>(
        &mut self,
        parser: &mut Parser<'i, '_>,
        import: &mut PendingImport,
        token: Token<'i>,
        start: usize,
        location: SourceLocation,
    ) -> Result<bool, CssParseError> {
        let invalid = CssParseError::InvalidImport {
            line: import.location.line + 1,
            column: import.location.column,
        };
        match token {
            Token::Semicolon => Ok(true),
            Token::WhiteSpace(_) | Token::Comment(_) => Ok(false),
            Token::BadUrl(_) | Token::BadString(_) => Err(bad_token(&token, location)),
            Token::CurlyBracketBlock | Token::CloseCurlyBracket => Err(invalid),
            Token::QuotedString(value) | Token::UnquotedUrl(value) if import.url.is_none() => {
                import.url = Some(value.to_string());
                import.url_end = parser.position().byte_index();
                Ok(false)
            }
            Token::Function(name) if import.url.is_none() && name.eq_ignore_ascii_case("url") => {
                match self.url_function(parser, location)? {
                    Some(value) => {
                        import.url = Some(value);
                        import.url_end = parser.position().byte_index();
                        Ok(false)
                    }
                    None => Err(invalid),
                }
            }
            _ if import.url.is_none() => Err(invalid),
            other => {
                // Media query list
                self.value_token(parser, other, start, location)?;
                Ok(false)
            }
        }
    }

    /// Record URLs and descend into blocks for any token of a value.
    fn value_token<'i>(
        &mut self,
        parser: &mut Parser<'i, '_>,
        token: Token<'i>,
        start: usize,
        location: SourceLocation,
    ) -> Result<(), CssParseError> {
        match token {
            Token::UnquotedUrl(value) => {
                self.urls.push(UrlSpan {
                    start,
                    end: parser.position().byte_index(),
                    value: value.to_string(),
                });
            }
            Token::Function(name) if name.eq_ignore_ascii_case("url") => {
                if let Some(value) = self.url_function(parser, location)? {
                    self.urls.push(UrlSpan {
                        start,
                        end: parser.position().byte_index(),
                        value,
                    });
                }
            }
            Token::Function(_)
            | Token::ParenthesisBlock
            | Token::SquareBracketBlock
            | Token::CurlyBracketBlock => self.nested(parser, location)?,
            Token::BadUrl(_) | Token::BadString(_) => return Err(bad_token(&token, location)),
            _ => {}
        }
        Ok(())
    }

    /// Walk the block just opened, failing if input ends before it closes.
    fn nested<'i>(
        &mut self,
        parser: &mut Parser<'i, '_>,
        location: SourceLocation,
    ) -> Result<(), CssParseError> {
        let mut inner_end = 0;
        let mut inner_error = None;
        let _ = parser.parse_nested_block(|p| {
            loop {
                let start = p.position().byte_index();
                let location = p.current_source_location();
                let token = match p.next_including_whitespace_and_comments() {
                    Ok(token) => token.clone(),
                    Err(_) => break,
                };
                if let Err(e) = self.value_token(p, token, start, location) {
                    inner_error = Some(e);
                    break;
                }
            }
            inner_end = p.position().byte_index();
            Ok::<_, ParseError<'i, ()>>(())
        });

        if let Some(e) = inner_error {
            return Err(e);
        }
        // A closed block consumed its closing bracket past the inner end
        if parser.position().byte_index() == inner_end {
            return Err(CssParseError::UnclosedBlock {
                line: location.line + 1,
                column: location.column,
            });
        }
        Ok(())
    }

    /// Read the quoted string inside `url(`. Returns `None` when the
    /// function holds anything other than one string.
    fn url_function<'i>(
        &mut self,
        parser: &mut Parser<'i, '_>,
        location: SourceLocation,
    ) -> Result<Option<String>, CssParseError> {
        let mut value = None;
        let mut extra = false;
        let mut bad = false;
        let mut inner_end = 0;
        let _ = parser.parse_nested_block(|p| {
            while let Ok(token) = p.next_including_whitespace_and_comments() {
                match token {
                    Token::WhiteSpace(_) | Token::Comment(_) => {}
                    Token::QuotedString(s) if value.is_none() && !extra => {
                        value = Some(s.to_string());
                    }
                    Token::BadString(_) => {
                        bad = true;
                        break;
                    }
                    _ => extra = true,
                }
            }
            inner_end = p.position().byte_index();
            Ok::<_, ParseError<'i, ()>>(())
        });

        if bad {
            return Err(CssParseError::BadString {
                line: location.line + 1,
                column: location.column,
            });
        }
        if parser.position().byte_index() == inner_end {
            return Err(CssParseError::UnclosedBlock {
                line: location.line + 1,
                column: location.column,
            });
        }
        Ok(if extra { None } else { value })
    }
}

fn bad_token(token: &Token<'_>, location: SourceLocation) -> CssParseError {
    let (line, column) = (location.line + 1, location.column);
    match token {
        Token::BadString(_) => CssParseError::BadString { line, column },
        _ => CssParseError::BadUrl { line, column },
    }
}

/// Cut the input into statements, splitting rules around their URLs.
fn assemble(text: &str, spans: Vec<StatementSpan>, urls: Vec<UrlSpan>) -> Vec<CssStatement> {
    let mut urls = urls.into_iter().peekable();
    let mut statements = Vec::with_capacity(spans.len());

    for span in spans {
        match span {
            StatementSpan::Import {
                start,
                end,
                keyword_start,
                url,
                url_end,
            } => {
                // Media functions may hold nested url() tokens; they stay raw
                while urls.peek().is_some_and(|u| u.start < end) {
                    urls.next();
                }
                statements.push(CssStatement::Import(CssImport {
                    leading: text[start..keyword_start].to_string(),
                    url,
                    media: text[url_end..end]
                        .trim()
                        .trim_end_matches(';')
                        .trim()
                        .to_string(),
                    raw: Some(text[start..end].to_string()),
                }));
            }
            StatementSpan::Rule { start, end } => {
                let mut components = Vec::new();
                let mut cursor = start;
                while let Some(url) = urls.next_if(|u| u.start < end) {
                    if url.start > cursor {
                        components.push(CssComponent::Text(text[cursor..url.start].to_string()));
                    }
                    components.push(CssComponent::Url(CssUrl {
                        raw: Some(text[url.start..url.end].to_string()),
                        value: url.value,
                    }));
                    cursor = url.end;
                }
                if end > cursor {
                    components.push(CssComponent::Text(text[cursor..end].to_string()));
                }
                statements.push(CssStatement::Rule(CssRule { components }));
            }
        }
    }
    statements
}
