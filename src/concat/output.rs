//! Wire formats for batch responses.
//!
//! Verbatim mode frames each body in comment banners:
//!
//! ```text
//! /* ---- Start <url> ---- */
//! <body>
//! /* ---- End <url> ---- */
//! ```
//!
//! JSON mode emits `<token>={ "<url>":"<escaped body>", ... };` so a page
//! can load several scripts as strings in one request. Every line ends in
//! CRLF. A failed item is replaced by an error banner; a fatal failure
//! writes its banner and ends the batch.

use reqwest::StatusCode;
use std::fmt::Write;

use crate::fetch::FetchError;
use crate::uri::Uri;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    Verbatim,
    Json(String),
}

/// Why one batch item has no body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemError {
    pub status: StatusCode,
    pub message: Option<String>,
    /// Stop the batch after reporting this item.
    pub fatal: bool,
}

impl ItemError {
    /// Upstream answered with a non-success status. Server errors are fatal.
    #[must_use]
    pub fn upstream(status: StatusCode) -> Self {
        Self {
            status,
            message: None,
            fatal: status.is_server_error(),
        }
    }

    /// Failure inside the proxy itself; always fatal.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: Some(message.into()),
            fatal: true,
        }
    }

    fn banner(&self, url: &Uri) -> String {
        match &self.message {
            Some(message) => format!(
                "/* ---- Error {}, {message} ({url}) ---- */",
                self.status.as_u16()
            ),
            None => format!("/* ---- Error {} ({url}) ---- */", self.status.as_u16()),
        }
    }
}

impl From<&FetchError> for ItemError {
    /// Classified by the status the failure renders as, like an upstream
    /// response: timeouts and transport failures end the batch.
    fn from(error: &FetchError) -> Self {
        let status = error.status();
        Self {
            status,
            message: Some(error.to_string()),
            fatal: status.is_server_error(),
        }
    }
}

/// Incremental writer for one batch response.
#[derive(Debug)]
pub struct ConcatWriter {
    mode: OutputMode,
    out: String,
    stopped: bool,
}

impl ConcatWriter {
    #[must_use]
    pub fn new(mode: OutputMode) -> Self {
        let mut out = String::new();
        if let OutputMode::Json(token) = &mode {
            out.push_str(token);
            out.push_str("={\r\n");
        }
        Self {
            mode,
            out,
            stopped: false,
        }
    }

    /// Append one item. Returns false once the batch must stop.
    pub fn write_item(&mut self, url: &Uri, result: &Result<String, ItemError>) -> bool {
        if self.stopped {
            return false;
        }

        let json = matches!(self.mode, OutputMode::Json(_));
        match (json, result) {
            (false, Ok(body)) => {
                let _ = write!(
                    self.out,
                    "/* ---- Start {url} ---- */\r\n{body}\r\n/* ---- End {url} ---- */\r\n"
                );
            }
            (false, Err(error)) => {
                self.out.push_str(&error.banner(url));
                self.out.push_str("\r\n");
            }
            (true, Ok(body)) => self.json_entry(url, body),
            (true, Err(error)) => self.json_entry(url, &error.banner(url)),
        }

        if let Err(error) = result
            && error.fatal
        {
            log::warn!(
                "Stopping batch after {} from {url}",
                error.status.as_u16()
            );
            self.stopped = true;
        }
        !self.stopped
    }

    fn json_entry(&mut self, url: &Uri, value: &str) {
        let _ = write!(
            self.out,
            "\"{}\":\"{}\",\r\n",
            js_escape(url.as_str()),
            js_escape(value)
        );
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Close the JSON object, if any, and return the body.
    #[must_use]
    pub fn finish(mut self) -> String {
        if matches!(self.mode, OutputMode::Json(_)) {
            self.out.push_str("};\r\n");
        }
        self.out
    }
}

/// Escape text for inclusion in a JavaScript string literal.
///
/// Quotes, backslash and `/` are backslash-escaped; control characters and
/// everything outside ASCII become `\uXXXX` UTF-16 escapes.
#[must_use]
pub fn js_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + input.len() / 8);
    for c in input.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\'"),
            '/' => out.push_str("\\/"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if !c.is_ascii() || c.is_ascii_control() => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{unit:04X}");
                }
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        Uri::parse(s).expect("valid uri")
    }

    #[test]
    fn test_verbatim_frames_bodies() {
        let mut writer = ConcatWriter::new(OutputMode::Verbatim);
        assert!(writer.write_item(&uri("http://a/1.js"), &Ok("one()".to_string())));
        assert_eq!(
            writer.finish(),
            "/* ---- Start http://a/1.js ---- */\r\none()\r\n/* ---- End http://a/1.js ---- */\r\n"
        );
    }

    #[test]
    fn test_client_error_continues_server_error_stops() {
        let mut writer = ConcatWriter::new(OutputMode::Verbatim);
        assert!(writer.write_item(&uri("http://a/1.js"), &Err(ItemError::upstream(StatusCode::NOT_FOUND))));
        assert!(!writer.write_item(
            &uri("http://a/2.js"),
            &Err(ItemError::upstream(StatusCode::INTERNAL_SERVER_ERROR))
        ));
        assert!(!writer.write_item(&uri("http://a/3.js"), &Ok("three()".to_string())));
        assert_eq!(
            writer.finish(),
            "/* ---- Error 404 (http://a/1.js) ---- */\r\n/* ---- Error 500 (http://a/2.js) ---- */\r\n"
        );
    }

    #[test]
    fn test_json_mode_closes_object_after_stop() {
        let mut writer = ConcatWriter::new(OutputMode::Json("_js".to_string()));
        writer.write_item(&uri("http://a/1.js"), &Ok("var s = \"x\";\n".to_string()));
        writer.write_item(&uri("http://a/2.js"), &Err(ItemError::internal("boom")));
        assert_eq!(
            writer.finish(),
            "_js={\r\n\
             \"http:\\/\\/a\\/1.js\":\"var s = \\\"x\\\";\\n\",\r\n\
             \"http:\\/\\/a\\/2.js\":\"\\/* ---- Error 500, boom (http:\\/\\/a\\/2.js) ---- *\\/\",\r\n\
             };\r\n"
        );
    }

    #[test]
    fn test_js_escape() {
        assert_eq!(js_escape("it's </script>"), "it\\'s <\\/script>");
        assert_eq!(js_escape("\u{1}\u{e9}\u{1F600}"), "\\u0001\\u00E9\\uD83D\\uDE00");
        assert_eq!(js_escape("a\\b\tc\r\n"), "a\\\\b\\tc\\r\\n");
    }

    #[test]
    fn test_fetch_failures_follow_their_status() {
        let timeout = ItemError::from(&FetchError::Timeout {
            url: "http://a/1.js".to_string(),
            secs: 5,
        });
        assert_eq!(timeout.status, StatusCode::GATEWAY_TIMEOUT);
        assert!(timeout.fatal);

        let transport = ItemError::from(&FetchError::Transport {
            url: "http://a/1.js".to_string(),
            message: "reset".to_string(),
        });
        assert!(transport.fatal);

        let invalid = ItemError::from(&FetchError::InvalidUrl {
            url: "ftp://a/1.js".to_string(),
            message: "not http".to_string(),
        });
        assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
        assert!(!invalid.fatal);
    }
}
