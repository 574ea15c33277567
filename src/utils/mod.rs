pub mod constants;
pub mod url_utils;

pub use constants::*;
pub use url_utils::{is_css_content_type, is_html_content_type, is_proxyable_link, mime_type};
