//! Relative reference resolution (RFC 3986 section 5.2).

use super::{QueryParams, Uri, UriParts};

pub(super) fn resolve(base: &Uri, relative: &Uri) -> Uri {
    let base_parts = &base.parts;
    let rel = &relative.parts;

    let scheme: Option<String>;
    let authority: Option<String>;
    let path: String;
    let query: QueryParams;

    if rel.scheme.is_some() {
        scheme = rel.scheme.clone();
        authority = rel.authority.clone();
        path = remove_dot_segments(&rel.path);
        query = rel.query.clone();
    } else {
        if rel.authority.is_some() {
            authority = rel.authority.clone();
            path = remove_dot_segments(&rel.path);
            query = rel.query.clone();
        } else {
            if rel.path.is_empty() {
                path = base_parts.path.clone();
                query = if rel.query.is_empty() {
                    base_parts.query.clone()
                } else {
                    rel.query.clone()
                };
            } else {
                path = if rel.path.starts_with('/') {
                    remove_dot_segments(&rel.path)
                } else {
                    remove_dot_segments(&merge(base_parts, &rel.path))
                };
                query = rel.query.clone();
            }
            authority = base_parts.authority.clone();
        }
        scheme = base_parts.scheme.clone();
    }

    Uri::from_parts(UriParts {
        scheme,
        authority,
        path,
        query,
        fragment: rel.fragment.clone(),
    })
}

fn merge(base: &UriParts, relative_path: &str) -> String {
    if base.authority.is_some() && base.path.is_empty() {
        return format!("/{relative_path}");
    }
    match base.path.rfind('/') {
        Some(index) => format!("{}{relative_path}", &base.path[..=index]),
        None => relative_path.to_string(),
    }
}

fn remove_dot_segments(path: &str) -> String {
    let mut input = path;
    let mut output = String::with_capacity(path.len());

    while !input.is_empty() {
        if let Some(rest) = input.strip_prefix("../") {
            input = rest;
        } else if let Some(rest) = input.strip_prefix("./") {
            input = rest;
        } else if input.starts_with("/./") {
            input = &input[2..];
        } else if input == "/." {
            input = "/";
        } else if input.starts_with("/../") || input == "/.." {
            input = if input == "/.." { "/" } else { &input[3..] };
            truncate_last_segment(&mut output);
        } else if input == "." || input == ".." {
            input = "";
        } else {
            let start = usize::from(input.starts_with('/'));
            let end = input[start..].find('/').map_or(input.len(), |i| i + start);
            output.push_str(&input[..end]);
            input = &input[end..];
        }
    }
    output
}

fn truncate_last_segment(output: &mut String) {
    match output.rfind('/') {
        Some(index) => output.truncate(index),
        None => output.clear(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(reference: &str, expected: &str) {
        let base = Uri::parse("http://a/b/c/d;p?q").unwrap();
        let resolved = base.resolve_str(reference).unwrap();
        assert_eq!(resolved.as_str(), expected, "resolving {reference}");
    }

    // Examples from RFC 3986 section 5.4. Queries are re-encoded by the
    // multimap, so `?y` renders as `?y=`.
    #[test]
    fn test_rfc_normal_examples() {
        check("g", "http://a/b/c/g");
        check("./g", "http://a/b/c/g");
        check("g/", "http://a/b/c/g/");
        check("/g", "http://a/g");
        check("//g", "http://g");
        check("?y", "http://a/b/c/d;p?y=");
        check("g#s", "http://a/b/c/g#s");
        check("", "http://a/b/c/d;p?q=");
        check(".", "http://a/b/c/");
        check("..", "http://a/b/");
        check("../g", "http://a/b/g");
        check("../..", "http://a/");
        check("../../g", "http://a/g");
    }

    #[test]
    fn test_rfc_abnormal_examples() {
        check("../../../g", "http://a/g");
        check("/./g", "http://a/g");
        check("/../g", "http://a/g");
        check("g.", "http://a/b/c/g.");
        check("./../g", "http://a/b/g");
        check("g/./h", "http://a/b/c/g/h");
        check("g/../h", "http://a/b/c/h");
    }

    #[test]
    fn test_absolute_reference_wins() {
        check("https://cdn.example.com/x.js", "https://cdn.example.com/x.js");
    }

    #[test]
    fn test_remove_dot_segments() {
        assert_eq!(remove_dot_segments("/a/b/c/./../../g"), "/a/g");
        assert_eq!(remove_dot_segments("mid/content=5/../6"), "mid/6");
    }
}
