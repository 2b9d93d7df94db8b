// src/utils/mod.rs

//! Utility functions and helpers.

use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Resolve a URL string against a base URL string.
pub fn resolve(base_url: &str, href: &str) -> Option<String> {
    Url::parse(base_url)
        .ok()
        .map(|base| resolve_url(&base, href))
}

/// Collapse accidental doubled slashes in a URL path while preserving the
/// scheme separator. Some feed platforms emit links like
/// `https://host//event/1`.
pub fn fix_double_slash(url: &str) -> String {
    match url.split_once("://") {
        Some((scheme, rest)) => {
            let mut path = rest.to_string();
            while path.contains("//") {
                path = path.replace("//", "/");
            }
            format!("{scheme}://{path}")
        }
        None => {
            let mut path = url.to_string();
            while path.contains("//") {
                path = path.replace("//", "/");
            }
            path
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://example.com/path/").unwrap();
        assert_eq!(
            resolve_url(&base, "page.html"),
            "https://example.com/path/page.html"
        );
        assert_eq!(
            resolve_url(&base, "/root.html"),
            "https://example.com/root.html"
        );
        assert_eq!(
            resolve_url(&base, "https://other.com/x"),
            "https://other.com/x"
        );
    }

    #[test]
    fn test_fix_double_slash() {
        assert_eq!(
            fix_double_slash("https://host.org//event//1"),
            "https://host.org/event/1"
        );
        assert_eq!(
            fix_double_slash("https://host.org/event/1"),
            "https://host.org/event/1"
        );
        assert_eq!(fix_double_slash("host.org//event"), "host.org/event");
    }
}
