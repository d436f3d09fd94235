//! HTML sanitization for rendering stored fragments.
//!
//! Synced fragments are persisted as-is and only sanitized at render time.
//! Sanitizers implement the [`Sanitizer`] trait; the built-in
//! [`AllowlistSanitizer`] strips everything outside a tag/attribute
//! allow-list while keeping permitted nested content.

mod allowlist;

pub use allowlist::AllowlistSanitizer;

use std::sync::LazyLock;

/// Trait for HTML content sanitizers.
///
/// Each sanitizer receives an HTML string and returns a transformed version.
/// Implementations must be `Send + Sync` so they can be shared with the
/// background refresh task.
pub trait Sanitizer: Send + Sync {
    /// Transform the given HTML content, returning the sanitized result.
    fn sanitize(&self, html: &str) -> String;
}

static DEFAULT_ALLOWLIST: LazyLock<AllowlistSanitizer> =
    LazyLock::new(AllowlistSanitizer::default);

/// Sanitize HTML with the default rich-text allow-list.
///
/// Convenience wrapper around a shared [`AllowlistSanitizer`]; used both
/// for rendering stored fragments and for cleaning individual history
/// entries during fragment assembly.
pub fn sanitize_rich(html: &str) -> String {
    DEFAULT_ALLOWLIST.sanitize(html)
}

/// HTML5 void elements that must not have a closing tag.
pub(crate) const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose contents the parser captures as a single raw text node.
/// Browsers do not entity-decode inside them, so serialization must emit
/// the text verbatim or the payload (inline JSON, CSS) breaks.
pub(crate) const RAW_TEXT_ELEMENTS: &[&str] = &[
    "iframe", "noembed", "noframes", "noscript", "script", "style", "xmp",
];

/// Whether a text node sits directly inside a raw-text element.
pub(crate) fn in_raw_text(node: ego_tree::NodeRef<'_, scraper::node::Node>) -> bool {
    node.parent()
        .and_then(|parent| parent.value().as_element())
        .is_some_and(|el| RAW_TEXT_ELEMENTS.contains(&el.name()))
}

/// Escape a string for use as HTML text content.
pub(crate) fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape a string for use inside a double-quoted attribute value.
pub(crate) fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_text_covers_markup_characters() {
        assert_eq!(
            escape_text(r#"<a href="x">&</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;"
        );
    }

    #[test]
    fn escape_attr_keeps_plain_values() {
        assert_eq!(escape_attr("https://h.test/x?a=1"), "https://h.test/x?a=1");
    }

    #[test]
    fn sanitize_rich_keeps_paragraphs() {
        assert_eq!(sanitize_rich("<p>hello</p>"), "<p>hello</p>");
    }
}
