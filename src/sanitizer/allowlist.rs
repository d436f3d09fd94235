//! Allow-list HTML sanitizer used when rendering stored fragments.

use std::collections::{HashMap, HashSet};

use scraper::{Html, node::Node};

use super::{Sanitizer, VOID_ELEMENTS, escape_attr, escape_text, in_raw_text};

/// Standard rich-text tags and the attributes they may carry.
const RICH_TEXT_TAGS: &[(&str, &[&str])] = &[
    ("a", &["href", "title", "target", "rel"]),
    ("abbr", &["title"]),
    ("b", &[]),
    ("blockquote", &["cite", "class"]),
    ("br", &[]),
    ("caption", &[]),
    ("cite", &[]),
    ("code", &["class"]),
    ("del", &["datetime"]),
    ("em", &[]),
    ("figcaption", &["class"]),
    ("figure", &["class"]),
    ("h1", &["class"]),
    ("h2", &["class"]),
    ("h3", &["class"]),
    ("h4", &["class"]),
    ("h5", &["class"]),
    ("h6", &["class"]),
    ("hr", &[]),
    ("i", &[]),
    ("img", &["src", "alt", "title", "width", "height", "class"]),
    ("ins", &["datetime"]),
    ("pre", &["class"]),
    ("q", &["cite"]),
    ("s", &[]),
    ("small", &[]),
    ("strong", &[]),
    ("u", &[]),
];

/// Structural containers allowed to carry only a `class` attribute.
const STRUCTURAL_TAGS: &[&str] = &[
    "div", "span", "p", "section", "article", "header", "footer", "ol", "ul", "li", "dl", "dt",
    "dd", "table", "thead", "tbody", "tfoot", "tr", "td", "th", "sup", "sub",
];

/// Asset tags needed so the remote system's embed bundle still loads after
/// sanitization. Attributes are enumerated, never wildcarded.
const ASSET_TAGS: &[(&str, &[&str])] = &[
    (
        "script",
        &["type", "src", "async", "defer", "crossorigin", "referrerpolicy", "data-nuxt-data"],
    ),
    ("link", &["rel", "href", "crossorigin", "type", "as", "sizes"]),
    ("style", &["type"]),
    ("noscript", &[]),
];

/// Sanitizer that keeps only allow-listed tags and attributes.
///
/// Disallowed elements are stripped while their permitted children and text
/// are preserved; disallowed attributes are dropped silently; comments are
/// removed. This mirrors "strip, not escape-and-show" semantics: an
/// `<iframe>payload</iframe>` becomes `payload`.
///
/// # Example
///
/// ```
/// use regulation_sync::{AllowlistSanitizer, Sanitizer};
///
/// let sanitizer = AllowlistSanitizer::default();
/// let html = r#"<iframe src="https://evil.test"><p>kept</p></iframe>"#;
/// assert_eq!(sanitizer.sanitize(html), "<p>kept</p>");
/// ```
pub struct AllowlistSanitizer {
    allowed: HashMap<String, HashSet<String>>,
}

impl AllowlistSanitizer {
    /// Create a sanitizer from explicit `(tag, attributes)` rules.
    pub fn new(rules: Vec<(&str, Vec<&str>)>) -> Self {
        let allowed = rules
            .into_iter()
            .map(|(tag, attrs)| {
                (
                    tag.to_ascii_lowercase(),
                    attrs.into_iter().map(str::to_ascii_lowercase).collect(),
                )
            })
            .collect();
        Self { allowed }
    }

    fn attrs_for(&self, tag: &str) -> Option<&HashSet<String>> {
        self.allowed.get(tag)
    }
}

impl Default for AllowlistSanitizer {
    /// The rich-text allow-list extended with structural containers and the
    /// embed bundle's asset tags.
    fn default() -> Self {
        let mut allowed: HashMap<String, HashSet<String>> = HashMap::new();

        for (tag, attrs) in RICH_TEXT_TAGS.iter().chain(ASSET_TAGS) {
            allowed.insert(
                (*tag).to_string(),
                attrs.iter().map(|a| (*a).to_string()).collect(),
            );
        }

        for tag in STRUCTURAL_TAGS {
            allowed
                .entry((*tag).to_string())
                .or_default()
                .insert("class".to_string());
        }

        Self { allowed }
    }
}

impl Sanitizer for AllowlistSanitizer {
    fn sanitize(&self, html: &str) -> String {
        let document = Html::parse_fragment(html);
        let mut out = String::with_capacity(html.len());
        serialize_node(self, document.tree.root(), &mut out);
        out
    }
}

fn serialize_node(sanitizer: &AllowlistSanitizer, node: ego_tree::NodeRef<Node>, out: &mut String) {
    match node.value() {
        Node::Document | Node::Fragment => {
            for child in node.children() {
                serialize_node(sanitizer, child, out);
            }
        }
        Node::Element(el) => {
            let tag = el.name();
            let Some(allowed_attrs) = sanitizer.attrs_for(tag) else {
                // Strip the element itself, keep whatever survives inside.
                for child in node.children() {
                    serialize_node(sanitizer, child, out);
                }
                return;
            };

            out.push('<');
            out.push_str(tag);
            for (k, v) in el.attrs() {
                if !allowed_attrs.contains(k) {
                    continue;
                }
                out.push(' ');
                out.push_str(k);
                out.push_str("=\"");
                out.push_str(&escape_attr(v));
                out.push('"');
            }
            out.push('>');

            if VOID_ELEMENTS.contains(&tag) {
                return;
            }

            for child in node.children() {
                serialize_node(sanitizer, child, out);
            }

            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        Node::Text(text) => {
            if in_raw_text(node) {
                out.push_str(text);
            } else {
                out.push_str(&escape_text(text));
            }
        }
        // Comments and processing instructions are dropped.
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitize(html: &str) -> String {
        AllowlistSanitizer::default().sanitize(html)
    }

    #[test]
    fn keeps_rich_text_markup() {
        let html = r#"<h2 class="regulation-title">Title</h2><p>Body <strong>text</strong></p>"#;
        assert_eq!(sanitize(html), html);
    }

    #[test]
    fn strips_iframe_but_keeps_nested_content() {
        let html = r#"<iframe src="https://evil.test"><p>kept</p>text</iframe>"#;
        assert_eq!(sanitize(html), "<p>kept</p>text");
    }

    #[test]
    fn drops_disallowed_attributes() {
        let result = sanitize(r#"<p onclick="steal()" class="meta">x</p>"#);
        assert!(!result.contains("onclick"));
        assert!(result.contains(r#"class="meta""#));
        assert!(result.contains(">x</p>"));
    }

    #[test]
    fn anchor_keeps_target_and_rel() {
        let html = r#"<a href="https://h.test/x" target="_blank" rel="noopener">l</a>"#;
        let result = sanitize(html);
        assert!(result.contains(r#"href="https://h.test/x""#));
        assert!(result.contains(r#"target="_blank""#));
        assert!(result.contains(r#"rel="noopener""#));
    }

    #[test]
    fn structural_tags_keep_only_class() {
        let result = sanitize(r#"<div class="box" id="x" style="color:red">y</div>"#);
        assert_eq!(result, r#"<div class="box">y</div>"#);
    }

    #[test]
    fn script_tag_survives_with_enumerated_attributes() {
        let html = r#"<script type="module" src="https://regsys.ntpusu.org/app.js" defer="" nonce="abc"></script>"#;
        let result = sanitize(html);
        assert!(result.contains("<script"));
        assert!(result.contains(r#"src="https://regsys.ntpusu.org/app.js""#));
        assert!(result.contains(r#"type="module""#));
        assert!(!result.contains("nonce"));
    }

    #[test]
    fn link_tag_survives_with_enumerated_attributes() {
        let html = r#"<link rel="preload" href="/font.woff2" as="font" media="all">"#;
        let result = sanitize(html);
        assert!(result.contains("<link"));
        assert!(result.contains(r#"rel="preload""#));
        assert!(!result.contains("media"));
    }

    #[test]
    fn inline_json_script_payload_is_verbatim() {
        let html = r#"<script type="application/json" data-nuxt-data="app">{"id":42,"title":"x"}</script>"#;
        let result = sanitize(html);
        assert!(result.contains("<script"));
        assert!(result.contains(r#">{"id":42,"title":"x"}</script>"#));
        assert!(!result.contains("&quot;"));
    }

    #[test]
    fn style_contents_are_not_entity_escaped() {
        let result = sanitize("<style>a > b { color: red; }</style>");
        assert_eq!(result, "<style>a > b { color: red; }</style>");
    }

    #[test]
    fn comments_are_removed() {
        assert_eq!(sanitize("<p>a</p><!-- secret --><p>b</p>"), "<p>a</p><p>b</p>");
    }

    #[test]
    fn text_is_escaped() {
        let result = sanitize("<p>1 &lt; 2 &amp; 3</p>");
        assert_eq!(result, "<p>1 &lt; 2 &amp; 3</p>");
    }

    #[test]
    fn custom_rules_override_default() {
        let sanitizer = AllowlistSanitizer::new(vec![("p", vec![])]);
        assert_eq!(
            sanitizer.sanitize(r#"<div><p class="x">a</p></div>"#),
            "<p>a</p>"
        );
    }

    #[test]
    fn table_markup_is_preserved() {
        let html = "<table><thead><tr><th>h</th></tr></thead><tbody><tr><td>d</td></tr></tbody></table>";
        assert_eq!(sanitize(html), html);
    }
}
