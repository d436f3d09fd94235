//! Normalization of fetched HTML: asset URL rewriting and body extraction.
//!
//! Pages fetched from an arbitrary host reference stylesheets, scripts, and
//! images by relative paths that would 404 once the markup is republished
//! elsewhere. [`BodyExtractor`] rewrites every `href`/`src` attribute to an
//! absolute URL against the source origin and returns only the contents of
//! the `<body>` element.

use std::sync::LazyLock;

use scraper::{Html, Selector, node::Node};
use url::Url;

use crate::sanitizer::{VOID_ELEMENTS, escape_attr, escape_text, in_raw_text};

static BODY_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("valid selector"));

/// Returns the origin (scheme + host + optional port) of a URL, used as the
/// base for resolving relative asset paths.
///
/// Returns `None` when the URL has no scheme or host.
pub fn origin(source_url: &str) -> Option<String> {
    let parsed = Url::parse(source_url).ok()?;
    let host = parsed.host_str()?;
    let mut base = format!("{}://{}", parsed.scheme(), host);
    if let Some(port) = parsed.port() {
        base.push(':');
        base.push_str(&port.to_string());
    }
    Some(base)
}

/// Rewrites a possibly-relative URL to an absolute one against `origin`.
///
/// Values that are already absolute, scheme-relative, pure fragments, or
/// non-HTTP schemes (`data:`, `mailto:`) pass through unchanged, which
/// makes the rewrite idempotent.
pub fn absolutize(value: &str, origin: &str) -> String {
    let value = value.trim();

    if value.is_empty() || value.starts_with("data:") || value.starts_with("mailto:") {
        return value.to_string();
    }

    if value.starts_with("//")
        || value.starts_with('#')
        || has_http_scheme(value)
    {
        return value.to_string();
    }

    let base = origin.trim_end_matches('/');
    if value.starts_with('/') {
        return format!("{base}{value}");
    }

    format!("{}/{}", base, value.trim_start_matches('/'))
}

fn has_http_scheme(value: &str) -> bool {
    let lower_prefix = value
        .get(..8)
        .unwrap_or(value)
        .to_ascii_lowercase();
    lower_prefix.starts_with("http://") || lower_prefix.starts_with("https://")
}

/// The host environment's HTML-parsing capability.
///
/// Built into the pipeline by default; when the pipeline is constructed
/// without one (see
/// [`SyncBuilder::without_body_extraction`](crate::SyncBuilder::without_body_extraction)),
/// fetched HTML is stored raw -- a documented degraded mode, not an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct BodyExtractor;

impl BodyExtractor {
    /// Rewrite asset URLs and extract the `<body>` contents of `html`
    /// fetched from `source_url`.
    ///
    /// Fails open at every step: input without a `<body` marker is treated
    /// as an existing fragment and returned unchanged, malformed markup is
    /// recovered by the tolerant parser, and a parse result without a
    /// `<body>` element falls back to the original string.
    pub fn extract(&self, html: &str, source_url: &str) -> String {
        if !html.to_ascii_lowercase().contains("<body") {
            return html.to_string();
        }

        let document = Html::parse_document(html);
        let base = origin(source_url);

        let Some(body) = document.select(&BODY_SELECTOR).next() else {
            return html.to_string();
        };

        let mut out = String::with_capacity(html.len());
        for child in body.children() {
            serialize_node(child, base.as_deref(), &mut out);
        }
        out
    }
}

/// Serialize a node, rewriting `href`/`src` attributes against `base`.
fn serialize_node(node: ego_tree::NodeRef<Node>, base: Option<&str>, out: &mut String) {
    match node.value() {
        Node::Document | Node::Fragment => {
            for child in node.children() {
                serialize_node(child, base, out);
            }
        }
        Node::Element(el) => {
            let tag = el.name();
            out.push('<');
            out.push_str(tag);

            for (k, v) in el.attrs() {
                let value = match (k, base) {
                    ("href" | "src", Some(base)) => absolutize(v, base),
                    _ => v.to_string(),
                };
                out.push(' ');
                out.push_str(k);
                out.push_str("=\"");
                out.push_str(&escape_attr(&value));
                out.push('"');
            }
            out.push('>');

            if VOID_ELEMENTS.contains(&tag) {
                return;
            }

            for child in node.children() {
                serialize_node(child, base, out);
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
        Node::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(comment.as_ref());
            out.push_str("-->");
        }
        _ => {}
    }
}
