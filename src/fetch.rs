//! HTTP fetching of regulation content.
//!
//! [`Fetcher`] decides the best strategy for a given URL: recognised
//! regulation pages are pulled through the structured API (the same payload
//! the remote SPA consumes), everything else falls back to a raw HTML fetch
//! followed by body extraction. One request per sync, no retries -- a
//! transient failure is final for that call.

use std::sync::LazyLock;
use std::time::Duration;

use scraper::{Html, Selector};
use serde::Deserialize;

use crate::error::{Result, SyncError};
use crate::normalize::{BodyExtractor, absolutize, origin};
use crate::resolver;
use crate::sanitizer::{escape_text, sanitize_rich};

pub(crate) const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(20);
pub(crate) const DEFAULT_LISTING_TIMEOUT: Duration = Duration::from_secs(15);

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

/// A regulation link discovered on the public listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegulationLink {
    /// Absolute URL of the detail page.
    pub href: String,
    /// Anchor text, or the href when the anchor has no text.
    pub text: String,
}

/// Payload served by the regulation API for one regulation.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegulationDoc {
    #[serde(default)]
    full_text: String,
    #[serde(default)]
    title_full: String,
    #[serde(default)]
    modified_type: String,
    #[serde(default)]
    modified_date: String,
    #[serde(default)]
    history: Vec<String>,
}

/// Fetches and assembles regulation fragments over HTTP.
pub struct Fetcher {
    client: reqwest::Client,
    fetch_timeout: Duration,
    listing_timeout: Duration,
    listing_url: String,
    extractor: Option<BodyExtractor>,
}

impl Fetcher {
    pub(crate) fn new(
        fetch_timeout: Duration,
        listing_timeout: Duration,
        listing_url: String,
        extractor: Option<BodyExtractor>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            fetch_timeout,
            listing_timeout,
            listing_url,
            extractor,
        }
    }

    /// Fetch an HTML fragment from an admin-supplied URL.
    ///
    /// URLs recognised by [`resolver::resolve_api_url`] go through the
    /// regulation API; all others are fetched as raw HTML and normalized.
    pub async fn fetch_fragment(&self, url: &str) -> Result<String> {
        match resolver::resolve_api_url(url) {
            Some(endpoint) => {
                tracing::debug!("Resolved {url} to API endpoint {endpoint}");
                self.fetch_regulation_api(&endpoint).await
            }
            None => self.fetch_page(url).await,
        }
    }

    /// Fetch a regulation through its structured API endpoint and assemble
    /// the display fragment.
    pub async fn fetch_regulation_api(&self, endpoint: &str) -> Result<String> {
        let body = self.get_body(endpoint, self.fetch_timeout).await?;

        let doc: RegulationDoc = serde_json::from_str(&body).map_err(|e| SyncError::Decode {
            url: endpoint.to_string(),
            source: e,
        })?;

        if doc.full_text.is_empty() {
            return Err(SyncError::MissingContent {
                url: endpoint.to_string(),
            });
        }

        Ok(assemble_fragment(doc))
    }

    /// Fetch an arbitrary page and reduce it to an embeddable fragment.
    ///
    /// Without the HTML capability the raw body is returned unchanged.
    pub async fn fetch_page(&self, url: &str) -> Result<String> {
        let body = self.get_body(url, self.fetch_timeout).await?;

        match &self.extractor {
            Some(extractor) => Ok(extractor.extract(&body, url)),
            None => Ok(body),
        }
    }

    /// Discover regulation links on the public listing page.
    ///
    /// Best-effort: any failure degrades to an empty list so the admin form
    /// can still offer the by-ID and custom-URL choices.
    pub async fn regulation_links(&self) -> Vec<RegulationLink> {
        if self.extractor.is_none() {
            return Vec::new();
        }

        let body = match self.get_body(&self.listing_url, self.listing_timeout).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Failed to load regulation listing: {e}");
                return Vec::new();
            }
        };

        let base = origin(&self.listing_url).unwrap_or_else(|| resolver::REGULATION_BASE_URL.to_string());
        let document = Html::parse_document(&body);

        let mut links = Vec::new();
        for element in document.select(&ANCHOR_SELECTOR) {
            let Some(href) = element.attr("href") else {
                continue;
            };
            if !resolver::is_detail_path(href) {
                continue;
            }

            let text = element.text().collect::<String>().trim().to_string();
            links.push(RegulationLink {
                href: absolutize(href, &base),
                text: if text.is_empty() { href.to_string() } else { text },
            });
        }

        links
    }

    /// Issue a single GET and apply the shared failure taxonomy.
    async fn get_body(&self, url: &str, timeout: Duration) -> Result<String> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| SyncError::Network {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(SyncError::UpstreamStatus {
                status,
                url: url.to_string(),
            });
        }

        let body = response.text().await.map_err(|e| SyncError::Network {
            url: url.to_string(),
            source: e,
        })?;

        if body.is_empty() {
            return Err(SyncError::EmptyResponse {
                url: url.to_string(),
            });
        }

        Ok(body)
    }
}

/// Assemble the display fragment from an API payload.
///
/// Order is fixed: optional escaped heading, optional escaped meta line,
/// the `fullText` HTML verbatim (trusted as pre-sanitized; render-time
/// sanitization still applies), then the history section with each entry
/// individually sanitized.
fn assemble_fragment(doc: RegulationDoc) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !doc.title_full.is_empty() {
        parts.push(format!(
            r#"<h2 class="regulation-title">{}</h2>"#,
            escape_text(doc.title_full.trim())
        ));
    }

    let meta_bits: Vec<&str> = [doc.modified_type.trim(), doc.modified_date.trim()]
        .into_iter()
        .filter(|bit| !bit.is_empty())
        .collect();
    if !meta_bits.is_empty() {
        parts.push(format!(
            r#"<p class="regulation-meta">{}</p>"#,
            escape_text(&meta_bits.join(" · "))
        ));
    }

    parts.push(doc.full_text);

    if !doc.history.is_empty() {
        let items: String = doc
            .history
            .iter()
            .map(|entry| format!("<li>{}</li>", sanitize_rich(entry)))
            .collect();
        parts.push(format!(
            r#"<div class="regulation-history"><h2>沿革</h2><ul>{items}</ul></div>"#
        ));
    }

    parts.concat()
}
