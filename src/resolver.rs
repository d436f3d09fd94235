//! Resolution of admin-supplied URLs to the regulation system's API.
//!
//! The remote regulation site is a JS-rendered SPA; scraping its detail
//! pages yields an empty shell. When a URL targets a known detail or embed
//! page we instead pull the same structured payload the SPA consumes.
//! Everything here is pure string/URL work with no I/O.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Host of the remote regulation system.
pub const REGULATION_HOST: &str = "regsys.ntpusu.org";

/// Canonical base URL used when re-targeting recognised paths.
pub const REGULATION_BASE_URL: &str = "https://regsys.ntpusu.org";

/// Public listing page enumerating all regulations.
pub const REGULATION_LIST_URL: &str = "https://regsys.ntpusu.org/regulation/";

static API_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/api/regulation/(\d+)/?").expect("valid regex"));

static DETAIL_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/regulation/(\d+)(?:/embed)?/?$").expect("valid regex"));

/// Translates a URL into the canonical regulation API endpoint.
///
/// Returns `Some(endpoint)` when the URL's host contains
/// [`REGULATION_HOST`] (case-insensitively) and its path is either an API
/// path or a detail/embed page. Returns `None` for every other URL --
/// callers fall back to a generic HTML fetch, so "not applicable" is not
/// an error.
///
/// # Example
///
/// ```
/// use regulation_sync::resolver::resolve_api_url;
///
/// assert_eq!(
///     resolve_api_url("https://regsys.ntpusu.org/regulation/42/embed").as_deref(),
///     Some("https://regsys.ntpusu.org/api/regulation/42"),
/// );
/// assert_eq!(resolve_api_url("https://example.com/regulation/42"), None);
/// ```
pub fn resolve_api_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    if !host.contains(REGULATION_HOST) {
        return None;
    }

    let path = parsed.path();
    let captures = API_PATH.captures(path).or_else(|| DETAIL_PATH.captures(path))?;
    Some(format!("{}/api/regulation/{}", REGULATION_BASE_URL, &captures[1]))
}

/// Whether a path (as found in a listing anchor) points at a regulation
/// detail or embed page.
pub(crate) fn is_detail_path(path: &str) -> bool {
    DETAIL_PATH.is_match(path)
}

/// Builds the detail/embed page URL for a regulation ID.
///
/// Used by the "enter a regulation ID" source choice; the resulting URL is
/// itself resolvable by [`resolve_api_url`].
pub fn embed_url(id: u64) -> String {
    format!("{REGULATION_BASE_URL}/regulation/{id}/embed")
}
