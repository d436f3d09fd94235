//! Error types for the `regulation_sync` crate.

/// All errors that can occur while fetching, transforming, or persisting
/// regulation content.
///
/// Fetch and transform failures are always returned as values to the
/// caller; scheduled runs log them and continue.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The HTTP request could not be completed (DNS, connect, timeout, ...).
    #[error("Request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The remote server answered with an error status.
    #[error("The remote server returned HTTP {status} for {url}")]
    UpstreamStatus { status: u16, url: String },

    /// The remote server answered without any content.
    #[error("{url} responded without any content")]
    EmptyResponse { url: String },

    /// The regulation API response was not valid JSON.
    #[error("Unable to decode the regulation API response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// The regulation API payload carried no `fullText` HTML.
    #[error("The regulation API at {url} did not include any HTML content")]
    MissingContent { url: String },

    /// The caller lacks the capability required for this operation.
    #[error("Permission denied: {0}")]
    Permission(&'static str),

    /// A required input was missing or malformed.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The target content item does not exist in the host system.
    #[error("Content item {0} does not exist")]
    UnknownItem(u64),

    /// The state store failed to read or persist data.
    #[error("Store error: {0}")]
    Store(Box<dyn std::error::Error + Send + Sync>),
}

/// A type alias for `Result<T, SyncError>`.
pub type Result<T> = std::result::Result<T, SyncError>;
