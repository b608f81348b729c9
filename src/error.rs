use ::scraper::error::SelectorErrorKind;

/// All errors that can occur while fetching, parsing or caching series data.
///
/// Most of these never reach a caller of [`crate::SeriesClient`]: discovery
/// and results loading degrade to stale or empty data instead. They surface
/// from the lower-level building blocks ([`crate::Fetch`], the parsers, the
/// cache stores) so those can be tested and composed directly.
#[derive(thiserror::Error, Debug)]
pub enum SeriesError {
    /// HTTP request failed (network, DNS, TLS, timeout, etc.).
    #[error("http request failed for {url}: {source}")]
    Http {
        url: String,
        source: reqwest::Error,
    },

    /// Server returned a non-success HTTP status code.
    #[error("unexpected status {status} for {url}")]
    UnexpectedStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    /// Upstream answered 429 and no stale copy was available.
    #[error("rate limited by upstream for {url}")]
    RateLimited { url: String },

    /// Failed to read the response body as text.
    #[error("failed to read response body from {url}: {source}")]
    ResponseBody {
        url: String,
        source: reqwest::Error,
    },

    /// The target URL could not be parsed or lacks a host/path.
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Only https targets are fetched.
    #[error("only https urls are allowed, got {scheme}")]
    InsecureScheme { scheme: String },

    /// The target host is not on the allow-list.
    #[error("host not allowed: {host}")]
    HostNotAllowed { host: String },

    /// Upstream body exceeded the configured size limit.
    #[error("response from {url} too large: {bytes} bytes (limit {limit})")]
    ResponseTooLarge {
        url: String,
        bytes: usize,
        limit: usize,
    },

    /// A CSS selector string could not be parsed.
    #[error("invalid CSS selector: {0}")]
    Selector(String),

    /// Cache envelope or configuration (de)serialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The series configuration is unusable.
    #[error("invalid series configuration: {0}")]
    Config(String),

    /// A cache store refused a write because it is full.
    #[error("cache quota exceeded: {needed} bytes needed, limit {limit}")]
    Quota { needed: usize, limit: usize },

    /// Disk cache I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl<'a> From<SelectorErrorKind<'a>> for SeriesError {
    fn from(err: SelectorErrorKind<'a>) -> Self {
        SeriesError::Selector(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SeriesError>;

/// Error type returned by injected naming/scoring callables.
pub type StrategyError = Box<dyn std::error::Error + Send + Sync>;
