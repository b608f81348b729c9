use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use crate::error::{Result, SeriesError};

pub const ALLOWED_HOSTS: [&str; 2] = ["www.pdga.com", "pdga.com"];
pub const MAX_RESPONSE_BYTES: usize = 2_000_000;
const USER_AGENT: &str = "dgseries/0.1 (+https://github.com/dgseries/dgseries)";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Something that turns an upstream page URL into its HTML.
///
/// Implementations are expected to cache and to keep serving when upstream
/// misbehaves; callers still treat every error as recoverable. The returned
/// future is `Send` so client calls can run on a multi-threaded runtime.
pub trait Fetch {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String>> + Send;
}

impl<F: Fetch + ?Sized> Fetch for &F {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String>> + Send {
        (**self).fetch(url)
    }
}

/// Issue a GET and return the status with the body text.
///
/// The body is read in chunks and abandoned as soon as it would exceed
/// `limit` bytes; a declared `Content-Length` over the limit fails before
/// any of the body is read.
async fn get_text(
    client: &reqwest::Client,
    url: &str,
    limit: usize,
) -> Result<(StatusCode, String)> {
    debug!(url, "fetching page");

    let mut response = client.get(url).send().await.map_err(|e| SeriesError::Http {
        url: url.to_owned(),
        source: e,
    })?;

    let status = response.status();
    let too_large = |bytes: usize| SeriesError::ResponseTooLarge {
        url: url.to_owned(),
        bytes,
        limit,
    };

    if let Some(declared) = response.content_length() {
        let declared = usize::try_from(declared).unwrap_or(usize::MAX);
        if declared > limit {
            return Err(too_large(declared));
        }
    }

    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| SeriesError::ResponseBody {
            url: url.to_owned(),
            source: e,
        })?
    {
        if body.len() + chunk.len() > limit {
            return Err(too_large(body.len() + chunk.len()));
        }
        body.extend_from_slice(&chunk);
    }

    Ok((status, String::from_utf8_lossy(&body).into_owned()))
}

/// Fetches through a deployed HTML proxy: `<endpoint>?url=<target>`.
#[derive(Debug, Clone)]
pub struct ProxyFetcher {
    http: reqwest::Client,
    endpoint: String,
}

impl ProxyFetcher {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http: client,
            endpoint: endpoint.into(),
        }
    }

    pub fn proxied_url(&self, target: &str) -> Result<Url> {
        Url::parse_with_params(&self.endpoint, &[("url", target)]).map_err(|e| {
            SeriesError::InvalidUrl {
                url: self.endpoint.clone(),
                reason: e.to_string(),
            }
        })
    }
}

impl Fetch for ProxyFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<String> {
        let proxied = self.proxied_url(url)?;
        let (status, body) = get_text(&self.http, proxied.as_str(), MAX_RESPONSE_BYTES).await?;
        if !status.is_success() {
            return Err(SeriesError::UnexpectedStatus {
                url: url.to_owned(),
                status,
            });
        }
        Ok(body)
    }
}

/// Which kind of upstream page a URL points at; decides cache lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum PageKind {
    Search,
    Detail,
}

impl PageKind {
    pub fn from_path(path: &str) -> Self {
        if path.starts_with("/tour/search") {
            PageKind::Search
        } else {
            PageKind::Detail
        }
    }

    /// How long a cached copy is served without asking upstream.
    pub fn fresh_for(self) -> Duration {
        match self {
            PageKind::Search => Duration::from_secs(5 * 60),
            PageKind::Detail => Duration::from_secs(60 * 60),
        }
    }

    /// How long a cached copy may stand in when upstream fails.
    pub fn stale_for(self) -> Duration {
        match self {
            PageKind::Search => Duration::from_secs(60 * 60),
            PageKind::Detail => Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Check scheme, host and shape of a target before anything is fetched.
pub fn validate_target(url: &str, allowed_hosts: &[String]) -> Result<(Url, PageKind)> {
    let parsed = Url::parse(url).map_err(|e| SeriesError::InvalidUrl {
        url: url.to_owned(),
        reason: e.to_string(),
    })?;

    if parsed.scheme() != "https" {
        return Err(SeriesError::InsecureScheme {
            scheme: parsed.scheme().to_string(),
        });
    }

    let host = parsed
        .host_str()
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| SeriesError::InvalidUrl {
            url: url.to_owned(),
            reason: "missing host".to_string(),
        })?;
    if !allowed_hosts.iter().any(|h| h.eq_ignore_ascii_case(&host)) {
        return Err(SeriesError::HostNotAllowed { host });
    }

    let kind = PageKind::from_path(parsed.path());
    Ok((parsed, kind))
}

#[derive(Debug, Serialize, Deserialize)]
struct PageMeta {
    fetched_at: DateTime<Utc>,
}

#[derive(Debug)]
struct CachedPage {
    fetched_at: DateTime<Utc>,
    body: String,
}

impl CachedPage {
    fn age(&self) -> Duration {
        (Utc::now() - self.fetched_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// Direct upstream fetcher with an on-disk page cache.
///
/// Applies the same rules a hosted proxy would: https only, allow-listed
/// hosts, bounded body size, fresh pages served from disk, and stale pages
/// served when upstream errors or rate-limits.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: reqwest::Client,
    cache_dir: Option<PathBuf>,
    allowed_hosts: Vec<String>,
    max_bytes: usize,
}

impl HttpFetcher {
    /// Fetcher without a disk cache.
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self::with_client(http)
    }

    /// Use the provided [`reqwest::Client`] (timeouts, proxies, headers).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            http: client,
            cache_dir: None,
            allowed_hosts: ALLOWED_HOSTS.iter().map(|h| h.to_string()).collect(),
            max_bytes: MAX_RESPONSE_BYTES,
        }
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn allowed_hosts<I, H>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = H>,
        H: Into<String>,
    {
        self.allowed_hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_bytes(mut self, limit: usize) -> Self {
        self.max_bytes = limit;
        self
    }

    fn cache_paths(dir: &Path, url: &str) -> (PathBuf, PathBuf) {
        let key = format!("{:x}", Sha256::digest(url.as_bytes()));
        (
            dir.join(format!("{key}.html")),
            dir.join(format!("{key}.json")),
        )
    }

    async fn read_cached(&self, url: &str) -> Option<CachedPage> {
        let dir = self.cache_dir.as_deref()?;
        let (body_path, meta_path) = Self::cache_paths(dir, url);
        let meta = tokio::fs::read_to_string(&meta_path).await.ok()?;
        let meta: PageMeta = serde_json::from_str(&meta).ok()?;
        let body = tokio::fs::read_to_string(&body_path).await.ok()?;
        Some(CachedPage {
            fetched_at: meta.fetched_at,
            body,
        })
    }

    async fn write_cached(&self, url: &str, body: &str) {
        let Some(dir) = self.cache_dir.as_deref() else {
            return;
        };
        if let Err(e) = Self::try_write_cached(dir, url, body).await {
            debug!(url, error = %e, "page cache write skipped");
        }
    }

    async fn try_write_cached(dir: &Path, url: &str, body: &str) -> Result<()> {
        tokio::fs::create_dir_all(dir).await?;
        let (body_path, meta_path) = Self::cache_paths(dir, url);
        let meta = serde_json::to_string(&PageMeta {
            fetched_at: Utc::now(),
        })?;
        tokio::fs::write(&body_path, body).await?;
        tokio::fs::write(&meta_path, meta).await?;
        Ok(())
    }

    /// Serve the cached copy if it is within the stale window, else `err`.
    fn stale_or(
        url: &str,
        cached: Option<CachedPage>,
        kind: PageKind,
        err: SeriesError,
    ) -> Result<String> {
        match cached {
            Some(page) if page.age() <= kind.stale_for() => {
                warn!(url, error = %err, "serving stale page");
                Ok(page.body)
            }
            _ => Err(err),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetch for HttpFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<String> {
        let (_, kind) = validate_target(url, &self.allowed_hosts)?;

        let cached = self.read_cached(url).await;
        if let Some(page) = cached.as_ref() {
            if page.age() <= kind.fresh_for() {
                debug!(url, %kind, "page cache hit");
                return Ok(page.body.clone());
            }
        }

        let (status, body) = match get_text(&self.http, url, self.max_bytes).await {
            Ok(response) => response,
            Err(e @ SeriesError::ResponseTooLarge { .. }) => return Err(e),
            Err(e) => return Self::stale_or(url, cached, kind, e),
        };

        if status == StatusCode::TOO_MANY_REQUESTS {
            let err = SeriesError::RateLimited {
                url: url.to_owned(),
            };
            return Self::stale_or(url, cached, kind, err);
        }

        if !status.is_success() {
            let err = SeriesError::UnexpectedStatus {
                url: url.to_owned(),
                status,
            };
            return Self::stale_or(url, cached, kind, err);
        }

        self.write_cached(url, &body).await;
        Ok(body)
    }
}
