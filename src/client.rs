use tracing::{debug, instrument};

use crate::aggregate;
use crate::cache::{CacheStore, MemoryStore, SeriesCache};
use crate::config::{ClientOptions, SeriesConfig};
use crate::context::{self, StatusSink};
use crate::fetch::{Fetch, HttpFetcher};
use crate::model::*;
use crate::player;
use crate::standings;

/// The main entry point for one disc golf series.
///
/// `SeriesClient` owns the series configuration, a [`Fetch`] implementation
/// and a namespaced cache, and exposes the discovered events, the aggregated
/// results and the views derived from them. Nothing here returns an error:
/// failed discovery or results loading degrade to cached or empty data.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> dgseries::Result<()> {
/// use dgseries::{ClientOptions, SeriesClient, SeriesConfig};
///
/// let config = SeriesConfig::from_json_str(r#"{ "identity": { "seriesId": "sows" } }"#)?;
/// let client = SeriesClient::direct(config, ClientOptions::default());
/// let ctx = client.get_series_context(false).await;
/// println!("Found {} events", ctx.events.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SeriesClient<F, S = MemoryStore> {
    config: SeriesConfig,
    fetcher: F,
    cache: SeriesCache<S>,
    options: ClientOptions,
}

impl SeriesClient<HttpFetcher, MemoryStore> {
    /// Client that fetches upstream directly and caches in memory.
    pub fn direct(config: SeriesConfig, options: ClientOptions) -> Self {
        Self::new(config, HttpFetcher::new(), MemoryStore::new(), options)
    }
}

impl<F: Fetch, S: CacheStore> SeriesClient<F, S> {
    /// Create a client. With `options.force_refresh` both cached entries are
    /// evicted before anything is read.
    pub fn new(config: SeriesConfig, fetcher: F, store: S, options: ClientOptions) -> Self {
        let cache = if options.cache_enabled {
            SeriesCache::new(store, config.series_id())
        } else {
            SeriesCache::disabled(store, config.series_id())
        };
        if options.force_refresh {
            debug!(series = config.series_id(), "evicting cached series data");
            cache.evict_all();
        }
        Self {
            config,
            fetcher,
            cache,
            options,
        }
    }

    pub fn config(&self) -> &SeriesConfig {
        &self.config
    }

    pub fn options(&self) -> ClientOptions {
        self.options
    }

    pub fn cache(&self) -> &SeriesCache<S> {
        &self.cache
    }

    /// Discovered events for the series, from cache when fresh.
    #[instrument(skip(self))]
    pub async fn get_series_context(&self, force_refresh: bool) -> SeriesContext {
        self.get_series_context_with_status(force_refresh, &()).await
    }

    /// [`Self::get_series_context`], reporting progress to `status`.
    pub async fn get_series_context_with_status(
        &self,
        force_refresh: bool,
        status: &dyn StatusSink,
    ) -> SeriesContext {
        context::build_series_context(
            &self.config,
            &self.fetcher,
            &self.cache,
            force_refresh,
            self.options.debug,
            status,
        )
        .await
    }

    /// Result rows of every completed event, from cache when fresh.
    #[instrument(skip(self))]
    pub async fn load_all_events(&self, force_refresh: bool) -> ResultsPayload {
        self.load_all_events_with_status(force_refresh, &()).await
    }

    /// [`Self::load_all_events`], reporting progress to `status`.
    pub async fn load_all_events_with_status(
        &self,
        force_refresh: bool,
        status: &dyn StatusSink,
    ) -> ResultsPayload {
        aggregate::load_all_events(
            &self.config,
            &self.fetcher,
            &self.cache,
            force_refresh,
            self.options.debug,
            status,
        )
        .await
    }

    /// Division codes present in the results, ordered by display name.
    pub async fn divisions(&self) -> Vec<String> {
        standings::divisions(&self.load_all_events(false).await.rows)
    }

    /// Series standings for `division`.
    #[instrument(skip(self))]
    pub async fn standings(&self, division: &str) -> Vec<StandingEntry> {
        let payload = self.load_all_events(false).await;
        standings::compute_standings(&payload.rows, division, &self.config.standings)
    }

    /// All results for one player, or `None` if they have none.
    #[instrument(skip(self))]
    pub async fn player_history(&self, query: &PlayerQuery) -> Option<PlayerHistory> {
        let payload = self.load_all_events(false).await;
        player::player_history(&payload.rows, query)
    }
}
