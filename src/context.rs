use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheKey, CacheStore, SeriesCache, SERIES_CONTEXT_TTL};
use crate::config::SeriesConfig;
use crate::error::Result;
use crate::fetch::Fetch;
use crate::label;
use crate::model::{Event, SeriesContext};
use crate::scraper::seed::parse_seed_page;

/// Receives human-readable progress messages.
pub trait StatusSink: Sync {
    fn status(&self, message: &str);
}

impl<F: Fn(&str) + Sync> StatusSink for F {
    fn status(&self, message: &str) {
        self(message)
    }
}

/// Discards every message.
impl StatusSink for () {
    fn status(&self, _message: &str) {}
}

/// Accumulates discovered events by id, keeping first-seen order.
#[derive(Debug, Default)]
pub(crate) struct EventMerger {
    events: Vec<Event>,
    index: HashMap<String, usize>,
}

impl EventMerger {
    pub(crate) fn merge(&mut self, event: Event) {
        let id = event.id.trim().to_string();
        if id.is_empty() {
            return;
        }
        match self.index.get(&id) {
            Some(&idx) => self.events[idx].merge_from(&event),
            None => {
                self.index.insert(id, self.events.len());
                self.events.push(event);
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.events.len()
    }

    pub(crate) fn into_events(self) -> Vec<Event> {
        self.events
    }
}

/// Order, uniquify and index merged events into a context.
pub(crate) fn finalize_context(
    mut events: Vec<Event>,
    seed_urls: Vec<String>,
    config: &SeriesConfig,
    debug: bool,
) -> SeriesContext {
    label::sort_events(&mut events, &config.naming.sort_policy());
    label::ensure_unique_short_labels(&mut events);
    label::flag_label_collisions(&mut events, debug);

    let mut event_url_by_label = BTreeMap::new();
    let mut url_is_completed: HashMap<String, bool> = HashMap::new();
    let mut event_name_by_label = BTreeMap::new();

    for event in &events {
        let label = event.short_label.trim();
        if label.is_empty() {
            continue;
        }

        if !event.url.is_empty() {
            // a completed event's URL wins over whatever was mapped first
            let replace = match url_is_completed.get(label) {
                None => true,
                Some(&completed) => !completed && event.is_completed,
            };
            if replace {
                event_url_by_label.insert(label.to_string(), event.url.clone());
                url_is_completed.insert(label.to_string(), event.is_completed);
            }
        }

        if !event.name.is_empty() {
            event_name_by_label
                .entry(label.to_string())
                .or_insert_with(|| event.name.clone());
        }
    }

    if debug {
        debug!(?event_url_by_label, "event urls by label");
    }

    SeriesContext {
        seed_urls,
        built_at: chrono::Utc::now(),
        events,
        event_url_by_label,
        event_name_by_label,
    }
}

/// Fetch and parse every seed page, merging events by id.
#[instrument(skip_all)]
pub(crate) async fn discover_events<F: Fetch>(
    config: &SeriesConfig,
    seed_urls: &[String],
    fetcher: &F,
    status: &dyn StatusSink,
) -> Result<Vec<Event>> {
    let mut merger = EventMerger::default();
    for (i, seed) in seed_urls.iter().enumerate() {
        status.status(&format!(
            "Fetching series listing… ({}/{})",
            i + 1,
            seed_urls.len()
        ));
        let html = fetcher.fetch(seed).await?;
        let parsed = parse_seed_page(&html, &config.naming)?;
        info!(seed = %seed, events = parsed.len(), "parsed seed page");
        for event in parsed {
            merger.merge(event);
        }
    }
    debug!(events = merger.len(), "merged seed events");
    Ok(merger.into_events())
}

/// Build the series context, or serve it from cache.
///
/// Never fails: when discovery breaks, the cached context is returned
/// regardless of its age, or an empty one if nothing is cached.
#[instrument(skip(config, fetcher, cache, status))]
pub async fn build_series_context<F: Fetch, S: CacheStore>(
    config: &SeriesConfig,
    fetcher: &F,
    cache: &SeriesCache<S>,
    force_refresh: bool,
    debug_labels: bool,
    status: &dyn StatusSink,
) -> SeriesContext {
    if !force_refresh {
        if let Some(ctx) = cache.get::<SeriesContext>(CacheKey::SeriesContext, SERIES_CONTEXT_TTL) {
            return ctx;
        }
    }

    status.status("Fetching series listing…");
    let seed_urls = config.seed_urls();

    match discover_events(config, &seed_urls, fetcher, status).await {
        Ok(events) => {
            let ctx = finalize_context(events, seed_urls, config, debug_labels);
            cache.set(CacheKey::SeriesContext, &ctx);
            status.status(&format!("Found {} event(s).", ctx.events.len()));
            ctx
        }
        Err(e) => {
            warn!(error = %e, "series discovery failed");
            status.status("Discovery failed (using cached data if available).");
            cache
                .get_stale::<SeriesContext>(CacheKey::SeriesContext)
                .unwrap_or_else(|| SeriesContext::empty(seed_urls))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use chrono::NaiveDate;

    use super::*;
    use crate::cache::MemoryStore;
    use crate::config::{LabelRule, PdgaConfig};
    use crate::error::SeriesError;
    use crate::model::DateRange;

    /// Serves canned pages and counts every request.
    #[derive(Default)]
    pub(crate) struct FakeFetch {
        pages: HashMap<String, String>,
        calls: AtomicUsize,
        requested: Mutex<Vec<String>>,
    }

    impl FakeFetch {
        pub(crate) fn page(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), html.to_string());
            self
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub(crate) fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    impl Fetch for FakeFetch {
        async fn fetch(&self, url: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requested.lock().unwrap().push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| SeriesError::UnexpectedStatus {
                    url: url.to_string(),
                    status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                })
        }
    }

    pub(crate) const SEED_A: &str = "https://www.pdga.com/tour/search?OfficialName=sows&page=0";
    pub(crate) const SEED_B: &str = "https://www.pdga.com/tour/search?OfficialName=sows&page=1";

    pub(crate) const SEED_A_HTML: &str = r#"
        <table><thead><tr><th>Name</th><th>Dates</th><th>Status</th></tr></thead><tbody>
          <tr><td><a href="/tour/event/101">SOWS Week 2</a></td><td>Apr 12, 2025</td><td></td></tr>
          <tr><td><a href="/tour/event/100">SOWS Week 1</a></td><td>TBD</td><td></td></tr>
        </tbody></table>"#;

    pub(crate) const SEED_B_HTML: &str = r#"
        <table><thead><tr><th>Name</th><th>Dates</th><th>Status</th></tr></thead><tbody>
          <tr><td><a href="/tour/event/100">SOWS Week 1</a></td><td>Apr 5, 2025</td>
              <td><img alt="Official Tournament Results"></td></tr>
          <tr><td><a href="/tour/event/102">SOWS Week 3</a></td><td>Apr 19, 2025</td><td></td></tr>
        </tbody></table>"#;

    pub(crate) fn sows_config() -> SeriesConfig {
        let mut config = SeriesConfig::default();
        config.identity.series_id = Some("sows".to_string());
        config.pdga = PdgaConfig {
            seed_urls: vec![SEED_A.to_string(), SEED_B.to_string()],
            seed_url: None,
        };
        config.naming.short_label = Some(LabelRule::KeywordNumber {
            keyword: "sows".to_string(),
            output_prefix: "SOWS".to_string(),
            max_number: 99,
        });
        config.naming.sort_by_date = true;
        config
    }

    fn event(id: &str, label: &str, completed: bool) -> Event {
        Event {
            id: id.to_string(),
            url: format!("https://www.pdga.com/tour/event/{id}"),
            name: format!("Event {id}"),
            short_label: label.to_string(),
            is_completed: completed,
            date_range: None,
        }
    }

    #[test]
    fn test_merge_fills_missing_fields() {
        let mut merger = EventMerger::default();
        merger.merge(event("7", "A", false));
        let mut later = event("7", "B", true);
        later.date_range = Some(DateRange {
            start: NaiveDate::from_ymd_opt(2025, 5, 1),
            end: None,
            raw: "May 1, 2025".to_string(),
        });
        merger.merge(later);
        merger.merge(event("8", "C", false));

        let events = merger.into_events();
        assert_eq!(events.len(), 2);
        assert!(events[0].is_completed);
        assert_eq!(events[0].short_label, "A");
        assert_eq!(events[0].start(), NaiveDate::from_ymd_opt(2025, 5, 1));
    }

    #[test]
    fn test_finalize_prefers_completed_url() {
        let config = SeriesConfig::default();
        let mut open = event("1", "X", false);
        open.url = "https://www.pdga.com/tour/event/1".to_string();
        let done = event("2", "X", true);
        let mut third = event("3", "X", false);
        third.url = "https://www.pdga.com/tour/event/3".to_string();

        // without uniquification the maps would collide; labels become X1..X3
        let ctx = finalize_context(vec![open, done, third], vec![], &config, false);
        let labels: Vec<&str> = ctx.events.iter().map(|e| e.short_label.as_str()).collect();
        assert_eq!(labels, ["X1", "X2", "X3"]);
        assert_eq!(
            ctx.event_url_by_label.get("X2").map(String::as_str),
            Some("https://www.pdga.com/tour/event/2")
        );
        assert_eq!(
            ctx.event_name_by_label.get("X3").map(String::as_str),
            Some("Event 3")
        );
    }

    #[tokio::test]
    async fn test_build_merges_seeds() {
        let config = sows_config();
        let fetcher = FakeFetch::default()
            .page(SEED_A, SEED_A_HTML)
            .page(SEED_B, SEED_B_HTML);
        let cache = SeriesCache::new(MemoryStore::new(), config.series_id());
        let messages = Mutex::new(vec![]);
        let sink = |m: &str| messages.lock().unwrap().push(m.to_string());

        let ctx = build_series_context(&config, &fetcher, &cache, false, false, &sink).await;

        assert_eq!(fetcher.requested(), [SEED_A, SEED_B]);
        let ids: Vec<&str> = ctx.events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["100", "101", "102"]);
        let week1 = ctx.event_by_label("SOWS1").unwrap();
        assert!(week1.is_completed);
        assert_eq!(week1.date_range.as_ref().unwrap().raw, "TBD");
        assert_eq!(ctx.completed_events().count(), 1);
        assert_eq!(
            messages.lock().unwrap().last().map(String::as_str),
            Some("Found 3 event(s).")
        );
    }

    #[tokio::test]
    async fn test_warm_cache_is_idempotent() {
        let config = sows_config();
        let fetcher = FakeFetch::default()
            .page(SEED_A, SEED_A_HTML)
            .page(SEED_B, SEED_B_HTML);
        let cache = SeriesCache::new(MemoryStore::new(), config.series_id());

        build_series_context(&config, &fetcher, &cache, false, false, &()).await;
        assert_eq!(fetcher.calls(), 2);

        let first = build_series_context(&config, &fetcher, &cache, false, false, &()).await;
        let second = build_series_context(&config, &fetcher, &cache, false, false, &()).await;
        assert_eq!(fetcher.calls(), 2);
        assert_eq!(first, second);

        build_series_context(&config, &fetcher, &cache, true, false, &()).await;
        assert_eq!(fetcher.calls(), 4);
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_stale_then_empty() {
        let config = sows_config();
        let cache = SeriesCache::new(MemoryStore::new(), config.series_id());
        let broken = FakeFetch::default();

        let ctx = build_series_context(&config, &broken, &cache, false, false, &()).await;
        assert!(ctx.events.is_empty());
        assert_eq!(ctx.seed_urls, [SEED_A, SEED_B]);

        let healthy = FakeFetch::default()
            .page(SEED_A, SEED_A_HTML)
            .page(SEED_B, SEED_B_HTML);
        let built = build_series_context(&config, &healthy, &cache, false, false, &()).await;

        // a forced rebuild that fails still serves the previous context
        let fallback = build_series_context(&config, &broken, &cache, true, false, &()).await;
        assert_eq!(fallback, built);
    }
}
