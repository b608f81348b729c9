use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::cache::{CacheKey, CacheStore, SeriesCache, RESULTS_TTL};
use crate::config::{ScoringConfig, SeriesConfig};
use crate::context::{build_series_context, StatusSink};
use crate::error::Result;
use crate::fetch::Fetch;
use crate::model::{fixed_columns, Event, ResultRow, ResultsPayload};
use crate::scraper::results::parse_results_page;

/// Fetch and parse one event's results page.
///
/// Events without a label or URL yield no rows.
#[instrument(skip_all, fields(event = %event.short_label))]
pub async fn fetch_event_results<F: Fetch>(
    event: &Event,
    scoring: &ScoringConfig,
    fetcher: &F,
    status: &dyn StatusSink,
) -> Result<Vec<ResultRow>> {
    let label = event.short_label.trim();
    let url = event.url.trim();
    if label.is_empty() || url.is_empty() {
        return Ok(vec![]);
    }

    status.status(&format!("Fetching results: {label}…"));
    let html = fetcher.fetch(url).await?;
    parse_results_page(&html, label, "", scoring)
}

/// Results for every completed event in the series, or the cached payload.
///
/// Events are fetched one at a time. An event that fails to load is logged
/// and left out; the rest still load.
#[instrument(skip(config, fetcher, cache, status))]
pub async fn load_all_events<F: Fetch, S: CacheStore>(
    config: &SeriesConfig,
    fetcher: &F,
    cache: &SeriesCache<S>,
    force_refresh: bool,
    debug_labels: bool,
    status: &dyn StatusSink,
) -> ResultsPayload {
    if !force_refresh {
        if let Some(payload) = cache.get::<ResultsPayload>(CacheKey::Results, RESULTS_TTL) {
            status.status("Loaded results from cache.");
            return payload;
        }
    }

    status.status("Loading results…");
    let ctx = build_series_context(config, fetcher, cache, false, debug_labels, status).await;
    let points_column = config.points_column();

    let completed: Vec<&Event> = ctx.completed_events().collect();
    if completed.is_empty() {
        let payload = ResultsPayload::empty(points_column);
        cache.set(CacheKey::Results, &payload);
        status.status("No completed events found.");
        return payload;
    }

    let mut rows = vec![];
    for event in completed {
        match fetch_event_results(event, &config.scoring, fetcher, status).await {
            Ok(event_rows) => rows.extend(event_rows),
            Err(e) => warn!(
                event = %event.short_label,
                url = %event.url,
                error = %e,
                "failed to load event results"
            ),
        }
    }

    let payload = ResultsPayload {
        columns: fixed_columns(points_column),
        rows,
        built_at: Utc::now(),
    };
    cache.set(CacheKey::Results, &payload);

    info!(rows = payload.rows.len(), "loaded series results");
    status.status(&format!("Loaded {} result row(s).", payload.rows.len()));
    payload
}
