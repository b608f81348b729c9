//! Discover the events of a PDGA disc golf series, aggregate their published
//! results and derive standings and player histories from them.

pub use aggregate::{fetch_event_results, load_all_events};
pub use cache::{CacheKey, CacheStore, MemoryStore, SeriesCache};
pub use client::SeriesClient;
pub use config::{
    ClientOptions, CustomLabel, CustomPoints, LabelRule, PointsRule, SeriesConfig, SortPolicy,
};
pub use context::{build_series_context, StatusSink};
pub use error::{Result, SeriesError, StrategyError};
pub use fetch::{Fetch, HttpFetcher, ProxyFetcher};
pub use model::*;
pub use player::player_history;
pub use scoring::{compute_points, parse_place_number};
pub use standings::{
    compute_standings, default_division, divisions, filter_rows, short_division_name,
};

pub mod aggregate;
pub mod cache;
mod client;
pub mod config;
pub mod context;
mod error;
pub mod fetch;
pub mod label;
mod model;
pub mod player;
pub mod scoring;
pub(crate) mod scraper;
pub mod standings;
