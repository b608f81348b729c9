use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A tournament discovered on a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Upstream event id (digits only); unique within a context.
    pub id: String,
    pub url: String,
    pub name: String,
    pub short_label: String,
    pub is_completed: bool,
    pub date_range: Option<DateRange>,
}

/// Parsed contents of a listing's date cell. Either end may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub raw: String,
}

impl DateRange {
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none() && self.raw.is_empty()
    }
}

impl Event {
    pub fn start(&self) -> Option<NaiveDate> {
        self.date_range.as_ref().and_then(|d| d.start)
    }

    /// Fold a repeat sighting of the same event into `self`.
    ///
    /// Completion is sticky; every other field keeps the first non-empty value.
    pub fn merge_from(&mut self, other: &Event) {
        self.is_completed |= other.is_completed;

        if let Some(theirs) = &other.date_range {
            let ours = self.date_range.get_or_insert_with(DateRange::default);
            if ours.raw.is_empty() {
                ours.raw.clone_from(&theirs.raw);
            }
            if ours.start.is_none() {
                ours.start = theirs.start;
            }
            if ours.end.is_none() {
                ours.end = theirs.end;
            }
        }
        if matches!(&self.date_range, Some(d) if d.is_empty()) {
            self.date_range = None;
        }

        fill_if_empty(&mut self.url, &other.url);
        fill_if_empty(&mut self.name, &other.name);
        fill_if_empty(&mut self.short_label, &other.short_label);
    }
}

fn fill_if_empty(field: &mut String, candidate: &str) {
    if field.is_empty() && !candidate.is_empty() {
        *field = candidate.to_string();
    }
}

/// The reconciled, ordered set of events for one series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesContext {
    pub seed_urls: Vec<String>,
    pub built_at: DateTime<Utc>,
    /// Display order, not discovery order.
    pub events: Vec<Event>,
    pub event_url_by_label: BTreeMap<String, String>,
    pub event_name_by_label: BTreeMap<String, String>,
}

impl SeriesContext {
    /// Context with no events, returned when discovery fails with nothing cached.
    pub fn empty(seed_urls: Vec<String>) -> Self {
        Self {
            seed_urls,
            built_at: Utc::now(),
            events: vec![],
            event_url_by_label: BTreeMap::new(),
            event_name_by_label: BTreeMap::new(),
        }
    }

    pub fn completed_events(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(|e| e.is_completed)
    }

    pub fn event_by_label(&self, label: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.short_label == label)
    }
}
