use std::collections::HashSet;

use ::scraper::{ElementRef, Html, Selector};
use chrono::{Datelike, NaiveDate};
use tracing::debug;

use crate::config::NamingConfig;
use crate::error::Result;
use crate::label;
use crate::model::{DateRange, Event};
use crate::scraper::{absolutize_href, clean_text, element_text};

const EVENT_LINK_SELECTOR: &str = r#"a[href*="/tour/event/"]"#;
const EVENT_PATH: &str = "/tour/event/";
const COMPLETED_MARKER: &str = "official tournament results";

const DATE_FORMATS: [&str; 9] = [
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%d-%b-%Y",
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%a, %b %d, %Y",
    "%A, %B %d, %Y",
];
const RANGE_SEPARATORS: [&str; 4] = [" - ", " – ", " — ", " to "];

/// Parse an event listing page into candidate events, already in series order.
///
/// Rows without an event link or with an id already seen on this page are
/// skipped. A page without a listing table yields no events.
pub(crate) fn parse_seed_page(html: &str, naming: &NamingConfig) -> Result<Vec<Event>> {
    let document = Html::parse_document(html);

    let table_selector = Selector::parse("table")?;
    let link_selector = Selector::parse(EVENT_LINK_SELECTOR)?;
    let Some(table) = document
        .select(&table_selector)
        .find(|t| t.select(&link_selector).next().is_some())
        .or_else(|| document.select(&table_selector).next())
    else {
        debug!("no listing table found");
        return Ok(vec![]);
    };

    let date_idx = find_date_column(&table)?;
    let row_selector = Selector::parse("tbody tr")?;
    let img_selector = Selector::parse("img")?;
    let td_selector = Selector::parse("td")?;

    let mut seen = HashSet::new();
    let mut events = vec![];

    for row in table.select(&row_selector) {
        let Some(link) = row.select(&link_selector).next() else {
            continue;
        };
        let href = link.value().attr("href").unwrap_or_default().trim();
        let Some(id) = event_id_from_href(href) else {
            continue;
        };
        if seen.contains(&id) {
            continue;
        }
        let name = element_text(&link);
        if name.is_empty() {
            continue;
        }

        let has_official_icon = row.select(&img_selector).any(|img| {
            ["alt", "title"].iter().any(|attr| {
                img.value()
                    .attr(attr)
                    .is_some_and(|v| v.to_lowercase().contains(COMPLETED_MARKER))
            })
        });
        let is_completed =
            has_official_icon || element_text(&row).to_lowercase().contains(COMPLETED_MARKER);

        let date_range = date_idx
            .and_then(|idx| row.select(&td_selector).nth(idx))
            .and_then(|cell| parse_date_range(&element_text(&cell)));

        let short_label = label::short_label_from_name(&name, naming);
        let url = absolutize_href(href);

        debug!(
            id = %id,
            name = %name,
            short_label = %short_label,
            completed = is_completed,
            "seed event"
        );

        seen.insert(id.clone());
        events.push(Event {
            id,
            url,
            name,
            short_label,
            is_completed,
            date_range,
        });
    }

    label::sort_events(&mut events, &naming.sort_policy());
    Ok(events)
}

/// Index of the header cell mentioning "date", if any.
fn find_date_column(table: &ElementRef) -> Result<Option<usize>> {
    let header_selector = Selector::parse("thead th")?;
    Ok(table.select(&header_selector).position(|th| {
        let text = element_text(&th).to_lowercase();
        text == "date" || text == "dates" || text.contains("date")
    }))
}

/// Numeric event id from a `/tour/event/<id>` link.
pub(crate) fn event_id_from_href(href: &str) -> Option<String> {
    let (_, rest) = href.split_once(EVENT_PATH)?;
    let id: String = rest.chars().take_while(char::is_ascii_digit).collect();
    (!id.is_empty()).then_some(id)
}

/// Parse a listing date cell such as `Apr 5, 2025 - Apr 6, 2025`.
///
/// Never fails: unparsable sides are left empty and the raw text is kept.
pub(crate) fn parse_date_range(text: &str) -> Option<DateRange> {
    let raw = clean_text(text);
    if raw.is_empty() {
        return None;
    }

    if let Some(date) = parse_date(&raw) {
        return Some(DateRange {
            start: Some(date),
            end: None,
            raw,
        });
    }

    let (start_text, end_text) = split_range(&raw);
    let end = end_text.as_deref().and_then(parse_date);
    let start = parse_date(&start_text).or_else(|| {
        let end = end?;
        let start = parse_date_in_year(&start_text, end.year())?;
        // a range that wraps the new year starts in the previous one
        if start > end {
            parse_date_in_year(&start_text, end.year() - 1)
        } else {
            Some(start)
        }
    });

    Some(DateRange { start, end, raw })
}

fn split_range(raw: &str) -> (String, Option<String>) {
    for sep in RANGE_SEPARATORS {
        if let Some((start, end)) = raw.split_once(sep) {
            return (start.trim().to_string(), Some(end.trim().to_string()));
        }
    }
    let mut parts = raw
        .split(['-', '–', '—'])
        .map(str::trim)
        .filter(|p| !p.is_empty());
    let start = parts.next().unwrap_or(raw).to_string();
    (start, parts.next().map(str::to_string))
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text.trim(), fmt).ok())
}

/// Parse a side that omits its year, e.g. `Apr 5` or `11-Oct`.
fn parse_date_in_year(text: &str, year: i32) -> Option<NaiveDate> {
    [
        format!("{text}, {year}"),
        format!("{text}-{year}"),
        format!("{text} {year}"),
    ]
    .iter()
    .find_map(|candidate| parse_date(candidate))
}
