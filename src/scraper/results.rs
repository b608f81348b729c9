use std::collections::HashMap;

use ::scraper::{ElementRef, Html, Selector};
use regex::Regex;
use tracing::debug;

use crate::config::ScoringConfig;
use crate::error::Result;
use crate::model::ResultRow;
use crate::scoring::compute_points;
use crate::scraper::{clean_text, element_text};

/// Heading tokens that look like division codes but are not.
const NOT_DIVISIONS: [&str; 7] = ["PRO", "OPEN", "MIXED", "WOMEN", "JUNIOR", "TOTAL", "STATUS"];
const MAX_INFERRED_ROUNDS: u32 = 9;

struct TableSelectors {
    head_cells: Selector,
    rows: Selector,
    body_rows: Selector,
    any_cells: Selector,
    data_cells: Selector,
    header_cells: Selector,
}

impl TableSelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            head_cells: Selector::parse("thead th")?,
            rows: Selector::parse("tr")?,
            body_rows: Selector::parse("tbody tr")?,
            any_cells: Selector::parse("th, td")?,
            data_cells: Selector::parse("td")?,
            header_cells: Selector::parse("th")?,
        })
    }
}

struct HeaderInfo<'a> {
    /// Set when the header was found by content inside the body.
    row: Option<ElementRef<'a>>,
    cells: Vec<String>,
}

/// Parse every results table on an event page.
///
/// Division headings (`MPO · Mixed Pro Open (35)`) set the division for the
/// tables that follow; `division` is used until the first one appears.
/// Tables without a recognizable header are skipped.
pub(crate) fn parse_results_page(
    html: &str,
    event_label: &str,
    division: &str,
    scoring: &ScoringConfig,
) -> Result<Vec<ResultRow>> {
    let document = Html::parse_document(html);
    let node_selector = Selector::parse("h1, h2, h3, h4, h5, table")?;
    let selectors = TableSelectors::new()?;

    let mut current_division = division.to_string();
    let mut rows = vec![];
    let mut table_count = 0;

    for node in document.select(&node_selector) {
        match node.value().name() {
            "h2" | "h3" | "h4" | "h5" => {
                if let Some(code) = division_code_from_heading(&element_text(&node)) {
                    current_division = code;
                }
            }
            "table" => {
                let Some(header) = find_header(&node, &selectors) else {
                    continue;
                };
                table_count += 1;
                rows.extend(parse_results_table(
                    &node,
                    &header,
                    &selectors,
                    event_label,
                    &current_division,
                    scoring,
                ));
            }
            _ => {}
        }
    }

    debug!(
        event = event_label,
        tables = table_count,
        rows = rows.len(),
        "parsed results page"
    );
    Ok(rows)
}

/// Division code from a heading's text, if it names one.
pub(crate) fn division_code_from_heading(text: &str) -> Option<String> {
    let code_pattern = Regex::new(r"^[A-Z]{2,3}\d{0,2}$").ok()?;

    let text = clean_text(text);
    let separator = if text.contains('·') { '·' } else { '•' };
    let left = clean_text(text.split(separator).next().unwrap_or_default());
    let left = strip_trailing_count(&left);
    let code = left.split(' ').next().unwrap_or_default().to_uppercase();

    let valid = code_pattern.is_match(&code) && !NOT_DIVISIONS.contains(&code.as_str());
    valid.then_some(code)
}

/// Drop a trailing `(35)` player count.
fn strip_trailing_count(text: &str) -> String {
    match Regex::new(r"\(\s*\d+\s*\)\s*$") {
        Ok(count) => clean_text(&count.replace(text, "")),
        Err(_) => clean_text(text),
    }
}

fn find_header<'a>(table: &ElementRef<'a>, sel: &TableSelectors) -> Option<HeaderInfo<'a>> {
    let head: Vec<String> = table
        .select(&sel.head_cells)
        .map(|th| element_text(&th))
        .collect();
    if !head.is_empty() {
        return Some(HeaderInfo {
            row: None,
            cells: head,
        });
    }

    // No <thead>: look for a row whose cells read like column titles.
    table.select(&sel.rows).find_map(|tr| {
        let cells: Vec<String> = tr.select(&sel.any_cells).map(|c| element_text(&c)).collect();
        if cells.is_empty() {
            return None;
        }
        let joined = cells.join(" ").to_lowercase();
        let has_place = joined.contains("place") || joined.contains("pos");
        let has_name = joined.contains("name") || joined.contains("player");
        let has_pdga = joined.contains("pdga");
        (has_place && has_name && has_pdga).then_some(HeaderInfo {
            row: Some(tr),
            cells,
        })
    })
}

/// `Rd3` → 3.
fn round_number(key: &str) -> Option<u32> {
    let prefix = key.get(..2)?;
    if !prefix.eq_ignore_ascii_case("rd") {
        return None;
    }
    let digits = &key[2..];
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Column keys from header text; a blank cell right after `RdN` is its rating.
pub(crate) fn header_keys(cells: &[String]) -> Vec<String> {
    let mut keys: Vec<String> = Vec::with_capacity(cells.len());
    for cell in cells {
        let raw = clean_text(cell);
        let key = match keys.last().and_then(|prev| round_number(prev)) {
            Some(round) if raw.is_empty() => format!("Rd{round} rating"),
            _ => raw,
        };
        keys.push(key);
    }
    keys
}

/// Widen `keys` to `target_len` when the header left out rating columns.
///
/// Inserts `RdN rating` after each `RdN` lacking one, then pads with empty
/// keys so later columns never shift onto the wrong header.
pub(crate) fn infer_missing_rating_keys(keys: &[String], target_len: usize) -> Vec<String> {
    let mut out = keys.to_vec();
    for round in 1..=MAX_INFERRED_ROUNDS {
        if out.len() >= target_len {
            break;
        }
        let Some(rd_idx) = out.iter().position(|k| round_number(k) == Some(round)) else {
            continue;
        };
        let rating_key = format!("Rd{round} rating");
        if out.iter().any(|k| k.eq_ignore_ascii_case(&rating_key)) {
            continue;
        }
        out.insert(rd_idx + 1, rating_key);
    }
    out.resize(out.len().max(target_len), String::new());
    out
}

fn parse_results_table(
    table: &ElementRef,
    header: &HeaderInfo,
    sel: &TableSelectors,
    event_label: &str,
    division: &str,
    scoring: &ScoringConfig,
) -> Vec<ResultRow> {
    let mut keys = header_keys(&header.cells);
    if keys.is_empty() {
        return vec![];
    }

    let probe_width = table
        .select(&sel.body_rows)
        .next()
        .or_else(|| table.select(&sel.rows).next())
        .map(|tr| tr.select(&sel.data_cells).count())
        .unwrap_or(0);
    if probe_width > keys.len() {
        keys = infer_missing_rating_keys(&keys, probe_width);
    }
    let keys: Vec<String> = keys.iter().map(|k| k.to_lowercase()).collect();

    let mut body: Vec<ElementRef> = table.select(&sel.body_rows).collect();
    if body.is_empty() {
        body = table.select(&sel.rows).collect();
    }

    let mut out = vec![];
    for tr in body {
        let is_header_row = header.row.is_some_and(|h| h.id() == tr.id());
        if is_header_row || tr.select(&sel.header_cells).next().is_some() {
            continue;
        }
        let cells: Vec<String> = tr.select(&sel.data_cells).map(|td| element_text(&td)).collect();
        if cells.is_empty() {
            continue;
        }

        let raw: HashMap<&str, &str> = keys
            .iter()
            .zip(cells.iter())
            .filter(|(k, _)| !k.is_empty())
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let field = |names: &[&str]| -> String {
            names
                .iter()
                .filter_map(|n| raw.get(n))
                .find(|v| !v.is_empty())
                .map(|v| v.to_string())
                .unwrap_or_default()
        };

        let name = field(&["name"]);
        if name.is_empty() {
            continue;
        }
        let place = field(&["place"]);

        out.push(ResultRow {
            event: event_label.to_string(),
            division: division.to_string(),
            points: compute_points(&place, scoring),
            place,
            name,
            pdga_number: field(&["pdga#", "pdga #", "pdga", "pdga number"]),
            rating: field(&["rating"]),
            par: field(&["par"]),
            rd1: field(&["rd1"]),
            rd1_rating: field(&["rd1 rating"]),
            rd2: field(&["rd2"]),
            rd2_rating: field(&["rd2 rating"]),
            total: field(&["total"]),
            prize: field(&["prize"]),
        });
    }
    out
}
