use std::cmp::Ordering;
use std::collections::HashMap;

use itertools::Itertools;

use crate::config::StandingsConfig;
use crate::model::{ResultRow, StandingEntry};

pub const DEFAULT_DIVISION: &str = "MPO";

/// Display name of a division: the text before a `•`/`·` separator.
pub fn short_division_name(division: &str) -> &str {
    let division = division.trim();
    division
        .split(['•', '·'])
        .next()
        .map(str::trim)
        .unwrap_or(division)
}

/// Distinct non-empty division codes, ordered by display name.
pub fn divisions(rows: &[ResultRow]) -> Vec<String> {
    rows.iter()
        .map(|r| r.division.trim())
        .filter(|d| !d.is_empty())
        .unique()
        .sorted_by(|a, b| short_division_name(a).cmp(short_division_name(b)))
        .map(str::to_string)
        .collect()
}

/// [`DEFAULT_DIVISION`] when present, otherwise the first division listed.
pub fn default_division(divisions: &[String]) -> Option<&str> {
    divisions
        .iter()
        .find(|d| d.as_str() == DEFAULT_DIVISION)
        .or_else(|| divisions.first())
        .map(String::as_str)
}

struct PlayerPoints<'a> {
    name: &'a str,
    pdga_number: &'a str,
    points: Vec<f64>,
}

fn standing_points(row: &ResultRow) -> Option<f64> {
    if row.points.trim().is_empty() {
        Some(0.0)
    } else {
        row.points_value()
    }
}

/// Series standings for one division.
///
/// Each player's best `top_events` results are summed and capped at
/// `max_total`. Players are keyed by PDGA number, or by name when they have
/// none. A blank points cell counts as 0; rows without a name or with
/// non-numeric points are ignored.
pub fn compute_standings(
    rows: &[ResultRow],
    division: &str,
    config: &StandingsConfig,
) -> Vec<StandingEntry> {
    let top_events = config.top_events();
    let max_total = config.max_total() as f64;

    let mut order: Vec<String> = vec![];
    let mut by_player: HashMap<String, PlayerPoints<'_>> = HashMap::new();

    for row in rows.iter().filter(|r| r.division == division) {
        let name = row.name.trim();
        let Some(points) = standing_points(row) else {
            continue;
        };
        if name.is_empty() {
            continue;
        }

        let pdga_number = row.pdga_number.trim();
        let key = if pdga_number.is_empty() {
            format!("name:{}", name.to_lowercase())
        } else {
            format!("pdga:{pdga_number}")
        };
        by_player
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                PlayerPoints {
                    name,
                    pdga_number,
                    points: vec![],
                }
            })
            .points
            .push(points);
    }

    let mut players: Vec<(&str, &str, f64)> = order
        .iter()
        .filter_map(|key| by_player.get(key))
        .map(|p| {
            let total: f64 = p
                .points
                .iter()
                .copied()
                .sorted_by(|a, b| b.total_cmp(a))
                .take(top_events)
                .sum();
            (p.name, p.pdga_number, total.min(max_total))
        })
        .collect();

    players.sort_by(|a, b| match b.2.total_cmp(&a.2) {
        Ordering::Equal => a.0.cmp(b.0),
        other => other,
    });

    let mut shown_rank = 0;
    let mut last_total = None;
    players
        .into_iter()
        .enumerate()
        .map(|(idx, (name, pdga_number, total))| {
            let rank_label = if last_total == Some(total) {
                format!("T{shown_rank}")
            } else {
                shown_rank = idx + 1;
                last_total = Some(total);
                shown_rank.to_string()
            };
            StandingEntry {
                name: name.to_string(),
                pdga_number: pdga_number.to_string(),
                total,
                rank_label,
            }
        })
        .collect()
}

/// Rows matching an event label, a division and a free-text query.
///
/// Empty filters match everything. The query is matched case-insensitively
/// against the player name and PDGA number.
pub fn filter_rows<'a>(
    rows: &'a [ResultRow],
    event: Option<&str>,
    division: Option<&str>,
    query: &str,
) -> Vec<&'a ResultRow> {
    let event = event.filter(|e| !e.is_empty());
    let division = division.filter(|d| !d.is_empty());
    let query = query.trim().to_lowercase();

    rows.iter()
        .filter(|r| event.map_or(true, |e| r.event == e))
        .filter(|r| division.map_or(true, |d| r.division == d))
        .filter(|r| {
            query.is_empty()
                || r.name.to_lowercase().contains(&query)
                || r.pdga_number.to_lowercase().contains(&query)
        })
        .collect()
}
