use itertools::Itertools;

use crate::model::{PlayerHistory, PlayerQuery, ResultRow, RoundRatingAverage};
use crate::standings::short_division_name;

fn normalize_name(name: &str) -> String {
    name.split_whitespace().join(" ")
}

fn normalize_pdga(pdga: &str) -> String {
    pdga.chars().filter(char::is_ascii_digit).collect()
}

/// Most frequent non-empty value; the first one seen wins a tie.
fn most_common(values: impl IntoIterator<Item = String>) -> String {
    let mut counts: Vec<(String, usize)> = vec![];
    for value in values.into_iter().filter(|v| !v.is_empty()) {
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, n)) => *n += 1,
            None => counts.push((value, 1)),
        }
    }
    let mut best: Option<(String, usize)> = None;
    for (value, n) in counts {
        if best.as_ref().map_or(true, |(_, top)| n > *top) {
            best = Some((value, n));
        }
    }
    best.map(|(value, _)| value).unwrap_or_default()
}

fn rating_number(text: &str) -> Option<f64> {
    let digits = normalize_pdga(text);
    digits.parse::<f64>().ok().filter(|n| *n > 0.0)
}

fn average_round_rating(rows: &[ResultRow]) -> Option<RoundRatingAverage> {
    let ratings: Vec<f64> = rows
        .iter()
        .flat_map(|r| [r.rd1_rating.as_str(), r.rd2_rating.as_str()])
        .filter_map(rating_number)
        .collect();
    if ratings.is_empty() {
        return None;
    }
    Some(RoundRatingAverage {
        average: ratings.iter().sum::<f64>() / ratings.len() as f64,
        rounds: ratings.len(),
    })
}

/// Every result for one player, with summary figures.
///
/// PDGA numbers compare on their digits only; names compare after collapsing
/// whitespace, ignoring case. Returns `None` when nothing matches.
pub fn player_history(rows: &[ResultRow], query: &PlayerQuery) -> Option<PlayerHistory> {
    let matches: Vec<ResultRow> = match query {
        PlayerQuery::Pdga(pdga) => {
            let wanted = normalize_pdga(pdga);
            if wanted.is_empty() {
                return None;
            }
            rows.iter()
                .filter(|r| normalize_pdga(&r.pdga_number) == wanted)
                .cloned()
                .collect()
        }
        PlayerQuery::Name(name) => {
            let wanted = normalize_name(name).to_lowercase();
            if wanted.is_empty() {
                return None;
            }
            rows.iter()
                .filter(|r| normalize_name(&r.name).to_lowercase() == wanted)
                .cloned()
                .collect()
        }
    };
    if matches.is_empty() {
        return None;
    }

    let display_name = most_common(matches.iter().map(|r| normalize_name(&r.name)));
    let pdga_number = most_common(matches.iter().map(|r| normalize_pdga(&r.pdga_number)));
    let event_count = matches
        .iter()
        .map(|r| r.event.as_str())
        .filter(|e| !e.is_empty())
        .unique()
        .count();
    let division_count = matches
        .iter()
        .map(|r| short_division_name(&r.division))
        .filter(|d| !d.is_empty())
        .unique()
        .count();
    let total_points = matches.iter().filter_map(ResultRow::points_value).sum();
    let average_round_rating = average_round_rating(&matches);

    let rows = matches
        .into_iter()
        .sorted_by(|a, b| a.event.cmp(&b.event).then_with(|| a.division.cmp(&b.division)))
        .collect();

    Some(PlayerHistory {
        display_name,
        pdga_number,
        rows,
        event_count,
        division_count,
        total_points,
        average_round_rating,
    })
}
