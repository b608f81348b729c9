use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed column names, in display order. `None` marks the points column,
/// whose header comes from the series configuration.
const COLUMN_LAYOUT: [Option<&str>; 14] = [
    Some("Event"),
    Some("Division"),
    None,
    Some("Place"),
    Some("Name"),
    Some("PDGA#"),
    Some("Rating"),
    Some("Par"),
    Some("Rd1"),
    Some("Rd1 rating"),
    Some("Rd2"),
    Some("Rd2 rating"),
    Some("Total"),
    Some("Prize"),
];

/// The fixed results schema with the configured points column name.
pub fn fixed_columns(points_column: &str) -> Vec<String> {
    COLUMN_LAYOUT
        .iter()
        .map(|c| c.unwrap_or(points_column).to_string())
        .collect()
}

/// One player's finish at one event in one division.
///
/// Every field is present; missing upstream values are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    /// Short label of the event.
    pub event: String,
    /// Raw division code, possibly carrying a decorative suffix.
    pub division: String,
    pub points: String,
    pub place: String,
    pub name: String,
    pub pdga_number: String,
    pub rating: String,
    pub par: String,
    pub rd1: String,
    pub rd1_rating: String,
    pub rd2: String,
    pub rd2_rating: String,
    pub total: String,
    pub prize: String,
}

impl ResultRow {
    /// Cell values in [`fixed_columns`] order.
    pub fn values(&self) -> [&str; 14] {
        [
            &self.event,
            &self.division,
            &self.points,
            &self.place,
            &self.name,
            &self.pdga_number,
            &self.rating,
            &self.par,
            &self.rd1,
            &self.rd1_rating,
            &self.rd2,
            &self.rd2_rating,
            &self.total,
            &self.prize,
        ]
    }

    /// Look a cell up by column name. The points column answers to
    /// `points_column`.
    pub fn get(&self, column: &str, points_column: &str) -> Option<&str> {
        let idx = COLUMN_LAYOUT
            .iter()
            .position(|c| c.unwrap_or(points_column) == column)?;
        Some(self.values()[idx])
    }

    /// Numeric points, if the points cell holds a number.
    pub fn points_value(&self) -> Option<f64> {
        self.points.trim().parse::<f64>().ok().filter(|n| n.is_finite())
    }
}

/// All result rows for a series, as cached and handed to views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsPayload {
    pub columns: Vec<String>,
    /// Event order, then page order; not sorted.
    pub rows: Vec<ResultRow>,
    pub built_at: DateTime<Utc>,
}

impl ResultsPayload {
    pub fn empty(points_column: &str) -> Self {
        Self {
            columns: fixed_columns(points_column),
            rows: vec![],
            built_at: Utc::now(),
        }
    }
}
