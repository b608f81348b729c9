use serde::Serialize;

use super::ResultRow;

/// One line of a division's standings table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandingEntry {
    pub name: String,
    pub pdga_number: String,
    pub total: f64,
    /// Competition rank; ties are shown as `T<rank>`.
    pub rank_label: String,
}

/// How to identify a player across result rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerQuery {
    Pdga(String),
    Name(String),
}

/// A player's rows plus the figures shown above them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerHistory {
    pub display_name: String,
    pub pdga_number: String,
    pub rows: Vec<ResultRow>,
    pub event_count: usize,
    pub division_count: usize,
    pub total_points: f64,
    pub average_round_rating: Option<RoundRatingAverage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RoundRatingAverage {
    pub average: f64,
    pub rounds: usize,
}
