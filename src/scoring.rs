use tracing::warn;

use crate::config::{PointsRule, ScoringConfig};

const DEFAULT_POINTS_BASE: f64 = 101.0;

/// First run of digits in a place cell (`"T3"` → 3).
pub fn parse_place_number(place_text: &str) -> Option<u32> {
    let digits: String = place_text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Series points for a finishing place; empty when the place has no number.
///
/// Order: injected callable, declarative linear rule, then `101 - place`.
pub fn compute_points(place_text: &str, scoring: &ScoringConfig) -> String {
    let Some(place) = parse_place_number(place_text) else {
        return String::new();
    };

    if let Some(custom) = &scoring.custom_points {
        match custom.call(place_text, place) {
            Ok(points) => return points.unwrap_or_default(),
            Err(e) => warn!(place = %place_text, error = %e, "custom points failed; falling back"),
        }
    }

    let base = match &scoring.points {
        Some(PointsRule::Linear { base: Some(base) }) => *base,
        Some(PointsRule::Linear { base: None }) => {
            warn!("linear points rule has no numeric base; using the default");
            DEFAULT_POINTS_BASE
        }
        _ => DEFAULT_POINTS_BASE,
    };
    let points = base - f64::from(place);
    if points > 0.0 {
        points.to_string()
    } else {
        "0".to_string()
    }
}
