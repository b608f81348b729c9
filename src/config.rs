use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::{Result, SeriesError, StrategyError};

/// Seed used when a series configures none.
pub const DEFAULT_SEED_URL: &str = "https://www.pdga.com/tour/search?OfficialName=&td=35187&date_filter%5Bmin%5D%5Bdate%5D=2025-09-01&date_filter%5Bmax%5D%5Bdate%5D=2026-03-31";

pub const DEFAULT_POINTS_COLUMN: &str = "Series Pts";
pub const DEFAULT_SERIES_ID: &str = "default";
pub const DEFAULT_MAX_LABEL_NUMBER: u32 = 99;
pub const DEFAULT_TOP_EVENTS: usize = 4;

/// Static configuration for one series.
///
/// Mirrors the per-deployment config file; keys the crate does not use (theme,
/// extra branding) are ignored on load. Injected callables are attached with
/// [`SeriesConfig::with_custom_label`] and [`SeriesConfig::with_custom_points`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeriesConfig {
    pub identity: Identity,
    pub branding: Branding,
    pub pdga: PdgaConfig,
    pub naming: NamingConfig,
    pub scoring: ScoringConfig,
    pub standings: StandingsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Identity {
    pub series_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Branding {
    pub title_text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PdgaConfig {
    pub seed_urls: Vec<String>,
    /// Legacy single-seed form, used only when `seed_urls` is empty.
    pub seed_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NamingConfig {
    #[serde(rename = "eventShortLabel")]
    pub short_label: Option<LabelRule>,
    pub sort_by_date: bool,
    pub sort_by_prefix_number: Option<PrefixSort>,
    #[serde(skip)]
    pub custom_label: Option<CustomLabel>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrefixSort {
    pub prefix: Option<String>,
}

/// Declarative short-label rule.
///
/// Loading is lenient: a rule without a recognised `type` becomes
/// [`LabelRule::Unsupported`] and missing fields load as empty, so an
/// incomplete rule is skipped when labels are derived instead of rejecting
/// the whole config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawRule")]
pub enum LabelRule {
    KeywordNumber {
        keyword: String,
        output_prefix: String,
        max_number: u32,
    },
    Unsupported,
}

/// Untyped form of a declarative rule as it appears in the config file.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawRule {
    #[serde(rename = "type")]
    kind: Option<serde_json::Value>,
    keyword: Option<serde_json::Value>,
    output_prefix: Option<serde_json::Value>,
    max_number: Option<serde_json::Value>,
    base: Option<serde_json::Value>,
}

impl RawRule {
    fn kind(&self) -> String {
        value_text(self.kind.as_ref()).to_lowercase()
    }
}

fn value_text(value: Option<&serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn value_number(value: Option<&serde_json::Value>) -> Option<f64> {
    let n = match value? {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

impl From<RawRule> for LabelRule {
    fn from(raw: RawRule) -> Self {
        if raw.kind() != "keywordnumber" {
            return Self::Unsupported;
        }
        let max_number = value_number(raw.max_number.as_ref())
            .filter(|n| *n >= 0.0 && *n <= f64::from(u32::MAX))
            .map_or(DEFAULT_MAX_LABEL_NUMBER, |n| n as u32);
        Self::KeywordNumber {
            keyword: value_text(raw.keyword.as_ref()),
            output_prefix: value_text(raw.output_prefix.as_ref()),
            max_number,
        }
    }
}

/// How discovered events are ordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortPolicy {
    /// Oldest start date first.
    Chronological,
    /// `<prefix><n>` labels by `n`, everything else by name.
    PrefixNumber { prefix: Option<String> },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringConfig {
    pub points_column_name: String,
    pub points: Option<PointsRule>,
    #[serde(skip)]
    pub custom_points: Option<CustomPoints>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            points_column_name: DEFAULT_POINTS_COLUMN.to_string(),
            points: None,
            custom_points: None,
        }
    }
}

/// Declarative points rule. A `linear` rule without a usable `base` loads
/// with `base: None` and falls back to the default rule when scoring.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawRule")]
pub enum PointsRule {
    Linear { base: Option<f64> },
    Unsupported,
}

impl From<RawRule> for PointsRule {
    fn from(raw: RawRule) -> Self {
        if raw.kind() != "linear" {
            return Self::Unsupported;
        }
        Self::Linear {
            base: value_number(raw.base.as_ref()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StandingsConfig {
    pub top_events: Option<usize>,
    pub max_total: Option<i64>,
    pub description: Option<String>,
}

type LabelFn = dyn Fn(&str) -> std::result::Result<Option<String>, StrategyError> + Send + Sync;
type PointsFn =
    dyn Fn(&str, u32) -> std::result::Result<Option<String>, StrategyError> + Send + Sync;

/// Injected short-label callable. `Ok(None)` means "no opinion".
#[derive(Clone)]
pub struct CustomLabel(Arc<LabelFn>);

impl CustomLabel {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str) -> std::result::Result<Option<String>, StrategyError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, name: &str) -> std::result::Result<Option<String>, StrategyError> {
        (self.0)(name)
    }
}

impl fmt::Debug for CustomLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomLabel(..)")
    }
}

/// Injected points callable, given the raw place text and its parsed number.
#[derive(Clone)]
pub struct CustomPoints(Arc<PointsFn>);

impl CustomPoints {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str, u32) -> std::result::Result<Option<String>, StrategyError>
            + Send
            + Sync
            + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(
        &self,
        place_text: &str,
        place: u32,
    ) -> std::result::Result<Option<String>, StrategyError> {
        (self.0)(place_text, place)
    }
}

impl fmt::Debug for CustomPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomPoints(..)")
    }
}

impl SeriesConfig {
    /// Parse a series configuration from its JSON form.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        if config.scoring.points_column_name.trim().is_empty() {
            return Err(SeriesError::Config(
                "scoring.pointsColumnName must not be blank".to_string(),
            ));
        }
        Ok(config)
    }

    pub fn with_custom_label<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> std::result::Result<Option<String>, StrategyError> + Send + Sync + 'static,
    {
        self.naming.custom_label = Some(CustomLabel::new(f));
        self
    }

    pub fn with_custom_points<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, u32) -> std::result::Result<Option<String>, StrategyError>
            + Send
            + Sync
            + 'static,
    {
        self.scoring.custom_points = Some(CustomPoints::new(f));
        self
    }

    /// Stable identifier used to namespace cache keys.
    pub fn series_id(&self) -> &str {
        self.identity
            .series_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SERIES_ID)
    }

    /// Seed URLs in configured order: `seedUrls`, then legacy `seedUrl`,
    /// then the built-in default.
    pub fn seed_urls(&self) -> Vec<String> {
        let cleaned: Vec<String> = self
            .pdga
            .seed_urls
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if !cleaned.is_empty() {
            return cleaned;
        }
        if let Some(seed) = self
            .pdga
            .seed_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            return vec![seed.to_string()];
        }
        vec![DEFAULT_SEED_URL.to_string()]
    }

    pub fn points_column(&self) -> &str {
        let name = self.scoring.points_column_name.trim();
        if name.is_empty() {
            DEFAULT_POINTS_COLUMN
        } else {
            name
        }
    }
}

impl NamingConfig {
    pub fn sort_policy(&self) -> SortPolicy {
        if self.sort_by_date {
            return SortPolicy::Chronological;
        }
        let prefix = self
            .sort_by_prefix_number
            .as_ref()
            .and_then(|p| p.prefix.as_deref())
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .or_else(|| match &self.short_label {
                Some(LabelRule::KeywordNumber { output_prefix, .. })
                    if !output_prefix.trim().is_empty() =>
                {
                    Some(output_prefix.trim().to_string())
                }
                _ => None,
            });
        SortPolicy::PrefixNumber { prefix }
    }
}

impl StandingsConfig {
    /// Number of best event results counted per player.
    pub fn top_events(&self) -> usize {
        self.top_events
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_TOP_EVENTS)
    }

    /// Cap on a player's total; defaults to 100 per counted event.
    pub fn max_total(&self) -> i64 {
        self.max_total
            .filter(|n| *n > 0)
            .unwrap_or(self.top_events() as i64 * 100)
    }
}

/// Per-session switches, the equivalent of `?debug=1`, `?force=1` and
/// `?nocache=1` on the hosted pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    /// Resolve leftover short-label collisions by appending the event id.
    pub debug: bool,
    /// Evict cached context and results before the first read.
    pub force_refresh: bool,
    pub cache_enabled: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            debug: false,
            force_refresh: false,
            cache_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOWS: &str = r##"{
        "identity": { "seriesId": "sows-25-26" },
        "branding": { "titleText": "SOWS 2025-2026" },
        "theme": { "accent": "#f5ff00" },
        "pdga": { "seedUrls": ["https://www.pdga.com/tour/search?OfficialName=SOWS+2025", "  "] },
        "naming": {
            "eventShortLabel": { "type": "keywordNumber", "keyword": "sows", "outputPrefix": "SOWS" },
            "sortByDate": true
        },
        "scoring": { "pointsColumnName": "Series Pts", "points": { "type": "linear", "base": 101 } },
        "standings": { "topEvents": 5, "maxTotal": 500, "description": "Top five" }
    }"##;

    #[test]
    fn test_parse_full_config() {
        let config = SeriesConfig::from_json_str(SOWS).unwrap();
        assert_eq!(config.series_id(), "sows-25-26");
        assert_eq!(config.seed_urls().len(), 1);
        assert_eq!(config.naming.sort_policy(), SortPolicy::Chronological);
        assert_eq!(
            config.naming.short_label,
            Some(LabelRule::KeywordNumber {
                keyword: "sows".to_string(),
                output_prefix: "SOWS".to_string(),
                max_number: 99,
            })
        );
        assert_eq!(
            config.scoring.points,
            Some(PointsRule::Linear { base: Some(101.0) })
        );
        assert_eq!(config.branding.title_text.as_deref(), Some("SOWS 2025-2026"));
        assert_eq!(config.standings.top_events(), 5);
        assert_eq!(config.standings.max_total(), 500);
    }

    #[test]
    fn test_defaults_for_empty_config() {
        let config = SeriesConfig::from_json_str("{}").unwrap();
        assert_eq!(config.series_id(), DEFAULT_SERIES_ID);
        assert_eq!(config.seed_urls(), vec![DEFAULT_SEED_URL.to_string()]);
        assert_eq!(config.points_column(), DEFAULT_POINTS_COLUMN);
        assert_eq!(config.standings.top_events(), 4);
        assert_eq!(config.standings.max_total(), 400);
        assert_eq!(
            config.naming.sort_policy(),
            SortPolicy::PrefixNumber { prefix: None }
        );
    }

    #[test]
    fn test_legacy_single_seed() {
        let config =
            SeriesConfig::from_json_str(r#"{ "pdga": { "seedUrl": " https://www.pdga.com/a " } }"#)
                .unwrap();
        assert_eq!(config.seed_urls(), vec!["https://www.pdga.com/a".to_string()]);
    }

    #[test]
    fn test_prefix_sort_falls_back_to_label_prefix() {
        let config = SeriesConfig::from_json_str(
            r#"{ "naming": { "eventShortLabel": { "type": "keywordNumber", "keyword": "uplay", "outputPrefix": "UPlay" } } }"#,
        )
        .unwrap();
        assert_eq!(
            config.naming.sort_policy(),
            SortPolicy::PrefixNumber {
                prefix: Some("UPlay".to_string())
            }
        );
    }

    #[test]
    fn test_unknown_rule_types_are_tolerated() {
        let config = SeriesConfig::from_json_str(
            r#"{ "naming": { "eventShortLabel": { "type": "regex" } }, "scoring": { "points": { "type": "table" } } }"#,
        )
        .unwrap();
        assert_eq!(config.naming.short_label, Some(LabelRule::Unsupported));
        assert_eq!(config.scoring.points, Some(PointsRule::Unsupported));
    }

    #[test]
    fn test_blank_points_column_rejected() {
        let err = SeriesConfig::from_json_str(r#"{ "scoring": { "pointsColumnName": " " } }"#);
        assert!(matches!(err, Err(SeriesError::Config(_))));
    }

    #[test]
    fn test_partial_label_rule_loads_with_empty_fields() {
        let config = SeriesConfig::from_json_str(
            r#"{ "naming": { "eventShortLabel": { "type": "keywordNumber", "keyword": "sows" } } }"#,
        )
        .unwrap();
        assert_eq!(
            config.naming.short_label,
            Some(LabelRule::KeywordNumber {
                keyword: "sows".to_string(),
                output_prefix: String::new(),
                max_number: 99,
            })
        );
        assert_eq!(
            config.naming.sort_policy(),
            SortPolicy::PrefixNumber { prefix: None }
        );
    }

    #[test]
    fn test_rules_without_type_are_unsupported() {
        let config = SeriesConfig::from_json_str(
            r#"{ "naming": { "eventShortLabel": { "keyword": "sows", "outputPrefix": "SOWS" } },
                 "scoring": { "points": { "base": 50 } } }"#,
        )
        .unwrap();
        assert_eq!(config.naming.short_label, Some(LabelRule::Unsupported));
        assert_eq!(config.scoring.points, Some(PointsRule::Unsupported));
    }

    #[test]
    fn test_linear_base_accepts_floats_strings_and_absence() {
        let base = |json: &str| {
            SeriesConfig::from_json_str(json)
                .unwrap()
                .scoring
                .points
        };
        assert_eq!(
            base(r#"{ "scoring": { "points": { "type": "linear", "base": 101.0 } } }"#),
            Some(PointsRule::Linear { base: Some(101.0) })
        );
        assert_eq!(
            base(r#"{ "scoring": { "points": { "type": "Linear", "base": "75" } } }"#),
            Some(PointsRule::Linear { base: Some(75.0) })
        );
        assert_eq!(
            base(r#"{ "scoring": { "points": { "type": "linear" } } }"#),
            Some(PointsRule::Linear { base: None })
        );
        assert_eq!(
            base(r#"{ "scoring": { "points": { "type": "linear", "base": "lots" } } }"#),
            Some(PointsRule::Linear { base: None })
        );
    }

    #[test]
    fn test_max_number_accepts_float_and_defaults_when_invalid() {
        let max = |json: &str| match SeriesConfig::from_json_str(json).unwrap().naming.short_label {
            Some(LabelRule::KeywordNumber { max_number, .. }) => max_number,
            other => panic!("unexpected rule {other:?}"),
        };
        assert_eq!(
            max(r#"{ "naming": { "eventShortLabel": { "type": "keywordNumber", "maxNumber": 12.0 } } }"#),
            12
        );
        assert_eq!(
            max(r#"{ "naming": { "eventShortLabel": { "type": "keywordNumber", "maxNumber": -3 } } }"#),
            99
        );
    }
}
