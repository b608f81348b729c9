use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use itertools::Itertools;
use regex::{Regex, RegexBuilder};
use tracing::warn;

use crate::config::{LabelRule, NamingConfig, SortPolicy};
use crate::model::Event;
use crate::scraper::clean_text;

/// How much text after the keyword is searched for an event number.
const KEYWORD_WINDOW_CHARS: usize = 180;

/// Number patterns near the keyword, most specific first. `{kw}` is replaced
/// by the escaped keyword.
const KEYWORD_NUMBER_PATTERNS: [&str; 8] = [
    r"{kw}[^0-9]{0,40}#\s*0*(\d{1,2})\b",
    r"{kw}[^0-9]{0,80}\bweek\s*0*(\d{1,2})\b",
    r"{kw}[^0-9]{0,80}\bwk\.?\s*0*(\d{1,2})\b",
    r"{kw}[^0-9]{0,80}\bevent\s*0*(\d{1,2})\b",
    r"{kw}[^0-9]{0,80}\bstop\s*0*(\d{1,2})\b",
    r"{kw}[^0-9]{0,80}\bround\s*0*(\d{1,2})\b",
    r"{kw}[^0-9]{0,80}\(\s*0*(\d{1,2})\s*\)",
    r"{kw}[^0-9]{0,40}[-–—]\s*0*(\d{1,2})\b",
];

fn case_insensitive(pattern: &str) -> Option<Regex> {
    match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(pattern, error = %e, "unusable label pattern");
            None
        }
    }
}

/// Derive an event's short label from its upstream name.
///
/// Tries the injected callable, then the declarative keyword rule, then the
/// first word of the name.
pub fn short_label_from_name(name: &str, naming: &NamingConfig) -> String {
    let name = clean_text(name);
    if name.is_empty() {
        return String::new();
    }

    if let Some(custom) = &naming.custom_label {
        match custom.call(&name) {
            Ok(Some(label)) if !clean_text(&label).is_empty() => return clean_text(&label),
            Ok(_) => {}
            Err(e) => warn!(name = %name, error = %e, "custom short label failed; falling back"),
        }
    }

    if let Some(LabelRule::KeywordNumber {
        keyword,
        output_prefix,
        max_number,
    }) = &naming.short_label
    {
        let keyword = keyword.trim();
        let prefix = output_prefix.trim();
        if keyword.is_empty() || prefix.is_empty() {
            warn!(
                keyword,
                prefix, "keyword label rule needs keyword and outputPrefix; ignoring it"
            );
        } else if name.to_lowercase().contains(&keyword.to_lowercase()) {
            return match extract_keyword_number(&name, keyword, *max_number) {
                Some(n) => format!("{prefix}{n}"),
                // may collide; uniquified after discovery
                None => prefix.to_string(),
            };
        }
    }

    let first_word = name.split_whitespace().next().map(str::to_string);
    first_word.unwrap_or(name)
}

/// Find the event number that follows `keyword` in `name`, within `1..=max_number`.
pub fn extract_keyword_number(name: &str, keyword: &str, max_number: u32) -> Option<u32> {
    let name = clean_text(name);
    let keyword = keyword.trim();
    if name.is_empty() || keyword.is_empty() {
        return None;
    }

    let kw = regex::escape(keyword);
    let start = case_insensitive(&kw)?.find(&name)?.start();
    let window: String = name[start..].chars().take(KEYWORD_WINDOW_CHARS).collect();
    let in_range = |n: u32| (1..=max_number).contains(&n);

    for pattern in KEYWORD_NUMBER_PATTERNS {
        let Some(re) = case_insensitive(&pattern.replace("{kw}", &kw)) else {
            continue;
        };
        let n = re
            .captures(&window)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok());
        if let Some(n) = n.filter(|n| in_range(*n)) {
            return Some(n);
        }
    }

    // Any short number after the keyword that does not look like part of a year.
    let tail = window.to_lowercase();
    let number = case_insensitive(r"\b(\d{1,2})\b")?;
    for caps in number.captures_iter(&tail) {
        let Some(m) = caps.get(1) else { continue };
        let Some(n) = m.as_str().parse::<u32>().ok().filter(|n| in_range(*n)) else {
            continue;
        };
        let before = preceding(&tail, m.start(), 6);
        if before.contains("202") || before.contains("203") {
            continue;
        }
        if before.ends_with('-') && preceding(&tail, m.start(), 11).contains("202") {
            continue;
        }
        return Some(n);
    }

    None
}

/// Up to `bytes` bytes of `s` ending at `pos`, widened to a char boundary.
fn preceding(s: &str, pos: usize, bytes: usize) -> &str {
    let mut from = pos.saturating_sub(bytes);
    while !s.is_char_boundary(from) {
        from -= 1;
    }
    &s[from..pos]
}

/// Suffix repeated labels with a running 1-based index, in slice order.
///
/// Must run after sorting: the order decides which event gets which suffix.
/// Labels that occur once are left alone.
pub fn ensure_unique_short_labels(events: &mut [Event]) {
    let counts = events
        .iter()
        .map(|e| e.short_label.trim().to_string())
        .filter(|l| !l.is_empty())
        .counts();

    let mut used: HashMap<String, usize> = HashMap::new();
    for event in events.iter_mut() {
        let base = event.short_label.trim().to_string();
        if counts.get(&base).copied().unwrap_or(0) <= 1 {
            continue;
        }
        let next = used.entry(base.clone()).or_insert(0);
        *next += 1;
        event.short_label = format!("{base}{next}");
    }
}

/// Order events in place according to the series policy. Stable.
pub fn sort_events(events: &mut [Event], policy: &SortPolicy) {
    match policy {
        SortPolicy::Chronological => events.sort_by(compare_chronological),
        SortPolicy::PrefixNumber { prefix } => {
            let re = prefix
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .and_then(|p| case_insensitive(&format!(r"^{}(\d+)$", regex::escape(p))));
            events.sort_by_cached_key(|e| {
                let n = re.as_ref().and_then(|re| {
                    re.captures(e.short_label.trim())
                        .and_then(|c| c.get(1))
                        .and_then(|m| m.as_str().parse::<u64>().ok())
                });
                match n {
                    Some(n) => (0u8, n, String::new()),
                    None => (1u8, 0, e.name.clone()),
                }
            });
        }
    }
}

fn compare_chronological(a: &Event, b: &Event) -> Ordering {
    match (a.start(), b.start()) {
        (Some(x), Some(y)) if x != y => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        _ => a.id.cmp(&b.id).then_with(|| a.name.cmp(&b.name)),
    }
}

/// Report labels still shared after uniquification.
///
/// In debug mode the colliding events get `-<id>` appended; otherwise the
/// collision is only logged. Returns the colliding labels.
pub fn flag_label_collisions(events: &mut [Event], debug: bool) -> Vec<String> {
    let mut by_label: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (idx, event) in events.iter().enumerate() {
        let label = event.short_label.trim();
        if !label.is_empty() {
            by_label.entry(label.to_string()).or_default().push(idx);
        }
    }

    let mut collisions = vec![];
    for (label, indices) in by_label {
        if indices.len() <= 1 {
            continue;
        }
        let ids = indices.iter().map(|&i| events[i].id.as_str()).join(", ");
        warn!(label = %label, ids = %ids, "duplicate event short label");

        if debug {
            for &i in &indices {
                let id = events[i].id.trim().to_string();
                if !id.is_empty() {
                    events[i].short_label = format!("{label}-{id}");
                }
            }
        }
        collisions.push(label);
    }
    collisions
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::config::CustomLabel;
    use crate::model::DateRange;

    fn keyword_rule(keyword: &str, prefix: &str) -> NamingConfig {
        NamingConfig {
            short_label: Some(LabelRule::KeywordNumber {
                keyword: keyword.to_string(),
                output_prefix: prefix.to_string(),
                max_number: 99,
            }),
            ..Default::default()
        }
    }

    fn event(id: &str, name: &str, label: &str, start: Option<(i32, u32, u32)>) -> Event {
        Event {
            id: id.to_string(),
            url: format!("https://www.pdga.com/tour/event/{id}"),
            name: name.to_string(),
            short_label: label.to_string(),
            is_completed: false,
            date_range: start.map(|(y, m, d)| DateRange {
                start: NaiveDate::from_ymd_opt(y, m, d),
                end: None,
                raw: String::new(),
            }),
        }
    }

    fn labels(events: &[Event]) -> Vec<&str> {
        events.iter().map(|e| e.short_label.as_str()).collect()
    }

    #[test]
    fn test_keyword_number_labels() {
        let sows = keyword_rule("sows", "SOWS");
        assert_eq!(short_label_from_name("SOWS Week 3 Singles", &sows), "SOWS3");
        assert_eq!(short_label_from_name("SOWS #12 Doubles", &sows), "SOWS12");
        assert_eq!(short_label_from_name("SOWS - 04", &sows), "SOWS4");
        assert_eq!(short_label_from_name("SOWS Finale", &sows), "SOWS");
        assert_eq!(short_label_from_name("Tuesday Doubles", &sows), "Tuesday");

        let uplay = keyword_rule("uplay", "UPlay");
        assert_eq!(short_label_from_name("UPlay (7)", &uplay), "UPlay7");
        assert_eq!(
            short_label_from_name("UPlay 2025-26 Winter Series Stop 5", &uplay),
            "UPlay5"
        );
    }

    #[test]
    fn test_incomplete_keyword_rule_falls_through() {
        let config = crate::config::SeriesConfig::from_json_str(
            r#"{ "naming": { "eventShortLabel": { "type": "keywordNumber", "keyword": "sows" } } }"#,
        )
        .unwrap();
        assert_eq!(
            short_label_from_name("SOWS Week 3 Singles", &config.naming),
            "SOWS"
        );
        assert_eq!(
            short_label_from_name("Tuesday Doubles", &keyword_rule("", "TD")),
            "Tuesday"
        );
    }

    #[test]
    fn test_fallback_scan_skips_years() {
        assert_eq!(extract_keyword_number("UPlay 2025-26 Winter #3", "uplay", 99), Some(3));
        assert_eq!(extract_keyword_number("UPlay 2025-26 Winter 8", "uplay", 99), Some(8));
        assert_eq!(extract_keyword_number("UPlay 2025-26", "uplay", 99), None);
        assert_eq!(extract_keyword_number("No keyword 5", "uplay", 99), None);
    }

    #[test]
    fn test_max_number_respected() {
        assert_eq!(extract_keyword_number("SOWS Week 42", "sows", 20), None);
        assert_eq!(extract_keyword_number("SOWS Week 0", "sows", 99), None);
    }

    #[test]
    fn test_custom_label_first_then_fallback() {
        let mut naming = keyword_rule("sows", "SOWS");
        naming.custom_label = Some(CustomLabel::new(|name: &str| {
            Ok(name.contains("Finale").then(|| "FIN".to_string()))
        }));
        assert_eq!(short_label_from_name("SOWS Finale", &naming), "FIN");
        assert_eq!(short_label_from_name("SOWS Week 2", &naming), "SOWS2");

        naming.custom_label = Some(CustomLabel::new(|_: &str| Err("boom".into())));
        assert_eq!(short_label_from_name("SOWS Week 2", &naming), "SOWS2");

        naming.custom_label = Some(CustomLabel::new(|_: &str| Ok(Some("  ".to_string()))));
        assert_eq!(short_label_from_name("SOWS Week 2", &naming), "SOWS2");
    }

    #[test]
    fn test_ensure_unique_short_labels() {
        let mut events = vec![
            event("1", "a", "SOWS", None),
            event("2", "b", "UPlay3", None),
            event("3", "c", "SOWS", None),
            event("4", "d", "", None),
            event("5", "e", "", None),
        ];
        ensure_unique_short_labels(&mut events);
        assert_eq!(labels(&events), ["SOWS1", "UPlay3", "SOWS2", "", ""]);
    }

    #[test]
    fn test_unique_labels_property() {
        let mut events: Vec<Event> = (0..12)
            .map(|i| event(&i.to_string(), "n", ["A", "B", "C7", "A"][i % 4], None))
            .collect();
        ensure_unique_short_labels(&mut events);
        assert!(events.iter().map(|e| &e.short_label).all_unique());
        assert!(!labels(&events).contains(&"C7"));

        let mut singles = vec![event("1", "a", "X", None), event("2", "b", "Y", None)];
        ensure_unique_short_labels(&mut singles);
        assert_eq!(labels(&singles), ["X", "Y"]);
    }

    #[test]
    fn test_sort_chronological() {
        let mut events = vec![
            event("30", "Undated B", "c", None),
            event("20", "Late", "b", Some((2025, 6, 1))),
            event("10", "Undated A", "a", None),
            event("40", "Early", "d", Some((2025, 4, 1))),
            event("15", "Same day", "e", Some((2025, 6, 1))),
        ];
        sort_events(&mut events, &SortPolicy::Chronological);
        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["40", "15", "20", "10", "30"]);
    }

    #[test]
    fn test_sort_prefix_number() {
        let mut events = vec![
            event("1", "Zeta", "Misc", None),
            event("2", "x", "UPLAY10", None),
            event("3", "Alpha", "Other", None),
            event("4", "y", "UPlay2", None),
        ];
        sort_events(
            &mut events,
            &SortPolicy::PrefixNumber {
                prefix: Some("UPlay".to_string()),
            },
        );
        assert_eq!(labels(&events), ["UPlay2", "UPLAY10", "Other", "Misc"]);

        sort_events(&mut events, &SortPolicy::PrefixNumber { prefix: None });
        let names: Vec<&str> = events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Alpha", "Zeta", "x", "y"]);
    }

    #[test]
    fn test_flag_label_collisions() {
        let mut events = vec![
            event("11", "a", "DUP", None),
            event("12", "b", "DUP", None),
            event("13", "c", "OK", None),
        ];
        assert_eq!(flag_label_collisions(&mut events, false), ["DUP"]);
        assert_eq!(labels(&events), ["DUP", "DUP", "OK"]);

        assert_eq!(flag_label_collisions(&mut events, true), ["DUP"]);
        assert_eq!(labels(&events), ["DUP-11", "DUP-12", "OK"]);
    }
}
