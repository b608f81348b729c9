pub(crate) mod results;
pub(crate) mod seed;

use ::scraper::ElementRef;

const BASE_URL: &str = "https://www.pdga.com";

/// Collapse runs of whitespace to single spaces and trim.
pub(crate) fn clean_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whitespace-normalized text content of an element and its descendants.
pub(crate) fn element_text(element: &ElementRef) -> String {
    clean_text(&element.text().collect::<String>())
}

/// Normalize a possibly relative upstream link to an absolute pdga.com URL.
pub(crate) fn absolutize_href(href: &str) -> String {
    let href = href.trim();
    if href.is_empty() || href.starts_with("http") {
        href.to_string()
    } else if href.starts_with('/') {
        format!("{BASE_URL}{href}")
    } else {
        format!("{BASE_URL}/{href}")
    }
}
