//! Document links recovered from free-text CRM notes.

use crate::types::DealField;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

static URL_RE: OnceLock<Regex> = OnceLock::new();

fn url_re() -> &'static Regex {
    URL_RE.get_or_init(|| Regex::new(r#"(?i)https?://[^\s<>)"']+"#).unwrap())
}

/// Every URL in `text`, with trailing sentence punctuation stripped.
pub fn extract_urls(text: &str) -> Vec<String> {
    url_re()
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';']).to_string())
        .collect()
}

/// Classify URLs found across `notes` into link fields using substring
/// `hints`. The first matching URL wins for each field; a URL is assigned to
/// at most one field.
pub fn links_from_notes(
    notes: &[String],
    hints: &BTreeMap<DealField, Vec<String>>,
) -> BTreeMap<DealField, String> {
    let mut seen = HashSet::new();
    let urls: Vec<String> = notes
        .iter()
        .flat_map(|n| extract_urls(n))
        .filter(|u| seen.insert(u.to_lowercase()))
        .collect();

    let mut links = BTreeMap::new();
    for url in urls {
        let low = url.to_lowercase();
        let matched = hints.iter().find(|(field, words)| {
            field.is_link()
                && !links.contains_key(*field)
                && words.iter().any(|w| low.contains(&w.to_lowercase()))
        });
        if let Some((field, _)) = matched {
            links.insert(*field, url);
        }
    }
    links
}
