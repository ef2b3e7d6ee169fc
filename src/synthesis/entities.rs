// src/synthesis/entities.rs
// Regex-based entity extraction over a session's accumulated text, per the
// four classes the worker is specified to recognize.

use crate::db::models::Entity;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    static ref JIRA_RE: Regex = Regex::new(r"[A-Z]{2,10}-\d+").unwrap();
    static ref HASHTAG_RE: Regex = Regex::new(r"#[A-Za-z0-9_]+").unwrap();
    static ref MENTION_RE: Regex = Regex::new(r"@[A-Za-z0-9_]+").unwrap();
    static ref URL_RE: Regex = Regex::new(r"https?://[^\s]+").unwrap();
}

/// Extracts and deduplicates entities, each carrying an occurrence count.
/// Order is not significant; callers that need stability should sort.
pub fn extract_entities(text: &str) -> Vec<Entity> {
    let mut counts: HashMap<(&'static str, String), u32> = HashMap::new();

    for m in JIRA_RE.find_iter(text) {
        *counts.entry(("jira", m.as_str().to_uppercase())).or_insert(0) += 1;
    }
    for m in HASHTAG_RE.find_iter(text) {
        *counts.entry(("hashtag", m.as_str().to_lowercase())).or_insert(0) += 1;
    }
    for m in MENTION_RE.find_iter(text) {
        *counts.entry(("mention", m.as_str().to_lowercase())).or_insert(0) += 1;
    }
    for m in URL_RE.find_iter(text) {
        *counts.entry(("url", m.as_str().to_lowercase())).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .map(|((entity_type, value), count)| Entity {
            entity_type: entity_type.to_string(),
            value,
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find<'a>(entities: &'a [Entity], entity_type: &str, value: &str) -> Option<&'a Entity> {
        entities
            .iter()
            .find(|e| e.entity_type == entity_type && e.value == value)
    }

    #[test]
    fn extracts_and_normalizes_all_four_classes() {
        let text = "Working on PROJ-123 #Bug with @Alice see HTTP://Example.com/x and proj-123 again";
        let entities = extract_entities(text);

        assert_eq!(find(&entities, "jira", "PROJ-123").unwrap().count, 2);
        assert_eq!(find(&entities, "hashtag", "#bug").unwrap().count, 1);
        assert_eq!(find(&entities, "mention", "@alice").unwrap().count, 1);
        assert!(find(&entities, "url", "http://example.com/x").is_some());
    }

    #[test]
    fn empty_text_yields_no_entities() {
        assert!(extract_entities("").is_empty());
    }

    #[test]
    fn lowercase_ticket_like_text_is_not_jira() {
        let entities = extract_entities("proj-123 is not a ticket by itself");
        assert!(find(&entities, "jira", "PROJ-123").is_none());
    }
}
