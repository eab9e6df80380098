//! Outline collection from rendered headings.

use std::collections::{HashMap, HashSet};

use crate::html::strip_tags;
use crate::normalize::normalize_id;
use crate::renderer::{Heading, HeadingInterceptor};

/// One outline (table of contents) entry.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OutlineEntry {
    /// Anchor id of the heading.
    pub id: String,
    /// Display title with inline markup removed.
    pub title: String,
    /// Heading level (1-6).
    pub level: u8,
}

/// Heading interceptor that assigns ids and collects one heading level.
///
/// Every heading gets an id from [`normalize_id`]; an id already used within
/// the same document gets the lowest free `-1`, `-2`, ... suffix, so no two
/// headings share an anchor even when a natural slug looks like a suffixed one. Only headings at the configured
/// level are recorded as outline entries, in document order.
///
/// One collector belongs to one document: create a fresh one per render so
/// nested renders never share state.
pub struct OutlineCollector {
    level: u8,
    entries: Vec<OutlineEntry>,
    used: HashSet<String>,
    next_suffix: HashMap<String, usize>,
}

impl OutlineCollector {
    /// Create a collector that records headings at `level`.
    #[must_use]
    pub fn new(level: u8) -> Self {
        Self {
            level,
            entries: Vec::new(),
            used: HashSet::new(),
            next_suffix: HashMap::new(),
        }
    }

    /// Consume the collector and return the recorded entries.
    #[must_use]
    pub fn into_entries(self) -> Vec<OutlineEntry> {
        self.entries
    }

    fn unique_id(&mut self, text: &str) -> String {
        let base_id = normalize_id(text);
        let id = if self.used.contains(&base_id) {
            let suffix = self.next_suffix.entry(base_id.clone()).or_insert(1);
            while self.used.contains(&format!("{base_id}-{suffix}")) {
                *suffix += 1;
            }
            let id = format!("{base_id}-{suffix}");
            *suffix += 1;
            id
        } else {
            base_id
        };
        self.used.insert(id.clone());
        id
    }
}

impl HeadingInterceptor for OutlineCollector {
    fn heading(&mut self, heading: &Heading<'_>) -> String {
        let id = self.unique_id(heading.text);
        if heading.level == self.level {
            self.entries.push(OutlineEntry {
                id: id.clone(),
                title: strip_tags(heading.html).trim().to_owned(),
                level: heading.level,
            });
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn heading<'a>(level: u8, text: &'a str, html: &'a str) -> Heading<'a> {
        Heading { level, text, html }
    }

    #[test]
    fn test_collects_configured_level_only() {
        let mut outline = OutlineCollector::new(2);
        assert_eq!(outline.heading(&heading(1, "Title", "Title")), "title");
        assert_eq!(outline.heading(&heading(2, "Setup", "Setup")), "setup");
        assert_eq!(outline.heading(&heading(3, "Details", "Details")), "details");
        assert_eq!(
            outline.heading(&heading(2, "Run it", "Run <code>it</code>")),
            "run-it"
        );

        assert_eq!(
            outline.into_entries(),
            vec![
                OutlineEntry {
                    id: "setup".to_owned(),
                    title: "Setup".to_owned(),
                    level: 2,
                },
                OutlineEntry {
                    id: "run-it".to_owned(),
                    title: "Run it".to_owned(),
                    level: 2,
                },
            ]
        );
    }

    #[test]
    fn test_duplicate_ids_get_suffix() {
        let mut outline = OutlineCollector::new(2);
        assert_eq!(outline.heading(&heading(2, "Usage", "Usage")), "usage");
        assert_eq!(outline.heading(&heading(3, "Usage", "Usage")), "usage-1");
        assert_eq!(outline.heading(&heading(2, "Usage", "Usage")), "usage-2");

        let ids: Vec<_> = outline.into_entries().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["usage", "usage-2"]);
    }

    #[test]
    fn test_suffixed_id_never_repeats_natural_id() {
        let mut outline = OutlineCollector::new(2);
        let ids: Vec<String> = ["Usage", "Usage", "Usage 1", "Usage", "Usage 3", "Usage 3"]
            .iter()
            .map(|text| outline.heading(&heading(2, text, text)))
            .collect();
        assert_eq!(
            ids,
            vec!["usage", "usage-1", "usage-1-1", "usage-2", "usage-3", "usage-3-1"]
        );

        // Natural slug first, generated suffix skips it
        let mut outline = OutlineCollector::new(2);
        assert_eq!(outline.heading(&heading(2, "Usage 1", "Usage 1")), "usage-1");
        assert_eq!(outline.heading(&heading(2, "Usage", "Usage")), "usage");
        assert_eq!(outline.heading(&heading(2, "Usage", "Usage")), "usage-2");
    }
}
