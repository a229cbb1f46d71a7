//! # Theme Tracker
//! Day-scoped duplicate-theme suppression for commentary selection. Keeps a
//! bounded FIFO of the last 10 extracted themes, persisted as JSON
//! `{ "day": "YYYY-MM-DD", "themes": [...] }`. A persisted window from a
//! different day is discarded on load, so themes never leak across days.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_THEME_CAPACITY: usize = 10;

const STOPWORDS: &[&str] = &[
    "the", "in", "of", "and", "to", "a", "after", "on", "for", "with", "is", "are", "will",
    "has", "have",
];

static RE_CAPITALIZED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][a-zA-Z]+\b").expect("capitalized-word regex"));
static RE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("word regex"));

fn is_stopword(w: &str) -> bool {
    STOPWORDS.contains(&w)
}

/// Extract a short theme token from a headline: the first capitalized
/// multi-letter word (proper-noun proxy), else the first two non-stopword
/// lowercase tokens joined by a space, else `"market"`.
pub fn extract_theme(headline: &str) -> String {
    for m in RE_CAPITALIZED.find_iter(headline) {
        let w = m.as_str();
        if w.len() > 2 && !is_stopword(&w.to_lowercase()) {
            return w.to_string();
        }
    }
    let lower = headline.to_lowercase();
    let tokens: Vec<&str> = RE_WORD
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|w| w.len() > 2 && !is_stopword(w))
        .take(2)
        .collect();
    if tokens.is_empty() {
        "market".to_string()
    } else {
        tokens.join(" ")
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ThemeWindowFile {
    day: String,
    themes: Vec<String>,
}

/// Bounded, day-scoped window of recently used themes.
#[derive(Debug)]
pub struct ThemeTracker {
    path: PathBuf,
    day: NaiveDate,
    themes: VecDeque<String>,
    capacity: usize,
}

impl ThemeTracker {
    /// Load the persisted window if it belongs to today (UTC); otherwise
    /// start empty. A missing or corrupted file also starts empty.
    pub fn load(path: &Path, capacity: usize) -> Self {
        let today = Utc::now().date_naive();
        let mut tracker = Self {
            path: path.to_path_buf(),
            day: today,
            themes: VecDeque::with_capacity(capacity),
            capacity,
        };

        match fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<ThemeWindowFile>(&raw) {
                Ok(file) if file.day == today.to_string() => {
                    for theme in file.themes.into_iter() {
                        tracker.push_bounded(theme);
                    }
                    tracing::info!(count = tracker.themes.len(), "loaded theme window for today");
                }
                Ok(file) => {
                    tracing::info!(
                        stored_day = %file.day,
                        today = %today,
                        "theme window is from another day, starting fresh"
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, "theme window file corrupted, starting fresh");
                }
            },
            Err(_) => {
                tracing::info!("no theme window on disk, starting fresh");
            }
        }
        tracker
    }

    /// Case-insensitive membership test: exact match, or containment either
    /// way for themes longer than 3 chars. Empty themes count as duplicates
    /// so they are never selected.
    pub fn is_duplicate(&self, theme: &str) -> bool {
        if theme.is_empty() {
            return true;
        }
        let new = theme.to_lowercase();
        self.themes.iter().any(|existing| {
            let old = existing.to_lowercase();
            new == old || (new.len() > 3 && old.len() > 3 && (old.contains(&new) || new.contains(&old)))
        })
    }

    /// Append a theme (evicting the oldest beyond capacity) and persist.
    /// Rolls the window over first if the UTC day changed since load.
    pub fn track(&mut self, theme: &str) -> Result<()> {
        if theme.is_empty() {
            tracing::warn!("refusing to track empty theme");
            return Ok(());
        }
        self.rollover_if_new_day();
        self.push_bounded(theme.to_string());
        self.save()
    }

    pub fn themes(&self) -> impl Iterator<Item = &str> {
        self.themes.iter().map(|s| s.as_str())
    }

    fn rollover_if_new_day(&mut self) {
        let today = Utc::now().date_naive();
        if today != self.day {
            tracing::info!(old_day = %self.day, new_day = %today, "theme window day rollover");
            self.themes.clear();
            self.day = today;
        }
    }

    fn push_bounded(&mut self, theme: String) {
        self.themes.push_back(theme);
        while self.themes.len() > self.capacity {
            self.themes.pop_front();
        }
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating theme dir {}", parent.display()))?;
        }
        let file = ThemeWindowFile {
            day: self.day.to_string(),
            themes: self.themes.iter().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json.as_bytes())
            .with_context(|| format!("writing theme window {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing theme window {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theme_prefers_capitalized_entity() {
        assert_eq!(extract_theme("Apple beats earnings estimates"), "Apple");
        // Leading stopword capitalized by sentence position is skipped.
        assert_eq!(extract_theme("The Nvidia rally continues"), "Nvidia");
    }

    #[test]
    fn theme_falls_back_to_significant_tokens() {
        assert_eq!(extract_theme("oil prices slide again"), "oil prices");
        assert_eq!(extract_theme(""), "market");
    }

    #[test]
    fn duplicate_check_is_case_insensitive_with_containment() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = ThemeTracker::load(&dir.path().join("recent_themes.json"), 10);
        t.track("Nvidia").unwrap();
        assert!(t.is_duplicate("nvidia"));
        assert!(t.is_duplicate("NVIDIA rally"));
        assert!(!t.is_duplicate("Apple"));
        assert!(t.is_duplicate(""));
    }

    #[test]
    fn window_is_bounded_fifo() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = ThemeTracker::load(&dir.path().join("recent_themes.json"), 3);
        for theme in ["a1", "b2", "c3", "d4"] {
            t.track(theme).unwrap();
        }
        let kept: Vec<&str> = t.themes().collect();
        assert_eq!(kept, vec!["b2", "c3", "d4"]);
    }

    #[test]
    fn stale_day_on_disk_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recent_themes.json");
        let yesterday = (Utc::now().date_naive() - chrono::Days::new(1)).to_string();
        std::fs::write(
            &path,
            format!(r#"{{"day":"{yesterday}","themes":["Nvidia","Apple"]}}"#),
        )
        .unwrap();
        let t = ThemeTracker::load(&path, 10);
        assert!(!t.is_duplicate("Nvidia"));
        assert!(!t.is_duplicate("Apple"));
        assert_eq!(t.themes().count(), 0);
    }
}
