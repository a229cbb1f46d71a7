//! # Pipeline Context
//! Explicit per-process state object wiring config, stores, theme tracker,
//! and the scorer together. Jobs (scoring, selection, usage marking,
//! rotation) all go through this context instead of module globals, so tests
//! and overlapping jobs stay safe.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::NaiveDate;

use crate::category::Category;
use crate::config::PipelineConfig;
use crate::generate::DynGenerator;
use crate::record::{HeadlineDraft, HeadlineRecord, UsageState};
use crate::rotate;
use crate::scorer::Scorer;
use crate::store::{today_utc, ScoreStore};
use crate::summary::ArticleSummarizer;
use crate::themes::{extract_theme, ThemeTracker};

pub struct Pipeline {
    config: Arc<PipelineConfig>,
    scorer: Scorer,
    themes: Mutex<ThemeTracker>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        generator: DynGenerator,
        summarizer: Arc<dyn ArticleSummarizer>,
    ) -> Self {
        let config = Arc::new(config);
        let themes = ThemeTracker::load(&config.theme_store_path(), config.themes.capacity);
        let scorer = Scorer::new(generator, summarizer, config.clone());
        Self {
            config,
            scorer,
            themes: Mutex::new(themes),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Hourly ingestion entry point: score, boost, filter, persist.
    pub async fn score_batch(&self, drafts: Vec<HeadlineDraft>) -> Result<Vec<HeadlineRecord>> {
        self.scorer.score_batch(drafts).await
    }

    /// Highest-scoring unused headline of `day`, optionally restricted to
    /// one category. Always served from the aggregate store, where usage
    /// marks land; the per-category files are write-only projections.
    pub fn read_unused_headline(
        &self,
        category: Option<Category>,
        day: NaiveDate,
    ) -> Result<Option<HeadlineRecord>> {
        Ok(self.unused_candidates(category, day)?.into_iter().next())
    }

    /// Commentary selection: among today's unused candidates sorted by score
    /// descending, pick the first whose theme is not a recent duplicate and
    /// track its theme. If every candidate is a duplicate, fall back to the
    /// top one anyway (with a warning).
    pub fn select_for_commentary(
        &self,
        category: Option<Category>,
    ) -> Result<Option<HeadlineRecord>> {
        let candidates = self.unused_candidates(category, today_utc())?;
        if candidates.is_empty() {
            tracing::info!("no unused headline available for commentary");
            return Ok(None);
        }

        let mut themes = self.themes.lock().expect("theme tracker mutex poisoned");
        for candidate in &candidates {
            let theme = extract_theme(&candidate.headline);
            if !themes.is_duplicate(&theme) {
                themes.track(&theme)?;
                return Ok(Some(candidate.clone()));
            }
        }

        let fallback = candidates.into_iter().next();
        if let Some(rec) = &fallback {
            tracing::warn!(
                headline = %rec.headline,
                "all candidate themes are recent duplicates, falling back to top score"
            );
        }
        Ok(fallback)
    }

    /// Mark a headline consumed (or skipped with a reason) in the aggregate
    /// store. At-most-once: once non-`Unused`, the row is never selected
    /// again.
    pub fn mark_used(&self, headline_text: &str, state: UsageState) -> Result<usize> {
        self.aggregate_store().mark_used(headline_text, state)
    }

    /// Weekly retention run over all stores and logs.
    pub fn rotate(&self) {
        rotate::rotate_all(&self.config);
    }

    fn unused_candidates(
        &self,
        category: Option<Category>,
        day: NaiveDate,
    ) -> Result<Vec<HeadlineRecord>> {
        let mut rows = self.aggregate_store().unused_on(day)?;
        if let Some(cat) = category {
            rows.retain(|r| r.ticker == cat);
        }
        Ok(rows)
    }

    fn aggregate_store(&self) -> ScoreStore {
        ScoreStore::aggregate(&self.config.paths.data_dir)
    }
}
