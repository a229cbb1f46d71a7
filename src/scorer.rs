//! # Scorer
//! Assigns a 1–10 market-impact score to each headline via the commentary
//! generator, applies the batch trend-boost pass, filters by per-category
//! threshold, and persists qualifying rows to the aggregate and per-category
//! stores.
//!
//! Failure semantics: one item's scoring failure never aborts the batch
//! (defaults to 1), a failed trend call degrades to "no boost", a failed
//! summary fetch degrades to an empty summary. Only persistence errors
//! propagate, so the scheduler can surface a failed job run.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;

use crate::category::{classify, Category};
use crate::config::PipelineConfig;
use crate::generate::DynGenerator;
use crate::record::{clamp_score, try_parse_score, HeadlineDraft, HeadlineRecord, UsageState};
use crate::store::ScoreStore;
use crate::summary::ArticleSummarizer;

const TREND_BOOST: u8 = 3;
const TREND_MAX_PICKS: usize = 3;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("scorer_headlines_total", "Headlines submitted for scoring.");
        describe_counter!(
            "scorer_failures_total",
            "Score responses that were empty or unparseable (defaulted to 1)."
        );
        describe_counter!(
            "scorer_trend_boosted_total",
            "Headlines boosted by the trend-detection pass."
        );
        describe_counter!(
            "scorer_persisted_total",
            "Headlines at/above their category threshold, persisted."
        );
        describe_counter!(
            "scorer_filtered_total",
            "Headlines below their category threshold, dropped."
        );
        describe_gauge!("scorer_last_run_ts", "Unix ts when the scorer last ran.");
    });
}

pub struct Scorer {
    generator: DynGenerator,
    summarizer: Arc<dyn ArticleSummarizer>,
    config: Arc<PipelineConfig>,
}

impl Scorer {
    pub fn new(
        generator: DynGenerator,
        summarizer: Arc<dyn ArticleSummarizer>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            generator,
            summarizer,
            config,
        }
    }

    /// Score a batch of drafts and persist the qualifying records. Always
    /// returns the persisted records (possibly empty).
    pub async fn score_batch(&self, drafts: Vec<HeadlineDraft>) -> Result<Vec<HeadlineRecord>> {
        ensure_metrics_described();
        let now = Utc::now();
        gauge!("scorer_last_run_ts").set(now.timestamp() as f64);

        // 1) Independent per-item scoring.
        let mut scored: Vec<(HeadlineDraft, Category, u8)> = Vec::with_capacity(drafts.len());
        for draft in drafts {
            counter!("scorer_headlines_total").increment(1);
            let category = classify(&draft.headline);
            let response = self
                .generator
                .generate(&impact_prompt(&draft.headline), 8)
                .await;
            let score = match try_parse_score(&response) {
                Some(s) => s,
                None => {
                    counter!("scorer_failures_total").increment(1);
                    tracing::warn!(
                        headline = %draft.headline,
                        response = %response,
                        "score response unusable, defaulting to 1"
                    );
                    1
                }
            };
            scored.push((draft, category, score));
        }

        // 2) Batch trend pass; a failed call means no boost for anyone.
        if !scored.is_empty() {
            let headlines: Vec<&str> = scored.iter().map(|(d, _, _)| d.headline.as_str()).collect();
            let response = self.generator.generate(&trend_prompt(&headlines), 200).await;
            // The model may repeat a pick; the boost applies at most once.
            let mut seen = std::collections::HashSet::new();
            for pick in response.lines().map(str::trim).filter(|l| !l.is_empty()) {
                if !seen.insert(pick) {
                    continue;
                }
                for (draft, _, score) in scored.iter_mut() {
                    if draft.headline == pick {
                        *score = clamp_score(i64::from(*score) + i64::from(TREND_BOOST));
                        counter!("scorer_trend_boosted_total").increment(1);
                        tracing::info!(headline = %draft.headline, score, "trend boost applied");
                    }
                }
            }
        }

        // 3) Threshold gating + 4) lazy summary + 5) persistence.
        let aggregate = ScoreStore::aggregate(&self.config.paths.data_dir);
        let mut persisted = Vec::new();
        for (draft, category, score) in scored {
            let threshold = self.config.threshold(category);
            if score < threshold {
                counter!("scorer_filtered_total").increment(1);
                tracing::info!(
                    headline = %draft.headline,
                    score,
                    threshold,
                    category = %category,
                    "skipped low-scoring headline"
                );
                continue;
            }

            let summary = self.summarizer.summarize(&draft.url).await;
            let record = HeadlineRecord {
                score,
                headline: draft.headline,
                url: draft.url,
                ticker: category,
                summary,
                timestamp: now,
                used_in_hourly_commentary: UsageState::Unused,
                filter_reason: String::new(),
            };

            aggregate.append(&record)?;
            ScoreStore::for_category(&self.config.paths.data_dir, category).append(&record)?;
            counter!("scorer_persisted_total").increment(1);
            tracing::info!(
                headline = %record.headline,
                score = record.score,
                category = %category,
                "scored and persisted headline"
            );
            persisted.push(record);
        }

        Ok(persisted)
    }
}

fn impact_prompt(headline: &str) -> String {
    format!(
        "As a hedge fund analyst, rate the market impact of this headline on a scale from 1 to 10: '{headline}'\n\
         Weigh immediate price-action potential, policy and economic implications, \
         sector and geopolitical relevance, and how unusual the story is.\n\
         Reply with the number only."
    )
}

fn trend_prompt(headlines: &[&str]) -> String {
    let mut listing = String::new();
    for h in headlines {
        listing.push_str(h);
        listing.push('\n');
    }
    format!(
        "Here are the current candidate headlines:\n{listing}\
         Name up to {TREND_MAX_PICKS} headlines that represent genuinely new or evolving market \
         stories rather than stale ones. Look for policy shifts, evolving geopolitical risk, \
         surprising data, major corporate events, and cross-asset triggers.\n\
         Return each chosen headline verbatim, one per line, with no other text."
    )
}
