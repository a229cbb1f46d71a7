// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod category;
pub mod config;
pub mod generate;
pub mod metrics;
pub mod pipeline;
pub mod record;
pub mod rotate;
pub mod scorer;
pub mod store;
pub mod summary;
pub mod themes;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::category::{classify, Category};
pub use crate::config::PipelineConfig;
pub use crate::pipeline::Pipeline;
pub use crate::record::{HeadlineDraft, HeadlineRecord, UsageState};
pub use crate::store::ScoreStore;
pub use crate::themes::{extract_theme, ThemeTracker};
