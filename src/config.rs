//! Pipeline configuration: data/backup/log directories, retention window,
//! theme window capacity, and per-category score thresholds.
//!
//! Resolution order: `$PIPELINE_CONFIG_PATH`, then `config/pipeline.toml`,
//! then built-in defaults. Every field is optional in the file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::category::Category;

pub const ENV_CONFIG_PATH: &str = "PIPELINE_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/pipeline.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub retention: RetentionConfig,
    pub themes: ThemesConfig,
    pub thresholds: ThresholdsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub log_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Rolling window in days; rows older than this are archived.
    pub days: i64,
    /// Plain log files rotated wholesale into dated backups.
    pub log_files: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThemesConfig {
    pub capacity: usize,
}

/// Per-category persistence thresholds; an item is stored only when its
/// boosted score meets its category's bar.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThresholdsConfig {
    pub equity: u8,
    #[serde(rename = "macro")]
    pub macro_: u8,
    pub political: u8,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            backup_dir: PathBuf::from("backups"),
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            days: 7,
            log_files: vec![
                "gpt.log".to_string(),
                "scorer.log".to_string(),
                "rss_fetch.log".to_string(),
            ],
        }
    }
}

impl Default for ThemesConfig {
    fn default() -> Self {
        Self {
            capacity: crate::themes::DEFAULT_THEME_CAPACITY,
        }
    }
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            equity: 6,
            macro_: 8,
            political: 7,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            retention: RetentionConfig::default(),
            themes: ThemesConfig::default(),
            thresholds: ThresholdsConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load using env var + fallbacks. An explicit `$PIPELINE_CONFIG_PATH`
    /// must exist; the default path is optional.
    pub fn load() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to a non-existent path"));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load_from(&default);
        }
        Ok(Self::default())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let cfg: Self = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(cfg)
    }

    pub fn threshold(&self, category: Category) -> u8 {
        match category {
            Category::Equity => self.thresholds.equity,
            Category::Macro => self.thresholds.macro_,
            Category::Political => self.thresholds.political,
        }
    }

    /// Path of the persisted theme window.
    pub fn theme_store_path(&self) -> PathBuf {
        self.paths.data_dir.join("recent_themes.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn defaults_match_policy() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.threshold(Category::Equity), 6);
        assert_eq!(cfg.threshold(Category::Macro), 8);
        assert_eq!(cfg.threshold(Category::Political), 7);
        assert_eq!(cfg.retention.days, 7);
        assert_eq!(cfg.themes.capacity, 10);
    }

    #[test]
    fn partial_toml_overlays_defaults() {
        let toml = r#"
            [thresholds]
            macro = 9

            [retention]
            days = 14
        "#;
        let cfg: PipelineConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.threshold(Category::Macro), 9);
        assert_eq!(cfg.threshold(Category::Equity), 6);
        assert_eq!(cfg.retention.days, 14);
        assert_eq!(cfg.paths.data_dir, PathBuf::from("data"));
    }

    #[serial_test::serial]
    #[test]
    fn env_path_must_exist() {
        env::set_var(ENV_CONFIG_PATH, "/definitely/not/here.toml");
        assert!(PipelineConfig::load().is_err());
        env::remove_var(ENV_CONFIG_PATH);
    }
}
