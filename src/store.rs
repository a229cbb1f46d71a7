//! # Score Store
//! One CSV file of [`HeadlineRecord`]s: the aggregate feed or one
//! per-category partition. All mutation goes through read-modify-atomic-
//! replace: the original file is untouched until the `rename` succeeds, so a
//! crash mid-write can never leave duplicate or missing rows.
//!
//! A process-wide advisory lock registry (keyed by store path) serializes
//! read-modify-write sequences; overlapping jobs touching the same store are
//! safe within this process.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;

use crate::category::Category;
use crate::record::{HeadlineRecord, UsageState, STORE_HEADER};

static LOCKS: Lazy<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn lock_for(path: &Path) -> Arc<Mutex<()>> {
    let mut map = LOCKS.lock().expect("store lock registry poisoned");
    map.entry(path.to_path_buf())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

/// Handle to a single score-store CSV file.
#[derive(Debug, Clone)]
pub struct ScoreStore {
    path: PathBuf,
}

impl ScoreStore {
    /// The aggregate store (`scored_headlines.csv`).
    pub fn aggregate(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("scored_headlines.csv"),
        }
    }

    /// A per-category partition (`scored_headlines_<category>.csv`).
    pub fn for_category(data_dir: &Path, category: Category) -> Self {
        Self {
            path: data_dir.join(format!("scored_headlines_{category}.csv")),
        }
    }

    /// Open an explicit path (tests, rotation).
    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every parseable row, migrating legacy schemas on the fly: rows
    /// missing the `summary`/usage columns come back with defaults. A row
    /// that fails to parse (e.g. a garbled timestamp) is skipped with a
    /// warning so one bad line never takes the whole store offline. A
    /// missing file is an empty store.
    pub fn read_all(&self) -> Result<Vec<HeadlineRecord>> {
        let guard = lock_for(&self.path);
        let _held = guard.lock().expect("store lock poisoned");
        self.read_lenient_unlocked()
    }

    fn read_lenient_unlocked(&self) -> Result<Vec<HeadlineRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = self.open_reader()?;
        let mut rows = Vec::new();
        for row in reader.deserialize::<HeadlineRecord>() {
            match row {
                Ok(rec) => rows.push(rec),
                Err(e) => {
                    tracing::warn!(
                        store = %self.path.display(),
                        error = %e,
                        "skipping unparseable store row"
                    );
                }
            }
        }
        Ok(rows)
    }

    // The rewrite path must see every row it is about to replace; a parse
    // failure here aborts instead of silently dropping the bad line.
    fn read_strict_unlocked(&self) -> Result<Vec<HeadlineRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = self.open_reader()?;
        let mut rows = Vec::new();
        for row in reader.deserialize::<HeadlineRecord>() {
            let rec = row.with_context(|| format!("parsing row in {}", self.path.display()))?;
            rows.push(rec);
        }
        Ok(rows)
    }

    fn open_reader(&self) -> Result<csv::Reader<fs::File>> {
        csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)
            .with_context(|| format!("opening store {}", self.path.display()))
    }

    /// Append a record, creating the file with a header row if absent.
    pub fn append(&self, record: &HeadlineRecord) -> Result<()> {
        let guard = lock_for(&self.path);
        let _held = guard.lock().expect("store lock poisoned");

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating data dir {}", parent.display()))?;
        }
        let fresh = !self.path.exists();
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening store {}", self.path.display()))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if fresh {
            writer.write_record(STORE_HEADER)?;
        }
        writer.serialize(record)?;
        writer.flush()?;
        Ok(())
    }

    /// Mark every row whose headline equals `headline_text` with the given
    /// usage state. The whole file is rewritten through a temp file and
    /// atomically renamed over the original; on any error the temp file is
    /// removed and the original is left intact.
    ///
    /// Rows that never had the usage columns are migrated to defaults in the
    /// same pass. Returns the number of rows updated.
    pub fn mark_used(&self, headline_text: &str, state: UsageState) -> Result<usize> {
        self.mark_where(|rec| rec.headline == headline_text, state)
    }

    /// Same as [`mark_used`](Self::mark_used) but matched on the stable
    /// derived id, immune to duplicate headline text.
    pub fn mark_used_by_id(&self, record_id: &str, state: UsageState) -> Result<usize> {
        self.mark_where(|rec| rec.record_id() == record_id, state)
    }

    fn mark_where<F>(&self, matches: F, state: UsageState) -> Result<usize>
    where
        F: Fn(&HeadlineRecord) -> bool,
    {
        let guard = lock_for(&self.path);
        let _held = guard.lock().expect("store lock poisoned");

        let mut rows = self.read_strict_unlocked()?;
        let filter_reason = match &state {
            UsageState::Skipped(reason) => reason.clone(),
            _ => String::new(),
        };

        let mut updated = 0usize;
        for rec in rows.iter_mut() {
            if matches(rec) {
                rec.used_in_hourly_commentary = state.clone();
                rec.filter_reason = filter_reason.clone();
                updated += 1;
            }
        }
        if updated == 0 {
            tracing::warn!(store = %self.path.display(), "mark_used matched no rows");
        }

        let bytes = serialize_rows(&rows)?;
        write_atomic(&self.path, &bytes)?;
        tracing::info!(
            store = %self.path.display(),
            updated,
            state = %state.as_field(),
            "marked headline usage"
        );
        Ok(updated)
    }

    /// Highest-scoring record of the given UTC day that is still unused by
    /// the hourly commentary consumer. Rows with unparseable timestamps were
    /// already skipped by `read_all`.
    pub fn read_unused_on(&self, day: NaiveDate) -> Result<Option<HeadlineRecord>> {
        let rows = self.read_all()?;
        Ok(unused_candidates(rows, day).into_iter().next())
    }

    /// All unused records of the given UTC day, sorted by score descending.
    pub fn unused_on(&self, day: NaiveDate) -> Result<Vec<HeadlineRecord>> {
        Ok(unused_candidates(self.read_all()?, day))
    }
}

fn unused_candidates(rows: Vec<HeadlineRecord>, day: NaiveDate) -> Vec<HeadlineRecord> {
    let mut candidates: Vec<HeadlineRecord> = rows
        .into_iter()
        .filter(|r| r.timestamp.date_naive() == day && r.used_in_hourly_commentary.is_unused())
        .collect();
    candidates.sort_by(|a, b| b.score.cmp(&a.score));
    candidates
}

fn serialize_rows(rows: &[HeadlineRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(STORE_HEADER)?;
    for rec in rows {
        writer.serialize(rec)?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow!("flushing rewritten store: {e}"))
}

/// Write `bytes` to `path` via a sibling temp file and `rename`. The rename
/// is the only step that touches the destination; on failure the temp file
/// is cleaned up.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("csv.tmp");
    let result = (|| -> Result<()> {
        let mut f = fs::File::create(&tmp)
            .with_context(|| format!("creating temp file {}", tmp.display()))?;
        f.write_all(bytes)?;
        f.flush()?;
        fs::rename(&tmp, path)
            .with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Convenience for jobs keyed on "today" (UTC).
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}
