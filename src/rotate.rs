//! # Retention / Rotation
//! Weekly housekeeping for the score stores and plain log files.
//!
//! Rolling stores are split on the retention cutoff: rows older than the
//! window go to a dated backup, recent rows stay live. The backup is written
//! before the live file is touched, and the live rewrite is atomic, so a
//! failure partway through never loses data. Unparseable timestamps abort
//! that one file's rotation without modifying it.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;

use crate::config::PipelineConfig;
use crate::record::{parse_timestamp, TIMESTAMP_FORMAT};
use crate::store::write_atomic;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "rotation_rows_archived_total",
            "Rows moved from live stores into dated backups."
        );
        describe_counter!(
            "rotation_files_rotated_total",
            "Files rotated (rolling splits and whole-file moves)."
        );
        describe_counter!("rotation_errors_total", "Per-file rotation failures.");
    });
}

/// Rotate one file into `backup_dir`.
///
/// * `rolling=true` (CSV stores): split rows on the cutoff; archive the old
///   partition, keep the recent one live (header-only if empty).
/// * `rolling=false`: move the whole file to a dated backup and, if `headers`
///   were supplied, recreate an empty file with just the header line.
///
/// A missing source file is a no-op, so re-running is always safe.
pub fn rotate_file(
    src: &Path,
    backup_dir: &Path,
    headers: Option<&[&str]>,
    rolling: bool,
    retention_days: i64,
) -> Result<()> {
    ensure_metrics_described();
    if !src.exists() {
        return Ok(());
    }

    let dst = backup_path(src, backup_dir)?;
    let is_csv = src.extension().and_then(|s| s.to_str()) == Some("csv");

    if rolling && is_csv {
        rotate_rolling(src, &dst, retention_days)
    } else {
        fs::rename(src, &dst)
            .with_context(|| format!("moving {} to {}", src.display(), dst.display()))?;
        tracing::info!(src = %src.display(), dst = %dst.display(), "rotated file to backup");
        counter!("rotation_files_rotated_total").increment(1);
        if let Some(cols) = headers {
            fs::write(src, format!("{}\n", cols.join(",")))
                .with_context(|| format!("recreating {} with headers", src.display()))?;
        }
        Ok(())
    }
}

fn rotate_rolling(src: &Path, dst: &Path, retention_days: i64) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(src)
        .with_context(|| format!("opening {}", src.display()))?;
    let header = reader.headers()?.clone();
    let ts_idx = header
        .iter()
        .position(|h| h == "timestamp")
        .ok_or_else(|| anyhow!("{} has no timestamp column", src.display()))?;

    // Parse the whole file up front; one bad timestamp aborts this file
    // with the original left untouched.
    let mut rows: Vec<(csv::StringRecord, DateTime<Utc>)> = Vec::new();
    for row in reader.records() {
        let rec = row.with_context(|| format!("reading {}", src.display()))?;
        let raw = rec
            .get(ts_idx)
            .ok_or_else(|| anyhow!("row in {} is missing the timestamp field", src.display()))?;
        let ts = parse_timestamp(raw)
            .ok_or_else(|| anyhow!("unparseable timestamp {raw:?} in {}", src.display()))?;
        rows.push((rec, ts));
    }

    let cutoff = Utc::now() - Duration::days(retention_days);
    let (recent, old): (Vec<_>, Vec<_>) = rows.into_iter().partition(|(_, ts)| *ts > cutoff);

    // Backup first, independently of the live rewrite.
    if !old.is_empty() {
        let bytes = serialize_partition(&header, &old, ts_idx)?;
        fs::write(dst, bytes).with_context(|| format!("writing backup {}", dst.display()))?;
        counter!("rotation_rows_archived_total").increment(old.len() as u64);
        tracing::info!(
            src = %src.display(),
            dst = %dst.display(),
            archived = old.len(),
            "archived old rows"
        );
    }

    let live = serialize_partition(&header, &recent, ts_idx)?;
    write_atomic(src, &live)?;
    counter!("rotation_files_rotated_total").increment(1);
    tracing::info!(src = %src.display(), retained = recent.len(), "retained recent rows");
    Ok(())
}

/// Serialize header + rows, re-serializing the timestamp column to the fixed
/// microsecond ISO pattern. All other columns pass through untouched.
fn serialize_partition(
    header: &csv::StringRecord,
    rows: &[(csv::StringRecord, DateTime<Utc>)],
    ts_idx: usize,
) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    writer.write_record(header)?;
    for (rec, ts) in rows {
        let mut out = csv::StringRecord::new();
        for (i, field) in rec.iter().enumerate() {
            if i == ts_idx {
                out.push_field(&ts.format(TIMESTAMP_FORMAT).to_string());
            } else {
                out.push_field(field);
            }
        }
        writer.write_record(&out)?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow!("flushing rotated rows: {e}"))
}

fn backup_path(src: &Path, backup_dir: &Path) -> Result<PathBuf> {
    let name = src
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("{} has no file name", src.display()))?;
    let ext = src.extension().and_then(|s| s.to_str());
    let dst_dir = backup_dir.join(format!("{name}_backup"));
    fs::create_dir_all(&dst_dir)
        .with_context(|| format!("creating backup dir {}", dst_dir.display()))?;
    let date = Utc::now().format("%Y-%m-%d");
    let file = match ext {
        Some(ext) => format!("{name}_{date}.{ext}"),
        None => format!("{name}_{date}"),
    };
    Ok(dst_dir.join(file))
}

/// Weekly rotation entry point: rolling retention for the aggregate and
/// per-category stores, whole-file rotation for plain logs. One file's
/// failure never stops the rest of the run.
pub fn rotate_all(config: &PipelineConfig) {
    ensure_metrics_described();
    tracing::info!("starting store rotation");

    let headers = crate::record::STORE_HEADER;
    let data = &config.paths.data_dir;
    let backup = &config.paths.backup_dir;
    let days = config.retention.days;

    let mut stores = vec![data.join("scored_headlines.csv")];
    for cat in crate::category::Category::all() {
        stores.push(data.join(format!("scored_headlines_{cat}.csv")));
    }
    for path in stores {
        if let Err(e) = rotate_file(&path, backup, Some(&headers), true, days) {
            counter!("rotation_errors_total").increment(1);
            tracing::error!(file = %path.display(), error = %e, "rolling rotation failed");
        }
    }

    for log in &config.retention.log_files {
        let path = config.paths.log_dir.join(log);
        if let Err(e) = rotate_file(&path, backup, None, false, days) {
            counter!("rotation_errors_total").increment(1);
            tracing::error!(file = %path.display(), error = %e, "log rotation failed");
        }
    }

    tracing::info!("store rotation complete");
}
