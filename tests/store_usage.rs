// tests/store_usage.rs
// Score store persistence: round-trips, schema migration, at-most-once
// usage marking, and crash safety of the atomic rewrite.

use chrono::Utc;
use headline_pipeline::record::{parse_timestamp, HeadlineRecord, UsageState};
use headline_pipeline::store::ScoreStore;
use headline_pipeline::Category;

fn record(headline: &str, score: u8, ts: &str) -> HeadlineRecord {
    HeadlineRecord {
        score,
        headline: headline.to_string(),
        url: format!("https://example.com/{score}"),
        ticker: Category::Macro,
        summary: "A short summary.".to_string(),
        timestamp: parse_timestamp(ts).unwrap(),
        used_in_hourly_commentary: UsageState::Unused,
        filter_reason: String::new(),
    }
}

#[test]
fn append_then_read_is_field_identical() {
    let dir = tempfile::tempdir().unwrap();
    let store = ScoreStore::aggregate(dir.path());

    let rec = record("Fed hikes rates", 8, "2024-03-01T14:05:00.123456");
    store.append(&rec).unwrap();

    let rows = store.read_all().unwrap();
    assert_eq!(rows, vec![rec]);
}

#[test]
fn missing_file_reads_as_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = ScoreStore::aggregate(dir.path());
    assert!(store.read_all().unwrap().is_empty());
}

#[test]
fn mark_used_is_at_most_once_for_the_reader() {
    let dir = tempfile::tempdir().unwrap();
    let store = ScoreStore::aggregate(dir.path());
    let today = Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string();

    store.append(&record("Top story", 9, &today)).unwrap();
    store.append(&record("Second story", 7, &today)).unwrap();

    let day = Utc::now().date_naive();
    let first = store.read_unused_on(day).unwrap().unwrap();
    assert_eq!(first.headline, "Top story");

    let updated = store.mark_used("Top story", UsageState::Used).unwrap();
    assert_eq!(updated, 1);

    // The marked row must never come back.
    let next = store.read_unused_on(day).unwrap().unwrap();
    assert_eq!(next.headline, "Second story");

    store
        .mark_used("Second story", UsageState::Skipped("filtered".into()))
        .unwrap();
    assert!(store.read_unused_on(day).unwrap().is_none());

    // Skip reasons land in both usage columns.
    let rows = store.read_all().unwrap();
    let second = rows.iter().find(|r| r.headline == "Second story").unwrap();
    assert_eq!(
        second.used_in_hourly_commentary,
        UsageState::Skipped("filtered".into())
    );
    assert_eq!(second.filter_reason, "filtered");
}

#[test]
fn duplicate_headline_text_marks_all_rows_but_id_marks_one() {
    let dir = tempfile::tempdir().unwrap();
    let store = ScoreStore::aggregate(dir.path());

    let mut a = record("Same wire headline", 8, "2024-03-01T10:00:00.000000");
    a.url = "https://wire-a.example.com".into();
    let mut b = record("Same wire headline", 8, "2024-03-01T11:00:00.000000");
    b.url = "https://wire-b.example.com".into();
    store.append(&a).unwrap();
    store.append(&b).unwrap();

    // Text matching updates every matching row.
    assert_eq!(store.mark_used("Same wire headline", UsageState::Used).unwrap(), 2);

    // Reset one row and mark by stable id: only that row changes.
    let dir2 = tempfile::tempdir().unwrap();
    let store2 = ScoreStore::aggregate(dir2.path());
    store2.append(&a).unwrap();
    store2.append(&b).unwrap();
    assert_eq!(store2.mark_used_by_id(&a.record_id(), UsageState::Used).unwrap(), 1);
    let rows = store2.read_all().unwrap();
    assert_eq!(rows[0].used_in_hourly_commentary, UsageState::Used);
    assert_eq!(rows[1].used_in_hourly_commentary, UsageState::Unused);
}

#[test]
fn legacy_files_are_migrated_on_rewrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scored_headlines.csv");
    // Pre-summary, pre-usage schema.
    std::fs::write(
        &path,
        "score,headline,url,ticker,timestamp\n\
         8,Old format story,https://example.com,macro,2024-03-01T10:00:00.000000\n\
         7,Another old story,https://example.com,equity,2024-03-01T11:00:00.000000\n",
    )
    .unwrap();

    let store = ScoreStore::at(path.clone());
    let rows = store.read_all().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.used_in_hourly_commentary.is_unused()));
    assert!(rows.iter().all(|r| r.summary.is_empty()));

    store.mark_used("Old format story", UsageState::Used).unwrap();

    // The rewrite upgraded the header and defaulted the untouched row.
    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.starts_with(
        "score,headline,url,ticker,summary,timestamp,used_in_hourly_commentary,filter_reason"
    ));
    assert!(raw.contains("Another old story"));
    let rows = store.read_all().unwrap();
    assert_eq!(rows[0].used_in_hourly_commentary, UsageState::Used);
    assert_eq!(rows[1].used_in_hourly_commentary, UsageState::Unused);
}

#[test]
fn corrupt_row_is_skipped_on_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scored_headlines.csv");
    let today = Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string();
    std::fs::write(
        &path,
        format!(
            "score,headline,url,ticker,summary,timestamp,used_in_hourly_commentary,filter_reason\n\
             8,Good row,https://example.com,macro,,{today},False,\n\
             7,Broken row,https://example.com,macro,,not-a-timestamp,False,\n\
             6,Another good row,https://example.com,equity,,{today},False,\n"
        ),
    )
    .unwrap();

    let store = ScoreStore::at(path);
    let rows = store.read_all().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.headline != "Broken row"));

    // Queries keep working around the bad line.
    let day = Utc::now().date_naive();
    let top = store.read_unused_on(day).unwrap().unwrap();
    assert_eq!(top.headline, "Good row");
}

#[test]
fn failed_rewrite_leaves_the_store_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scored_headlines.csv");
    let original = "score,headline,url,ticker,summary,timestamp,used_in_hourly_commentary,filter_reason\n\
         8,Good row,https://example.com,macro,,2024-03-01T10:00:00.000000,False,\n\
         7,Bad row,https://example.com,macro,,not-a-timestamp,False,\n";
    std::fs::write(&path, original).unwrap();

    let store = ScoreStore::at(path.clone());
    assert!(store.mark_used("Good row", UsageState::Used).is_err());

    let after = std::fs::read_to_string(&path).unwrap();
    assert_eq!(after, original);
    // No temp file left behind either.
    assert!(!dir.path().join("scored_headlines.csv.tmp").exists());
}
