//! # Headline Records
//! Typed rows of the score store CSV plus the flexible timestamp parsing
//! shared with rotation. Column order is part of the on-disk contract:
//! `score, headline, url, ticker, summary, timestamp,
//! used_in_hourly_commentary, filter_reason`.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::category::Category;

/// Header line written when a store file is first created. Consumers must
/// tolerate legacy files missing the trailing usage columns.
pub const STORE_HEADER: [&str; 8] = [
    "score",
    "headline",
    "url",
    "ticker",
    "summary",
    "timestamp",
    "used_in_hourly_commentary",
    "filter_reason",
];

/// Serialization pattern for store timestamps (naive UTC, microseconds).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Raw scorer input: a headline with an optional source URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeadlineDraft {
    pub headline: String,
    #[serde(default)]
    pub url: String,
}

/// Tri-state usage flag for the hourly commentary consumer.
///
/// Transitions at most once: `Unused -> Used` (posted) or
/// `Unused -> Skipped(reason)` (terminal). Serialized as the literal strings
/// `"False"`, `"True"`, or the free-text reason.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UsageState {
    #[default]
    Unused,
    Used,
    Skipped(String),
}

impl UsageState {
    pub fn is_unused(&self) -> bool {
        matches!(self, UsageState::Unused)
    }

    pub fn as_field(&self) -> std::borrow::Cow<'_, str> {
        match self {
            UsageState::Unused => "False".into(),
            UsageState::Used => "True".into(),
            UsageState::Skipped(reason) => reason.as_str().into(),
        }
    }

    pub fn from_field(s: &str) -> Self {
        let t = s.trim();
        if t.is_empty() || t.eq_ignore_ascii_case("false") {
            UsageState::Unused
        } else if t.eq_ignore_ascii_case("true") {
            UsageState::Used
        } else {
            UsageState::Skipped(t.to_string())
        }
    }
}

impl Serialize for UsageState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_field())
    }
}

impl<'de> Deserialize<'de> for UsageState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(UsageState::from_field(&s))
    }
}

/// One scored headline, one CSV row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeadlineRecord {
    pub score: u8,
    pub headline: String,
    #[serde(default)]
    pub url: String,
    pub ticker: Category,
    #[serde(default)]
    pub summary: String,
    #[serde(with = "store_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub used_in_hourly_commentary: UsageState,
    #[serde(default)]
    pub filter_reason: String,
}

impl HeadlineRecord {
    /// Stable identifier derived from immutable fields. The CSV format is
    /// unchanged; headline-text matching remains available as the migration
    /// path for legacy rows.
    pub fn record_id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.headline.as_bytes());
        hasher.update(b"|");
        hasher.update(self.url.as_bytes());
        hasher.update(b"|");
        hasher.update(self.timestamp.format(TIMESTAMP_FORMAT).to_string().as_bytes());
        let digest = hasher.finalize();
        let mut out = String::with_capacity(16);
        for b in digest.iter().take(8) {
            out.push_str(&format!("{b:02x}"));
        }
        out
    }
}

/// Clamp a raw score into the closed range [1, 10].
pub fn clamp_score(raw: i64) -> u8 {
    raw.clamp(1, 10) as u8
}

/// Parse a generator score response. Accepts integers and floats (rounded),
/// clamped to [1, 10]. `None` for empty or non-numeric responses.
pub fn try_parse_score(response: &str) -> Option<u8> {
    match response.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Some(clamp_score(v.round() as i64)),
        _ => None,
    }
}

/// Like [`try_parse_score`], defaulting failures to score 1.
pub fn parse_score(response: &str) -> u8 {
    try_parse_score(response).unwrap_or(1)
}

/// Flexible timestamp parsing: strict ISO-8601 (with or without offset)
/// first, then mixed-format fallbacks. Naive values are assumed UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let t = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(dt.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: [&str; 3] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d",
    ];
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(t, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
        if fmt == "%Y-%m-%d" {
            if let Ok(d) = chrono::NaiveDate::parse_from_str(t, fmt) {
                return Some(Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0)?));
            }
        }
    }
    None
}

/// Serialize/deserialize `timestamp` as naive UTC with microsecond precision,
/// accepting the mixed legacy formats on read.
mod store_timestamp {
    use super::*;

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&ts.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(de)?;
        parse_timestamp(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("unparseable timestamp: {s:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_parse_and_clamp() {
        assert_eq!(parse_score("7"), 7);
        assert_eq!(parse_score(" 7.4 "), 7);
        assert_eq!(parse_score("-3"), 1);
        assert_eq!(parse_score("42"), 10);
        assert_eq!(parse_score("apple"), 1);
        assert_eq!(parse_score(""), 1);
    }

    #[test]
    fn usage_state_round_trips_literals() {
        assert_eq!(UsageState::from_field("False"), UsageState::Unused);
        assert_eq!(UsageState::from_field("false"), UsageState::Unused);
        assert_eq!(UsageState::from_field(""), UsageState::Unused);
        assert_eq!(UsageState::from_field("True"), UsageState::Used);
        assert_eq!(
            UsageState::from_field("filtered"),
            UsageState::Skipped("filtered".into())
        );
        assert_eq!(UsageState::Used.as_field(), "True");
        assert_eq!(UsageState::Unused.as_field(), "False");
    }

    #[test]
    fn timestamps_parse_both_strict_and_mixed() {
        let a = parse_timestamp("2024-03-01T14:05:00.123456").unwrap();
        assert_eq!(a.format(TIMESTAMP_FORMAT).to_string(), "2024-03-01T14:05:00.123456");
        // Offset-aware input normalizes to UTC.
        let b = parse_timestamp("2024-03-01T15:05:00+01:00").unwrap();
        assert_eq!(b.format(TIMESTAMP_FORMAT).to_string(), "2024-03-01T14:05:00.000000");
        // Space separator fallback.
        assert!(parse_timestamp("2024-03-01 14:05:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn record_id_is_stable_and_distinct() {
        let ts = parse_timestamp("2024-03-01T14:05:00.000000").unwrap();
        let rec = HeadlineRecord {
            score: 8,
            headline: "Fed hikes rates".into(),
            url: "https://example.com/a".into(),
            ticker: Category::Macro,
            summary: String::new(),
            timestamp: ts,
            used_in_hourly_commentary: UsageState::Unused,
            filter_reason: String::new(),
        };
        let mut other = rec.clone();
        other.url = "https://example.com/b".into();
        assert_eq!(rec.record_id(), rec.clone().record_id());
        assert_ne!(rec.record_id(), other.record_id());
        assert_eq!(rec.record_id().len(), 16);
    }
}
