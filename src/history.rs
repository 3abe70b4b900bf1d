//! Persisted weigh-in history and progress calculations.
//!
//! History is an append-only JSON array of [`Datapoint`]s in insertion order.
//! Entries are never edited; [`HistoryStore::reset`] drops the whole file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tracing::{debug, info};

use crate::constants::DEFAULT_UNIT;
use crate::error::{Error, Result};

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    pub weight: f64,
    pub unit: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl Datapoint {
    pub fn new(weight: f64, unit: impl Into<String>, timestamp: i64) -> Self {
        Self {
            weight,
            unit: unit.into(),
            timestamp,
        }
    }

    /// A reading taken now.
    pub fn now(weight: f64, unit: impl Into<String>) -> Self {
        Self::new(weight, unit, now_millis())
    }

    /// A settled scale reading taken now. The scale only reports kilograms.
    pub fn reading(kg: f64) -> Self {
        Self::now(kg, DEFAULT_UNIT)
    }
}

pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty history.
    pub fn load(&self) -> Result<Vec<Datapoint>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(&self.path, e)),
        };
        serde_json::from_str(&contents).map_err(|source| Error::Json {
            path: self.path.clone(),
            source,
        })
    }

    pub fn append(&self, datapoint: Datapoint) -> Result<Vec<Datapoint>> {
        let mut data = self.load()?;
        data.push(datapoint);
        self.save(&data)?;
        debug!(path = %self.path.display(), entries = data.len(), "history appended");
        Ok(data)
    }

    pub fn reset(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "history cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(&self.path, e)),
        }
    }

    fn save(&self, data: &[Datapoint]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let json = serde_json::to_string(data).map_err(|source| Error::Json {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, json).map_err(|e| Error::io(&self.path, e))
    }
}

/// Weight difference between two datapoints, or 0 when either is missing.
pub fn change_since(before: Option<&Datapoint>, after: Option<&Datapoint>) -> f64 {
    match (before, after) {
        (Some(before), Some(after)) => after.weight - before.weight,
        _ => 0.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl Direction {
    pub fn of(amount: f64) -> Self {
        if amount > 0.0 {
            Direction::Up
        } else if amount < 0.0 {
            Direction::Down
        } else {
            Direction::Flat
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Direction::Up => "▲",
            Direction::Down => "▼",
            Direction::Flat => " ",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub amount: f64,
    pub unit: String,
    /// Start of the compared period, ms since the epoch.
    pub since: i64,
}

impl Change {
    pub fn direction(&self) -> Direction {
        Direction::of(self.amount)
    }

    /// Whole days between `since` and `now_ms`.
    pub fn days_since(&self, now_ms: i64) -> i64 {
        (now_ms - self.since).div_euclid(MS_PER_DAY)
    }

    /// e.g. `▼ 1.50 kg since beginning (March 3, 2026, 12 days ago)`.
    pub fn describe(&self, label: &str, now_ms: i64, offset: UtcOffset) -> String {
        let days = self.days_since(now_ms);
        format!(
            "{} {:.2} {} since {} ({}, {} day{} ago)",
            self.direction().symbol(),
            self.amount.abs(),
            self.unit,
            label,
            format_date(self.since, offset),
            days,
            if days == 1 { "" } else { "s" }
        )
    }
}

/// Calendar date of a millisecond timestamp at `offset`, e.g. `March 3, 2026`.
pub fn format_date(timestamp_ms: i64, offset: UtcOffset) -> String {
    let format = format_description!("[month repr:long] [day padding:none], [year]");
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(timestamp_ms) * 1_000_000)
        .ok()
        .and_then(|dt| dt.to_offset(offset).format(&format).ok())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

/// The machine's UTC offset, or UTC when it cannot be determined.
///
/// The offset can only be read soundly while the process is single-threaded,
/// so call this before starting the async runtime.
pub fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or_else(|e| {
        debug!("local offset unavailable, using UTC: {}", e);
        UtcOffset::UTC
    })
}

/// Progress of a history, optionally against a fresh reading not saved yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub since_beginning: Change,
    /// Only present when there is a fresh reading to compare.
    pub since_last_checkin: Option<Change>,
}

impl Progress {
    pub fn compute(history: &[Datapoint], candidate: Option<&Datapoint>, now_ms: i64) -> Self {
        let oldest = history.first();
        let most_recent = history.last();
        let after = candidate.or(most_recent);

        let since_beginning = Change {
            amount: change_since(oldest, after),
            unit: DEFAULT_UNIT.to_string(),
            since: oldest.map_or(now_ms, |d| d.timestamp),
        };
        let since_last_checkin = candidate.map(|candidate| Change {
            amount: change_since(most_recent, Some(candidate)),
            unit: DEFAULT_UNIT.to_string(),
            since: most_recent.map_or(now_ms, |d| d.timestamp),
        });

        Self {
            since_beginning,
            since_last_checkin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn point(weight: f64, timestamp: i64) -> Datapoint {
        Datapoint::new(weight, "kg", timestamp)
    }

    #[test]
    fn change_is_zero_when_an_endpoint_is_missing() {
        let p = point(80.0, 0);
        assert_eq!(change_since(None, Some(&p)), 0.0);
        assert_eq!(change_since(Some(&p), None), 0.0);
        assert_eq!(change_since(None, None), 0.0);
    }

    #[test]
    fn change_is_after_minus_before() {
        let change = change_since(Some(&point(80.0, 0)), Some(&point(78.5, 1)));
        assert_eq!(change, -1.5);
        assert_eq!(Direction::of(change), Direction::Down);
    }

    #[test]
    fn store_preserves_order_and_resets() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::open(dir.path().join("nested").join("history.json"));
        assert!(store.load().unwrap().is_empty());

        store.append(point(80.0, 1)).unwrap();
        store.append(point(79.2, 2)).unwrap();
        store.append(point(79.9, 3)).unwrap();
        let weights: Vec<f64> = store.load().unwrap().iter().map(|d| d.weight).collect();
        assert_eq!(weights, vec![80.0, 79.2, 79.9]);

        store.reset().unwrap();
        assert!(store.load().unwrap().is_empty());
        store.reset().unwrap();
    }

    #[test]
    fn history_file_uses_plain_field_names() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::open(dir.path().join("history.json"));
        store.append(point(75.3, 1_700_000_000_000)).unwrap();
        let raw = fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw, r#"[{"weight":75.3,"unit":"kg","timestamp":1700000000000}]"#);
    }

    #[test]
    fn corrupt_history_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(HistoryStore::open(path).load(), Err(Error::Json { .. })));
    }

    #[test]
    fn progress_prefers_candidate_over_last_saved() {
        let history = vec![point(82.0, 0), point(80.0, MS_PER_DAY)];
        let candidate = point(79.0, 3 * MS_PER_DAY);

        let progress = Progress::compute(&history, Some(&candidate), 3 * MS_PER_DAY);
        assert_eq!(progress.since_beginning.amount, -3.0);
        assert_eq!(progress.since_beginning.since, 0);
        let last = progress.since_last_checkin.unwrap();
        assert_eq!(last.amount, -1.0);
        assert_eq!(last.since, MS_PER_DAY);

        let progress = Progress::compute(&history, None, 3 * MS_PER_DAY);
        assert_eq!(progress.since_beginning.amount, -2.0);
        assert!(progress.since_last_checkin.is_none());
    }

    #[test]
    fn empty_history_shows_no_change() {
        let progress = Progress::compute(&[], None, 42);
        assert_eq!(progress.since_beginning.amount, 0.0);
        assert_eq!(progress.since_beginning.since, 42);
        assert_eq!(progress.since_beginning.direction(), Direction::Flat);
    }

    #[test]
    fn describe_formats_amount_and_days() {
        let change = Change {
            amount: -1.5,
            unit: "kg".into(),
            since: 0,
        };
        assert_eq!(
            change.describe("beginning", MS_PER_DAY + 5, UtcOffset::UTC),
            "▼ 1.50 kg since beginning (January 1, 1970, 1 day ago)"
        );
        let gain = Change { amount: 0.25, ..change };
        assert_eq!(
            gain.describe("last checkin", 3 * MS_PER_DAY, UtcOffset::UTC),
            "▲ 0.25 kg since last checkin (January 1, 1970, 3 days ago)"
        );
    }

    #[test]
    fn readings_and_progress_are_in_kilograms() {
        let reading = Datapoint::reading(75.3);
        assert_eq!(reading.unit, "kg");
        assert_eq!(reading.weight, 75.3);

        let progress = Progress::compute(&[point(76.0, 0)], Some(&reading), reading.timestamp);
        assert_eq!(progress.since_beginning.unit, "kg");
        assert_eq!(progress.since_last_checkin.unwrap().unit, "kg");
    }

    #[test]
    fn dates_follow_the_given_offset() {
        // 23:00 UTC on January 1, 1970
        let late_evening = 23 * 60 * 60 * 1000;
        assert_eq!(format_date(late_evening, UtcOffset::UTC), "January 1, 1970");
        let east = UtcOffset::from_hms(2, 0, 0).unwrap();
        assert_eq!(format_date(late_evening, east), "January 2, 1970");
        let west = UtcOffset::from_hms(-5, 0, 0).unwrap();
        assert_eq!(format_date(0, west), "December 31, 1969");
    }
}
