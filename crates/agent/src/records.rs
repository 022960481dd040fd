//! Append-only audit log of booking outcomes (`BookingRecord`, §3):
//! "every booking outcome is also persisted" by the facade (§4.12).
//! One JSON object per line, grounded in the job registry's
//! durable-file style (`booking_jobs::registry`) but append rather than
//! rewrite-whole-file, matching the record's own "append-only" contract.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use booking_domain::models::BookingRecord;
use booking_domain::{Error, Result};

pub struct BookingRecordLog {
    path: PathBuf,
}

impl BookingRecordLog {
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir).map_err(Error::Io)?;
        Ok(Self {
            path: data_dir.join("booking_records.jsonl"),
        })
    }

    pub fn append(&self, record: &BookingRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path).map_err(Error::Io)?;
        writeln!(file, "{line}").map_err(Error::Io)?;
        Ok(())
    }

    /// Reads the most recent `limit` records, newest first.
    pub fn recent(&self, limit: usize) -> Vec<BookingRecord> {
        let Ok(text) = std::fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        let mut records: Vec<BookingRecord> = text.lines().filter_map(|l| serde_json::from_str(l).ok()).collect();
        records.reverse();
        records.truncate(limit);
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(status: &str) -> BookingRecord {
        BookingRecord {
            order_id: Some("o1".into()),
            preset: Some(13),
            venue_name: "南洋北苑健身房".into(),
            field_type_name: "篮球场".into(),
            date: "2026-07-29".into(),
            start: "18:00".into(),
            end: "19:00".into(),
            status: status.into(),
            message: "预订成功".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn append_and_read_back_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let log = BookingRecordLog::new(dir.path()).unwrap();
        log.append(&record("success")).unwrap();
        log.append(&record("failed")).unwrap();

        let recent = log.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].status, "failed");
        assert_eq!(recent[1].status, "success");
    }

    #[test]
    fn recent_on_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = BookingRecordLog::new(dir.path()).unwrap();
        assert!(log.recent(5).is_empty());
    }
}
