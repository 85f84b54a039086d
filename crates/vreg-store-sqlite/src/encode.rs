//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings with microsecond
//! precision (`YYYY-MM-DDTHH:MM:SS.ffffffZ`). Every stored timestamp has the
//! same width, so SQLite's string comparison orders them chronologically and
//! the temporal predicates can be evaluated directly on the text columns.
//! UUIDs are stored as hyphenated lowercase strings; payloads as JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;
use vreg_core::{
  entity::{Versioned, VersionedRow},
  interval::Interval,
};

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw column values of one versioned row.
#[derive(Debug, Clone)]
pub struct RawRow {
  pub row_id:      i64,
  pub logical_id:  String,
  pub parent_id:   Option<String>,
  pub start_date:  String,
  pub end_date:    String,
  pub modified_by: String,
  pub data:        String,
}

impl RawRow {
  pub fn from_sql(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      row_id:      row.get(0)?,
      logical_id:  row.get(1)?,
      parent_id:   row.get(2)?,
      start_date:  row.get(3)?,
      end_date:    row.get(4)?,
      modified_by: row.get(5)?,
      data:        row.get(6)?,
    })
  }

  pub fn into_row<P: Versioned>(self) -> Result<VersionedRow<P>> {
    let interval =
      Interval::new(decode_dt(&self.start_date)?, decode_dt(&self.end_date)?)?;
    Ok(VersionedRow {
      row_id: self.row_id,
      logical_id: decode_uuid(&self.logical_id)?,
      interval,
      modified_by: self.modified_by,
      payload: serde_json::from_str(&self.data)?,
    })
  }
}

/// Column values for a row about to be inserted.
#[derive(Debug, Clone)]
pub struct NewRawRow {
  pub logical_id:  String,
  pub parent_id:   Option<String>,
  pub modified_by: String,
  pub data:        String,
}

impl NewRawRow {
  pub fn encode<P: Versioned>(id: Uuid, payload: &P, modified_by: &str) -> Result<Self> {
    Ok(Self {
      logical_id:  encode_uuid(id),
      parent_id:   payload.parent_id().map(encode_uuid),
      modified_by: modified_by.to_owned(),
      data:        serde_json::to_string(payload)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};
  use vreg_core::sentinel::Sentinels;

  use super::*;

  #[test]
  fn encoded_timestamps_sort_chronologically() {
    let base = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
    let times = [
      base,
      base + Duration::microseconds(1),
      base + Duration::milliseconds(10),
      base + Duration::days(400),
      Sentinels::standard().currently_valid_end(),
      Sentinels::standard().draft_deletion_end(),
    ];
    let encoded: Vec<_> = times.iter().copied().map(encode_dt).collect();

    assert!(encoded.iter().all(|s| s.len() == encoded[0].len()));
    assert!(encoded.windows(2).all(|w| w[0] < w[1]));
    for (t, s) in times.iter().zip(&encoded) {
      assert_eq!(decode_dt(s).unwrap(), *t);
    }
  }

  #[test]
  fn decode_rejects_garbage() {
    assert!(matches!(decode_dt("yesterday"), Err(Error::DateParse(_))));
  }
}
