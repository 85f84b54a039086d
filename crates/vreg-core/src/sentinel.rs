//! Sentinel timestamps: reserved, never-real instants that encode the
//! non-ordinary lifecycle states.
//!
//! | State                       | start                | end                                    |
//! |-----------------------------|----------------------|----------------------------------------|
//! | Historical                  | real                 | real                                   |
//! | Current                     | real                 | `currently_valid_end`                  |
//! | Draft addition/modification | `draft_start`        | `draft_addition_modification_end`      |
//! | Draft deletion              | `draft_start`        | `draft_deletion_end`                   |
//!
//! The four sentinels are strictly increasing and lie beyond any plausible
//! clock reading, so `end = :sentinel` selects exactly one state and
//! `start <= :t AND :t < end` never matches a draft row for a real `t`.
//!
//! Stored timestamps are fixed-width four-digit-year text, so every instant
//! the store accepts, sentinels included, lies in years 0000 through 9999.
//!
//! Changing the sentinels breaks every stored row, so a [`Sentinels`] value is
//! fixed when a store is created and never read from runtime configuration.

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Column holding the inclusive lower bound of a row's interval.
pub const START_DATE: &str = "start_date";

/// Column holding the exclusive upper bound of a row's interval.
pub const END_DATE: &str = "end_date";

/// The ordered set of sentinel timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentinels {
  currently_valid_end:             DateTime<Utc>,
  draft_start:                     DateTime<Utc>,
  draft_addition_modification_end: DateTime<Utc>,
  draft_deletion_end:              DateTime<Utc>,
}

impl Sentinels {
  /// Build a sentinel set, rejecting any set that is not strictly increasing
  /// or that leaves the four-digit-year range.
  pub fn new(
    currently_valid_end: DateTime<Utc>,
    draft_start: DateTime<Utc>,
    draft_addition_modification_end: DateTime<Utc>,
    draft_deletion_end: DateTime<Utc>,
  ) -> Result<Self> {
    if currently_valid_end <= earliest() || draft_deletion_end > latest() {
      return Err(Error::InvalidInterval(format!(
        "sentinels must lie after {} and no later than {}",
        earliest(),
        latest()
      )));
    }
    if !(currently_valid_end < draft_start
      && draft_start < draft_addition_modification_end
      && draft_addition_modification_end < draft_deletion_end)
    {
      return Err(Error::InvalidInterval(format!(
        "sentinels must be strictly increasing: {currently_valid_end}, \
         {draft_start}, {draft_addition_modification_end}, \
         {draft_deletion_end}"
      )));
    }
    Ok(Self {
      currently_valid_end,
      draft_start,
      draft_addition_modification_end,
      draft_deletion_end,
    })
  }

  /// The registry's standard set: midnight UTC on 1–4 December 9999.
  pub fn standard() -> Self {
    Self {
      currently_valid_end:             midnight(9999, 12, 1),
      draft_start:                     midnight(9999, 12, 2),
      draft_addition_modification_end: midnight(9999, 12, 3),
      draft_deletion_end:              midnight(9999, 12, 4),
    }
  }

  pub fn currently_valid_end(&self) -> DateTime<Utc> {
    self.currently_valid_end
  }

  pub fn draft_start(&self) -> DateTime<Utc> { self.draft_start }

  pub fn draft_addition_modification_end(&self) -> DateTime<Utc> {
    self.draft_addition_modification_end
  }

  pub fn draft_deletion_end(&self) -> DateTime<Utc> {
    self.draft_deletion_end
  }

  /// Whether `t` is an ordinary instant: no earlier than year 0 and strictly
  /// before every sentinel.
  pub fn is_real(&self, t: DateTime<Utc>) -> bool {
    earliest() <= t && t < self.currently_valid_end
  }
}

impl Default for Sentinels {
  fn default() -> Self { Self::standard() }
}

/// `0000-01-01T00:00:00Z`
fn earliest() -> DateTime<Utc> { midnight(0, 1, 1) }

/// `9999-12-31T23:59:59.999999Z`
fn latest() -> DateTime<Utc> {
  midnight(9999, 12, 31) + TimeDelta::days(1) - TimeDelta::microseconds(1)
}

fn midnight(year: i32, month: u32, day: u32) -> DateTime<Utc> {
  NaiveDate::from_ymd_opt(year, month, day)
    .and_then(|d| d.and_hms_opt(0, 0, 0))
    .expect("sentinel dates are valid calendar dates")
    .and_utc()
}
