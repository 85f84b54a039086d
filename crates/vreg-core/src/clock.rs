//! Time source for "now".
//!
//! Stores read the clock once per operation, so every row written by one
//! transition shares the same timestamp. Timestamps are truncated to whole
//! microseconds, the precision the stores persist.

use std::sync::Mutex;

use chrono::{DateTime, Duration, SubsecRound as _, Utc};

pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock, in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }
}

/// A clock that only moves when told to. Used by tests and replays.
#[derive(Debug)]
pub struct ManualClock {
  now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
  pub fn new(start: DateTime<Utc>) -> Self {
    Self { now: Mutex::new(start.trunc_subsecs(6)) }
  }

  pub fn set(&self, t: DateTime<Utc>) {
    *self.now.lock().unwrap_or_else(|p| p.into_inner()) = t.trunc_subsecs(6);
  }

  pub fn advance(&self, by: Duration) {
    let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
    *now = (*now + by).trunc_subsecs(6);
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    *self.now.lock().unwrap_or_else(|p| p.into_inner())
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn manual_clock_advances_and_truncates() {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let clock = ManualClock::new(start);
    assert_eq!(clock.now(), start);

    clock.advance(Duration::nanoseconds(1_500));
    assert_eq!(clock.now(), start + Duration::microseconds(1));

    clock.set(start);
    assert_eq!(clock.now(), start);
  }
}
