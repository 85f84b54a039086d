//! Interval algebra: classification of stored intervals and the predicate
//! fragments used for the current, as-of and draft views.
//!
//! Everything here is pure. Storage backends render a [`Predicate`] into
//! their own query language; [`Predicate::matches`] gives the same answer in
//! memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::{
  Error, Result,
  sentinel::{END_DATE, START_DATE, Sentinels},
};

// ─── Interval ────────────────────────────────────────────────────────────────

/// The half-open validity range `[start, end)` of one stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
  start: DateTime<Utc>,
  end:   DateTime<Utc>,
}

impl Interval {
  /// Fails with [`Error::InvalidInterval`] unless `start < end`.
  pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
    if start >= end {
      return Err(Error::InvalidInterval(format!(
        "start {start} is not before end {end}"
      )));
    }
    Ok(Self { start, end })
  }

  pub fn start(&self) -> DateTime<Utc> { self.start }

  pub fn end(&self) -> DateTime<Utc> { self.end }

  /// Lower bound inclusive, upper bound exclusive.
  pub fn contains(&self, t: DateTime<Utc>) -> bool {
    self.start <= t && t < self.end
  }
}

// ─── States ──────────────────────────────────────────────────────────────────

/// The two draft encodings. Addition and modification share a sentinel; which
/// one a draft is depends on whether the entity has a current row.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize,
  Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DraftKind {
  AdditionModification,
  Deletion,
}

/// The lifecycle state a stored interval encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "kind", rename_all = "snake_case")]
pub enum IntervalState {
  Historical,
  Current,
  Draft(DraftKind),
}

// ─── Predicates ──────────────────────────────────────────────────────────────

/// One of the two temporal columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
  Start,
  End,
}

impl Column {
  pub fn name(self) -> &'static str {
    match self {
      Self::Start => START_DATE,
      Self::End => END_DATE,
    }
  }

  fn read(self, interval: &Interval) -> DateTime<Utc> {
    match self {
      Self::Start => interval.start(),
      Self::End => interval.end(),
    }
  }
}

/// `column <op> value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
  Eq,
  Lt,
  Le,
  Gt,
}

impl Comparison {
  pub fn operator(self) -> &'static str {
    match self {
      Self::Eq => "=",
      Self::Lt => "<",
      Self::Le => "<=",
      Self::Gt => ">",
    }
  }

  fn holds(self, lhs: DateTime<Utc>, rhs: DateTime<Utc>) -> bool {
    match self {
      Self::Eq => lhs == rhs,
      Self::Lt => lhs < rhs,
      Self::Le => lhs <= rhs,
      Self::Gt => lhs > rhs,
    }
  }
}

/// A composable filter over versioned rows.
///
/// Fragments are combined with [`Predicate::and`]; conjunctions are kept flat,
/// so `(a ∧ b) ∧ c` and `a ∧ (b ∧ c)` build the same value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
  Compare {
    column: Column,
    cmp:    Comparison,
    value:  DateTime<Utc>,
  },
  /// Rows of one logical entity.
  LogicalId(Uuid),
  /// Rows whose parent entity is the given id.
  ParentId(Uuid),
  /// Conjunction; the empty conjunction matches every row.
  All(Vec<Predicate>),
}

impl Predicate {
  /// Matches every row.
  pub fn always() -> Self { Self::All(Vec::new()) }

  pub fn compare(column: Column, cmp: Comparison, value: DateTime<Utc>) -> Self {
    Self::Compare { column, cmp, value }
  }

  pub fn for_entity(id: Uuid) -> Self { Self::LogicalId(id) }

  pub fn for_parent(id: Uuid) -> Self { Self::ParentId(id) }

  pub fn and(self, other: Predicate) -> Self {
    let mut parts = self.into_conjuncts();
    parts.extend(other.into_conjuncts());
    match parts.len() {
      1 => parts.remove(0),
      _ => Self::All(parts),
    }
  }

  fn into_conjuncts(self) -> Vec<Predicate> {
    match self {
      Self::All(parts) => parts,
      other => vec![other],
    }
  }

  /// Evaluate against a row's identity and interval.
  pub fn matches(
    &self,
    logical_id: Uuid,
    parent_id: Option<Uuid>,
    interval: &Interval,
  ) -> bool {
    match self {
      Self::Compare { column, cmp, value } => {
        cmp.holds(column.read(interval), *value)
      }
      Self::LogicalId(id) => *id == logical_id,
      Self::ParentId(id) => parent_id == Some(*id),
      Self::All(parts) => {
        parts.iter().all(|p| p.matches(logical_id, parent_id, interval))
      }
    }
  }
}

// ─── Algebra ─────────────────────────────────────────────────────────────────

/// Predicate builders and interval constructors for one sentinel set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TemporalAlgebra {
  sentinels: Sentinels,
}

impl TemporalAlgebra {
  pub fn new(sentinels: Sentinels) -> Self { Self { sentinels } }

  pub fn sentinels(&self) -> &Sentinels { &self.sentinels }

  /// `end = CURRENTLY_VALID_END_DATE`
  pub fn current(&self) -> Predicate {
    Predicate::compare(
      Column::End,
      Comparison::Eq,
      self.sentinels.currently_valid_end(),
    )
  }

  /// `start <= t AND t < end`. Never matches a draft row for a real `t`.
  pub fn as_of(&self, t: DateTime<Utc>) -> Predicate {
    Predicate::compare(Column::Start, Comparison::Le, t)
      .and(Predicate::compare(Column::End, Comparison::Gt, t))
  }

  /// `start = DRAFT_START_DATE`
  pub fn all_drafts(&self) -> Predicate {
    Predicate::compare(Column::Start, Comparison::Eq, self.sentinels.draft_start())
  }

  /// `start = DRAFT_START_DATE AND end = <sentinel for kind>`
  pub fn draft_kind(&self, kind: DraftKind) -> Predicate {
    self.all_drafts().and(Predicate::compare(
      Column::End,
      Comparison::Eq,
      self.draft_end(kind),
    ))
  }

  /// Historical and current rows: everything that is not a draft.
  pub fn non_draft(&self) -> Predicate {
    Predicate::compare(Column::Start, Comparison::Lt, self.sentinels.draft_start())
  }

  /// Historical rows only.
  pub fn closed(&self) -> Predicate {
    Predicate::compare(
      Column::End,
      Comparison::Lt,
      self.sentinels.currently_valid_end(),
    )
  }

  pub fn draft_end(&self, kind: DraftKind) -> DateTime<Utc> {
    match kind {
      DraftKind::AdditionModification => {
        self.sentinels.draft_addition_modification_end()
      }
      DraftKind::Deletion => self.sentinels.draft_deletion_end(),
    }
  }

  /// Which lifecycle state `interval` encodes. Fails for intervals that use a
  /// sentinel in a position no state allows.
  pub fn classify(&self, interval: &Interval) -> Result<IntervalState> {
    let s = &self.sentinels;
    let (start, end) = (interval.start(), interval.end());

    if start == s.draft_start() {
      return if end == s.draft_addition_modification_end() {
        Ok(IntervalState::Draft(DraftKind::AdditionModification))
      } else if end == s.draft_deletion_end() {
        Ok(IntervalState::Draft(DraftKind::Deletion))
      } else {
        Err(Error::InvalidInterval(format!(
          "draft interval ends at {end}, which is not a draft sentinel"
        )))
      };
    }
    if !s.is_real(start) {
      return Err(Error::InvalidInterval(format!(
        "start {start} is a reserved timestamp"
      )));
    }
    if end == s.currently_valid_end() {
      Ok(IntervalState::Current)
    } else if s.is_real(end) {
      Ok(IntervalState::Historical)
    } else {
      Err(Error::InvalidInterval(format!(
        "end {end} is a reserved timestamp other than the current sentinel"
      )))
    }
  }

  /// Fails unless `t` is a real instant: no earlier than year 0 and before
  /// every sentinel.
  pub fn require_real(&self, t: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if self.sentinels.is_real(t) {
      Ok(t)
    } else {
      Err(Error::InvalidInterval(format!(
        "{t} is not a real instant between year 0 and the currently-valid \
         sentinel"
      )))
    }
  }

  /// `[start, CURRENTLY_VALID_END_DATE)`
  pub fn current_from(&self, start: DateTime<Utc>) -> Result<Interval> {
    Interval::new(self.require_real(start)?, self.sentinels.currently_valid_end())
  }

  /// `[DRAFT_START_DATE, <sentinel for kind>)`
  pub fn draft(&self, kind: DraftKind) -> Interval {
    Interval {
      start: self.sentinels.draft_start(),
      end:   self.draft_end(kind),
    }
  }
}
