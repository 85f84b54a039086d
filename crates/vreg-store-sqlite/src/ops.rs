//! The lifecycle transitions, as synchronous functions run inside one
//! transaction.
//!
//! Each function reads the entity's current and draft rows, checks the
//! transition against [`LifecycleState`], then issues its writes. A rule
//! violation aborts with [`Abort::Rule`] before any write, and the caller
//! rolls the transaction back.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;
use vreg_core::{
  entity::{DraftAction, EntityKind, TableSpec},
  interval::{DraftKind, Predicate, TemporalAlgebra},
  lifecycle::{LifecycleOp, LifecycleState},
};

use crate::{
  encode::{NewRawRow, RawRow, encode_dt},
  query,
};

// ─── Abort ───────────────────────────────────────────────────────────────────

/// Why a transaction body stopped early.
#[derive(Debug)]
pub enum Abort {
  Sql(rusqlite::Error),
  Rule(vreg_core::Error),
}

impl From<rusqlite::Error> for Abort {
  fn from(e: rusqlite::Error) -> Self { Self::Sql(e) }
}

impl From<vreg_core::Error> for Abort {
  fn from(e: vreg_core::Error) -> Self { Self::Rule(e) }
}

pub type OpResult<T> = std::result::Result<T, Abort>;

// ─── Target ──────────────────────────────────────────────────────────────────

/// One logical entity of one kind, plus the algebra used to address its rows.
#[derive(Debug, Clone, Copy)]
pub struct Target {
  pub kind:    EntityKind,
  pub id:      Uuid,
  pub algebra: TemporalAlgebra,
}

/// The rows that decide an entity's lifecycle state.
#[derive(Debug)]
pub struct Snapshot {
  pub current: Option<RawRow>,
  pub draft:   Option<(DraftAction, RawRow)>,
}

impl Snapshot {
  pub fn state(&self) -> LifecycleState {
    LifecycleState {
      draft:       self.draft.as_ref().map(|(action, _)| *action),
      has_current: self.current.is_some(),
    }
  }
}

impl Target {
  fn spec(&self) -> TableSpec { self.kind.table() }

  fn current_end(&self) -> String {
    encode_dt(self.algebra.sentinels().currently_valid_end())
  }

  pub fn snapshot(&self, conn: &Connection) -> rusqlite::Result<Snapshot> {
    let spec = self.spec();
    let entity = Predicate::for_entity(self.id);

    let current =
      query::select_one(conn, &spec, &entity.clone().and(self.algebra.current()))?;
    let draft =
      query::select_one(conn, &spec, &entity.and(self.algebra.all_drafts()))?;

    let deletion_end = encode_dt(self.algebra.draft_end(DraftKind::Deletion));
    let draft = draft.map(|row| {
      let kind = if row.end_date == deletion_end {
        DraftKind::Deletion
      } else {
        DraftKind::AdditionModification
      };
      (DraftAction::resolve(kind, current.is_some()), row)
    });

    Ok(Snapshot { current, draft })
  }

  /// Check `op` against the entity's state, returning the snapshot it was
  /// checked against.
  fn check(&self, conn: &Connection, op: LifecycleOp) -> OpResult<Snapshot> {
    let snap = self.snapshot(conn)?;
    snap.state().apply(self.kind, self.id, op)?;
    Ok(snap)
  }

  fn conflict(&self, at: DateTime<Utc>) -> Abort {
    Abort::Rule(vreg_core::Error::WriteConflict {
      kind: self.kind,
      id: self.id,
      at,
    })
  }

  /// A new current interval may not start before the entity's history ends.
  fn ensure_after_history(&self, conn: &Connection, at: DateTime<Utc>) -> OpResult<()> {
    let closed = Predicate::for_entity(self.id).and(self.algebra.closed());
    if let Some(end) = query::max_end(conn, &self.spec(), &closed)?
      && end > encode_dt(at)
    {
      return Err(self.conflict(at));
    }
    Ok(())
  }

  /// `at` must fall strictly after the start of the row being closed.
  fn ensure_after_start(&self, row: &RawRow, at: DateTime<Utc>) -> OpResult<()> {
    if encode_dt(at) <= row.start_date {
      return Err(self.conflict(at));
    }
    Ok(())
  }

  fn require<T>(&self, row: Option<T>) -> OpResult<T> {
    row.ok_or_else(|| {
      Abort::Rule(vreg_core::Error::NotFound { kind: self.kind, id: self.id })
    })
  }

  fn require_draft(
    &self,
    draft: Option<(DraftAction, RawRow)>,
  ) -> OpResult<(DraftAction, RawRow)> {
    draft.ok_or_else(|| {
      Abort::Rule(vreg_core::Error::NoDraft { kind: self.kind, id: self.id })
    })
  }

  fn close(&self, conn: &Connection, mut row: RawRow, at: DateTime<Utc>) -> OpResult<RawRow> {
    let end = encode_dt(at);
    query::set_end(conn, &self.spec(), row.row_id, &end)?;
    row.end_date = end;
    Ok(row)
  }

  // ── Committed writes ──────────────────────────────────────────────────

  pub fn create(&self, conn: &Connection, row: NewRawRow, now: DateTime<Utc>) -> OpResult<RawRow> {
    self.check(conn, LifecycleOp::Create)?;
    self.ensure_after_history(conn, now)?;
    let start = encode_dt(self.algebra.current_from(now)?.start());
    Ok(query::insert_row(conn, &self.spec(), row, start, self.current_end())?)
  }

  pub fn supersede(
    &self,
    conn: &Connection,
    row: NewRawRow,
    effective: DateTime<Utc>,
  ) -> OpResult<RawRow> {
    let snap = self.check(conn, LifecycleOp::Supersede)?;
    let current = self.require(snap.current)?;
    let start = encode_dt(self.algebra.current_from(effective)?.start());
    self.ensure_after_start(&current, effective)?;

    self.close(conn, current, effective)?;
    Ok(query::insert_row(conn, &self.spec(), row, start, self.current_end())?)
  }

  pub fn retire(&self, conn: &Connection, effective: DateTime<Utc>) -> OpResult<RawRow> {
    let snap = self.check(conn, LifecycleOp::Retire)?;
    let current = self.require(snap.current)?;
    self.algebra.require_real(effective)?;
    self.ensure_after_start(&current, effective)?;
    self.close(conn, current, effective)
  }

  // ── Drafts ────────────────────────────────────────────────────────────

  pub fn propose(
    &self,
    conn: &Connection,
    action: DraftAction,
    row: NewRawRow,
  ) -> OpResult<RawRow> {
    let op = match action {
      DraftAction::Addition => LifecycleOp::ProposeAddition,
      DraftAction::Modification => LifecycleOp::ProposeModification,
      DraftAction::Deletion => LifecycleOp::ProposeDeletion,
    };
    self.check(conn, op)?;
    self.insert_draft(conn, action.stored_kind(), row)
  }

  /// A deletion draft carries a copy of the current payload.
  pub fn propose_deletion(&self, conn: &Connection, modified_by: String) -> OpResult<RawRow> {
    let snap = self.check(conn, LifecycleOp::ProposeDeletion)?;
    let current = self.require(snap.current)?;
    let row = NewRawRow {
      logical_id: current.logical_id,
      parent_id: current.parent_id,
      modified_by,
      data: current.data,
    };
    self.insert_draft(conn, DraftKind::Deletion, row)
  }

  fn insert_draft(&self, conn: &Connection, kind: DraftKind, row: NewRawRow) -> OpResult<RawRow> {
    let interval = self.algebra.draft(kind);
    Ok(query::insert_row(
      conn,
      &self.spec(),
      row,
      encode_dt(interval.start()),
      encode_dt(interval.end()),
    )?)
  }

  pub fn revise(&self, conn: &Connection, row: NewRawRow) -> OpResult<RawRow> {
    let snap = self.check(conn, LifecycleOp::ReviseDraft)?;
    let (_, mut draft) = self.require_draft(snap.draft)?;
    query::set_payload(conn, &self.spec(), draft.row_id, &row)?;
    draft.parent_id = row.parent_id;
    draft.modified_by = row.modified_by;
    draft.data = row.data;
    Ok(draft)
  }

  pub fn commit(&self, conn: &Connection, now: DateTime<Utc>) -> OpResult<Committed> {
    let snap = self.check(conn, LifecycleOp::CommitDraft)?;
    let (action, mut draft) = self.require_draft(snap.draft)?;
    let start = encode_dt(self.algebra.current_from(now)?.start());

    match (action, snap.current) {
      (DraftAction::Deletion, current) => {
        let current = self.require(current)?;
        self.ensure_after_start(&current, now)?;
        let closed = self.close(conn, current, now)?;
        query::delete_row(conn, &self.spec(), draft.row_id)?;
        Ok(Committed::Retired(closed))
      }
      (_, current) => {
        match current {
          Some(current) => {
            self.ensure_after_start(&current, now)?;
            self.close(conn, current, now)?;
          }
          None => self.ensure_after_history(conn, now)?,
        }
        let end = self.current_end();
        query::set_interval(conn, &self.spec(), draft.row_id, &start, &end)?;
        draft.start_date = start;
        draft.end_date = end;
        Ok(Committed::Promoted(draft))
      }
    }
  }

  pub fn discard(&self, conn: &Connection) -> OpResult<(DraftAction, RawRow)> {
    let snap = self.check(conn, LifecycleOp::DiscardDraft)?;
    let draft = self.require_draft(snap.draft)?;
    query::delete_row(conn, &self.spec(), draft.1.row_id)?;
    Ok(draft)
  }
}

/// What a committed draft turned into.
#[derive(Debug)]
pub enum Committed {
  /// The promoted draft row, now current.
  Promoted(RawRow),
  /// The current row the deletion closed.
  Retired(RawRow),
}
