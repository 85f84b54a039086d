//! [`DraftLifecycle`] for [`SqliteStore`].

use std::collections::HashSet;

use uuid::Uuid;
use vreg_core::{
  entity::{CommitOutcome, Draft, DraftAction, Versioned, VersionedRow},
  interval::{IntervalState, TemporalAlgebra},
  lifecycle::LifecycleState,
  store::DraftLifecycle,
};

use crate::{
  Result,
  encode::{NewRawRow, RawRow, decode_dt},
  ops::Committed,
  query,
  store::SqliteStore,
};

/// Decode a draft row and resolve its action against whether the entity
/// currently has a committed row.
fn decode_draft<P: Versioned>(
  algebra: &TemporalAlgebra,
  raw: RawRow,
  has_current: bool,
) -> Result<Draft<P>> {
  let row: VersionedRow<P> = raw.into_row()?;
  match algebra.classify(&row.interval)? {
    IntervalState::Draft(kind) => Ok(Draft {
      action: DraftAction::resolve(kind, has_current),
      row,
    }),
    state => Err(
      vreg_core::Error::InvalidInterval(format!(
        "row {} of {} was selected as a draft but is {state:?}",
        row.row_id,
        P::KIND,
      ))
      .into(),
    ),
  }
}

impl DraftLifecycle for SqliteStore {
  async fn get_draft<P: Versioned>(&self, id: Uuid) -> Result<Option<Draft<P>>> {
    let target = self.target(P::KIND, id);
    let snap = self.read(move |conn| target.snapshot(conn)).await?;
    let has_current = snap.current.is_some();

    snap
      .draft
      .map(|(_, raw)| decode_draft(self.algebra(), raw, has_current))
      .transpose()
  }

  async fn get_all_drafts<P: Versioned>(&self) -> Result<Vec<Draft<P>>> {
    let spec = P::KIND.table();
    let drafts = self.algebra().all_drafts();
    let current = self.algebra().current();

    let (raws, current_ids) = self
      .read(move |conn| {
        let raws = query::select_rows(conn, &spec, &drafts)?;
        let ids = query::select_ids(conn, &spec, &current)?;
        Ok((raws, ids))
      })
      .await?;

    let current_ids: HashSet<String> = current_ids.into_iter().collect();
    raws
      .into_iter()
      .map(|raw| {
        let has_current = current_ids.contains(&raw.logical_id);
        decode_draft(self.algebra(), raw, has_current)
      })
      .collect()
  }

  async fn lifecycle_state<P: Versioned>(&self, id: Uuid) -> Result<LifecycleState> {
    let target = self.target(P::KIND, id);
    let snap = self.read(move |conn| target.snapshot(conn)).await?;
    Ok(snap.state())
  }

  async fn propose_addition<'a, P: Versioned>(
    &'a self,
    id: Uuid,
    payload: P,
    modified_by: &'a str,
  ) -> Result<VersionedRow<P>> {
    let row = NewRawRow::encode(id, &payload, modified_by)?;
    let target = self.target(P::KIND, id);

    let raw = self
      .transact(move |tx| target.propose(tx, DraftAction::Addition, row.clone()))
      .await?;

    tracing::info!(kind = %P::KIND, %id, "proposed addition");
    raw.into_row()
  }

  async fn propose_modification<'a, P: Versioned>(
    &'a self,
    id: Uuid,
    payload: P,
    modified_by: &'a str,
  ) -> Result<VersionedRow<P>> {
    let row = NewRawRow::encode(id, &payload, modified_by)?;
    let target = self.target(P::KIND, id);

    let raw = self
      .transact(move |tx| {
        target.propose(tx, DraftAction::Modification, row.clone())
      })
      .await?;

    tracing::info!(kind = %P::KIND, %id, "proposed modification");
    raw.into_row()
  }

  async fn propose_deletion<'a, P: Versioned>(
    &'a self,
    id: Uuid,
    modified_by: &'a str,
  ) -> Result<VersionedRow<P>> {
    let target = self.target(P::KIND, id);
    let modified_by = modified_by.to_owned();

    let raw = self
      .transact(move |tx| target.propose_deletion(tx, modified_by.clone()))
      .await?;

    tracing::info!(kind = %P::KIND, %id, "proposed deletion");
    raw.into_row()
  }

  async fn revise_draft<'a, P: Versioned>(
    &'a self,
    id: Uuid,
    payload: P,
    modified_by: &'a str,
  ) -> Result<VersionedRow<P>> {
    let row = NewRawRow::encode(id, &payload, modified_by)?;
    let target = self.target(P::KIND, id);

    let raw = self.transact(move |tx| target.revise(tx, row.clone())).await?;

    tracing::info!(kind = %P::KIND, %id, "revised draft");
    raw.into_row()
  }

  async fn commit_draft<P: Versioned>(&self, id: Uuid) -> Result<CommitOutcome<P>> {
    let target = self.target(P::KIND, id);
    let now = self.now()?;

    let committed = self.transact(move |tx| target.commit(tx, now)).await?;

    match committed {
      Committed::Promoted(raw) => {
        tracing::info!(kind = %P::KIND, %id, start = %now, "committed draft");
        Ok(CommitOutcome::Promoted { row: raw.into_row()? })
      }
      Committed::Retired(raw) => {
        tracing::info!(kind = %P::KIND, %id, end = %now, "committed deletion");
        Ok(CommitOutcome::Retired {
          logical_id: id,
          at:         decode_dt(&raw.end_date)?,
        })
      }
    }
  }

  async fn discard_draft<P: Versioned>(&self, id: Uuid) -> Result<Draft<P>> {
    let target = self.target(P::KIND, id);

    let (action, raw) = self.transact(move |tx| target.discard(tx)).await?;

    tracing::info!(kind = %P::KIND, %id, %action, "discarded draft");
    Ok(Draft { action, row: raw.into_row()? })
  }
}
