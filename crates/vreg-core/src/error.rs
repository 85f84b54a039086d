//! Error types for `vreg-core`.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::{entity::EntityKind, lifecycle::LifecycleOp};

#[derive(Debug, Error)]
pub enum Error {
  /// A start/end pair that can never be stored. Always a programming error.
  #[error("invalid interval: {0}")]
  InvalidInterval(String),

  #[error("no current {kind} with id {id}")]
  NotFound { kind: EntityKind, id: Uuid },

  #[error("no draft {kind} with id {id}")]
  NoDraft { kind: EntityKind, id: Uuid },

  #[error("{kind} {id} already has a current row")]
  DuplicateCurrent { kind: EntityKind, id: Uuid },

  #[error("{kind} {id} already has a pending draft")]
  DraftConflict { kind: EntityKind, id: Uuid },

  #[error("cannot {op} {kind} {id} in its present state")]
  InvalidTransition {
    kind: EntityKind,
    id:   Uuid,
    op:   LifecycleOp,
  },

  /// Another write moved the entity past `at` before this one committed.
  #[error("write to {kind} {id} at {at} conflicts with a later write")]
  WriteConflict {
    kind: EntityKind,
    id:   Uuid,
    at:   DateTime<Utc>,
  },

  #[error("{0} rows have no parent entity")]
  NoParent(EntityKind),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// `true` for the expected-absence errors (`NotFound`, `NoDraft`) that a
  /// caller should report as a normal negative result.
  pub fn is_absence(&self) -> bool {
    matches!(self, Self::NotFound { .. } | Self::NoDraft { .. })
  }

  /// `true` when the request violated a lifecycle invariant. Retrying such a
  /// request cannot change the outcome.
  pub fn is_rejection(&self) -> bool {
    matches!(
      self,
      Self::DuplicateCurrent { .. }
        | Self::DraftConflict { .. }
        | Self::InvalidTransition { .. }
        | Self::WriteConflict { .. }
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
