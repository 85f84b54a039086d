//! The per-entity lifecycle state machine.
//!
//! A logical entity's state is the pair (pending draft, has current row).
//! Only some pairs are valid: a draft addition requires that no current row
//! exists, while a draft modification or deletion requires one. Every write
//! operation is checked here before the store touches any row.

use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::{
  Error, Result,
  entity::{DraftAction, EntityKind},
};

/// A write operation on one logical entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum LifecycleOp {
  Create,
  Supersede,
  Retire,
  ProposeAddition,
  ProposeModification,
  ProposeDeletion,
  ReviseDraft,
  CommitDraft,
  DiscardDraft,
}

/// The lifecycle state of one logical entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LifecycleState {
  pub draft:       Option<DraftAction>,
  pub has_current: bool,
}

impl LifecycleState {
  pub fn is_valid(&self) -> bool {
    matches!(
      (self.draft, self.has_current),
      (None, _)
        | (Some(DraftAction::Addition), false)
        | (Some(DraftAction::Modification | DraftAction::Deletion), true)
    )
  }

  /// The state after `op`, or the typed error explaining why `op` is not
  /// allowed from this state.
  pub fn apply(self, kind: EntityKind, id: Uuid, op: LifecycleOp) -> Result<Self> {
    use LifecycleOp::*;

    let invalid = || Error::InvalidTransition { kind, id, op };
    let conflict = || Error::DraftConflict { kind, id };
    let not_found = || Error::NotFound { kind, id };
    let no_draft = || Error::NoDraft { kind, id };

    let next = match op {
      Create => {
        if self.has_current {
          return Err(Error::DuplicateCurrent { kind, id });
        }
        if self.draft.is_some() {
          return Err(invalid());
        }
        Self { draft: None, has_current: true }
      }
      Supersede => {
        if !self.has_current {
          return Err(not_found());
        }
        self
      }
      Retire => {
        if !self.has_current {
          return Err(not_found());
        }
        if self.draft.is_some() {
          return Err(invalid());
        }
        Self { draft: None, has_current: false }
      }
      ProposeAddition | ProposeModification | ProposeDeletion => {
        if self.draft.is_some() {
          return Err(conflict());
        }
        let (action, needs_current) = match op {
          ProposeAddition => (DraftAction::Addition, false),
          ProposeModification => (DraftAction::Modification, true),
          _ => (DraftAction::Deletion, true),
        };
        if self.has_current != needs_current {
          return Err(invalid());
        }
        Self { draft: Some(action), ..self }
      }
      ReviseDraft => match self.draft {
        None => return Err(no_draft()),
        Some(DraftAction::Deletion) => return Err(invalid()),
        Some(_) => self,
      },
      CommitDraft => match self.draft {
        None => return Err(no_draft()),
        Some(DraftAction::Addition | DraftAction::Modification) => {
          Self { draft: None, has_current: true }
        }
        Some(DraftAction::Deletion) => Self { draft: None, has_current: false },
      },
      DiscardDraft => {
        if self.draft.is_none() {
          return Err(no_draft());
        }
        Self { draft: None, ..self }
      }
    };

    debug_assert!(next.is_valid());
    Ok(next)
  }
}
