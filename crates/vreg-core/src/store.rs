//! The `VersionedStore` and `DraftLifecycle` traits.
//!
//! Both are implemented by storage backends (e.g. `vreg-store-sqlite`) and
//! are generic over the payload type, so one implementation serves every
//! [`EntityKind`](crate::entity::EntityKind).
//!
//! Every multi-row write runs as a single all-or-nothing transaction: a
//! reader never observes zero or two current rows for a logical id in the
//! middle of a transition.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  entity::{CommitOutcome, Draft, Versioned, VersionedRow},
  lifecycle::LifecycleState,
};

// ─── Versioned entity store ──────────────────────────────────────────────────

/// Reads and committed writes over versioned rows.
pub trait VersionedStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// The current row of `id`, if any.
  fn get_current<P: Versioned>(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<VersionedRow<P>>, Self::Error>> + Send + '_;

  /// The row of `id` that was authoritative at `at`. `at` must be a real
  /// instant, not a sentinel.
  fn get_as_of<P: Versioned>(
    &self,
    id: Uuid,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<VersionedRow<P>>, Self::Error>> + Send + '_;

  /// Every current row of the kind.
  fn get_all_current<P: Versioned>(
    &self,
  ) -> impl Future<Output = Result<Vec<VersionedRow<P>>, Self::Error>> + Send + '_;

  /// Current rows whose parent entity is `parent_id`.
  fn get_current_children<P: Versioned>(
    &self,
    parent_id: Uuid,
  ) -> impl Future<Output = Result<Vec<VersionedRow<P>>, Self::Error>> + Send + '_;

  /// All historical and current rows of `id`, oldest first.
  fn history<P: Versioned>(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Vec<VersionedRow<P>>, Self::Error>> + Send + '_;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Insert the first current row of `id`, valid from now.
  fn create_current<'a, P: Versioned>(
    &'a self,
    id: Uuid,
    payload: P,
    modified_by: &'a str,
  ) -> impl Future<Output = Result<VersionedRow<P>, Self::Error>> + Send + 'a;

  /// Close the current row of `id` at `effective` and open a new one with
  /// `payload` from the same instant.
  fn supersede<'a, P: Versioned>(
    &'a self,
    id: Uuid,
    payload: P,
    effective: DateTime<Utc>,
    modified_by: &'a str,
  ) -> impl Future<Output = Result<VersionedRow<P>, Self::Error>> + Send + 'a;

  /// Close the current row of `id` at `effective` with no replacement.
  /// Returns the closed row.
  fn retire<P: Versioned>(
    &self,
    id: Uuid,
    effective: DateTime<Utc>,
  ) -> impl Future<Output = Result<VersionedRow<P>, Self::Error>> + Send + '_;
}

// ─── Draft lifecycle ─────────────────────────────────────────────────────────

/// The draft workflow: at most one pending draft per logical id, which is
/// either committed into the current view or discarded.
pub trait DraftLifecycle: VersionedStore {
  fn get_draft<P: Versioned>(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Draft<P>>, Self::Error>> + Send + '_;

  fn get_all_drafts<P: Versioned>(
    &self,
  ) -> impl Future<Output = Result<Vec<Draft<P>>, Self::Error>> + Send + '_;

  /// The (draft, current) state of `id` for the kind of `P`.
  fn lifecycle_state<P: Versioned>(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<LifecycleState, Self::Error>> + Send + '_;

  /// Propose a new entity. `id` must have no current row.
  fn propose_addition<'a, P: Versioned>(
    &'a self,
    id: Uuid,
    payload: P,
    modified_by: &'a str,
  ) -> impl Future<Output = Result<VersionedRow<P>, Self::Error>> + Send + 'a;

  /// Propose new content for an entity that has a current row.
  fn propose_modification<'a, P: Versioned>(
    &'a self,
    id: Uuid,
    payload: P,
    modified_by: &'a str,
  ) -> impl Future<Output = Result<VersionedRow<P>, Self::Error>> + Send + 'a;

  /// Propose retiring an entity that has a current row. The draft carries a
  /// copy of the current payload.
  fn propose_deletion<'a, P: Versioned>(
    &'a self,
    id: Uuid,
    modified_by: &'a str,
  ) -> impl Future<Output = Result<VersionedRow<P>, Self::Error>> + Send + 'a;

  /// Replace the payload of a pending addition or modification draft.
  fn revise_draft<'a, P: Versioned>(
    &'a self,
    id: Uuid,
    payload: P,
    modified_by: &'a str,
  ) -> impl Future<Output = Result<VersionedRow<P>, Self::Error>> + Send + 'a;

  /// Make the pending draft of `id` take effect now.
  fn commit_draft<P: Versioned>(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<CommitOutcome<P>, Self::Error>> + Send + '_;

  /// Throw the pending draft of `id` away. Returns the discarded draft.
  fn discard_draft<P: Versioned>(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Draft<P>, Self::Error>> + Send + '_;
}
