//! Integration tests for `SqliteStore` against in-memory and temp-file
//! databases.

use std::{path::Path, sync::Arc, thread, time::Duration as StdDuration};

use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;
use vreg_core::{
  clock::ManualClock,
  entity::{
    AccessPoint, AccessPointType, CommitOutcome, DraftAction, RelatedEntity,
    RelatedEntityIdentifier, RelatedEntityIdentifierType, RelatedEntityRelation,
    RelatedEntityType, Version, VersionStatus, Vocabulary,
    VocabularyRelatedEntity, VocabularyStatus,
  },
  lifecycle::{LifecycleOp, LifecycleState},
  sentinel::Sentinels,
  store::{DraftLifecycle, VersionedStore},
};

use crate::{Error, SqliteStore, StoreConfig};

fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() }

async fn store() -> (SqliteStore, Arc<ManualClock>) {
  let clock = Arc::new(ManualClock::new(t0()));
  let store = SqliteStore::builder()
    .clock(clock.clone())
    .open()
    .await
    .expect("in-memory store");
  (store, clock)
}

fn vocab(title: &str) -> Vocabulary {
  Vocabulary {
    owner:       "ands".into(),
    slug:        "rifcs".into(),
    title:       title.into(),
    description: None,
    status:      VocabularyStatus::Published,
  }
}

fn version(vocabulary_id: Uuid, slug: &str) -> Version {
  Version {
    vocabulary_id,
    slug: slug.into(),
    title: slug.to_uppercase(),
    status: VersionStatus::Current,
    release_date: None,
  }
}

fn rule(err: Error) -> vreg_core::Error {
  match err {
    Error::Core(e) => e,
    other => panic!("expected a lifecycle error, got {other:?}"),
  }
}

// ─── Committed writes ────────────────────────────────────────────────────────

#[tokio::test]
async fn create_then_get_current() {
  let (s, _) = store().await;
  let id = Uuid::new_v4();

  let created = s.create_current(id, vocab("RIF-CS"), "alice").await.unwrap();
  assert_eq!(created.logical_id, id);
  assert_eq!(created.interval.start(), t0());
  assert_eq!(
    created.interval.end(),
    Sentinels::standard().currently_valid_end()
  );
  assert_eq!(created.modified_by, "alice");

  let current = s.get_current::<Vocabulary>(id).await.unwrap().unwrap();
  assert_eq!(current, created);
  assert_eq!(s.history::<Vocabulary>(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn get_current_missing_returns_none() {
  let (s, _) = store().await;
  let got = s.get_current::<Vocabulary>(Uuid::new_v4()).await.unwrap();
  assert!(got.is_none());
}

#[tokio::test]
async fn create_twice_is_duplicate_current() {
  let (s, _) = store().await;
  let id = Uuid::new_v4();
  s.create_current(id, vocab("a"), "alice").await.unwrap();

  let err = s.create_current(id, vocab("b"), "alice").await.unwrap_err();
  assert!(matches!(rule(err), vreg_core::Error::DuplicateCurrent { .. }));

  let current = s.get_current::<Vocabulary>(id).await.unwrap().unwrap();
  assert_eq!(current.payload.title, "a");
}

#[tokio::test]
async fn supersede_closes_old_row_and_opens_new_one() {
  let (s, _) = store().await;
  let id = Uuid::new_v4();
  let t1 = t0() + Duration::days(1);

  s.create_current(id, vocab("v1"), "alice").await.unwrap();
  let new = s.supersede(id, vocab("v2"), t1, "bob").await.unwrap();
  assert_eq!(new.interval.start(), t1);

  let current = s.get_current::<Vocabulary>(id).await.unwrap().unwrap();
  assert_eq!(current.payload.title, "v2");
  assert_eq!(current.modified_by, "bob");

  let before = s
    .get_as_of::<Vocabulary>(id, t0() + Duration::hours(1))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(before.payload.title, "v1");

  // Intervals are half-open: at t1 the new row already applies.
  let at_boundary = s.get_as_of::<Vocabulary>(id, t1).await.unwrap().unwrap();
  assert_eq!(at_boundary.payload.title, "v2");

  let history = s.history::<Vocabulary>(id).await.unwrap();
  assert_eq!(history.len(), 2);
  assert_eq!(history[0].interval.end(), t1);
  assert_eq!(history[1].interval.start(), t1);
}

#[tokio::test]
async fn supersede_missing_is_not_found() {
  let (s, _) = store().await;
  let err = s
    .supersede(Uuid::new_v4(), vocab("x"), t0(), "alice")
    .await
    .unwrap_err();
  let err = rule(err);
  assert!(err.is_absence());
  assert!(matches!(err, vreg_core::Error::NotFound { .. }));
}

#[tokio::test]
async fn supersede_not_after_current_start_conflicts() {
  let (s, _) = store().await;
  let id = Uuid::new_v4();
  s.create_current(id, vocab("v1"), "alice").await.unwrap();

  for at in [t0(), t0() - Duration::minutes(5)] {
    let err = s.supersede(id, vocab("v2"), at, "bob").await.unwrap_err();
    assert!(matches!(rule(err), vreg_core::Error::WriteConflict { .. }));
  }
  assert_eq!(s.history::<Vocabulary>(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_supersedes_exactly_one_wins() {
  let (s, _) = store().await;
  let id = Uuid::new_v4();
  let t1 = t0() + Duration::hours(2);
  s.create_current(id, vocab("v1"), "alice").await.unwrap();

  let other = s.clone();
  let (a, b) = tokio::join!(
    s.supersede(id, vocab("from-a"), t1, "alice"),
    other.supersede(id, vocab("from-b"), t1, "bob"),
  );

  assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
  let loser = a.err().or(b.err()).unwrap();
  assert!(matches!(rule(loser), vreg_core::Error::WriteConflict { .. }));

  let all = s.get_all_current::<Vocabulary>().await.unwrap();
  assert_eq!(all.len(), 1);
  assert_eq!(s.history::<Vocabulary>(id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn retire_closes_without_replacement() {
  let (s, clock) = store().await;
  let id = Uuid::new_v4();
  let t1 = t0() + Duration::days(3);
  s.create_current(id, vocab("v1"), "alice").await.unwrap();

  let closed = s.retire::<Vocabulary>(id, t1).await.unwrap();
  assert_eq!(closed.interval.end(), t1);

  assert!(s.get_current::<Vocabulary>(id).await.unwrap().is_none());
  assert!(s.get_as_of::<Vocabulary>(id, t0()).await.unwrap().is_some());
  assert!(s.get_as_of::<Vocabulary>(id, t1).await.unwrap().is_none());

  // Re-creating may not overlap the retired row.
  clock.set(t1 - Duration::hours(1));
  let err = s.create_current(id, vocab("v2"), "alice").await.unwrap_err();
  assert!(matches!(rule(err), vreg_core::Error::WriteConflict { .. }));

  clock.set(t1 + Duration::hours(1));
  s.create_current(id, vocab("v2"), "alice").await.unwrap();
  let history = s.history::<Vocabulary>(id).await.unwrap();
  assert_eq!(history.len(), 2);
  assert!(history[0].interval.end() <= history[1].interval.start());
}

#[tokio::test]
async fn retire_missing_is_not_found() {
  let (s, _) = store().await;
  let err = s.retire::<Vocabulary>(Uuid::new_v4(), t0()).await.unwrap_err();
  assert!(matches!(rule(err), vreg_core::Error::NotFound { .. }));
}

#[tokio::test]
async fn as_of_rejects_sentinel_instants() {
  let (s, _) = store().await;
  let id = Uuid::new_v4();
  s.create_current(id, vocab("v1"), "alice").await.unwrap();
  let sentinels = Sentinels::standard();

  for at in [sentinels.currently_valid_end(), sentinels.draft_start()] {
    let err = s.get_as_of::<Vocabulary>(id, at).await.unwrap_err();
    assert!(matches!(rule(err), vreg_core::Error::InvalidInterval(_)));
  }
}

#[tokio::test]
async fn as_of_partitions_the_timeline() {
  let (s, _) = store().await;
  let id = Uuid::new_v4();
  s.create_current(id, vocab("v0"), "alice").await.unwrap();
  for day in 1..=3 {
    s.supersede(id, vocab(&format!("v{day}")), t0() + Duration::days(day), "alice")
      .await
      .unwrap();
  }

  let history = s.history::<Vocabulary>(id).await.unwrap();
  assert_eq!(history.len(), 4);

  for hours in [0, 1, 23, 24, 25, 48, 71, 72, 1000] {
    let at = t0() + Duration::hours(hours);
    let got = s.get_as_of::<Vocabulary>(id, at).await.unwrap().unwrap();
    let containing: Vec<_> =
      history.iter().filter(|r| r.interval.contains(at)).collect();
    assert_eq!(containing.len(), 1, "instant at +{hours}h");
    assert_eq!(&got, containing[0]);
  }

  let before = t0() - Duration::seconds(1);
  assert!(s.get_as_of::<Vocabulary>(id, before).await.unwrap().is_none());
}

#[tokio::test]
async fn current_children_follow_parent_column() {
  let (s, _) = store().await;
  let vocabulary_id = Uuid::new_v4();
  let other = Uuid::new_v4();
  s.create_current(vocabulary_id, vocab("v"), "alice").await.unwrap();

  let (v1, v2, v3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
  s.create_current(v1, version(vocabulary_id, "1.0"), "alice").await.unwrap();
  s.create_current(v2, version(vocabulary_id, "2.0"), "alice").await.unwrap();
  s.create_current(v3, version(other, "9.0"), "alice").await.unwrap();
  s.retire::<Version>(v1, t0() + Duration::days(1)).await.unwrap();

  let children = s.get_current_children::<Version>(vocabulary_id).await.unwrap();
  assert_eq!(children.len(), 1);
  assert_eq!(children[0].logical_id, v2);

  let ap = AccessPoint {
    version_id: v2,
    kind:       AccessPointType::ApiSparql,
    url:        "https://example.org/sparql".into(),
  };
  s.create_current(Uuid::new_v4(), ap.clone(), "alice").await.unwrap();
  let aps = s.get_current_children::<AccessPoint>(v2).await.unwrap();
  assert_eq!(aps.len(), 1);
  assert_eq!(aps[0].payload, ap);

  let err = s
    .get_current_children::<Vocabulary>(vocabulary_id)
    .await
    .unwrap_err();
  assert!(matches!(rule(err), vreg_core::Error::NoParent(_)));
}

// ─── Drafts ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn addition_draft_is_invisible_until_committed() {
  let (s, clock) = store().await;
  let id = Uuid::new_v4();

  let draft = s.propose_addition(id, vocab("new"), "alice").await.unwrap();
  assert_eq!(draft.interval.start(), Sentinels::standard().draft_start());

  assert!(s.get_current::<Vocabulary>(id).await.unwrap().is_none());
  assert!(s.get_all_current::<Vocabulary>().await.unwrap().is_empty());
  assert!(s.history::<Vocabulary>(id).await.unwrap().is_empty());
  assert!(s.get_as_of::<Vocabulary>(id, t0()).await.unwrap().is_none());
  assert_eq!(
    s.lifecycle_state::<Vocabulary>(id).await.unwrap(),
    LifecycleState { draft: Some(DraftAction::Addition), has_current: false }
  );

  let pending = s.get_draft::<Vocabulary>(id).await.unwrap().unwrap();
  assert_eq!(pending.action, DraftAction::Addition);
  assert_eq!(pending.row.payload.title, "new");

  let t1 = t0() + Duration::hours(4);
  clock.set(t1);
  let outcome = s.commit_draft::<Vocabulary>(id).await.unwrap();
  let CommitOutcome::Promoted { row } = outcome else {
    panic!("expected a promoted row");
  };
  assert_eq!(row.interval.start(), t1);

  let current = s.get_current::<Vocabulary>(id).await.unwrap().unwrap();
  assert_eq!(current.payload.title, "new");
  assert!(s.get_draft::<Vocabulary>(id).await.unwrap().is_none());
  assert_eq!(
    s.lifecycle_state::<Vocabulary>(id).await.unwrap(),
    LifecycleState { draft: None, has_current: true }
  );
}

#[tokio::test]
async fn duplicate_addition_is_rejected_and_leaves_draft_alone() {
  let (s, _) = store().await;
  let id = Uuid::new_v4();
  s.propose_addition(id, vocab("first"), "alice").await.unwrap();

  let err = s
    .propose_addition(id, vocab("second"), "bob")
    .await
    .unwrap_err();
  let err = rule(err);
  assert!(err.is_rejection());
  assert!(matches!(err, vreg_core::Error::DraftConflict { .. }));

  let pending = s.get_draft::<Vocabulary>(id).await.unwrap().unwrap();
  assert_eq!(pending.row.payload.title, "first");
  assert_eq!(pending.row.modified_by, "alice");
  assert_eq!(s.get_all_drafts::<Vocabulary>().await.unwrap().len(), 1);
}

#[tokio::test]
async fn modification_round_trip() {
  let (s, clock) = store().await;
  let id = Uuid::new_v4();
  s.create_current(id, vocab("v1"), "alice").await.unwrap();

  s.propose_modification(id, vocab("v2"), "bob").await.unwrap();
  let current = s.get_current::<Vocabulary>(id).await.unwrap().unwrap();
  assert_eq!(current.payload.title, "v1");

  let pending = s.get_draft::<Vocabulary>(id).await.unwrap().unwrap();
  assert_eq!(pending.action, DraftAction::Modification);

  let t1 = t0() + Duration::days(1);
  clock.set(t1);
  s.commit_draft::<Vocabulary>(id).await.unwrap();

  let history = s.history::<Vocabulary>(id).await.unwrap();
  assert_eq!(history.len(), 2);
  assert_eq!(history[0].payload.title, "v1");
  assert_eq!(history[0].interval.end(), t1);
  assert_eq!(history[1].payload.title, "v2");
  assert_eq!(history[1].interval.start(), t1);
  assert_eq!(history[1].modified_by, "bob");
}

#[tokio::test]
async fn deletion_draft_retires_on_commit() {
  let (s, clock) = store().await;
  let id = Uuid::new_v4();
  s.create_current(id, vocab("v1"), "alice").await.unwrap();

  let draft = s.propose_deletion::<Vocabulary>(id, "bob").await.unwrap();
  assert_eq!(draft.payload.title, "v1");
  assert_eq!(
    draft.interval.end(),
    Sentinels::standard().draft_deletion_end()
  );

  let pending = s.get_draft::<Vocabulary>(id).await.unwrap().unwrap();
  assert_eq!(pending.action, DraftAction::Deletion);
  assert!(s.get_current::<Vocabulary>(id).await.unwrap().is_some());

  let t1 = t0() + Duration::days(2);
  clock.set(t1);
  let outcome = s.commit_draft::<Vocabulary>(id).await.unwrap();
  assert_eq!(outcome, CommitOutcome::Retired { logical_id: id, at: t1 });

  assert!(s.get_current::<Vocabulary>(id).await.unwrap().is_none());
  assert!(s.get_draft::<Vocabulary>(id).await.unwrap().is_none());
  let was = s.get_as_of::<Vocabulary>(id, t0()).await.unwrap().unwrap();
  assert_eq!(was.interval.end(), t1);
  assert_eq!(
    s.lifecycle_state::<Vocabulary>(id).await.unwrap(),
    LifecycleState::default()
  );
}

#[tokio::test]
async fn proposals_against_wrong_current_state_are_invalid() {
  let (s, _) = store().await;
  let absent = Uuid::new_v4();
  let present = Uuid::new_v4();
  s.create_current(present, vocab("v1"), "alice").await.unwrap();

  let err = s
    .propose_modification(absent, vocab("x"), "bob")
    .await
    .unwrap_err();
  assert!(matches!(
    rule(err),
    vreg_core::Error::InvalidTransition { op: LifecycleOp::ProposeModification, .. }
  ));

  let err = s.propose_deletion::<Vocabulary>(absent, "bob").await.unwrap_err();
  assert!(matches!(
    rule(err),
    vreg_core::Error::InvalidTransition { op: LifecycleOp::ProposeDeletion, .. }
  ));

  let err = s
    .propose_addition(present, vocab("x"), "bob")
    .await
    .unwrap_err();
  assert!(matches!(
    rule(err),
    vreg_core::Error::InvalidTransition { op: LifecycleOp::ProposeAddition, .. }
  ));

  assert!(s.get_all_drafts::<Vocabulary>().await.unwrap().is_empty());
}

#[tokio::test]
async fn retire_with_pending_draft_is_invalid() {
  let (s, _) = store().await;
  let id = Uuid::new_v4();
  s.create_current(id, vocab("v1"), "alice").await.unwrap();
  s.propose_modification(id, vocab("v2"), "bob").await.unwrap();

  let err = s
    .retire::<Vocabulary>(id, t0() + Duration::days(1))
    .await
    .unwrap_err();
  assert!(matches!(
    rule(err),
    vreg_core::Error::InvalidTransition { op: LifecycleOp::Retire, .. }
  ));
  assert!(s.get_current::<Vocabulary>(id).await.unwrap().is_some());
}

#[tokio::test]
async fn commit_and_discard_without_draft_fail() {
  let (s, _) = store().await;
  let id = Uuid::new_v4();
  s.create_current(id, vocab("v1"), "alice").await.unwrap();

  let err = s.commit_draft::<Vocabulary>(id).await.unwrap_err();
  assert!(matches!(rule(err), vreg_core::Error::NoDraft { .. }));

  let err = s.discard_draft::<Vocabulary>(id).await.unwrap_err();
  assert!(matches!(rule(err), vreg_core::Error::NoDraft { .. }));
}

#[tokio::test]
async fn revise_replaces_pending_payload() {
  let (s, _) = store().await;
  let id = Uuid::new_v4();
  s.propose_addition(id, vocab("draft 1"), "alice").await.unwrap();

  let revised = s.revise_draft(id, vocab("draft 2"), "bob").await.unwrap();
  assert_eq!(revised.payload.title, "draft 2");
  assert_eq!(revised.modified_by, "bob");

  let pending = s.get_draft::<Vocabulary>(id).await.unwrap().unwrap();
  assert_eq!(pending.row.payload.title, "draft 2");
  assert_eq!(pending.action, DraftAction::Addition);

  let err = s
    .revise_draft(Uuid::new_v4(), vocab("x"), "bob")
    .await
    .unwrap_err();
  assert!(matches!(rule(err), vreg_core::Error::NoDraft { .. }));
}

#[tokio::test]
async fn revise_of_deletion_draft_is_invalid() {
  let (s, _) = store().await;
  let id = Uuid::new_v4();
  s.create_current(id, vocab("v1"), "alice").await.unwrap();
  s.propose_deletion::<Vocabulary>(id, "bob").await.unwrap();

  let err = s.revise_draft(id, vocab("v2"), "bob").await.unwrap_err();
  assert!(matches!(
    rule(err),
    vreg_core::Error::InvalidTransition { op: LifecycleOp::ReviseDraft, .. }
  ));
}

#[tokio::test]
async fn discard_restores_prior_state() {
  let (s, _) = store().await;
  let id = Uuid::new_v4();
  s.create_current(id, vocab("v1"), "alice").await.unwrap();
  s.propose_modification(id, vocab("v2"), "bob").await.unwrap();

  let discarded = s.discard_draft::<Vocabulary>(id).await.unwrap();
  assert_eq!(discarded.action, DraftAction::Modification);
  assert_eq!(discarded.row.payload.title, "v2");

  assert_eq!(
    s.lifecycle_state::<Vocabulary>(id).await.unwrap(),
    LifecycleState { draft: None, has_current: true }
  );
  let current = s.get_current::<Vocabulary>(id).await.unwrap().unwrap();
  assert_eq!(current.payload.title, "v1");

  // The slot is free again.
  s.propose_modification(id, vocab("v3"), "bob").await.unwrap();
}

#[tokio::test]
async fn all_drafts_resolve_their_actions() {
  let (s, _) = store().await;
  let (added, modified, deleted) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
  s.create_current(modified, vocab("m"), "alice").await.unwrap();
  s.create_current(deleted, vocab("d"), "alice").await.unwrap();

  s.propose_addition(added, vocab("a"), "bob").await.unwrap();
  s.propose_modification(modified, vocab("m2"), "bob").await.unwrap();
  s.propose_deletion::<Vocabulary>(deleted, "bob").await.unwrap();

  let drafts = s.get_all_drafts::<Vocabulary>().await.unwrap();
  assert_eq!(drafts.len(), 3);
  let action_of = |id: Uuid| {
    drafts
      .iter()
      .find(|d| d.row.logical_id == id)
      .map(|d| d.action)
  };
  assert_eq!(action_of(added), Some(DraftAction::Addition));
  assert_eq!(action_of(modified), Some(DraftAction::Modification));
  assert_eq!(action_of(deleted), Some(DraftAction::Deletion));

  assert_eq!(s.get_all_current::<Vocabulary>().await.unwrap().len(), 2);
}

#[tokio::test]
async fn kinds_are_stored_independently() {
  let (s, _) = store().await;
  let id = Uuid::new_v4();
  s.create_current(id, vocab("v"), "alice").await.unwrap();

  assert!(s.get_current::<Version>(id).await.unwrap().is_none());
  s.create_current(id, version(Uuid::new_v4(), "1.0"), "alice")
    .await
    .unwrap();
  assert!(s.get_current::<Version>(id).await.unwrap().is_some());
}

#[tokio::test]
async fn related_entities_link_to_vocabularies() {
  let (s, _) = store().await;
  let vocab_id = Uuid::new_v4();
  let party_id = Uuid::new_v4();
  s.create_current(vocab_id, vocab("v"), "alice").await.unwrap();

  let party = RelatedEntity {
    owner: "ands".into(),
    kind:  RelatedEntityType::Party,
    title: "Geoscience Australia".into(),
    email: Some("clientservices@ga.gov.au".into()),
    phone: None,
    urls:  vec!["http://www.ga.gov.au/".into()],
  };
  s.create_current(party_id, party, "alice").await.unwrap();

  let relations = [RelatedEntityRelation::PublishedBy, RelatedEntityRelation::PointOfContact];
  for relation in relations {
    let link = VocabularyRelatedEntity {
      vocabulary_id: vocab_id,
      related_entity_id: party_id,
      relation,
    };
    s.create_current(Uuid::new_v4(), link, "alice").await.unwrap();
  }
  let orcid = RelatedEntityIdentifier {
    related_entity_id: party_id,
    identifier_type:   RelatedEntityIdentifierType::Orcid,
    identifier_value:  "0000-0002-1825-0097".into(),
  };
  s.create_current(Uuid::new_v4(), orcid, "alice").await.unwrap();

  let links = s
    .get_current_children::<VocabularyRelatedEntity>(vocab_id)
    .await
    .unwrap();
  assert_eq!(links.len(), 2);
  assert!(links.iter().all(|l| l.payload.related_entity_id == party_id));

  let ids = s
    .get_current_children::<RelatedEntityIdentifier>(party_id)
    .await
    .unwrap();
  assert_eq!(ids.len(), 1);
  assert_eq!(ids[0].payload.identifier_type, RelatedEntityIdentifierType::Orcid);

  let err = s
    .get_current_children::<RelatedEntity>(vocab_id)
    .await
    .unwrap_err();
  assert!(matches!(rule(err), vreg_core::Error::NoParent(_)));
}

// ─── Clock bounds ────────────────────────────────────────────────────────────

#[tokio::test]
async fn clock_before_year_zero_is_refused() {
  let (s, clock) = store().await;
  let id = Uuid::new_v4();
  clock.set(Utc.with_ymd_and_hms(-5, 6, 1, 0, 0, 0).unwrap());

  let err = s.create_current(id, vocab("v"), "alice").await.unwrap_err();
  assert!(matches!(rule(err), vreg_core::Error::InvalidInterval(_)));
  assert!(s.get_all_current::<Vocabulary>().await.unwrap().is_empty());

  clock.set(t0());
  s.propose_addition(id, vocab("v"), "alice").await.unwrap();
  clock.set(Utc.with_ymd_and_hms(-1, 12, 31, 0, 0, 0).unwrap());

  let err = s.commit_draft::<Vocabulary>(id).await.unwrap_err();
  assert!(matches!(rule(err), vreg_core::Error::InvalidInterval(_)));
  assert!(s.get_draft::<Vocabulary>(id).await.unwrap().is_some());
  assert!(s.get_current::<Vocabulary>(id).await.unwrap().is_none());
}

// ─── Locking and retries ─────────────────────────────────────────────────────

async fn file_store(path: &Path, config: StoreConfig) -> SqliteStore {
  SqliteStore::builder()
    .path(path)
    .config(config)
    .clock(Arc::new(ManualClock::new(t0())))
    .open()
    .await
    .expect("file store")
}

/// Another process holding the write lock with an uncommitted change.
fn hold_write_lock(path: &Path) -> rusqlite::Connection {
  let conn = rusqlite::Connection::open(path).unwrap();
  conn
    .execute_batch(
      "BEGIN IMMEDIATE;
       INSERT INTO temporal_meta (key, value) VALUES ('held_by', 'other');",
    )
    .unwrap();
  conn
}

#[tokio::test]
async fn reads_proceed_while_another_writer_holds_the_lock() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("vreg.sqlite3");
  let s = file_store(&path, StoreConfig::default()).await;
  let id = Uuid::new_v4();
  s.create_current(id, vocab("committed"), "alice").await.unwrap();

  let other = hold_write_lock(&path);

  let current = s.get_current::<Vocabulary>(id).await.unwrap().unwrap();
  assert_eq!(current.payload.title, "committed");
  assert_eq!(s.history::<Vocabulary>(id).await.unwrap().len(), 1);
  assert!(s.get_draft::<Vocabulary>(id).await.unwrap().is_none());

  other.execute_batch("ROLLBACK").unwrap();
  s.propose_deletion::<Vocabulary>(id, "bob").await.unwrap();
}

#[tokio::test]
async fn held_lock_surfaces_as_retryable_timeout() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("vreg.sqlite3");
  let config = StoreConfig { busy_timeout_ms: 0, max_retries: 1, retry_backoff_ms: 1 };
  let s = file_store(&path, config).await;
  let id = Uuid::new_v4();

  let other = hold_write_lock(&path);
  let err = s.create_current(id, vocab("v"), "alice").await.unwrap_err();
  assert!(matches!(err, Error::StorageTimeout(_)), "got {err:?}");
  assert!(err.is_retryable());

  other.execute_batch("ROLLBACK").unwrap();
  assert!(s.get_current::<Vocabulary>(id).await.unwrap().is_none());
}

#[tokio::test]
async fn write_succeeds_once_the_lock_is_released() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("vreg.sqlite3");
  let config = StoreConfig { busy_timeout_ms: 0, max_retries: 10, retry_backoff_ms: 20 };
  let s = file_store(&path, config).await;
  let id = Uuid::new_v4();

  let other = hold_write_lock(&path);
  let release = thread::spawn(move || {
    thread::sleep(StdDuration::from_millis(50));
    other.execute_batch("COMMIT").unwrap();
  });

  s.create_current(id, vocab("v"), "alice").await.unwrap();
  release.join().unwrap();
  assert!(s.get_current::<Vocabulary>(id).await.unwrap().is_some());

  // Rule violations come back on the first attempt and are not retryable.
  let err = s.create_current(id, vocab("again"), "alice").await.unwrap_err();
  assert!(!err.is_retryable());
  assert!(matches!(rule(err), vreg_core::Error::DuplicateCurrent { .. }));
}

// ─── Sentinels and persistence ───────────────────────────────────────────────

fn late_sentinels() -> Sentinels {
  let day = |d| Utc.with_ymd_and_hms(2100, 1, d, 0, 0, 0).unwrap();
  Sentinels::new(day(1), day(2), day(3), day(4)).unwrap()
}

#[tokio::test]
async fn alternate_sentinels_drive_the_same_lifecycle() {
  let sentinels = late_sentinels();
  let clock = Arc::new(ManualClock::new(t0()));
  let s = SqliteStore::builder()
    .sentinels(sentinels)
    .clock(clock.clone())
    .open()
    .await
    .unwrap();
  let id = Uuid::new_v4();

  let row = s.create_current(id, vocab("v1"), "alice").await.unwrap();
  assert_eq!(row.interval.end(), sentinels.currently_valid_end());

  let draft = s.propose_deletion::<Vocabulary>(id, "bob").await.unwrap();
  assert_eq!(draft.interval.start(), sentinels.draft_start());
  assert_eq!(
    s.get_draft::<Vocabulary>(id).await.unwrap().unwrap().action,
    DraftAction::Deletion
  );

  let err = s
    .get_as_of::<Vocabulary>(id, sentinels.currently_valid_end())
    .await
    .unwrap_err();
  assert!(matches!(rule(err), vreg_core::Error::InvalidInterval(_)));
}

#[tokio::test]
async fn file_store_persists_and_pins_sentinels() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("vreg.sqlite3");
  let id = Uuid::new_v4();

  {
    let s = SqliteStore::open(&path).await.unwrap();
    s.create_current(id, vocab("kept"), "alice").await.unwrap();
  }

  let s = SqliteStore::open(&path).await.unwrap();
  let current = s.get_current::<Vocabulary>(id).await.unwrap().unwrap();
  assert_eq!(current.payload.title, "kept");

  let err = SqliteStore::builder()
    .path(&path)
    .sentinels(late_sentinels())
    .open()
    .await
    .err()
    .expect("mismatched sentinels must be refused");
  assert!(matches!(err, Error::SentinelMismatch(_)));
}
