//! Entity kinds, their payload types, and the row envelope every versioned
//! table shares.
//!
//! [`EntityKind`] is the compile-time registry of versioned tables: each kind
//! maps to one [`TableSpec`] and one payload type implementing [`Versioned`].
//! Storage code is written once, generically over `P: Versioned`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use strum::{Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::interval::{DraftKind, Interval};

// ─── Kinds ───────────────────────────────────────────────────────────────────

/// Every kind of versioned registry entity.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter,
  Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
  Vocabulary,
  Version,
  AccessPoint,
  RelatedEntity,
  VocabularyRelatedEntity,
  RelatedEntityIdentifier,
}

/// Physical layout of the table backing one entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
  pub table:         &'static str,
  /// Column holding the logical (cross-version) identifier.
  pub id_column:     &'static str,
  /// Column holding the owning entity's logical id, if the kind has one.
  pub parent_column: Option<&'static str>,
}

impl EntityKind {
  pub fn table(self) -> TableSpec {
    match self {
      Self::Vocabulary => TableSpec {
        table:         "vocabularies",
        id_column:     "vocabulary_id",
        parent_column: None,
      },
      Self::Version => TableSpec {
        table:         "versions",
        id_column:     "version_id",
        parent_column: Some("vocabulary_id"),
      },
      Self::AccessPoint => TableSpec {
        table:         "access_points",
        id_column:     "access_point_id",
        parent_column: Some("version_id"),
      },
      Self::RelatedEntity => TableSpec {
        table:         "related_entities",
        id_column:     "related_entity_id",
        parent_column: None,
      },
      Self::VocabularyRelatedEntity => TableSpec {
        table:         "vocabulary_related_entities",
        id_column:     "vocabulary_related_entity_id",
        parent_column: Some("vocabulary_id"),
      },
      Self::RelatedEntityIdentifier => TableSpec {
        table:         "related_entity_identifiers",
        id_column:     "related_entity_identifier_id",
        parent_column: Some("related_entity_id"),
      },
    }
  }
}

// ─── Payload trait ───────────────────────────────────────────────────────────

/// A payload stored in a versioned table.
pub trait Versioned:
  Serialize + DeserializeOwned + Clone + Send + Sync + 'static
{
  const KIND: EntityKind;

  /// Logical id of the owning entity, for kinds with a parent column.
  fn parent_id(&self) -> Option<Uuid> { None }
}

// ─── Vocabulary ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VocabularyStatus {
  Published,
  Deprecated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
  pub owner:       String,
  pub slug:        String,
  pub title:       String,
  pub description: Option<String>,
  pub status:      VocabularyStatus,
}

impl Versioned for Vocabulary {
  const KIND: EntityKind = EntityKind::Vocabulary;
}

// ─── Version ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStatus {
  Current,
  Superseded,
  Deprecated,
}

/// One release of a vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
  pub vocabulary_id: Uuid,
  pub slug:          String,
  pub title:         String,
  pub status:        VersionStatus,
  pub release_date:  Option<NaiveDate>,
}

impl Versioned for Version {
  const KIND: EntityKind = EntityKind::Version;

  fn parent_id(&self) -> Option<Uuid> { Some(self.vocabulary_id) }
}

// ─── Access point ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPointType {
  ApiSparql,
  File,
  SesameDownload,
  Sissvoc,
  WebPage,
}

/// A way of reaching the content of one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPoint {
  pub version_id: Uuid,
  #[serde(rename = "type")]
  pub kind:       AccessPointType,
  pub url:        String,
}

impl Versioned for AccessPoint {
  const KIND: EntityKind = EntityKind::AccessPoint;

  fn parent_id(&self) -> Option<Uuid> { Some(self.version_id) }
}

// ─── Related entities ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelatedEntityType {
  Party,
  Service,
  Vocabulary,
}

/// A party, service or external vocabulary that registry vocabularies point
/// at. Shared between vocabularies with the same owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedEntity {
  pub owner: String,
  #[serde(rename = "type")]
  pub kind:  RelatedEntityType,
  pub title: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub phone: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub urls:  Vec<String>,
}

impl Versioned for RelatedEntity {
  const KIND: EntityKind = EntityKind::RelatedEntity;
}

/// How a vocabulary relates to a related entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelatedEntityRelation {
  PublishedBy,
  HasAuthor,
  HasContributor,
  PointOfContact,
  ImplementedBy,
  ConsumerOf,
  HasAssociationWith,
  IsPresentedBy,
  IsUsedBy,
  IsDerivedFrom,
  Enriches,
  IsPartOf,
}

/// One relation between a vocabulary and a related entity. A vocabulary
/// related to the same entity in several ways has one row per relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyRelatedEntity {
  pub vocabulary_id:     Uuid,
  pub related_entity_id: Uuid,
  pub relation:          RelatedEntityRelation,
}

impl Versioned for VocabularyRelatedEntity {
  const KIND: EntityKind = EntityKind::VocabularyRelatedEntity;

  fn parent_id(&self) -> Option<Uuid> { Some(self.vocabulary_id) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelatedEntityIdentifierType {
  AuAnlPeau,
  Doi,
  Handle,
  Infouri,
  Isni,
  Local,
  Orcid,
  Purl,
  ResearcherId,
  Uri,
  Viaf,
}

/// An external identifier (DOI, ORCID, ...) of a related entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedEntityIdentifier {
  pub related_entity_id: Uuid,
  pub identifier_type:   RelatedEntityIdentifierType,
  pub identifier_value:  String,
}

impl Versioned for RelatedEntityIdentifier {
  const KIND: EntityKind = EntityKind::RelatedEntityIdentifier;

  fn parent_id(&self) -> Option<Uuid> { Some(self.related_entity_id) }
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// One stored version of a logical entity: its payload and the interval over
/// which that payload is (or was, or will be) authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedRow<P> {
  /// Surrogate key of the physical row.
  pub row_id:      i64,
  pub logical_id:  Uuid,
  pub interval:    Interval,
  pub modified_by: String,
  pub payload:     P,
}

/// The resolved kind of a pending draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DraftAction {
  Addition,
  Modification,
  Deletion,
}

impl DraftAction {
  /// Resolve a stored draft kind given whether the entity has a current row.
  pub fn resolve(kind: DraftKind, has_current: bool) -> Self {
    match (kind, has_current) {
      (DraftKind::Deletion, _) => Self::Deletion,
      (DraftKind::AdditionModification, true) => Self::Modification,
      (DraftKind::AdditionModification, false) => Self::Addition,
    }
  }

  pub fn stored_kind(self) -> DraftKind {
    match self {
      Self::Addition | Self::Modification => DraftKind::AdditionModification,
      Self::Deletion => DraftKind::Deletion,
    }
  }
}

/// A pending draft row together with what committing it would do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft<P> {
  pub action: DraftAction,
  pub row:    VersionedRow<P>,
}

/// The result of committing a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommitOutcome<P> {
  /// An addition or modification draft became the current row.
  Promoted { row: VersionedRow<P> },
  /// A deletion draft closed the current row at `at`.
  Retired { logical_id: Uuid, at: DateTime<Utc> },
}
