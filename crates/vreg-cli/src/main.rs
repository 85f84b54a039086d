//! `vreg`: command-line access to the vocabulary registry store.
//!
//! Reads `vreg.toml` (or the path given with `--config`) plus `VREG_*`
//! environment variables, opens the SQLite store, runs one lifecycle
//! operation and prints the result as JSON.

mod settings;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use vreg_core::{
  entity::{
    AccessPoint, EntityKind, RelatedEntity, RelatedEntityIdentifier, Version,
    Versioned, Vocabulary, VocabularyRelatedEntity,
  },
  store::{DraftLifecycle, VersionedStore},
};
use vreg_store_sqlite::SqliteStore;

use settings::Settings;

#[derive(Parser)]
#[command(author, version, about = "Vocabulary registry temporal store")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "vreg.toml", global = true)]
  config: PathBuf,

  /// Who to record as the author of writes; defaults to `modified_by` from
  /// the configuration.
  #[arg(long, global = true)]
  by: Option<String>,

  #[command(subcommand)]
  command: Command,
}

/// Every command takes the entity kind first: `vocabulary`, `version`,
/// `access_point`, `related_entity`, `vocabulary_related_entity` or
/// `related_entity_identifier`. Payload arguments are paths to JSON files, or
/// `-` for stdin.
#[derive(Subcommand, Debug)]
enum Command {
  /// Print the current row of an entity.
  Current { kind: EntityKind, id: Uuid },
  /// Print every current row of a kind.
  List { kind: EntityKind },
  /// Print the row that was authoritative at an instant (RFC 3339).
  AsOf {
    kind: EntityKind,
    id:   Uuid,
    at:   DateTime<Utc>,
  },
  /// Print every committed row of an entity, oldest first.
  History { kind: EntityKind, id: Uuid },
  /// Print the current children of a parent entity.
  Children { kind: EntityKind, parent: Uuid },
  /// Create the first current row of an entity.
  Create {
    kind:    EntityKind,
    payload: PathBuf,
    /// Logical id to use; a fresh one is generated when omitted.
    #[arg(long)]
    id:      Option<Uuid>,
  },
  /// Replace the current row of an entity.
  Supersede {
    kind:      EntityKind,
    id:        Uuid,
    payload:   PathBuf,
    /// When the new content takes effect; defaults to now.
    #[arg(long)]
    effective: Option<DateTime<Utc>>,
  },
  /// Close the current row of an entity without a replacement.
  Retire {
    kind:      EntityKind,
    id:        Uuid,
    #[arg(long)]
    effective: Option<DateTime<Utc>>,
  },
  /// Propose a new entity as a draft.
  ProposeAdd {
    kind:    EntityKind,
    payload: PathBuf,
    #[arg(long)]
    id:      Option<Uuid>,
  },
  /// Propose new content for an existing entity.
  ProposeModify {
    kind:    EntityKind,
    id:      Uuid,
    payload: PathBuf,
  },
  /// Propose retiring an existing entity.
  ProposeDelete { kind: EntityKind, id: Uuid },
  /// Replace the payload of a pending addition or modification.
  Revise {
    kind:    EntityKind,
    id:      Uuid,
    payload: PathBuf,
  },
  /// Print every pending draft of a kind.
  Drafts { kind: EntityKind },
  /// Print the pending draft of an entity.
  Draft { kind: EntityKind, id: Uuid },
  /// Apply the pending draft of an entity.
  Commit { kind: EntityKind, id: Uuid },
  /// Throw away the pending draft of an entity.
  Discard { kind: EntityKind, id: Uuid },
  /// Print the lifecycle state of an entity.
  State { kind: EntityKind, id: Uuid },
}

impl Command {
  fn kind(&self) -> EntityKind {
    match self {
      Self::Current { kind, .. }
      | Self::List { kind }
      | Self::AsOf { kind, .. }
      | Self::History { kind, .. }
      | Self::Children { kind, .. }
      | Self::Create { kind, .. }
      | Self::Supersede { kind, .. }
      | Self::Retire { kind, .. }
      | Self::ProposeAdd { kind, .. }
      | Self::ProposeModify { kind, .. }
      | Self::ProposeDelete { kind, .. }
      | Self::Revise { kind, .. }
      | Self::Drafts { kind }
      | Self::Draft { kind, .. }
      | Self::Commit { kind, .. }
      | Self::Discard { kind, .. }
      | Self::State { kind, .. } => *kind,
    }
  }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Logs go to stderr so stdout stays valid JSON.
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = Settings::load(&cli.config)
    .with_context(|| format!("failed to read configuration from {:?}", cli.config))?;
  let store_path = settings.resolved_store_path();

  let store = SqliteStore::builder()
    .path(&store_path)
    .config(settings.store_config())
    .open()
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let by = cli.by.unwrap_or(settings.modified_by);

  match cli.command.kind() {
    EntityKind::Vocabulary => run::<Vocabulary>(&store, &by, cli.command).await,
    EntityKind::Version => run::<Version>(&store, &by, cli.command).await,
    EntityKind::AccessPoint => run::<AccessPoint>(&store, &by, cli.command).await,
    EntityKind::RelatedEntity => {
      run::<RelatedEntity>(&store, &by, cli.command).await
    }
    EntityKind::VocabularyRelatedEntity => {
      run::<VocabularyRelatedEntity>(&store, &by, cli.command).await
    }
    EntityKind::RelatedEntityIdentifier => {
      run::<RelatedEntityIdentifier>(&store, &by, cli.command).await
    }
  }
}

/// Run `command` against the table for payload type `P`.
async fn run<P: Versioned>(
  store: &SqliteStore,
  by: &str,
  command: Command,
) -> anyhow::Result<()> {
  match command {
    Command::Current { id, .. } => print_json(&store.get_current::<P>(id).await?),
    Command::List { .. } => print_json(&store.get_all_current::<P>().await?),
    Command::AsOf { id, at, .. } => print_json(&store.get_as_of::<P>(id, at).await?),
    Command::History { id, .. } => print_json(&store.history::<P>(id).await?),
    Command::Children { parent, .. } => {
      print_json(&store.get_current_children::<P>(parent).await?)
    }
    Command::Create { id, payload, .. } => {
      let payload: P = read_payload(&payload)?;
      let id = id.unwrap_or_else(Uuid::new_v4);
      print_json(&store.create_current(id, payload, by).await?)
    }
    Command::Supersede { id, payload, effective, .. } => {
      let payload: P = read_payload(&payload)?;
      let effective = effective.unwrap_or_else(Utc::now);
      print_json(&store.supersede(id, payload, effective, by).await?)
    }
    Command::Retire { id, effective, .. } => {
      let effective = effective.unwrap_or_else(Utc::now);
      print_json(&store.retire::<P>(id, effective).await?)
    }
    Command::ProposeAdd { id, payload, .. } => {
      let payload: P = read_payload(&payload)?;
      let id = id.unwrap_or_else(Uuid::new_v4);
      print_json(&store.propose_addition(id, payload, by).await?)
    }
    Command::ProposeModify { id, payload, .. } => {
      let payload: P = read_payload(&payload)?;
      print_json(&store.propose_modification(id, payload, by).await?)
    }
    Command::ProposeDelete { id, .. } => {
      print_json(&store.propose_deletion::<P>(id, by).await?)
    }
    Command::Revise { id, payload, .. } => {
      let payload: P = read_payload(&payload)?;
      print_json(&store.revise_draft(id, payload, by).await?)
    }
    Command::Drafts { .. } => print_json(&store.get_all_drafts::<P>().await?),
    Command::Draft { id, .. } => print_json(&store.get_draft::<P>(id).await?),
    Command::Commit { id, .. } => print_json(&store.commit_draft::<P>(id).await?),
    Command::Discard { id, .. } => print_json(&store.discard_draft::<P>(id).await?),
    Command::State { id, .. } => print_json(&store.lifecycle_state::<P>(id).await?),
  }
}

/// Read a JSON payload from `path`, or from stdin when `path` is `-`.
fn read_payload<P: Versioned>(path: &Path) -> anyhow::Result<P> {
  let text = if path == Path::new("-") {
    std::io::read_to_string(std::io::stdin()).context("failed to read stdin")?
  } else {
    std::fs::read_to_string(path)
      .with_context(|| format!("failed to read payload from {path:?}"))?
  };
  serde_json::from_str(&text)
    .with_context(|| format!("payload is not a valid {}", P::KIND))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn kind_is_parsed_from_snake_case() {
    let cli = Cli::try_parse_from([
      "vreg",
      "history",
      "access_point",
      "6f1c1f0e-7d1a-4b55-9d39-0d5c4f2b1a11",
    ])
    .unwrap();
    assert_eq!(cli.command.kind(), EntityKind::AccessPoint);
  }

  #[test]
  fn related_entity_kinds_are_accepted() {
    let cli = Cli::try_parse_from([
      "vreg",
      "children",
      "vocabulary_related_entity",
      "6f1c1f0e-7d1a-4b55-9d39-0d5c4f2b1a11",
    ])
    .unwrap();
    assert_eq!(cli.command.kind(), EntityKind::VocabularyRelatedEntity);

    let cli = Cli::try_parse_from(["vreg", "list", "related_entity_identifier"]).unwrap();
    assert_eq!(cli.command.kind(), EntityKind::RelatedEntityIdentifier);
  }

  #[test]
  fn unknown_kind_is_rejected() {
    let parsed = Cli::try_parse_from(["vreg", "list", "concept"]);
    assert!(parsed.is_err());
  }

  #[test]
  fn supersede_takes_optional_effective_instant() {
    let cli = Cli::try_parse_from([
      "vreg",
      "--by",
      "editor",
      "supersede",
      "vocabulary",
      "6f1c1f0e-7d1a-4b55-9d39-0d5c4f2b1a11",
      "v2.json",
      "--effective",
      "2024-06-01T00:00:00Z",
    ])
    .unwrap();
    assert_eq!(cli.by.as_deref(), Some("editor"));
    let Command::Supersede { effective, payload, .. } = cli.command else {
      panic!("expected supersede");
    };
    assert_eq!(payload, PathBuf::from("v2.json"));
    assert_eq!(
      effective.map(|t| t.to_rfc3339()),
      Some("2024-06-01T00:00:00+00:00".to_owned())
    );
  }
}
