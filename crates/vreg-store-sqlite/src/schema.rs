//! SQL schema for the registry's versioned tables.
//!
//! One table per [`EntityKind`], all sharing the same temporal layout. The
//! partial unique indexes embed the sentinel literals, so the DDL is built
//! from the store's [`Sentinels`] rather than kept as a constant.

use strum::IntoEnumIterator as _;
use vreg_core::{
  entity::EntityKind,
  sentinel::{END_DATE, START_DATE, Sentinels},
};

use crate::encode::encode_dt;

/// Connection settings and the table recording which sentinels the database
/// was created with. Runs before anything else.
pub const META: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS temporal_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

/// `(key, value)` pairs pinned into `temporal_meta`.
pub fn sentinel_entries(s: &Sentinels) -> [(&'static str, String); 4] {
  [
    ("currently_valid_end", encode_dt(s.currently_valid_end())),
    ("draft_start", encode_dt(s.draft_start())),
    (
      "draft_addition_modification_end",
      encode_dt(s.draft_addition_modification_end()),
    ),
    ("draft_deletion_end", encode_dt(s.draft_deletion_end())),
  ]
}

/// DDL for every versioned table; idempotent thanks to `IF NOT EXISTS`.
pub fn versioned_tables(s: &Sentinels) -> String {
  let current_end = encode_dt(s.currently_valid_end());
  let draft_start = encode_dt(s.draft_start());

  let mut ddl = String::new();
  for kind in EntityKind::iter() {
    let spec = kind.table();
    let (table, id) = (spec.table, spec.id_column);
    let parent_col = spec
      .parent_column
      .map(|p| format!("\n    {p} TEXT NOT NULL,"))
      .unwrap_or_default();

    ddl.push_str(&format!(
      "
-- Rows are never removed except pending drafts. History is closed by
-- rewriting a current row's {END_DATE}, never by deleting it.
CREATE TABLE IF NOT EXISTS {table} (
    row_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    {id} TEXT NOT NULL,{parent_col}
    {START_DATE}  TEXT NOT NULL,    -- fixed-width RFC 3339 UTC
    {END_DATE}    TEXT NOT NULL,
    modified_by TEXT NOT NULL,
    data        TEXT NOT NULL,    -- JSON payload
    CHECK ({START_DATE} < {END_DATE})
);

CREATE INDEX IF NOT EXISTS {table}_end_idx      ON {table}({END_DATE});
CREATE INDEX IF NOT EXISTS {table}_id_end_idx   ON {table}({id}, {END_DATE});
CREATE INDEX IF NOT EXISTS {table}_interval_idx ON {table}({START_DATE}, {END_DATE});

-- At most one current row and at most one draft per logical entity.
CREATE UNIQUE INDEX IF NOT EXISTS {table}_one_current
    ON {table}({id}) WHERE {END_DATE} = '{current_end}';
CREATE UNIQUE INDEX IF NOT EXISTS {table}_one_draft
    ON {table}({id}) WHERE {START_DATE} = '{draft_start}';
"
    ));

    if let Some(parent) = spec.parent_column {
      ddl.push_str(&format!(
        "CREATE INDEX IF NOT EXISTS {table}_parent_end_idx ON {table}({parent}, {END_DATE});\n"
      ));
    }
  }
  ddl
}
