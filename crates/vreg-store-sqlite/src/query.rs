//! Rendering [`Predicate`]s to SQL, and the handful of statements the store
//! runs against a versioned table.
//!
//! Everything here is synchronous and takes a plain [`rusqlite::Connection`]
//! (a transaction derefs to one), so callers decide the transaction scope.

use rusqlite::{Connection, OptionalExtension as _, params, params_from_iter};
use vreg_core::{
  entity::TableSpec,
  interval::Predicate,
  sentinel::{END_DATE, START_DATE},
};

use crate::encode::{NewRawRow, RawRow, encode_dt, encode_uuid};

// ─── Rendering ───────────────────────────────────────────────────────────────

/// A `WHERE` clause body and its positional parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
  pub sql:    String,
  pub params: Vec<String>,
}

pub fn render(predicate: &Predicate, spec: &TableSpec) -> Fragment {
  let mut params = Vec::new();
  let sql = render_into(predicate, spec, &mut params);
  Fragment { sql, params }
}

fn render_into(
  predicate: &Predicate,
  spec: &TableSpec,
  params: &mut Vec<String>,
) -> String {
  match predicate {
    Predicate::Compare { column, cmp, value } => {
      params.push(encode_dt(*value));
      format!("{} {} ?", column.name(), cmp.operator())
    }
    Predicate::LogicalId(id) => {
      params.push(encode_uuid(*id));
      format!("{} = ?", spec.id_column)
    }
    Predicate::ParentId(id) => match spec.parent_column {
      Some(parent) => {
        params.push(encode_uuid(*id));
        format!("{parent} = ?")
      }
      // Kinds without a parent column have no children of anything.
      None => "0".to_owned(),
    },
    Predicate::All(parts) if parts.is_empty() => "1".to_owned(),
    Predicate::All(parts) => parts
      .iter()
      .map(|p| format!("({})", render_into(p, spec, params)))
      .collect::<Vec<_>>()
      .join(" AND "),
  }
}

fn select_columns(spec: &TableSpec) -> String {
  format!(
    "row_id, {}, {}, {START_DATE}, {END_DATE}, modified_by, data",
    spec.id_column,
    spec.parent_column.unwrap_or("NULL"),
  )
}

// ─── Reads ───────────────────────────────────────────────────────────────────

/// All rows matching `predicate`, ordered by logical id then start date.
pub fn select_rows(
  conn: &Connection,
  spec: &TableSpec,
  predicate: &Predicate,
) -> rusqlite::Result<Vec<RawRow>> {
  let Fragment { sql, params } = render(predicate, spec);
  let query = format!(
    "SELECT {} FROM {} WHERE {sql} ORDER BY {}, {START_DATE}",
    select_columns(spec),
    spec.table,
    spec.id_column,
  );
  let mut stmt = conn.prepare(&query)?;
  let rows = stmt
    .query_map(params_from_iter(params.iter()), RawRow::from_sql)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

/// The single row matching `predicate`. Callers only use predicates that a
/// unique index or the partition invariant limits to one row.
pub fn select_one(
  conn: &Connection,
  spec: &TableSpec,
  predicate: &Predicate,
) -> rusqlite::Result<Option<RawRow>> {
  let Fragment { sql, params } = render(predicate, spec);
  let query = format!(
    "SELECT {} FROM {} WHERE {sql} LIMIT 1",
    select_columns(spec),
    spec.table,
  );
  conn
    .query_row(&query, params_from_iter(params.iter()), RawRow::from_sql)
    .optional()
}

/// Logical ids of every row matching `predicate`.
pub fn select_ids(
  conn: &Connection,
  spec: &TableSpec,
  predicate: &Predicate,
) -> rusqlite::Result<Vec<String>> {
  let Fragment { sql, params } = render(predicate, spec);
  let query = format!("SELECT {} FROM {} WHERE {sql}", spec.id_column, spec.table);
  let mut stmt = conn.prepare(&query)?;
  let ids = stmt
    .query_map(params_from_iter(params.iter()), |r| r.get(0))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(ids)
}

/// The latest end date among rows matching `predicate`.
pub fn max_end(
  conn: &Connection,
  spec: &TableSpec,
  predicate: &Predicate,
) -> rusqlite::Result<Option<String>> {
  let Fragment { sql, params } = render(predicate, spec);
  let query = format!("SELECT MAX({END_DATE}) FROM {} WHERE {sql}", spec.table);
  conn.query_row(&query, params_from_iter(params.iter()), |r| r.get(0))
}

// ─── Writes ──────────────────────────────────────────────────────────────────

pub fn insert_row(
  conn: &Connection,
  spec: &TableSpec,
  row: NewRawRow,
  start: String,
  end: String,
) -> rusqlite::Result<RawRow> {
  match spec.parent_column {
    Some(parent) => conn.execute(
      &format!(
        "INSERT INTO {} ({}, {parent}, {START_DATE}, {END_DATE}, modified_by, data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        spec.table, spec.id_column,
      ),
      params![row.logical_id, row.parent_id, start, end, row.modified_by, row.data],
    )?,
    None => conn.execute(
      &format!(
        "INSERT INTO {} ({}, {START_DATE}, {END_DATE}, modified_by, data)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        spec.table, spec.id_column,
      ),
      params![row.logical_id, start, end, row.modified_by, row.data],
    )?,
  };

  Ok(RawRow {
    row_id:      conn.last_insert_rowid(),
    logical_id:  row.logical_id,
    parent_id:   row.parent_id.filter(|_| spec.parent_column.is_some()),
    start_date:  start,
    end_date:    end,
    modified_by: row.modified_by,
    data:        row.data,
  })
}

/// Rewrite both bounds of a row's interval.
pub fn set_interval(
  conn: &Connection,
  spec: &TableSpec,
  row_id: i64,
  start: &str,
  end: &str,
) -> rusqlite::Result<()> {
  conn.execute(
    &format!(
      "UPDATE {} SET {START_DATE} = ?1, {END_DATE} = ?2 WHERE row_id = ?3",
      spec.table
    ),
    params![start, end, row_id],
  )?;
  Ok(())
}

/// Close a row by rewriting its end date.
pub fn set_end(
  conn: &Connection,
  spec: &TableSpec,
  row_id: i64,
  end: &str,
) -> rusqlite::Result<()> {
  conn.execute(
    &format!("UPDATE {} SET {END_DATE} = ?1 WHERE row_id = ?2", spec.table),
    params![end, row_id],
  )?;
  Ok(())
}

/// Replace the payload of a (draft) row.
pub fn set_payload(
  conn: &Connection,
  spec: &TableSpec,
  row_id: i64,
  row: &NewRawRow,
) -> rusqlite::Result<()> {
  match spec.parent_column {
    Some(parent) => conn.execute(
      &format!(
        "UPDATE {} SET {parent} = ?1, modified_by = ?2, data = ?3 WHERE row_id = ?4",
        spec.table
      ),
      params![row.parent_id, row.modified_by, row.data, row_id],
    )?,
    None => conn.execute(
      &format!(
        "UPDATE {} SET modified_by = ?1, data = ?2 WHERE row_id = ?3",
        spec.table
      ),
      params![row.modified_by, row.data, row_id],
    )?,
  };
  Ok(())
}

pub fn delete_row(conn: &Connection, spec: &TableSpec, row_id: i64) -> rusqlite::Result<()> {
  conn.execute(
    &format!("DELETE FROM {} WHERE row_id = ?1", spec.table),
    params![row_id],
  )?;
  Ok(())
}
