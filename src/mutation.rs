use std::collections::BTreeMap;

use auto_impl::auto_impl;

use crate::error::{Error, NotUpdatableReason, Result};
use crate::field::Encoding;
use crate::protocol::column::{Column, ColumnSet};
use crate::value::Param;

/// Write-back state machine of an updatable result.
///
/// `Standard` staging a column moves to `StagingUpdate`; committing moves
/// through `Updated` back to `Standard` on the next transition. The insert
/// path mirrors it via `StagingInsert`/`Inserted`. Any reposition clears
/// staging and, from `StagingInsert`, restores the saved position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    Standard,
    StagingUpdate,
    Updated,
    StagingInsert,
    Inserted,
}

/// Pending mutation set: the staged values plus the state machine.
pub(crate) struct Mutation {
    pub(crate) meta: std::result::Result<UpdatableMeta, NotUpdatableReason>,
    pub(crate) state: MutationState,
    /// Sparse 0-based column index -> staged value.
    pub(crate) staged: BTreeMap<usize, Param>,
    /// Cursor position to restore when insert staging ends.
    pub(crate) saved_pos: i64,
}

impl Mutation {
    pub(crate) fn new(meta: std::result::Result<UpdatableMeta, NotUpdatableReason>) -> Self {
        Self {
            meta,
            state: MutationState::Standard,
            staged: BTreeMap::new(),
            saved_pos: -1,
        }
    }
}

/// The single table and discovered primary key backing an updatable result.
#[derive(Debug, Clone)]
pub struct UpdatableMeta {
    pub schema: String,
    pub table: String,
    /// 0-based indexes of the key columns within the result.
    pub pk_columns: Vec<usize>,
}

/// Affected-row metadata of one executed statement.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecOutcome {
    pub affected_rows: u64,
    pub last_insert_id: u64,
}

/// Statement-execution collaborator the synthesizer drives.
///
/// Statement preparation and parameter binding stay outside this crate; the
/// synthesizer only supplies SQL text with `?` placeholders and owned
/// parameters. `query_one` must return the row payload in the requested
/// encoding. `primary_key` runs the schema introspection (information_schema
/// or `SHOW KEYS`) and reports key column names in key order.
#[auto_impl(&mut, Box)]
pub trait Executor {
    fn execute(&mut self, sql: &str, params: &[Param]) -> Result<ExecOutcome>;

    fn query_one(
        &mut self,
        sql: &str,
        params: &[Param],
        encoding: Encoding,
    ) -> Result<Option<Box<[u8]>>>;

    fn primary_key(&mut self, schema: &str, table: &str) -> Result<Vec<String>>;

    /// Whether the dialect supports `INSERT .. RETURNING` (MariaDB 10.5+).
    fn supports_insert_returning(&self) -> bool {
        false
    }
}

/// Check the updatability precondition once, at construction.
///
/// The outer error is an introspection failure (transport); the inner result
/// records why mutations must be refused, without failing construction.
pub(crate) fn discover<E: Executor>(
    columns: &ColumnSet,
    exec: &mut E,
) -> Result<std::result::Result<UpdatableMeta, NotUpdatableReason>> {
    let cols = columns.columns();
    let Some(first) = cols.first() else {
        return Ok(Err(NotUpdatableReason::NoTable));
    };
    if first.org_table.is_empty() {
        return Ok(Err(NotUpdatableReason::NoTable));
    }
    for col in cols {
        if col.org_table.is_empty() {
            return Ok(Err(NotUpdatableReason::NoTable));
        }
        if col.org_table != first.org_table || col.schema != first.schema {
            return Ok(Err(NotUpdatableReason::MultipleTables));
        }
    }

    let pk_names = exec.primary_key(&first.schema, &first.org_table)?;
    if pk_names.is_empty() {
        return Ok(Err(NotUpdatableReason::NoPrimaryKey));
    }

    let mut pk_columns = Vec::with_capacity(pk_names.len());
    for name in &pk_names {
        match cols
            .iter()
            .position(|c| c.org_name.eq_ignore_ascii_case(name))
        {
            Some(index) => pk_columns.push(index),
            None => return Ok(Err(NotUpdatableReason::PrimaryKeyNotSelected)),
        }
    }

    tracing::debug!(
        table = %first.org_table,
        key_columns = pk_columns.len(),
        "result is updatable"
    );
    Ok(Ok(UpdatableMeta {
        schema: first.schema.clone(),
        table: first.org_table.clone(),
        pk_columns,
    }))
}

/// Backtick-quote an identifier, doubling embedded backticks.
fn quote_ident(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('`');
    for ch in name.chars() {
        if ch == '`' {
            out.push('`');
        }
        out.push(ch);
    }
    out.push('`');
    out
}

fn table_reference(meta: &UpdatableMeta) -> String {
    if meta.schema.is_empty() {
        quote_ident(&meta.table)
    } else {
        format!("{}.{}", quote_ident(&meta.schema), quote_ident(&meta.table))
    }
}

fn where_by_pk(meta: &UpdatableMeta, columns: &[Column]) -> String {
    let mut out = String::new();
    for (i, &idx) in meta.pk_columns.iter().enumerate() {
        if i > 0 {
            out.push_str(" AND ");
        }
        out.push_str(&quote_ident(&columns[idx].org_name));
        out.push_str("=?");
    }
    out
}

/// `UPDATE <table> SET <staged>=? WHERE <pk>=?`.
pub(crate) fn build_update(
    meta: &UpdatableMeta,
    columns: &[Column],
    staged: &[(usize, Param)],
) -> String {
    let mut sql = format!("UPDATE {} SET ", table_reference(meta));
    for (i, (idx, _)) in staged.iter().enumerate() {
        if i > 0 {
            sql.push(',');
        }
        sql.push_str(&quote_ident(&columns[*idx].org_name));
        sql.push_str("=?");
    }
    sql.push_str(" WHERE ");
    sql.push_str(&where_by_pk(meta, columns));
    sql
}

/// `DELETE FROM <table> WHERE <pk>=?`.
pub(crate) fn build_delete(meta: &UpdatableMeta, columns: &[Column]) -> String {
    format!(
        "DELETE FROM {} WHERE {}",
        table_reference(meta),
        where_by_pk(meta, columns)
    )
}

/// Re-select the result's columns for one row by primary key.
pub(crate) fn build_select_by_pk(meta: &UpdatableMeta, columns: &[Column]) -> String {
    let mut sql = String::from("SELECT ");
    for (i, col) in columns.iter().enumerate() {
        if i > 0 {
            sql.push(',');
        }
        sql.push_str(&quote_ident(&col.org_name));
    }
    sql.push_str(" FROM ");
    sql.push_str(&table_reference(meta));
    sql.push_str(" WHERE ");
    sql.push_str(&where_by_pk(meta, columns));
    sql
}

/// Build the INSERT for the staged columns.
///
/// Unstaged columns are omitted when the server generates them
/// (auto-increment) or fills a declared default; nullable columns get an
/// explicit NULL; anything else fails the whole operation before any SQL is
/// sent.
pub(crate) fn build_insert(
    meta: &UpdatableMeta,
    columns: &[Column],
    staged: &[(usize, Param)],
) -> Result<(String, Vec<Param>)> {
    let mut names = Vec::new();
    let mut placeholders = Vec::new();
    let mut params = Vec::new();

    for (index, col) in columns.iter().enumerate() {
        if let Some((_, param)) = staged.iter().find(|(i, _)| *i == index) {
            names.push(quote_ident(&col.org_name));
            placeholders.push("?");
            params.push(param.clone());
        } else if col.is_auto_increment() {
            // Server-generated surrogate.
        } else if col.is_nullable() {
            names.push(quote_ident(&col.org_name));
            placeholders.push("NULL");
        } else if col.has_default() {
            // Omitted so the server applies the declared default.
        } else {
            return Err(Error::InsertMissingColumn(col.org_name.clone()));
        }
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table_reference(meta),
        names.join(","),
        placeholders.join(",")
    );
    Ok((sql, params))
}

/// Append a RETURNING clause covering the result's columns.
pub(crate) fn with_returning(sql: &str, columns: &[Column]) -> String {
    let list: Vec<String> = columns.iter().map(|c| quote_ident(&c.org_name)).collect();
    format!("{} RETURNING {}", sql, list.join(","))
}

/// Key tuple to re-select a freshly inserted row by: the staged key values
/// when the whole key was supplied, else the generated auto-increment id.
pub(crate) fn insert_key(
    meta: &UpdatableMeta,
    columns: &[Column],
    staged: &[(usize, Param)],
    outcome: &ExecOutcome,
) -> Option<Vec<Param>> {
    let staged_key: Option<Vec<Param>> = meta
        .pk_columns
        .iter()
        .map(|idx| {
            staged
                .iter()
                .find(|(i, _)| i == idx)
                .map(|(_, p)| p.clone())
        })
        .collect();
    if let Some(key) = staged_key {
        return Some(key);
    }
    if let [idx] = meta.pk_columns[..] {
        if columns[idx].is_auto_increment() && outcome.last_insert_id != 0 {
            return Some(vec![Param::UInt(outcome.last_insert_id)]);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant::{ColumnFlags, ColumnType};
    use crate::testutil::{column, column_set};
    use pretty_assertions::assert_eq;

    fn meta() -> UpdatableMeta {
        UpdatableMeta {
            schema: "db".to_string(),
            table: "t".to_string(),
            pk_columns: vec![0],
        }
    }

    fn id_name_columns() -> Vec<Column> {
        vec![
            column(
                "id",
                ColumnType::MYSQL_TYPE_LONGLONG,
                ColumnFlags::PRI_KEY_FLAG | ColumnFlags::NOT_NULL_FLAG | ColumnFlags::AUTO_INCREMENT_FLAG,
            ),
            column("name", ColumnType::MYSQL_TYPE_VAR_STRING, ColumnFlags::empty()),
        ]
    }

    #[test]
    fn update_sql_shape() {
        let cols = id_name_columns();
        let staged = vec![(1, Param::Text("new".to_string()))];
        let sql = build_update(&meta(), &cols, &staged);
        assert_eq!(sql, "UPDATE `db`.`t` SET `name`=? WHERE `id`=?");
    }

    #[test]
    fn delete_and_select_sql_shape() {
        let cols = id_name_columns();
        assert_eq!(
            build_delete(&meta(), &cols),
            "DELETE FROM `db`.`t` WHERE `id`=?"
        );
        assert_eq!(
            build_select_by_pk(&meta(), &cols),
            "SELECT `id`,`name` FROM `db`.`t` WHERE `id`=?"
        );
    }

    #[test]
    fn insert_fills_nullable_and_skips_generated() {
        let cols = id_name_columns();
        let staged: Vec<(usize, Param)> = vec![];
        // id is auto-increment (omitted), name is nullable (explicit NULL)
        let (sql, params) = build_insert(&meta(), &cols, &staged).unwrap();
        assert_eq!(sql, "INSERT INTO `db`.`t` (`name`) VALUES (NULL)");
        assert!(params.is_empty());
    }

    #[test]
    fn insert_fails_without_required_column() {
        let cols = vec![
            column(
                "id",
                ColumnType::MYSQL_TYPE_LONGLONG,
                ColumnFlags::PRI_KEY_FLAG
                    | ColumnFlags::NOT_NULL_FLAG
                    | ColumnFlags::NO_DEFAULT_VALUE_FLAG,
            ),
            column("name", ColumnType::MYSQL_TYPE_VAR_STRING, ColumnFlags::empty()),
        ];
        let err = build_insert(&meta(), &cols, &[]).unwrap_err();
        assert!(matches!(err, Error::InsertMissingColumn(name) if name == "id"));
    }

    #[test]
    fn insert_key_prefers_staged_then_generated() {
        let cols = id_name_columns();
        let m = meta();

        let staged = vec![(0, Param::Int(9))];
        assert_eq!(
            insert_key(&m, &cols, &staged, &ExecOutcome::default()),
            Some(vec![Param::Int(9)])
        );

        let outcome = ExecOutcome {
            affected_rows: 1,
            last_insert_id: 42,
        };
        assert_eq!(
            insert_key(&m, &cols, &[], &outcome),
            Some(vec![Param::UInt(42)])
        );
    }

    #[test]
    fn quoting_doubles_backticks() {
        assert_eq!(quote_ident("we`ird"), "`we``ird`");
    }

    #[test]
    fn discovery_rejects_multi_table_results() {
        struct NoopExec;
        impl Executor for NoopExec {
            fn execute(&mut self, _: &str, _: &[Param]) -> Result<ExecOutcome> {
                Ok(ExecOutcome::default())
            }
            fn query_one(
                &mut self,
                _: &str,
                _: &[Param],
                _: Encoding,
            ) -> Result<Option<Box<[u8]>>> {
                Ok(None)
            }
            fn primary_key(&mut self, _: &str, _: &str) -> Result<Vec<String>> {
                Ok(vec!["id".to_string()])
            }
        }

        let set = column_set(&[
            ("db", "a", "id", ColumnType::MYSQL_TYPE_LONG, ColumnFlags::empty()),
            ("db", "b", "x", ColumnType::MYSQL_TYPE_LONG, ColumnFlags::empty()),
        ]);
        let result = discover(&set, &mut NoopExec).unwrap();
        assert_eq!(result.unwrap_err(), NotUpdatableReason::MultipleTables);

        let set = column_set(&[(
            "db",
            "a",
            "id",
            ColumnType::MYSQL_TYPE_LONG,
            ColumnFlags::empty(),
        )]);
        let result = discover(&set, &mut NoopExec).unwrap();
        assert_eq!(result.unwrap().pk_columns, vec![0]);
    }
}
