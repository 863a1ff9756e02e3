//! Statement rendering and execution shared by both session kinds.

use crate::error::{PersistError, PersistResult};
use crate::mapping::{display_value, quote_ident, sql_value, Entity, Field};
use crate::query::Criteria;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

/// A rendered write with its bound values.
#[derive(Debug, Clone)]
pub(crate) struct WriteStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

pub(crate) fn id_value<T: Entity>(entity: &T) -> PersistResult<Option<Value>> {
    entity.id().map(|id| sql_value(&id)).transpose()
}

pub(crate) fn require_id<T: Entity>(entity: &T) -> PersistResult<Value> {
    id_value(entity)?.ok_or_else(|| {
        PersistError::InvalidData(format!("`{}` entity has no identifier", T::TABLE))
    })
}

fn column_values<T: Entity>(entity: &T) -> PersistResult<Vec<Value>> {
    let values = entity.values();
    if values.len() != T::COLUMNS.len() {
        return Err(PersistError::InvalidData(format!(
            "`{}` produced {} values for {} mapped columns",
            T::TABLE,
            values.len(),
            T::COLUMNS.len()
        )));
    }
    Ok(values)
}

fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn find_by_id<T: Entity>(conn: &Connection, id: Value) -> PersistResult<Option<T>> {
    let criteria = Criteria::<T>::new().eq(Field::id(), id);
    Ok(list(conn, &criteria)?.into_iter().next())
}

pub(crate) fn list<T: Entity>(conn: &Connection, criteria: &Criteria<T>) -> PersistResult<Vec<T>> {
    let (sql, params) = criteria.select_sql();
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(params.iter()))?;

    let mut entities = Vec::new();
    while let Some(row) = rows.next()? {
        entities.push(T::from_row(row)?);
    }
    Ok(entities)
}

pub(crate) fn count<T: Entity>(conn: &Connection, criteria: &Criteria<T>) -> PersistResult<u64> {
    let (sql, params) = criteria.count_sql();
    let count: i64 = conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;
    u64::try_from(count)
        .map_err(|_| PersistError::InvalidData(format!("negative row count {count}")))
}

pub(crate) fn query_values(
    conn: &Connection,
    sql: &str,
    params: &[Value],
) -> PersistResult<Vec<Vec<Value>>> {
    let mut stmt = conn.prepare(sql)?;
    let width = stmt.column_count();
    let mut rows = stmt.query(params_from_iter(params.iter()))?;

    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(width);
        for index in 0..width {
            values.push(row.get::<_, Value>(index)?);
        }
        records.push(values);
    }
    Ok(records)
}

/// Inserts `entity` right away and returns its identifier.
///
/// Entities without an identifier receive the generated rowid.
pub(crate) fn insert<T: Entity>(conn: &Connection, entity: &mut T) -> PersistResult<Value> {
    let id = id_value(entity)?;
    let mut columns = Vec::with_capacity(T::COLUMNS.len() + 1);
    let mut params = Vec::with_capacity(T::COLUMNS.len() + 1);
    if let Some(id) = &id {
        columns.push(quote_ident(T::ID_COLUMN));
        params.push(id.clone());
    }
    columns.extend(T::COLUMNS.iter().map(|column| quote_ident(column)));
    params.extend(column_values(entity)?);

    let sql = if columns.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", quote_ident(T::TABLE))
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(T::TABLE),
            columns.join(", "),
            placeholders(columns.len())
        )
    };
    conn.execute(&sql, params_from_iter(params.iter()))?;

    match id {
        Some(id) => Ok(id),
        None => {
            let rowid = conn.last_insert_rowid();
            entity.assign_generated_id(rowid);
            Ok(Value::Integer(rowid))
        }
    }
}

pub(crate) fn update_statement<T: Entity>(entity: &T, id: &Value) -> PersistResult<WriteStatement> {
    let mut params = column_values(entity)?;
    let assignments = if T::COLUMNS.is_empty() {
        format!("{0} = {0}", quote_ident(T::ID_COLUMN))
    } else {
        T::COLUMNS
            .iter()
            .enumerate()
            .map(|(index, column)| format!("{} = ?{}", quote_ident(column), index + 1))
            .collect::<Vec<_>>()
            .join(", ")
    };
    params.push(id.clone());

    Ok(WriteStatement {
        sql: format!(
            "UPDATE {} SET {assignments} WHERE {} = ?{}",
            quote_ident(T::TABLE),
            quote_ident(T::ID_COLUMN),
            params.len()
        ),
        params,
    })
}

pub(crate) fn delete_statement<T: Entity>(id: &Value) -> WriteStatement {
    WriteStatement {
        sql: format!(
            "DELETE FROM {} WHERE {} = ?1",
            quote_ident(T::TABLE),
            quote_ident(T::ID_COLUMN)
        ),
        params: vec![id.clone()],
    }
}

/// Insert-or-update keyed on the identity column.
pub(crate) fn upsert_statement<T: Entity>(entity: &T, id: &Value) -> PersistResult<WriteStatement> {
    let mut params = vec![id.clone()];
    params.extend(column_values(entity)?);

    let columns = std::iter::once(T::ID_COLUMN)
        .chain(T::COLUMNS.iter().copied())
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(", ");
    let conflict = if T::COLUMNS.is_empty() {
        "DO NOTHING".to_string()
    } else {
        let assignments = T::COLUMNS
            .iter()
            .map(|column| format!("{0} = excluded.{0}", quote_ident(column)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("DO UPDATE SET {assignments}")
    };

    Ok(WriteStatement {
        sql: format!(
            "INSERT INTO {} ({columns}) VALUES ({}) ON CONFLICT({}) {conflict}",
            quote_ident(T::TABLE),
            placeholders(params.len()),
            quote_ident(T::ID_COLUMN)
        ),
        params,
    })
}

pub(crate) fn execute(conn: &Connection, statement: &WriteStatement) -> PersistResult<usize> {
    Ok(conn.execute(&statement.sql, params_from_iter(statement.params.iter()))?)
}

/// Runs `statement` and fails with `NotFound` when it touched no row.
pub(crate) fn execute_existing(
    conn: &Connection,
    entity: &'static str,
    id: &Value,
    statement: &WriteStatement,
) -> PersistResult<()> {
    if execute(conn, statement)? == 0 {
        return Err(PersistError::NotFound {
            entity,
            id: display_value(id),
        });
    }
    Ok(())
}

/// Starts a deferred transaction unless one is already open on `conn`.
pub(crate) fn begin(conn: &Connection) -> PersistResult<()> {
    if conn.is_autocommit() {
        conn.execute_batch("BEGIN DEFERRED;")?;
    }
    Ok(())
}

pub(crate) fn commit(conn: &Connection) -> PersistResult<()> {
    if conn.is_autocommit() {
        return Err(PersistError::NoTransaction);
    }
    conn.execute_batch("COMMIT;")?;
    Ok(())
}

pub(crate) fn rollback(conn: &Connection) -> PersistResult<()> {
    if !conn.is_autocommit() {
        conn.execute_batch("ROLLBACK;")?;
    }
    Ok(())
}

pub(crate) fn close(conn: Option<Connection>) -> PersistResult<()> {
    match conn {
        Some(conn) => conn.close().map_err(|(_, err)| PersistError::Engine(err)),
        None => Ok(()),
    }
}
