//! SQLite executor, running on pooled `deadpool-sqlite` connections.
//!
//! rusqlite is synchronous, so every statement runs inside the pool's
//! `interact` closure on its blocking thread.

use deadpool_sqlite::Object;
use deadpool_sqlite::rusqlite;
use rusqlite::types::Value as DriverValue;

use crate::error::DbError;
use crate::results::ResultSet;
use crate::types::SqlValue;

fn to_driver_values(params: &[SqlValue]) -> Result<Vec<DriverValue>, DbError> {
    params.iter().map(to_driver_value).collect()
}

fn to_driver_value(value: &SqlValue) -> Result<DriverValue, DbError> {
    Ok(match value {
        SqlValue::Int(i) => DriverValue::Integer(*i),
        SqlValue::Float(f) => DriverValue::Real(*f),
        SqlValue::Text(s) => DriverValue::Text(s.clone()),
        SqlValue::Bool(b) => DriverValue::Integer(i64::from(*b)),
        SqlValue::Timestamp(dt) => DriverValue::Text(dt.format("%F %T%.f").to_string()),
        SqlValue::Null => DriverValue::Null,
        SqlValue::Json(j) => DriverValue::Text(j.to_string()),
        SqlValue::Blob(b) => DriverValue::Blob(b.clone()),
        SqlValue::List(_) => {
            return Err(DbError::Execution(
                "list parameter was not expanded before execution".into(),
            ));
        }
    })
}

fn from_driver_value(value: DriverValue) -> SqlValue {
    match value {
        DriverValue::Null => SqlValue::Null,
        DriverValue::Integer(i) => SqlValue::Int(i),
        DriverValue::Real(f) => SqlValue::Float(f),
        DriverValue::Text(s) => SqlValue::Text(s),
        DriverValue::Blob(b) => SqlValue::Blob(b),
    }
}

async fn interact<T, F>(conn: &Object, func: F) -> Result<T, DbError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<T, DbError> + Send + 'static,
    T: Send + 'static,
{
    conn.interact(func)
        .await
        .map_err(|e| DbError::Connection(format!("sqlite interact: {e}")))?
}

pub(crate) async fn execute(
    conn: &Object,
    sql: &str,
    params: &[SqlValue],
) -> Result<u64, DbError> {
    let sql = sql.to_owned();
    let values = to_driver_values(params)?;
    interact(conn, move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let changed = stmt.execute(rusqlite::params_from_iter(values))?;
        Ok(changed as u64)
    })
    .await
}

pub(crate) async fn query(
    conn: &Object,
    sql: &str,
    params: &[SqlValue],
) -> Result<ResultSet, DbError> {
    let sql = sql.to_owned();
    let values = to_driver_values(params)?;
    interact(conn, move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(ToString::to_string).collect();
        let col_count = columns.len();
        let mut builder = ResultSet::with_columns(columns);

        let mut rows = stmt.query(rusqlite::params_from_iter(values))?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(col_count);
            for idx in 0..col_count {
                let value: DriverValue = row.get(idx)?;
                values.push(from_driver_value(value));
            }
            builder.push(values);
        }
        Ok(builder.finish())
    })
    .await
}

pub(crate) async fn batch(conn: &Object, sql: &str) -> Result<(), DbError> {
    let sql = sql.to_owned();
    interact(conn, move |conn| {
        conn.execute_batch(&sql)?;
        Ok(())
    })
    .await
}
