//! MariaDB / MySQL executor on `mysql_async` pooled connections.

use chrono::{Datelike, NaiveDate, Timelike};
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Params, Value};

use crate::error::DbError;
use crate::results::ResultSet;
use crate::types::SqlValue;

fn to_driver_params(params: &[SqlValue]) -> Result<Params, DbError> {
    if params.is_empty() {
        return Ok(Params::Empty);
    }
    let values = params
        .iter()
        .map(to_driver_value)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Params::Positional(values))
}

fn to_driver_value(value: &SqlValue) -> Result<Value, DbError> {
    Ok(match value {
        SqlValue::Int(i) => Value::Int(*i),
        SqlValue::Float(f) => Value::Double(*f),
        SqlValue::Text(s) => Value::Bytes(s.clone().into_bytes()),
        SqlValue::Bool(b) => Value::Int(i64::from(*b)),
        SqlValue::Timestamp(dt) => {
            let year = u16::try_from(dt.year())
                .map_err(|_| DbError::Execution("timestamp year out of range".into()))?;
            Value::Date(
                year,
                dt.month() as u8,
                dt.day() as u8,
                dt.hour() as u8,
                dt.minute() as u8,
                dt.second() as u8,
                dt.nanosecond() / 1_000,
            )
        }
        SqlValue::Null => Value::NULL,
        SqlValue::Json(j) => Value::Bytes(j.to_string().into_bytes()),
        SqlValue::Blob(b) => Value::Bytes(b.clone()),
        SqlValue::List(_) => {
            return Err(DbError::Execution(
                "list parameter was not expanded before execution".into(),
            ));
        }
    })
}

fn from_driver_value(value: Value) -> SqlValue {
    match value {
        Value::NULL => SqlValue::Null,
        Value::Int(i) => SqlValue::Int(i),
        Value::UInt(u) => i64::try_from(u)
            .map(SqlValue::Int)
            .unwrap_or_else(|_| SqlValue::Text(u.to_string())),
        Value::Float(f) => SqlValue::Float(f64::from(f)),
        Value::Double(d) => SqlValue::Float(d),
        Value::Bytes(b) => match String::from_utf8(b) {
            Ok(s) => SqlValue::Text(s),
            Err(e) => SqlValue::Blob(e.into_bytes()),
        },
        Value::Date(y, mo, d, h, mi, s, us) => NaiveDate::from_ymd_opt(
            i32::from(y),
            u32::from(mo),
            u32::from(d),
        )
        .and_then(|date| date.and_hms_micro_opt(u32::from(h), u32::from(mi), u32::from(s), us))
        .map(SqlValue::Timestamp)
        .unwrap_or(SqlValue::Null),
        Value::Time(neg, days, h, mi, s, us) => {
            let sign = if neg { "-" } else { "" };
            let hours = days * 24 + u32::from(h);
            SqlValue::Text(format!("{sign}{hours:02}:{mi:02}:{s:02}.{us:06}"))
        }
    }
}

pub(crate) async fn execute(
    conn: &mut Conn,
    sql: &str,
    params: &[SqlValue],
) -> Result<u64, DbError> {
    match to_driver_params(params)? {
        Params::Empty => conn.query_drop(sql).await?,
        params => conn.exec_drop(sql, params).await?,
    }
    Ok(conn.affected_rows())
}

fn column_names(columns: Option<&[mysql_async::Column]>) -> Vec<String> {
    columns
        .map(|cols| cols.iter().map(|c| c.name_str().into_owned()).collect())
        .unwrap_or_default()
}

pub(crate) async fn query(
    conn: &mut Conn,
    sql: &str,
    params: &[SqlValue],
) -> Result<ResultSet, DbError> {
    // The result metadata carries the column header even for empty result
    // sets.
    let (columns, rows): (Vec<String>, Vec<mysql_async::Row>) =
        match to_driver_params(params)? {
            Params::Empty => {
                let mut result = conn.query_iter(sql).await?;
                let columns = column_names(result.columns().as_deref());
                (columns, result.collect().await?)
            }
            params => {
                let mut result = conn.exec_iter(sql, params).await?;
                let columns = column_names(result.columns().as_deref());
                (columns, result.collect().await?)
            }
        };

    let mut builder = ResultSet::with_columns(columns);
    for mut row in rows {
        let count = row.len();
        let mut values = Vec::with_capacity(count);
        for idx in 0..count {
            let value: Value = row.take(idx).unwrap_or(Value::NULL);
            values.push(from_driver_value(value));
        }
        builder.push(values);
    }
    Ok(builder.finish())
}

pub(crate) async fn batch(conn: &mut Conn, sql: &str) -> Result<(), DbError> {
    conn.query_drop(sql).await?;
    Ok(())
}
