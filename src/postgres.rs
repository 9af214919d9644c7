//! PostgreSQL executor on pooled `deadpool-postgres` clients.

use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use tokio_util::bytes::BytesMut;

use crate::error::DbError;
use crate::results::ResultSet;
use crate::types::SqlValue;

impl ToSql for SqlValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            SqlValue::Int(i) => i.to_sql(ty, out),
            SqlValue::Float(f) => f.to_sql(ty, out),
            SqlValue::Text(s) => s.to_sql(ty, out),
            SqlValue::Bool(b) => b.to_sql(ty, out),
            SqlValue::Timestamp(dt) => dt.to_sql(ty, out),
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Json(j) => j.to_sql(ty, out),
            SqlValue::Blob(b) => b.to_sql(ty, out),
            SqlValue::List(_) => {
                Err("list parameter was not expanded before execution".into())
            }
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // The server-assigned parameter type decides the encoding above;
        // mismatches surface as driver errors at bind time.
        true
    }

    to_sql_checked!();
}

fn as_param_refs(params: &[SqlValue]) -> Result<Vec<&(dyn ToSql + Sync)>, DbError> {
    if params.iter().any(|p| matches!(p, SqlValue::List(_))) {
        return Err(DbError::Execution(
            "list parameter was not expanded before execution".into(),
        ));
    }
    Ok(params.iter().map(|p| p as &(dyn ToSql + Sync)).collect())
}

fn from_column(row: &tokio_postgres::Row, idx: usize) -> Result<SqlValue, DbError> {
    let ty = row.columns()[idx].type_();
    let value = match ty.name() {
        "int2" => row
            .try_get::<_, Option<i16>>(idx)?
            .map(|v| SqlValue::Int(i64::from(v))),
        "int4" => row
            .try_get::<_, Option<i32>>(idx)?
            .map(|v| SqlValue::Int(i64::from(v))),
        "int8" => row.try_get::<_, Option<i64>>(idx)?.map(SqlValue::Int),
        "float4" => row
            .try_get::<_, Option<f32>>(idx)?
            .map(|v| SqlValue::Float(f64::from(v))),
        "float8" => row.try_get::<_, Option<f64>>(idx)?.map(SqlValue::Float),
        "bool" => row.try_get::<_, Option<bool>>(idx)?.map(SqlValue::Bool),
        "timestamp" => row
            .try_get::<_, Option<chrono::NaiveDateTime>>(idx)?
            .map(SqlValue::Timestamp),
        "timestamptz" => row
            .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)?
            .map(|v| SqlValue::Timestamp(v.naive_utc())),
        "json" | "jsonb" => row
            .try_get::<_, Option<serde_json::Value>>(idx)?
            .map(SqlValue::Json),
        "bytea" => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(SqlValue::Blob),
        _ => row.try_get::<_, Option<String>>(idx)?.map(SqlValue::Text),
    };
    Ok(value.unwrap_or(SqlValue::Null))
}

pub(crate) async fn execute(
    client: &deadpool_postgres::Object,
    sql: &str,
    params: &[SqlValue],
) -> Result<u64, DbError> {
    let refs = as_param_refs(params)?;
    Ok(client.execute(sql, &refs).await?)
}

pub(crate) async fn query(
    client: &deadpool_postgres::Object,
    sql: &str,
    params: &[SqlValue],
) -> Result<ResultSet, DbError> {
    let refs = as_param_refs(params)?;
    // The statement metadata carries the column header even for empty
    // result sets.
    let stmt = client.prepare_cached(sql).await?;
    let columns: Vec<String> = stmt
        .columns()
        .iter()
        .map(|c| c.name().to_owned())
        .collect();
    let rows = client.query(&stmt, &refs).await?;

    let mut builder = ResultSet::with_columns(columns);
    for row in &rows {
        let mut values = Vec::with_capacity(row.columns().len());
        for idx in 0..row.columns().len() {
            values.push(from_column(row, idx)?);
        }
        builder.push(values);
    }
    Ok(builder.finish())
}

pub(crate) async fn batch(
    client: &deadpool_postgres::Object,
    sql: &str,
) -> Result<(), DbError> {
    client.batch_execute(sql).await?;
    Ok(())
}
