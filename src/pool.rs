//! Per-engine connection pools behind one dispatch type.

use crate::error::DbError;
use crate::results::ResultSet;
use crate::types::{DatabaseType, SqlValue};

/// A connection pool for one database engine.
///
/// Usually built through the `Db::connect_*` constructors; exposed so callers
/// with bespoke pool configuration can hand a preconfigured pool to
/// [`Db::new`](crate::Db::new).
#[derive(Clone)]
pub enum Pool {
    #[cfg(feature = "sqlite")]
    Sqlite(deadpool_sqlite::Pool),
    #[cfg(feature = "postgres")]
    Postgres(deadpool_postgres::Pool),
    #[cfg(feature = "mariadb")]
    MariaDb(mysql_async::Pool),
}

impl Pool {
    pub(crate) fn driver(&self) -> DatabaseType {
        match self {
            #[cfg(feature = "sqlite")]
            Pool::Sqlite(_) => DatabaseType::Sqlite,
            #[cfg(feature = "postgres")]
            Pool::Postgres(_) => DatabaseType::Postgres,
            #[cfg(feature = "mariadb")]
            Pool::MariaDb(_) => DatabaseType::MariaDb,
        }
    }

    pub(crate) async fn acquire(&self) -> Result<PoolConn, DbError> {
        match self {
            #[cfg(feature = "sqlite")]
            Pool::Sqlite(pool) => Ok(PoolConn::Sqlite(pool.get().await?)),
            #[cfg(feature = "postgres")]
            Pool::Postgres(pool) => Ok(PoolConn::Postgres(pool.get().await?)),
            #[cfg(feature = "mariadb")]
            Pool::MariaDb(pool) => Ok(PoolConn::MariaDb(pool.get_conn().await?)),
        }
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Pool").field(&self.driver()).finish()
    }
}

/// One checked-out connection. While held, nothing else can use it; dropping
/// it returns it to its pool.
pub(crate) enum PoolConn {
    #[cfg(feature = "sqlite")]
    Sqlite(deadpool_sqlite::Object),
    #[cfg(feature = "postgres")]
    Postgres(deadpool_postgres::Object),
    #[cfg(feature = "mariadb")]
    MariaDb(mysql_async::Conn),
}

impl PoolConn {
    pub(crate) async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DbError> {
        match self {
            #[cfg(feature = "sqlite")]
            PoolConn::Sqlite(conn) => crate::sqlite::execute(conn, sql, params).await,
            #[cfg(feature = "postgres")]
            PoolConn::Postgres(client) => crate::postgres::execute(client, sql, params).await,
            #[cfg(feature = "mariadb")]
            PoolConn::MariaDb(conn) => crate::mariadb::execute(conn, sql, params).await,
        }
    }

    pub(crate) async fn query(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<ResultSet, DbError> {
        match self {
            #[cfg(feature = "sqlite")]
            PoolConn::Sqlite(conn) => crate::sqlite::query(conn, sql, params).await,
            #[cfg(feature = "postgres")]
            PoolConn::Postgres(client) => crate::postgres::query(client, sql, params).await,
            #[cfg(feature = "mariadb")]
            PoolConn::MariaDb(conn) => crate::mariadb::query(conn, sql, params).await,
        }
    }

    pub(crate) async fn batch(&mut self, sql: &str) -> Result<(), DbError> {
        match self {
            #[cfg(feature = "sqlite")]
            PoolConn::Sqlite(conn) => crate::sqlite::batch(conn, sql).await,
            #[cfg(feature = "postgres")]
            PoolConn::Postgres(client) => crate::postgres::batch(client, sql).await,
            #[cfg(feature = "mariadb")]
            PoolConn::MariaDb(conn) => crate::mariadb::batch(conn, sql).await,
        }
    }
}
