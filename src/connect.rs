//! Engine-specific constructors for [`Db`].

use crate::db::Db;
use crate::error::DbError;
use crate::pool::Pool;

impl Db {
    /// Open a SQLite database at the given path.
    ///
    /// `:memory:` caps the pool at one connection, since every pooled
    /// connection would otherwise see its own private database.
    ///
    /// # Errors
    ///
    /// `DbError::Config` for pool-construction failures, driver errors if
    /// the database cannot be opened.
    #[cfg(feature = "sqlite")]
    pub async fn connect_sqlite(path: impl AsRef<std::path::Path>) -> Result<Db, DbError> {
        let path = path.as_ref();
        let mut cfg = deadpool_sqlite::Config::new(path);
        if path.as_os_str() == ":memory:" {
            cfg.pool = Some(deadpool::managed::PoolConfig::new(1));
        }
        let pool = cfg
            .create_pool(deadpool::Runtime::Tokio1)
            .map_err(|e| DbError::Config(format!("sqlite pool: {e}")))?;
        let db = Db::new(Pool::Sqlite(pool));
        db.ping().await?;
        check_min_version(&db).await?;
        Ok(db)
    }

    /// Connect to PostgreSQL from a `deadpool_postgres` configuration
    /// (typically filled from environment or a config file).
    ///
    /// # Errors
    ///
    /// `DbError::Config` for pool-construction failures or a server older
    /// than the supported minimum, driver errors if unreachable.
    #[cfg(feature = "postgres")]
    pub async fn connect_postgres(cfg: deadpool_postgres::Config) -> Result<Db, DbError> {
        let pool = cfg
            .create_pool(Some(deadpool_postgres::Runtime::Tokio1), tokio_postgres::NoTls)
            .map_err(|e| DbError::Config(format!("postgres pool: {e}")))?;
        let db = Db::new(Pool::Postgres(pool));
        check_min_version(&db).await?;
        Ok(db)
    }

    /// Connect to MariaDB (or MySQL) from a `mysql://` URL.
    ///
    /// # Errors
    ///
    /// `DbError::Config` for an invalid URL or a server older than the
    /// supported minimum, driver errors if unreachable.
    #[cfg(feature = "mariadb")]
    pub async fn connect_mariadb(url: &str) -> Result<Db, DbError> {
        let opts =
            mysql_async::Opts::from_url(url).map_err(|e| DbError::Config(format!("mariadb url: {e}")))?;
        let db = Db::new(Pool::MariaDb(mysql_async::Pool::new(opts)));
        check_min_version(&db).await?;
        Ok(db)
    }
}

async fn check_min_version(db: &Db) -> Result<(), DbError> {
    let caps = db.caps();
    if let Some(min) = caps.min_version {
        let version = db.version().await?;
        if !version.at_least(min) {
            return Err(DbError::Config(format!(
                "{} {min} or newer required, server reports {version}",
                db.driver()
            )));
        }
        tracing::debug!(driver = %db.driver(), %version, "connected");
    }
    Ok(())
}
