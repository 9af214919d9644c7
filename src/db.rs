//! The database handle and its transaction coordinator.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::drivers::DriverCaps;
use crate::error::DbError;
use crate::params::Arg;
use crate::pool::{Pool, PoolConn};
use crate::prepare::prepare_query;
use crate::query_files::QueryFiles;
use crate::results::{ResultSet, Row};
use crate::transaction::{BeginState, TxGuard};
use crate::types::{DatabaseType, SqlValue};
use crate::version::Version;

/// A database handle: either a pool of connections or a live transaction.
///
/// Cloning is cheap and clones share state; a clone of a transaction handle
/// is the same transaction. Whether a handle is transactional is part of its
/// value, so a function taking `Db` runs inside whatever its caller set up.
#[derive(Clone)]
pub struct Db {
    inner: Arc<DbInner>,
    cancel: Option<CancellationToken>,
}

struct DbInner {
    driver: DatabaseType,
    files: Option<Arc<QueryFiles>>,
    kind: HandleKind,
}

enum HandleKind {
    Pool(Pool),
    Tx(TxGuard),
}

/// Where a statement's connection comes from: freshly checked out, or the
/// one the transaction owns.
enum ConnSlot<'a> {
    Pooled(PoolConn),
    Tx(tokio::sync::MutexGuard<'a, Option<PoolConn>>),
}

impl ConnSlot<'_> {
    fn conn_mut(&mut self) -> Result<&mut PoolConn, DbError> {
        match self {
            ConnSlot::Pooled(conn) => Ok(conn),
            ConnSlot::Tx(guard) => guard.as_mut().ok_or(DbError::TransactionCompleted),
        }
    }
}

impl Db {
    /// Wrap an already-configured pool.
    #[must_use]
    pub fn new(pool: Pool) -> Db {
        let driver = pool.driver();
        Db {
            inner: Arc::new(DbInner {
                driver,
                files: None,
                kind: HandleKind::Pool(pool),
            }),
            cancel: None,
        }
    }

    /// Attach a store of named query files, enabling the `load:name` query
    /// form on this handle and everything derived from it.
    #[must_use]
    pub fn with_query_files(mut self, files: QueryFiles) -> Db {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.files = Some(Arc::new(files));
            self
        } else if let HandleKind::Pool(pool) = &self.inner.kind {
            Db {
                inner: Arc::new(DbInner {
                    driver: self.inner.driver,
                    files: Some(Arc::new(files)),
                    kind: HandleKind::Pool(pool.clone()),
                }),
                cancel: self.cancel,
            }
        } else {
            // A shared transaction handle cannot be rebuilt without
            // detaching its clones; attach files before begin.
            tracing::warn!("with_query_files on a shared transaction handle has no effect");
            self
        }
    }

    /// Derive a handle whose operations abort with [`DbError::Canceled`] once
    /// the token is cancelled. The underlying state is shared, so the derived
    /// handle is still [`same_handle`](Db::same_handle) as the original.
    #[must_use]
    pub fn with_cancellation(&self, token: CancellationToken) -> Db {
        Db {
            inner: Arc::clone(&self.inner),
            cancel: Some(token),
        }
    }

    #[must_use]
    pub fn driver(&self) -> DatabaseType {
        self.inner.driver
    }

    #[must_use]
    pub fn caps(&self) -> &'static DriverCaps {
        self.inner.driver.caps()
    }

    /// Whether this handle is a live transaction.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        matches!(self.inner.kind, HandleKind::Tx(_))
    }

    /// Whether two handles share the same underlying state. Transaction
    /// handles compare equal to their clones and to the nested handles
    /// [`begin`](Db::begin) returned for them.
    #[must_use]
    pub fn same_handle(&self, other: &Db) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Resolve a named query file attached via
    /// [`with_query_files`](Db::with_query_files).
    ///
    /// # Errors
    ///
    /// `DbError::Config` if no files are attached, `DbError::QueryNotFound`
    /// if no variant of the name exists.
    pub fn load(&self, name: &str) -> Result<String, DbError> {
        let files = self
            .inner
            .files
            .as_ref()
            .ok_or_else(|| DbError::Config("no query files attached to this handle".into()))?;
        files.load(name, self.caps())
    }

    /// Prepare a query for this handle's engine without executing it:
    /// resolve `load:` names, conditional blocks, and named placeholders, and
    /// rebind to the engine's placeholder syntax.
    ///
    /// # Errors
    ///
    /// See [`prepare_query`] for the preparation errors; `load:` names add
    /// the [`load`](Db::load) errors.
    pub fn prepare(&self, query: &str, args: &[Arg]) -> Result<(String, Vec<SqlValue>), DbError> {
        match query.strip_prefix("load:") {
            Some(name) => {
                let text = self.load(name)?;
                prepare_query(self.caps(), &text, args)
            }
            None => prepare_query(self.caps(), query, args),
        }
    }

    /// Execute a statement and return the number of affected rows.
    ///
    /// # Errors
    ///
    /// Preparation errors, driver errors, `DbError::TransactionCompleted` on
    /// a resolved transaction handle, `DbError::Canceled` if a cancellation
    /// token fires.
    pub async fn execute(&self, query: &str, args: &[Arg]) -> Result<u64, DbError> {
        let (sql, params) = self.prepare(query, args)?;
        let mut slot = self.conn().await?;
        let conn = slot.conn_mut()?;
        self.guard(conn.execute(&sql, &params)).await
    }

    /// Run a multi-statement script verbatim. No placeholder processing.
    ///
    /// # Errors
    ///
    /// Driver errors, plus the transaction and cancellation errors of
    /// [`execute`](Db::execute).
    pub async fn execute_batch(&self, sql: &str) -> Result<(), DbError> {
        let mut slot = self.conn().await?;
        let conn = slot.conn_mut()?;
        self.guard(conn.batch(sql)).await
    }

    /// Run a query and return every row.
    ///
    /// # Errors
    ///
    /// Same classes as [`execute`](Db::execute).
    pub async fn fetch_all(&self, query: &str, args: &[Arg]) -> Result<ResultSet, DbError> {
        let (sql, params) = self.prepare(query, args)?;
        let mut slot = self.conn().await?;
        let conn = slot.conn_mut()?;
        self.guard(conn.query(&sql, &params)).await
    }

    /// Run a query expected to return at least one row; surplus rows are
    /// ignored.
    ///
    /// # Errors
    ///
    /// `DbError::NoRows` if the result is empty, plus the classes of
    /// [`fetch_all`](Db::fetch_all).
    pub async fn fetch_one(&self, query: &str, args: &[Arg]) -> Result<Row, DbError> {
        self.fetch_optional(query, args)
            .await?
            .ok_or(DbError::NoRows)
    }

    /// Run a query and return its first row, if any.
    ///
    /// # Errors
    ///
    /// Same classes as [`fetch_all`](Db::fetch_all).
    pub async fn fetch_optional(&self, query: &str, args: &[Arg]) -> Result<Option<Row>, DbError> {
        let rows = self.fetch_all(query, args).await?;
        Ok(rows.into_rows().into_iter().next())
    }

    /// Execute an `insert` and return the generated id from `id_column`,
    /// by appending a `returning` clause.
    ///
    /// When the statement inserts multiple rows the id of the last row is
    /// returned.
    ///
    /// # Errors
    ///
    /// Same classes as [`execute`](Db::execute); also fails if the statement
    /// returned no id.
    pub async fn insert_id(
        &self,
        id_column: &str,
        query: &str,
        args: &[Arg],
    ) -> Result<i64, DbError> {
        let caps = self.caps();
        if !caps.supports_returning {
            return Err(DbError::Execution(format!(
                "{} does not support insert ... returning",
                self.inner.driver
            )));
        }
        let (sql, params) = self.prepare(query, args)?;
        let sql = format!("{sql} returning {}", caps.quote_ident(id_column));
        let mut slot = self.conn().await?;
        let conn = slot.conn_mut()?;
        let rows = self.guard(conn.query(&sql, &params)).await?;
        rows.last()
            .and_then(|row| row.get_by_index(0))
            .and_then(SqlValue::as_int)
            .ok_or_else(|| DbError::Execution("insert did not return an id".into()))
    }

    /// Start a transaction, or join the one already running on this handle.
    ///
    /// On a pool handle this checks out a connection, opens a transaction on
    /// it, and returns a new transaction handle with [`BeginState::Started`].
    /// On a transaction handle it returns a clone of the same handle with
    /// [`BeginState::AlreadyStarted`]; no nested or second transaction is
    /// opened, and resolution stays with the outermost caller.
    ///
    /// # Errors
    ///
    /// Pool and driver errors, `DbError::Canceled`.
    pub async fn begin(&self) -> Result<(Db, BeginState), DbError> {
        match &self.inner.kind {
            HandleKind::Tx(_) => Ok((self.clone(), BeginState::AlreadyStarted)),
            HandleKind::Pool(pool) => {
                let mut conn = self.guard(pool.acquire()).await?;
                self.guard(conn.batch(self.caps().begin_sql)).await?;
                tracing::debug!(driver = %self.inner.driver, "transaction started");
                Ok((
                    Db {
                        inner: Arc::new(DbInner {
                            driver: self.inner.driver,
                            files: self.inner.files.clone(),
                            kind: HandleKind::Tx(TxGuard::new(conn)),
                        }),
                        cancel: self.cancel.clone(),
                    },
                    BeginState::Started,
                ))
            }
        }
    }

    /// Commit the transaction and release its connection.
    ///
    /// # Errors
    ///
    /// `DbError::TransactionCompleted` if already resolved, driver errors.
    pub async fn commit(&self) -> Result<(), DbError> {
        self.resolve("COMMIT").await
    }

    /// Roll the transaction back and release its connection.
    ///
    /// # Errors
    ///
    /// `DbError::TransactionCompleted` if already resolved, driver errors.
    pub async fn rollback(&self) -> Result<(), DbError> {
        self.resolve("ROLLBACK").await
    }

    async fn resolve(&self, sql: &'static str) -> Result<(), DbError> {
        let HandleKind::Tx(tx) = &self.inner.kind else {
            return Err(DbError::Execution(
                "commit/rollback called outside a transaction".into(),
            ));
        };
        let mut guard = tx.conn.lock().await;
        let mut conn = guard.take().ok_or(DbError::TransactionCompleted)?;
        let result = conn.batch(sql).await;
        tracing::debug!(
            driver = %self.inner.driver,
            statement = sql,
            ok = result.is_ok(),
            "transaction resolved"
        );
        // The connection drops here and returns to its pool.
        result
    }

    /// Run a closure inside a transaction.
    ///
    /// If this handle is a pool, a transaction is opened, and committed when
    /// the closure returns `Ok` or rolled back when it returns `Err`. If this
    /// handle is already a transaction the closure simply runs on it and
    /// resolution is left to the caller that opened it, so `transact` calls
    /// nest freely. When a rollback itself fails, the failure is logged and
    /// the closure's error is returned.
    ///
    /// # Errors
    ///
    /// The closure's error, or the begin/commit errors around it.
    pub async fn transact<F, Fut, T>(&self, func: F) -> Result<T, DbError>
    where
        F: FnOnce(Db) -> Fut,
        Fut: Future<Output = Result<T, DbError>>,
    {
        let (tx, state) = self.begin().await?;
        let result = func(tx.clone()).await;
        if state.already_started() {
            return result;
        }
        match result {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rb) = tx.rollback().await {
                    tracing::warn!(error = %rb, "rollback after failed transaction also failed");
                }
                Err(err)
            }
        }
    }

    /// The server version, normalized for [`Version::at_least`] checks.
    ///
    /// # Errors
    ///
    /// Driver errors, or an unparseable version row.
    pub async fn version(&self) -> Result<Version, DbError> {
        let row = self.fetch_one(self.caps().version_query, &[]).await?;
        let text = row
            .get_by_index(0)
            .and_then(|v| v.as_text().map(str::to_owned))
            .ok_or_else(|| DbError::Execution("version query returned no text".into()))?;
        Ok(Version::from(text.as_str()))
    }

    /// Check that the server is reachable.
    ///
    /// # Errors
    ///
    /// Pool or driver errors.
    pub async fn ping(&self) -> Result<(), DbError> {
        self.fetch_one("select 1", &[]).await.map(|_| ())
    }

    async fn conn(&self) -> Result<ConnSlot<'_>, DbError> {
        match &self.inner.kind {
            HandleKind::Pool(pool) => Ok(ConnSlot::Pooled(self.guard(pool.acquire()).await?)),
            HandleKind::Tx(tx) => {
                let guard = tx.conn.lock().await;
                if guard.is_none() {
                    return Err(DbError::TransactionCompleted);
                }
                Ok(ConnSlot::Tx(guard))
            }
        }
    }

    async fn guard<T>(
        &self,
        fut: impl Future<Output = Result<T, DbError>>,
    ) -> Result<T, DbError> {
        match &self.cancel {
            Some(token) => {
                if token.is_cancelled() {
                    return Err(DbError::Canceled);
                }
                tokio::select! {
                    result = fut => result,
                    () = token.cancelled() => Err(DbError::Canceled),
                }
            }
            None => fut.await,
        }
    }
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("driver", &self.inner.driver)
            .field("in_transaction", &self.in_transaction())
            .finish_non_exhaustive()
    }
}
