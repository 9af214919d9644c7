use thiserror::Error;

/// Errors surfaced by the access layer.
///
/// Every condition callers may want to branch on is a distinct variant, so
/// nothing requires matching on message text. Driver and pool errors pass
/// through transparently.
#[derive(Debug, Error)]
pub enum DbError {
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    Postgres(#[from] tokio_postgres::Error),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    Sqlite(#[from] deadpool_sqlite::rusqlite::Error),

    #[cfg(feature = "mariadb")]
    #[error(transparent)]
    MariaDb(#[from] mysql_async::Error),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PoolPostgres(#[from] deadpool::managed::PoolError<tokio_postgres::Error>),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    PoolSqlite(#[from] deadpool::managed::PoolError<deadpool_sqlite::rusqlite::Error>),

    /// The same named parameter was supplied by more than one source.
    #[error("parameter {0:?} given more than once")]
    DuplicateParameter(String),

    /// Named sources (maps, records) and positional scalars in one call.
    #[error("cannot mix named and positional parameters")]
    MixedParameters,

    /// The query text itself uses both `:name` and `?`/`$N` placeholders.
    #[error("query mixes named and positional placeholders")]
    MixedPlaceholders,

    /// A `:name` placeholder or conditional-block controller with no
    /// matching key in the named parameter set.
    #[error("could not find named parameter {0:?}")]
    UnknownParameter(String),

    /// A `load:` query name that matched no configured query file.
    #[error("could not load query {0:?}")]
    QueryNotFound(String),

    /// `fetch_one` on an empty result.
    #[error("no rows returned")]
    NoRows,

    /// The caller's cancellation token fired while a statement was in flight.
    #[error("operation canceled")]
    Canceled,

    /// Commit or rollback on a transaction that was already resolved.
    #[error("transaction already completed")]
    TransactionCompleted,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("execution error: {0}")]
    Execution(String),
}
