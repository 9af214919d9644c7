//! Transaction state shared between a handle and its clones.

use tokio::sync::Mutex;

use crate::pool::PoolConn;

/// What [`Db::begin`](crate::Db::begin) did.
///
/// Nested `begin` calls on a transaction handle return the same handle with
/// [`BeginState::AlreadyStarted`]; only the call that observed
/// [`BeginState::Started`] may commit or roll back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginState {
    /// This call opened the transaction and owns its resolution.
    Started,
    /// A transaction was already running on this handle.
    AlreadyStarted,
}

impl BeginState {
    #[must_use]
    pub fn already_started(self) -> bool {
        matches!(self, BeginState::AlreadyStarted)
    }
}

/// The connection a transaction handle owns exclusively for its lifetime.
/// `None` once the transaction has been committed or rolled back; any later
/// use fails with `DbError::TransactionCompleted`.
pub(crate) struct TxGuard {
    pub(crate) conn: Mutex<Option<PoolConn>>,
}

impl TxGuard {
    pub(crate) fn new(conn: PoolConn) -> Self {
        TxGuard {
            conn: Mutex::new(Some(conn)),
        }
    }
}
