//! Async SQL access layer over SQLite, PostgreSQL, and MariaDB.
//!
//! The crate gives callers a single [`Db`] handle that runs raw SQL with a
//! richer binding syntax than the native drivers support: named `:param`
//! placeholders resolved from maps and records, `{{:cond ...}}` conditional
//! fragments, and slice expansion for `IN` lists. The same handle
//! transparently becomes a transaction without threading a transaction object
//! through every call site.

#[cfg(not(any(feature = "sqlite", feature = "postgres", feature = "mariadb")))]
compile_error!("at least one engine feature (sqlite, postgres, mariadb) must be enabled");

pub mod drivers;
pub mod error;
pub mod params;
pub mod prelude;
pub mod prepare;
pub mod query_files;
pub mod results;
pub mod transaction;
pub mod types;
pub mod version;

mod connect;
mod db;
mod pool;

#[cfg(feature = "mariadb")]
mod mariadb;
#[cfg(feature = "postgres")]
mod postgres;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use db::Db;
pub use error::DbError;
pub use params::{Arg, BindRecord};
pub use pool::Pool;
pub use query_files::QueryFiles;
pub use results::{ResultSet, Row};
pub use transaction::BeginState;
pub use types::{DatabaseType, SqlValue};
pub use version::Version;
