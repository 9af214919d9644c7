//! Convenient single-line import for the common surface.
//!
//! ```rust
//! use sql_conduit::prelude::*;
//! ```

pub use crate::drivers::{DriverCaps, PlaceholderStyle};
pub use crate::named_args;
pub use crate::prepare::prepare_query;
pub use crate::{
    Arg, BeginState, BindRecord, DatabaseType, Db, DbError, Pool, QueryFiles, ResultSet, Row,
    SqlValue, Version,
};
