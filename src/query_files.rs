//! File-backed query definitions, resolved through the `load:` sentinel.
//!
//! Queries live in `.sql` files keyed by name, with optional per-engine
//! variants: `load:hit-count` tries `hit-count-postgres.sql` (and the other
//! suffixes the engine answers to) before falling back to `hit-count.sql`.
//! The bare name is inserted as a `/* name */` first line so individual
//! queries stay identifiable in logs and `pg_stat_statements`.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::drivers::DriverCaps;
use crate::error::DbError;

/// An in-memory store of named query files.
#[derive(Debug, Clone, Default)]
pub struct QueryFiles {
    files: HashMap<String, String>,
}

impl QueryFiles {
    /// Load every `.sql` file in a directory (non-recursive); keys are the
    /// file names.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Config` if the directory cannot be read.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, DbError> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir)
            .map_err(|e| DbError::Config(format!("query dir {}: {e}", dir.display())))?;

        let mut files = HashMap::new();
        for entry in entries {
            let entry = entry.map_err(|e| DbError::Config(format!("query dir: {e}")))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("sql") {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let text = fs::read_to_string(&path)
                .map_err(|e| DbError::Config(format!("query file {}: {e}", path.display())))?;
            files.insert(name.to_owned(), text);
        }
        Ok(QueryFiles { files })
    }

    /// Build a store from static entries, e.g. `include_str!` content.
    /// Keys may be given with or without the `.sql` extension.
    #[must_use]
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let files = entries
            .into_iter()
            .map(|(name, text)| {
                let key = if name.ends_with(".sql") {
                    name.to_owned()
                } else {
                    format!("{name}.sql")
                };
                (key, text.to_owned())
            })
            .collect();
        QueryFiles { files }
    }

    /// Resolve a query by name for the given engine, most specific variant
    /// first.
    ///
    /// # Errors
    ///
    /// Returns `DbError::QueryNotFound` if no variant exists.
    pub fn load(&self, name: &str, caps: &DriverCaps) -> Result<String, DbError> {
        let base = name.strip_suffix(".sql").unwrap_or(name);
        for suffix in caps.file_suffixes {
            if let Some(text) = self.files.get(&format!("{base}-{suffix}.sql")) {
                return Ok(format!("/* {base} */\n{text}"));
            }
        }
        match self.files.get(&format!("{base}.sql")) {
            Some(text) => Ok(format!("/* {base} */\n{text}")),
            None => Err(DbError::QueryNotFound(name.to_owned())),
        }
    }
}
