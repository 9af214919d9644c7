//! Per-engine capability table.
//!
//! Everything engine-specific that the query preparer and the transaction
//! coordinator consume lives here as data. Adding an engine means adding a
//! table row, not new control flow.

use std::fmt::Write;

use crate::types::DatabaseType;

/// Native positional-placeholder syntax for an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?` placeholders (SQLite, MariaDB).
    Question,
    /// `$1`-style numbered placeholders (PostgreSQL).
    Numbered,
}

/// Capabilities of one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverCaps {
    pub driver: DatabaseType,
    pub placeholder: PlaceholderStyle,
    /// Identifier quote character (`"` or `` ` ``); doubled to escape.
    pub ident_quote: char,
    /// Whether `\` escapes the next character inside quoted strings
    /// (MySQL-style `'it\'s'` literals).
    pub backslash_escapes: bool,
    /// Statement that opens a transaction on a raw connection.
    pub begin_sql: &'static str,
    /// Query that reports the server version as a single text column.
    pub version_query: &'static str,
    /// Minimum server version enforced at connect time, if any.
    pub min_version: Option<&'static str>,
    /// Whether `INSERT ... RETURNING` is available (all current engines).
    pub supports_returning: bool,
    /// Driver-name suffixes tried when resolving `load:` query files,
    /// most specific first.
    pub file_suffixes: &'static [&'static str],
}

const SQLITE: DriverCaps = DriverCaps {
    driver: DatabaseType::Sqlite,
    placeholder: PlaceholderStyle::Question,
    ident_quote: '"',
    backslash_escapes: false,
    begin_sql: "BEGIN DEFERRED",
    version_query: "select sqlite_version()",
    min_version: None,
    supports_returning: true,
    file_suffixes: &["sqlite", "sqlite3"],
};

const POSTGRES: DriverCaps = DriverCaps {
    driver: DatabaseType::Postgres,
    placeholder: PlaceholderStyle::Numbered,
    ident_quote: '"',
    backslash_escapes: false,
    begin_sql: "BEGIN",
    version_query: "show server_version",
    min_version: Some("12.0"),
    supports_returning: true,
    file_suffixes: &["postgres", "postgresql", "psql"],
};

const MARIADB: DriverCaps = DriverCaps {
    driver: DatabaseType::MariaDb,
    placeholder: PlaceholderStyle::Question,
    ident_quote: '`',
    backslash_escapes: true,
    begin_sql: "START TRANSACTION",
    version_query: "select version()",
    min_version: Some("10.5"),
    supports_returning: true,
    file_suffixes: &["mysql", "mariadb"],
};

impl DatabaseType {
    /// The capability row for this engine.
    #[must_use]
    pub fn caps(&self) -> &'static DriverCaps {
        match self {
            DatabaseType::Sqlite => &SQLITE,
            DatabaseType::Postgres => &POSTGRES,
            DatabaseType::MariaDb => &MARIADB,
        }
    }
}

impl DriverCaps {
    /// Append the `n`-th placeholder (1-based) in this engine's native syntax.
    pub(crate) fn push_placeholder(&self, out: &mut String, n: usize) {
        match self.placeholder {
            PlaceholderStyle::Question => out.push('?'),
            PlaceholderStyle::Numbered => {
                // Writing to a String cannot fail.
                let _ = write!(out, "${n}");
            }
        }
    }

    /// Append an explicitly indexed placeholder (`$3` / `?3`).
    pub(crate) fn push_indexed_placeholder(&self, out: &mut String, n: usize) {
        match self.placeholder {
            PlaceholderStyle::Question => {
                let _ = write!(out, "?{n}");
            }
            PlaceholderStyle::Numbered => {
                let _ = write!(out, "${n}");
            }
        }
    }

    /// Quote an identifier for this engine, escaping embedded quotes.
    #[must_use]
    pub fn quote_ident(&self, ident: &str) -> String {
        let q = self.ident_quote;
        let mut out = String::with_capacity(ident.len() + 2);
        out.push(q);
        for ch in ident.chars() {
            out.push(ch);
            if ch == q {
                out.push(q);
            }
        }
        out.push(q);
        out
    }
}
