//! Parameter extraction: merges a variadic argument list into either one
//! positional list or one named mapping, with conflict detection.

use std::collections::HashMap;

use crate::error::DbError;
use crate::types::SqlValue;

/// A record type that can supply named parameters.
///
/// This is the compile-time counterpart of binding a struct by field name:
/// each implementor decides which `(name, value)` pairs it exposes, and a
/// declared alias is simply the name it emits.
///
/// ```rust
/// use sql_conduit::{BindRecord, SqlValue};
///
/// struct Site {
///     id: i64,
///     hostname: String,
/// }
///
/// impl BindRecord for Site {
///     fn bind_fields(&self) -> Vec<(String, SqlValue)> {
///         vec![
///             ("id".into(), SqlValue::Int(self.id)),
///             ("hostname".into(), SqlValue::Text(self.hostname.clone())),
///         ]
///     }
/// }
/// ```
pub trait BindRecord {
    fn bind_fields(&self) -> Vec<(String, SqlValue)>;
}

/// One parameter source in a variadic call.
///
/// A `Value` is positional; `Named` carries `(key, value)` pairs from a map
/// or a [`BindRecord`]. Multiple named sources union their keys; a duplicate
/// key or a positional scalar among named sources is an error at preparation
/// time.
#[derive(Debug, Clone)]
pub enum Arg {
    /// A single positional value (scalars and lists alike).
    Value(SqlValue),
    /// Named `key -> value` pairs.
    Named(Vec<(String, SqlValue)>),
}

impl Arg {
    pub fn value(v: impl Into<SqlValue>) -> Self {
        Arg::Value(v.into())
    }

    pub fn named<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<SqlValue>,
    {
        Arg::Named(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn record<T: BindRecord>(rec: &T) -> Self {
        Arg::Named(rec.bind_fields())
    }
}

impl<T> From<T> for Arg
where
    T: Into<SqlValue>,
{
    fn from(v: T) -> Self {
        Arg::Value(v.into())
    }
}

/// Build a named [`Arg`] from a map-style literal.
///
/// ```rust
/// use sql_conduit::named_args;
///
/// let arg = named_args! { "site" => 42, "path" => "/x" };
/// # let _ = arg;
/// ```
#[macro_export]
macro_rules! named_args {
    ($($key:literal => $value:expr),* $(,)?) => {
        $crate::Arg::named([
            $(($key, $crate::SqlValue::from($value))),*
        ])
    };
}

/// The single shape an argument list resolves to.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ResolvedParams {
    None,
    Positional(Vec<SqlValue>),
    Named(HashMap<String, SqlValue>),
}

/// Merge the variadic argument list into one parameter set.
///
/// Named mode wins as soon as any source is named; a positional scalar mixed
/// in is then `DbError::MixedParameters`, and a key supplied by two sources
/// is `DbError::DuplicateParameter`. Keys are lowercased so lookups are
/// case-insensitive. Pure; no I/O.
pub(crate) fn resolve_args(args: &[Arg]) -> Result<ResolvedParams, DbError> {
    if args.is_empty() {
        return Ok(ResolvedParams::None);
    }

    let named_mode = args.iter().any(|a| matches!(a, Arg::Named(_)));
    if !named_mode {
        let values = args
            .iter()
            .map(|a| match a {
                Arg::Value(v) => v.clone(),
                Arg::Named(_) => unreachable!("checked above"),
            })
            .collect();
        return Ok(ResolvedParams::Positional(values));
    }

    let mut map = HashMap::new();
    for arg in args {
        match arg {
            Arg::Named(pairs) => {
                for (key, value) in pairs {
                    let key = key.to_ascii_lowercase();
                    if map.insert(key.clone(), value.clone()).is_some() {
                        return Err(DbError::DuplicateParameter(key));
                    }
                }
            }
            Arg::Value(_) => return Err(DbError::MixedParameters),
        }
    }
    Ok(ResolvedParams::Named(map))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Rec {
        x: i64,
    }

    impl BindRecord for Rec {
        fn bind_fields(&self) -> Vec<(String, SqlValue)> {
            vec![("x".into(), SqlValue::Int(self.x))]
        }
    }

    #[test]
    fn empty_is_none() {
        assert_eq!(resolve_args(&[]).unwrap(), ResolvedParams::None);
    }

    #[test]
    fn positional_keeps_call_order() {
        let got = resolve_args(&[Arg::value("a"), Arg::value(2i64)]).unwrap();
        assert_eq!(
            got,
            ResolvedParams::Positional(vec![SqlValue::Text("a".into()), SqlValue::Int(2)])
        );
    }

    #[test]
    fn map_and_record_union() {
        let got = resolve_args(&[named_args! { "y" => "Y" }, Arg::record(&Rec { x: 42 })]).unwrap();
        let ResolvedParams::Named(map) = got else {
            panic!("expected named");
        };
        assert_eq!(map.get("x"), Some(&SqlValue::Int(42)));
        assert_eq!(map.get("y"), Some(&SqlValue::Text("Y".into())));
    }

    #[test]
    fn duplicate_key_across_sources() {
        let err = resolve_args(&[named_args! { "x" => 1 }, named_args! { "x" => 2 }]).unwrap_err();
        assert!(matches!(err, DbError::DuplicateParameter(k) if k == "x"));

        // Same conflict when one side is a record.
        let err =
            resolve_args(&[named_args! { "x" => 1 }, Arg::record(&Rec { x: 2 })]).unwrap_err();
        assert!(matches!(err, DbError::DuplicateParameter(k) if k == "x"));
    }

    #[test]
    fn keys_are_case_normalized() {
        let err = resolve_args(&[named_args! { "X" => 1, "x" => 2 }]).unwrap_err();
        assert!(matches!(err, DbError::DuplicateParameter(k) if k == "x"));
    }

    #[test]
    fn scalar_among_named_is_mixed() {
        let err = resolve_args(&[named_args! { "x" => 1 }, Arg::value(42i64)]).unwrap_err();
        assert!(matches!(err, DbError::MixedParameters));
    }
}
