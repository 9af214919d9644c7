//! Query preparation: conditional blocks, named-placeholder resolution,
//! slice expansion, and rebinding to the target engine's native syntax.
//!
//! Whether a call is named or positional is decided by the supplied
//! parameter sources (see [`crate::params`]): any map or record source makes
//! the call named. Named calls resolve `{{:cond ...}}` blocks first, then
//! substitute `:name` placeholders left to right. Positional calls pass the
//! template through untouched apart from placeholder rebinding and, when a
//! list argument is present, in-place expansion of bare `?` placeholders.
//!
//! Malformed conditional blocks are deliberately left verbatim rather than
//! rejected, so stray `{{`/`}}` in literal SQL never breaks a query that does
//! not use the conditional feature.

pub(crate) mod scanner;

use std::collections::HashMap;

use crate::drivers::DriverCaps;
use crate::error::DbError;
use crate::params::{Arg, ResolvedParams, resolve_args};
use crate::types::SqlValue;

use scanner::{PosMarker, blocks, scan};

/// Prepare a query template for the given engine.
///
/// Returns the rebound query text and the positional argument list in
/// matching order. Pure computation; nothing is executed.
///
/// # Errors
///
/// All errors are attributable to caller input: conflicting or mixed
/// parameter sources, a template mixing `:name` with `?`/`$N`, an
/// unresolvable named identifier or block controller, and list-expansion
/// misuse.
pub fn prepare_query(
    caps: &DriverCaps,
    template: &str,
    args: &[Arg],
) -> Result<(String, Vec<SqlValue>), DbError> {
    match resolve_args(args)? {
        ResolvedParams::Named(map) => prepare_named(caps, template, &map),
        ResolvedParams::Positional(values) => prepare_positional(caps, template, values),
        ResolvedParams::None => prepare_positional(caps, template, Vec::new()),
    }
}

fn prepare_named(
    caps: &DriverCaps,
    template: &str,
    map: &HashMap<String, SqlValue>,
) -> Result<(String, Vec<SqlValue>), DbError> {
    let text = resolve_blocks(template, map, caps.backslash_escapes)?;

    let markers = scan(&text, caps.backslash_escapes);
    if !markers.positional.is_empty() {
        return Err(DbError::MixedPlaceholders);
    }

    let mut out = String::with_capacity(text.len());
    let mut out_args = Vec::with_capacity(markers.named.len());
    let mut copied = 0;
    let mut n = 0;
    for mk in &markers.named {
        let ident = &text[mk.start + 1..mk.end];
        let value = map
            .get(&ident.to_ascii_lowercase())
            .ok_or_else(|| DbError::UnknownParameter(ident.to_owned()))?;
        out.push_str(&text[copied..mk.start]);
        push_value(caps, &mut out, &mut out_args, &mut n, value)?;
        copied = mk.end;
    }
    out.push_str(&text[copied..]);
    Ok((out, out_args))
}

/// Replace each well-formed conditional block with its fragment or nothing,
/// before any placeholder resolution. Placeholders inside a suppressed block
/// therefore never need to resolve.
fn resolve_blocks(
    template: &str,
    map: &HashMap<String, SqlValue>,
    backslash_escapes: bool,
) -> Result<String, DbError> {
    let found = blocks(template, backslash_escapes);
    if found.is_empty() {
        return Ok(template.to_owned());
    }

    let mut out = String::with_capacity(template.len());
    let mut copied = 0;
    for block in &found {
        let value = map
            .get(&block.ident.to_ascii_lowercase())
            .ok_or_else(|| DbError::UnknownParameter(block.ident.clone()))?;
        out.push_str(&template[copied..block.start]);
        if value.is_truthy() != block.negate {
            out.push_str(&template[block.frag_start..block.frag_end]);
        }
        copied = block.end;
    }
    out.push_str(&template[copied..]);
    Ok(out)
}

fn prepare_positional(
    caps: &DriverCaps,
    template: &str,
    args: Vec<SqlValue>,
) -> Result<(String, Vec<SqlValue>), DbError> {
    let markers = scan(template, caps.backslash_escapes);

    // Template-level invariant: named and positional placeholders never mix.
    // Block controllers (and anything else inside a block span) don't count;
    // blocks pass through verbatim in positional mode.
    if !markers.positional.is_empty() {
        let spans = blocks(template, caps.backslash_escapes);
        let named_outside = markers
            .named
            .iter()
            .any(|mk| !spans.iter().any(|b| b.contains(mk.start, mk.end)));
        if named_outside {
            return Err(DbError::MixedPlaceholders);
        }
    }

    if args.iter().any(|a| matches!(a, SqlValue::List(_))) {
        expand_positional(caps, template, &markers.positional, &args)
    } else {
        rebind_only(caps, template, &markers.positional, args)
    }
}

/// Textual rebind: placeholders are rewritten to the target syntax and the
/// argument list is forwarded unchanged. A query already in the target
/// engine's native syntax comes back identical.
fn rebind_only(
    caps: &DriverCaps,
    template: &str,
    markers: &[PosMarker],
    args: Vec<SqlValue>,
) -> Result<(String, Vec<SqlValue>), DbError> {
    if markers.is_empty() {
        return Ok((template.to_owned(), args));
    }

    let mut out = String::with_capacity(template.len());
    let mut copied = 0;
    let mut seq = 0;
    for mk in markers {
        out.push_str(&template[copied..mk.start]);
        match mk.index {
            Some(n) => caps.push_indexed_placeholder(&mut out, n),
            None => {
                seq += 1;
                caps.push_placeholder(&mut out, seq);
            }
        }
        copied = mk.end;
    }
    out.push_str(&template[copied..]);
    Ok((out, args))
}

/// Expansion rebind, used when a list argument is present: bare `?`
/// placeholders consume arguments left to right and a list expands into one
/// placeholder per element.
fn expand_positional(
    caps: &DriverCaps,
    template: &str,
    markers: &[PosMarker],
    args: &[SqlValue],
) -> Result<(String, Vec<SqlValue>), DbError> {
    if markers.iter().any(|mk| mk.index.is_some()) {
        return Err(DbError::Execution(
            "list parameters cannot be combined with numbered placeholders".into(),
        ));
    }
    if markers.len() != args.len() {
        return Err(DbError::Execution(format!(
            "query has {} placeholders but {} parameters were supplied",
            markers.len(),
            args.len()
        )));
    }

    let mut out = String::with_capacity(template.len());
    let mut out_args = Vec::with_capacity(args.len());
    let mut copied = 0;
    let mut n = 0;
    for (mk, value) in markers.iter().zip(args) {
        out.push_str(&template[copied..mk.start]);
        push_value(caps, &mut out, &mut out_args, &mut n, value)?;
        copied = mk.end;
    }
    out.push_str(&template[copied..]);
    Ok((out, out_args))
}

/// Emit the placeholder(s) and output argument(s) for one bound value,
/// expanding lists in place.
fn push_value(
    caps: &DriverCaps,
    out: &mut String,
    out_args: &mut Vec<SqlValue>,
    n: &mut usize,
    value: &SqlValue,
) -> Result<(), DbError> {
    match value {
        SqlValue::List(items) => {
            if items.is_empty() {
                return Err(DbError::Execution(
                    "cannot expand an empty list parameter".into(),
                ));
            }
            for (i, item) in items.iter().enumerate() {
                if matches!(item, SqlValue::List(_)) {
                    return Err(DbError::Execution(
                        "nested list parameters are not supported".into(),
                    ));
                }
                if i > 0 {
                    out.push_str(", ");
                }
                *n += 1;
                caps.push_placeholder(out, *n);
                out_args.push(item.clone());
            }
        }
        value => {
            *n += 1;
            caps.push_placeholder(out, *n);
            out_args.push(value.clone());
        }
    }
    Ok(())
}
