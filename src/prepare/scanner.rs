//! Lexical scan of query templates.
//!
//! A lightweight state machine walks the template once and reports every
//! placeholder and conditional-block span that sits in plain SQL text.
//! Single- and double-quoted strings (with doubled-quote escapes, and
//! MySQL-style backslash escapes when the engine uses them), backtick
//! quoting, `--` line comments, nested `/* */` block comments, and
//! PostgreSQL `$tag$ ... $tag$` dollar-quoting are all opaque: nothing inside
//! them is ever treated as a placeholder.

#[derive(Clone)]
enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    BacktickQuoted,
    LineComment,
    BlockComment(u32),
    DollarQuoted(String),
}

/// A `:name` placeholder span; `start` is the colon, `end` is one past the
/// identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NamedMarker {
    pub start: usize,
    pub end: usize,
}

/// A `?`, `?N`, or `$N` placeholder span. `index` is `Some` for the
/// explicitly numbered forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PosMarker {
    pub start: usize,
    pub end: usize,
    pub index: Option<usize>,
}

/// Everything one scan pass finds.
#[derive(Debug, Default)]
pub(crate) struct Markers {
    pub named: Vec<NamedMarker>,
    pub positional: Vec<PosMarker>,
    /// Byte offsets of `{{` sequences in plain text; candidates for
    /// conditional blocks.
    pub block_opens: Vec<usize>,
}

/// A well-formed conditional block `{{:ident[!] fragment}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Block {
    pub start: usize,
    /// One past the closing `}}`.
    pub end: usize,
    pub ident: String,
    pub negate: bool,
    pub frag_start: usize,
    pub frag_end: usize,
}

impl Block {
    pub fn contains(&self, start: usize, end: usize) -> bool {
        start >= self.start && end <= self.end
    }
}

pub(crate) fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn scan_digits(bytes: &[u8], start: usize) -> Option<(usize, usize)> {
    let mut idx = start;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    if idx == start {
        return None;
    }
    // Placeholder indexes are small; anything unparseable is not a placeholder.
    std::str::from_utf8(&bytes[start..idx])
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .map(|n| (idx, n))
}

/// Try to read a dollar-quote opener (`$$`, `$fn$`, ...) at `start`.
/// Returns the tag and the offset of its closing `$`.
fn dollar_quote_tag(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    let mut idx = start + 1;
    while idx < bytes.len() && bytes[idx] != b'$' {
        if !is_ident_char(bytes[idx]) {
            return None;
        }
        idx += 1;
    }
    if idx < bytes.len() && bytes[idx] == b'$' {
        let tag = String::from_utf8(bytes[start + 1..idx].to_vec()).ok()?;
        Some((tag, idx))
    } else {
        None
    }
}

fn closes_dollar_quote(bytes: &[u8], idx: usize, tag: &str) -> bool {
    let end = idx + 1 + tag.len();
    end < bytes.len()
        && bytes[idx + 1..].starts_with(tag.as_bytes())
        && bytes.get(end) == Some(&b'$')
}

/// One pass over the template, collecting placeholder and block markers.
pub(crate) fn scan(sql: &str, backslash_escapes: bool) -> Markers {
    let bytes = sql.as_bytes();
    let mut markers = Markers::default();
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => {
                    state = State::SingleQuoted;
                }
                b'"' => {
                    state = State::DoubleQuoted;
                }
                b'`' => {
                    state = State::BacktickQuoted;
                }
                b'-' if bytes.get(idx + 1) == Some(&b'-') => {
                    state = State::LineComment;
                    idx += 1;
                }
                b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'{' if bytes.get(idx + 1) == Some(&b'{') => {
                    markers.block_opens.push(idx);
                    idx += 1;
                }
                b':' => {
                    if bytes.get(idx + 1) == Some(&b':') {
                        // `::` cast, not a placeholder.
                        idx += 1;
                    } else if bytes
                        .get(idx + 1)
                        .is_some_and(|&c| c.is_ascii_alphabetic() || c == b'_')
                    {
                        let mut end = idx + 1;
                        while end < bytes.len() && is_ident_char(bytes[end]) {
                            end += 1;
                        }
                        markers.named.push(NamedMarker { start: idx, end });
                        idx = end - 1;
                    }
                }
                b'?' => {
                    if let Some((end, n)) = scan_digits(bytes, idx + 1) {
                        markers.positional.push(PosMarker {
                            start: idx,
                            end,
                            index: Some(n),
                        });
                        idx = end - 1;
                    } else {
                        markers.positional.push(PosMarker {
                            start: idx,
                            end: idx + 1,
                            index: None,
                        });
                    }
                }
                b'$' => {
                    if let Some((tag, close)) = dollar_quote_tag(bytes, idx) {
                        state = State::DollarQuoted(tag);
                        idx = close;
                    } else if let Some((end, n)) = scan_digits(bytes, idx + 1) {
                        markers.positional.push(PosMarker {
                            start: idx,
                            end,
                            index: Some(n),
                        });
                        idx = end - 1;
                    }
                }
                _ => {}
            },
            State::SingleQuoted => {
                if backslash_escapes && b == b'\\' {
                    idx += 1;
                } else if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1; // escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if backslash_escapes && b == b'\\' {
                    idx += 1;
                } else if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::BacktickQuoted => {
                if b == b'`' {
                    state = State::Normal;
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if b == b'/' && bytes.get(idx + 1) == Some(&b'*') {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if b == b'*' && bytes.get(idx + 1) == Some(&b'/') {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
            State::DollarQuoted(ref tag) => {
                if b == b'$' && closes_dollar_quote(bytes, idx, tag) {
                    idx += tag.len() + 1;
                    state = State::Normal;
                }
            }
        }
        idx += 1;
    }

    markers
}

/// Parse a conditional block starting at a `{{` offset. Malformed syntax
/// (no `:`, empty identifier, no separator, missing `}}`) yields `None`,
/// never an error; the caller leaves such text verbatim.
pub(crate) fn parse_block(sql: &str, start: usize) -> Option<Block> {
    let bytes = sql.as_bytes();
    let mut idx = start + 2;
    if bytes.get(idx) != Some(&b':') {
        return None;
    }
    idx += 1;

    let ident_start = idx;
    while idx < bytes.len() && is_ident_char(bytes[idx]) {
        idx += 1;
    }
    if idx == ident_start {
        return None;
    }
    let ident = sql[ident_start..idx].to_owned();

    let mut negate = false;
    if bytes.get(idx) == Some(&b'!') {
        negate = true;
        idx += 1;
    }

    if !bytes.get(idx).is_some_and(u8::is_ascii_whitespace) {
        return None;
    }
    idx += 1; // single separator; the rest belongs to the fragment

    let close = sql[idx..].find("}}")?;
    Some(Block {
        start,
        end: idx + close + 2,
        ident,
        negate,
        frag_start: idx,
        frag_end: idx + close,
    })
}

/// All well-formed conditional blocks, left to right, non-overlapping.
pub(crate) fn blocks(sql: &str, backslash_escapes: bool) -> Vec<Block> {
    let mut out: Vec<Block> = Vec::new();
    for open in scan(sql, backslash_escapes).block_opens {
        if out.last().is_some_and(|b| open < b.end) {
            continue; // `{{` inside the previous block's fragment
        }
        if let Some(block) = parse_block(sql, open) {
            out.push(block);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_named_markers() {
        let m = scan("select :x, :y_2 from t", false);
        let idents: Vec<&str> = m
            .named
            .iter()
            .map(|mk| &"select :x, :y_2 from t"[mk.start + 1..mk.end])
            .collect();
        assert_eq!(idents, ["x", "y_2"]);
    }

    #[test]
    fn skips_casts_and_literals() {
        let m = scan("select x::text, ':nope', \":also\" -- :no\n from t", false);
        assert!(m.named.is_empty());
    }

    #[test]
    fn backslash_escapes_are_engine_dependent() {
        let sql = r"select 'it\'s' = :x";
        // MySQL lexing: the literal runs to the closing quote, `:x` is a
        // placeholder.
        let m = scan(sql, true);
        assert_eq!(m.named.len(), 1);
        assert_eq!(&sql[m.named[0].start + 1..m.named[0].end], "x");
        // Standard lexing: the literal closes at `\'` and the second quote
        // reopens a string that swallows the rest.
        assert!(scan(sql, false).named.is_empty());
    }

    #[test]
    fn positional_markers_with_indexes() {
        let m = scan("select ?, ?2, $3", false);
        assert_eq!(m.positional.len(), 3);
        assert_eq!(m.positional[0].index, None);
        assert_eq!(m.positional[1].index, Some(2));
        assert_eq!(m.positional[2].index, Some(3));
    }

    #[test]
    fn dollar_quoting_is_opaque() {
        let m = scan("$fn$ select $1 :x $fn$ where a = $1", false);
        assert!(m.named.is_empty());
        assert_eq!(m.positional.len(), 1);
    }

    #[test]
    fn comments_are_opaque() {
        let m = scan("select '?1', $1 -- $2\n/* ?3 /* $4 */ */ from t where a = $1", false);
        assert_eq!(m.positional.len(), 2);
        assert!(m.positional.iter().all(|p| p.index == Some(1)));
    }

    #[test]
    fn block_parsing() {
        let sql = "select {{:a x like :foo}} {{:b! y}} {{bad}} {{:open never";
        let got = blocks(sql, false);
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].ident, "a");
        assert!(!got[0].negate);
        assert_eq!(&sql[got[0].frag_start..got[0].frag_end], "x like :foo");
        assert_eq!(got[1].ident, "b");
        assert!(got[1].negate);
        assert_eq!(&sql[got[1].frag_start..got[1].frag_end], "y");
    }
}
