use std::fmt;

/// A dotted server version, as reported by the engine.
///
/// Keeps the raw string for display and compares numerically field by field,
/// ignoring any non-numeric suffix ("10.5.4-MariaDB-log" compares as
/// `[10, 5, 4]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version(String);

impl Version {
    pub fn new(raw: impl Into<String>) -> Self {
        Version(raw.into())
    }

    fn fields(s: &str) -> Vec<u64> {
        let mut out = Vec::new();
        for part in s.split('.') {
            let digits: String = part
                .trim_start()
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            match digits.parse::<u64>() {
                Ok(n) => out.push(n),
                Err(_) => break,
            }
        }
        out
    }

    /// Report whether this version is `want` or newer.
    ///
    /// Missing fields count as zero, so `"4".at_least("4.0.0")` holds and
    /// `"3.35.0".at_least("4")` does not.
    #[must_use]
    pub fn at_least(&self, want: &str) -> bool {
        let have = Self::fields(&self.0);
        let want = Self::fields(want);
        for i in 0..have.len().max(want.len()) {
            let h = have.get(i).copied().unwrap_or(0);
            let w = want.get(i).copied().unwrap_or(0);
            if h != w {
                return h > w;
            }
        }
        true
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Version::new(s)
    }
}
