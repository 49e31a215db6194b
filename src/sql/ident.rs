//! Identifier allowlist. Table and column names cannot be bound as parameters, so every
//! name that reaches generated SQL passes through here first.

use std::fmt;

/// PostgreSQL truncates identifiers beyond this length.
const MAX_IDENT_LEN: usize = 63;

fn allowed(body: &str) -> bool {
    let mut chars = body.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A validated SQL identifier. `name` is the catalog spelling: unquoted input is folded to
/// lower case the way PostgreSQL folds it, quoted input keeps its case.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Ident {
    name: String,
}

impl Ident {
    /// Returns `None` for anything outside the allowlist (letters, digits, underscore,
    /// optionally wrapped in one pair of double quotes).
    pub fn sanitize(raw: &str) -> Option<Ident> {
        let raw = raw.trim();
        let (body, quoted) = match raw.strip_prefix('"') {
            Some(rest) => (rest.strip_suffix('"')?, true),
            None => (raw, false),
        };
        if body.is_empty() || body.len() > MAX_IDENT_LEN || !allowed(body) {
            return None;
        }
        let name = if quoted { body.to_string() } else { body.to_ascii_lowercase() };
        Some(Ident { name })
    }

    /// Name as stored in `information_schema`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Double-quoted form for SQL text.
    pub fn quoted(&self) -> String {
        quote(&self.name)
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Quote a catalog name. Only called with names that came from the allowlist or from the
/// catalog itself.
pub(crate) fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_quoted_names() {
        assert_eq!(Ident::sanitize("startups").unwrap().name(), "startups");
        assert_eq!(Ident::sanitize("Startups").unwrap().name(), "startups");
        assert_eq!(Ident::sanitize("\"Startup\"").unwrap().name(), "Startup");
        assert_eq!(Ident::sanitize("  date_debut ").unwrap().name(), "date_debut");
        assert_eq!(Ident::sanitize("_legacy2").unwrap().quoted(), "\"_legacy2\"");
    }

    #[test]
    fn rejects_everything_else() {
        for bad in [
            "",
            "\"\"",
            "users; DROP TABLE users",
            "name--",
            "1col",
            "a b",
            "\"unterminated",
            "a.b",
            "col\"",
            "ümlaut",
        ] {
            assert!(Ident::sanitize(bad).is_none(), "{bad:?} should be rejected");
        }
        assert!(Ident::sanitize(&"x".repeat(64)).is_none());
        assert!(Ident::sanitize(&"x".repeat(63)).is_some());
    }
}
