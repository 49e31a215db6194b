//! URL-safe slugs and collision-free allocation.

use crate::error::AppError;
use async_trait::async_trait;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Upper bound on suffix probing before giving up with a conflict.
const MAX_SUFFIX: u32 = 10_000;

/// Letters NFD leaves whole.
fn special(c: char) -> Option<&'static str> {
    Some(match c {
        'æ' => "ae",
        'œ' => "oe",
        'ß' => "ss",
        'ł' => "l",
        'đ' | 'ð' => "d",
        'ø' => "o",
        'ı' => "i",
        'þ' => "th",
        _ => return None,
    })
}

/// Lowercase, strip combining marks after canonical decomposition, collapse every run of
/// other characters into one hyphen, trim hyphens. May return an empty string.
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut pending_hyphen = false;
    for c in lowered.nfd().filter(|c| !is_combining_mark(*c)) {
        let mut buf = [0u8; 4];
        let piece = if c.is_ascii_alphanumeric() {
            Some(&*c.encode_utf8(&mut buf))
        } else {
            special(c)
        };
        match piece {
            Some(p) => {
                if pending_hyphen && !out.is_empty() {
                    out.push('-');
                }
                pending_hyphen = false;
                out.push_str(p);
            }
            None => pending_hyphen = true,
        }
    }
    out
}

/// [`slugify`], or `fallback` when nothing URL-safe is left.
pub fn base_slug(name: &str, fallback: &str) -> String {
    let s = slugify(name);
    if s.is_empty() {
        fallback.to_string()
    } else {
        s
    }
}

/// Answers whether a slug is already used.
#[async_trait]
pub trait SlugLookup: Send {
    async fn taken(&mut self, candidate: &str) -> Result<bool, AppError>;
}

/// `base`, then `base-2`, `base-3`, ... until the lookup reports a free one.
pub async fn allocate<P: SlugLookup + ?Sized>(lookup: &mut P, base: &str) -> Result<String, AppError> {
    if !lookup.taken(base).await? {
        return Ok(base.to_string());
    }
    for n in 2..=MAX_SUFFIX {
        let candidate = format!("{}-{}", base, n);
        if !lookup.taken(&candidate).await? {
            return Ok(candidate);
        }
    }
    Err(AppError::Conflict {
        code: "conflict",
        message: format!("no free slug for {:?}", base),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Taken(HashSet<String>, usize);

    #[async_trait]
    impl SlugLookup for Taken {
        async fn taken(&mut self, candidate: &str) -> Result<bool, AppError> {
            self.1 += 1;
            Ok(self.0.contains(candidate))
        }
    }

    #[test]
    fn slugify_folds_and_collapses() {
        assert_eq!(slugify("Acme"), "acme");
        assert_eq!(slugify("  Café  Crème -- Lab! "), "cafe-creme-lab");
        assert_eq!(slugify("Œuvre & Fils"), "oeuvre-fils");
        assert_eq!(slugify("Straße 42"), "strasse-42");
        assert_eq!(slugify("北京"), "");
        assert_eq!(base_slug("!!!", "startup"), "startup");
    }

    #[test]
    fn slugify_strips_marks_beyond_latin_1() {
        assert_eq!(slugify("Şahin Tech"), "sahin-tech");
        assert_eq!(slugify("Đà Nẵng"), "da-nang");
        assert_eq!(slugify("Ölçü Ağ"), "olcu-ag");
        assert_eq!(slugify("Ţară"), "tara");
        assert_eq!(slugify("Łódź Øresund"), "lodz-oresund");
        assert_eq!(slugify("İstanbul"), "istanbul");
    }

    #[tokio::test]
    async fn allocate_suffixes_until_free() {
        let mut lookup = Taken(HashSet::new(), 0);
        assert_eq!(allocate(&mut lookup, "acme").await.unwrap(), "acme");

        let mut lookup = Taken(["acme", "acme-2", "acme-3"].iter().map(|s| s.to_string()).collect(), 0);
        assert_eq!(allocate(&mut lookup, "acme").await.unwrap(), "acme-4");
        assert_eq!(lookup.1, 4);
    }
}
