//! Collation: the total order used by index keys and sorts.

use std::cmp::Ordering;
use unicode_normalization::UnicodeNormalization;

/// How strictly two strings compare under a locale collation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseSensitivity {
    /// Case and accents both significant.
    Exact,
    /// Case-insensitive, accents significant.
    IgnoreCase,
    /// Case- and accent-insensitive.
    IgnoreCaseAndAccents,
}

/// Total order applied to `BsonValue`s when comparing index keys and sort
/// keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collation {
    /// Byte-wise UTF-8 comparison. The default, and the fastest.
    Binary,
    /// Locale-aware comparison with configurable case/accent folding.
    Locale(CaseSensitivity),
}

impl Default for Collation {
    fn default() -> Self {
        Collation::Binary
    }
}

impl Collation {
    /// Parse the `COLLATION` pragma / connection-string value.
    ///
    /// Recognizes `"binary"`, `"exact"`, `"ignorecase"`, and
    /// `"ignorecaseandaccents"` case-insensitively; anything else falls back
    /// to `Binary`, matching the engine's conservative default.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "exact" => Collation::Locale(CaseSensitivity::Exact),
            "ignorecase" => Collation::Locale(CaseSensitivity::IgnoreCase),
            "ignorecaseandaccents" => Collation::Locale(CaseSensitivity::IgnoreCaseAndAccents),
            _ => Collation::Binary,
        }
    }

    /// Compare two strings under this collation.
    pub fn compare_str(&self, a: &str, b: &str) -> Ordering {
        match self {
            Collation::Binary => a.as_bytes().cmp(b.as_bytes()),
            Collation::Locale(strength) => {
                let fa = Self::fold(a, *strength);
                let fb = Self::fold(b, *strength);
                fa.cmp(&fb)
            }
        }
    }

    fn fold(s: &str, strength: CaseSensitivity) -> String {
        match strength {
            CaseSensitivity::Exact => s.to_string(),
            CaseSensitivity::IgnoreCase => s.to_lowercase(),
            CaseSensitivity::IgnoreCaseAndAccents => s
                .nfd()
                .filter(|c| !is_combining_mark(*c))
                .collect::<String>()
                .to_lowercase(),
        }
    }
}

/// Rough combining-mark test over the Unicode "Combining Diacritical Marks"
/// block, sufficient for accent stripping after NFD normalization.
fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_collation_is_bytewise() {
        let c = Collation::Binary;
        // 'a' is 0x61, 'B' is 0x42: lowercase sorts after uppercase in ASCII.
        assert_eq!(c.compare_str("a", "B"), Ordering::Greater);
        assert_eq!(c.compare_str("apple", "banana"), Ordering::Less);
    }

    #[test]
    fn test_binary_case_sensitive() {
        let c = Collation::Binary;
        assert_ne!(c.compare_str("abc", "ABC"), Ordering::Equal);
    }

    #[test]
    fn test_ignore_case() {
        let c = Collation::Locale(CaseSensitivity::IgnoreCase);
        assert_eq!(c.compare_str("abc", "ABC"), Ordering::Equal);
    }

    #[test]
    fn test_ignore_case_and_accents() {
        let c = Collation::Locale(CaseSensitivity::IgnoreCaseAndAccents);
        assert_eq!(c.compare_str("café", "CAFE"), Ordering::Equal);
    }

    #[test]
    fn test_parse() {
        assert_eq!(Collation::parse("BINARY"), Collation::Binary);
        assert_eq!(
            Collation::parse("IgnoreCase"),
            Collation::Locale(CaseSensitivity::IgnoreCase)
        );
        assert_eq!(Collation::parse("unknown"), Collation::Binary);
    }
}
