//! ISBN normalization and validation.
//!
//! Every function here is total: malformed input yields `None` or `false`,
//! never a panic or an error. Normalization deliberately does not validate
//! checksums, so identity keys stay stable even for mistyped identifiers.
//!
//! # Example
//!
//! ```
//! use bibrecon::isbn;
//!
//! assert_eq!(isbn::normalize("978-0-13-468599-1").as_deref(), Some("9780134685991"));
//! assert!(isbn::is_valid_isbn13("978-0-13-468599-1"));
//! assert!(!isbn::is_valid_isbn13("978-0-13-468599-2"));
//! ```

use serde::{Deserialize, Serialize};

/// Identifier type tag for 13-digit ISBNs in metadata-API payloads.
pub const ISBN_13: &str = "ISBN_13";
/// Identifier type tag for 10-digit ISBNs in metadata-API payloads.
pub const ISBN_10: &str = "ISBN_10";

/// One `{type, identifier}` entry of a metadata-API `industryIdentifiers` list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndustryIdentifier {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub identifier: String,
}

/// Strips hyphens and spaces from an ISBN.
///
/// Returns `None` when nothing is left. Leading zeros are preserved and the
/// checksum is not inspected.
pub fn normalize(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() { None } else { Some(cleaned) }
}

/// [`normalize`] lifted over an optional value.
pub fn normalize_opt(raw: Option<&str>) -> Option<String> {
    raw.and_then(normalize)
}

/// Validates an ISBN-10 checksum (weights 10..1, sum mod 11 == 0).
///
/// Only the final position may be `X` (value 10).
pub fn is_valid_isbn10(raw: &str) -> bool {
    let Some(s) = normalize(raw) else {
        return false;
    };
    if s.len() != 10 || !s.is_ascii() {
        return false;
    }

    let mut total = 0u32;
    for (i, ch) in s.chars().enumerate() {
        let value = match ch {
            '0'..='9' => ch as u32 - '0' as u32,
            'X' | 'x' if i == 9 => 10,
            _ => return false,
        };
        total += (10 - i as u32) * value;
    }
    total % 11 == 0
}

/// Validates an ISBN-13 check digit (alternating weights 1 and 3).
pub fn is_valid_isbn13(raw: &str) -> bool {
    let Some(s) = normalize(raw) else {
        return false;
    };
    if s.len() != 13 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let digits: Vec<u32> = s.bytes().map(|b| u32::from(b - b'0')).collect();
    let total: u32 = digits[..12]
        .iter()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { *d } else { d * 3 })
        .sum();
    let check = (10 - total % 10) % 10;
    check == digits[12]
}

/// Prefers a normalized ISBN-13, falling back to a normalized ISBN-10.
pub fn coalesce(isbn13: Option<&str>, isbn10: Option<&str>) -> Option<String> {
    normalize_opt(isbn13).or_else(|| normalize_opt(isbn10))
}

/// Finds the identifier of the requested type in an `industryIdentifiers` list.
///
/// When asking for [`ISBN_13`] and none is present, the first [`ISBN_10`] is
/// returned instead. Callers that request both types may therefore see the
/// same ISBN-10 twice; that mirrors how the upstream enrichment data was built.
pub fn find_by_type(identifiers: &[IndustryIdentifier], wanted_type: &str) -> Option<String> {
    let exact = identifiers
        .iter()
        .find(|id| id.kind == wanted_type)
        .map(|id| id.identifier.clone());
    if exact.is_some() {
        return exact;
    }

    if wanted_type == ISBN_13 {
        return identifiers
            .iter()
            .find(|id| id.kind == ISBN_10)
            .map(|id| id.identifier.clone());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn ident(kind: &str, identifier: &str) -> IndustryIdentifier {
        IndustryIdentifier {
            kind: kind.to_string(),
            identifier: identifier.to_string(),
        }
    }

    #[rstest]
    #[case("978-0-13-468599-1", Some("9780134685991"))]
    #[case(" 0 306 40615 2 ", Some("0306406152"))]
    #[case("0012345678", Some("0012345678"))]
    #[case("", None)]
    #[case(" - - ", None)]
    fn test_normalize(#[case] raw: &str, #[case] expected: Option<&str>) {
        assert_eq!(normalize(raw).as_deref(), expected);
    }

    #[test]
    fn test_normalize_opt() {
        assert_eq!(normalize_opt(None), None);
        assert_eq!(normalize_opt(Some("1-2")).as_deref(), Some("12"));
    }

    #[rstest]
    #[case("0306406152", true)]
    #[case("0-306-40615-2", true)]
    #[case("080442957X", true)]
    #[case("080442957x", true)]
    #[case("0306406153", false)]
    #[case("X306406152", false)]
    #[case("030640615", false)]
    #[case("03064O6152", false)]
    #[case("", false)]
    fn test_is_valid_isbn10(#[case] raw: &str, #[case] expected: bool) {
        assert_eq!(is_valid_isbn10(raw), expected);
    }

    #[rstest]
    #[case("9780134685991", true)]
    #[case("978-0-441-01359-3", true)]
    #[case("9780306406157", true)]
    #[case("9780306406158", false)]
    #[case("978030640615", false)]
    #[case("978030640615X", false)]
    #[case("", false)]
    fn test_is_valid_isbn13(#[case] raw: &str, #[case] expected: bool) {
        assert_eq!(is_valid_isbn13(raw), expected);
    }

    #[test]
    fn test_isbn13_single_digit_mutation_fails() {
        let valid = "9780134685991";
        assert!(is_valid_isbn13(valid));

        for pos in 0..valid.len() {
            let original = valid.as_bytes()[pos];
            for digit in b'0'..=b'9' {
                if digit == original {
                    continue;
                }
                let mut mutated = valid.as_bytes().to_vec();
                mutated[pos] = digit;
                let mutated = String::from_utf8(mutated).unwrap();
                assert!(
                    !is_valid_isbn13(&mutated),
                    "mutation at {pos} should invalidate {mutated}"
                );
            }
        }
    }

    #[test]
    fn test_coalesce() {
        assert_eq!(
            coalesce(Some("978-0-13-468599-1"), Some("0134685997")).as_deref(),
            Some("9780134685991")
        );
        assert_eq!(
            coalesce(Some("  "), Some("0-13-468599-7")).as_deref(),
            Some("0134685997")
        );
        assert_eq!(coalesce(None, None), None);
    }

    #[test]
    fn test_find_by_type_exact() {
        let ids = vec![ident(ISBN_10, "0441013597"), ident(ISBN_13, "9780441013593")];
        assert_eq!(find_by_type(&ids, ISBN_13).as_deref(), Some("9780441013593"));
        assert_eq!(find_by_type(&ids, ISBN_10).as_deref(), Some("0441013597"));
    }

    #[test]
    fn test_find_by_type_isbn13_falls_back_to_isbn10() {
        let ids = vec![ident("OTHER", "abc"), ident(ISBN_10, "0441013597")];
        assert_eq!(find_by_type(&ids, ISBN_13).as_deref(), Some("0441013597"));
    }

    #[test]
    fn test_find_by_type_isbn10_has_no_fallback() {
        let ids = vec![ident(ISBN_13, "9780441013593")];
        assert_eq!(find_by_type(&ids, ISBN_10), None);
        assert_eq!(find_by_type(&[], ISBN_13), None);
    }
}
