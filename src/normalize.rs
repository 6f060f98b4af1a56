//! String normalization used by matching and duplicate detection.
//!
//! Three strengths of comparison are used across the engine:
//!
//! - [`strip_trailing_punctuation`] — removes ISBD separators from the end of a
//!   value (`Helsinki :` and `Helsinki` compare equal);
//! - [`normalize_for_comparison`] — case, diacritic and punctuation insensitive
//!   (`Äänitteet.` and `aanitteet` compare equal);
//! - [`normalize_identifier`] — canonicalizes identifier prefixes and URNs so that
//!   `(FIN11)000123` and `http://urn.fi/URN:NBN:fi:au:finaf:000123` compare equal.

use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Characters stripped from the end of a value by [`strip_trailing_punctuation`].
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ':', ';', '/', '='];

/// Identifier prefixes and the canonical prefix they stand for.
///
/// Matched case-insensitively against the start of the value.
const IDENTIFIER_PREFIXES: &[(&str, &str)] = &[
    ("(FIN11)", "(FI-ASTERI-N)"),
    ("http://urn.fi/URN:NBN:fi:au:finaf:", "(FI-ASTERI-N)"),
    ("https://urn.fi/URN:NBN:fi:au:finaf:", "(FI-ASTERI-N)"),
    ("(FIN01)", "(FI-MELINDA)"),
    ("(FI-MELINDA)", "(FI-MELINDA)"),
    ("http://isni.org/isni/", "(isni)"),
    ("https://isni.org/isni/", "(isni)"),
    ("(isni)", "(isni)"),
    ("http://id.loc.gov/authorities/names/", "(DLC)"),
    ("https://id.loc.gov/authorities/names/", "(DLC)"),
    ("(DLC)", "(DLC)"),
    ("http://www.yso.fi/onto/yso/", "(FI-YSO)"),
    ("https://www.yso.fi/onto/yso/", "(FI-YSO)"),
];

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref LINK_OCCURRENCE: Regex = Regex::new(r"^(\d{3})-\d{2,3}").unwrap();
    static ref GROUP_NUMBER: Regex = Regex::new(r"^\d+").unwrap();
}

/// Remove trailing ISBD separators and whitespace.
///
/// Open date ranges (`1984-`), closing brackets and question marks are kept.
///
/// # Examples
///
/// ```
/// use mrrc_merge::normalize::strip_trailing_punctuation;
///
/// assert_eq!(strip_trailing_punctuation("Helsinki :"), "Helsinki");
/// assert_eq!(strip_trailing_punctuation("Otava, "), "Otava");
/// assert_eq!(strip_trailing_punctuation("1984-"), "1984-");
/// ```
#[must_use]
pub fn strip_trailing_punctuation(value: &str) -> &str {
    value.trim_end_matches(|c: char| c.is_whitespace() || TRAILING_PUNCTUATION.contains(&c))
}

/// Normalize a value for loose comparison.
///
/// Decomposes to NFD, drops combining marks, lower-cases, drops everything
/// that is not alphanumeric or whitespace and collapses whitespace.
///
/// # Examples
///
/// ```
/// use mrrc_merge::normalize::normalize_for_comparison;
///
/// assert_eq!(normalize_for_comparison("Äänitteet."), "aanitteet");
/// assert_eq!(
///     normalize_for_comparison("Smith,  John"),
///     normalize_for_comparison("smith john")
/// );
/// ```
#[must_use]
pub fn normalize_for_comparison(value: &str) -> String {
    let folded: String = value
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    WHITESPACE.replace_all(folded.trim(), " ").into_owned()
}

/// Canonicalize an identifier value.
///
/// Known URI and legacy system prefixes are replaced by their canonical
/// parenthesized prefix, spaces are removed and the result is lower-cased so
/// that prefix spelling differences do not matter.
///
/// # Examples
///
/// ```
/// use mrrc_merge::normalize::normalize_identifier;
///
/// assert_eq!(
///     normalize_identifier("(FIN11)000123456"),
///     normalize_identifier("http://urn.fi/URN:NBN:fi:au:finaf:000123456")
/// );
/// assert_eq!(
///     normalize_identifier("(isni)0000 0001 2138 4215"),
///     normalize_identifier("https://isni.org/isni/0000000121384215")
/// );
/// ```
#[must_use]
pub fn normalize_identifier(value: &str) -> String {
    let trimmed = value.trim();
    let canonical = IDENTIFIER_PREFIXES
        .iter()
        .find(|(prefix, _)| {
            trimmed
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        })
        .map_or_else(
            || trimmed.to_string(),
            |(prefix, canonical)| format!("{canonical}{}", &trimmed[prefix.len()..]),
        );
    canonical
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Digits (and a trailing `X` check character) of a standard number.
///
/// Only the first whitespace-separated token is considered, so qualifiers
/// such as `(nid.)` are ignored.
///
/// # Examples
///
/// ```
/// use mrrc_merge::normalize::identifier_digits;
///
/// assert_eq!(identifier_digits("951-9123-45-6"), "9519123456");
/// assert_eq!(identifier_digits("0000-000x (print)"), "0000000X");
/// ```
#[must_use]
pub fn identifier_digits(value: &str) -> String {
    value
        .split_whitespace()
        .next()
        .unwrap_or("")
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == 'x' || *c == 'X')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Whether the first token of a standard number carries hyphens.
#[must_use]
pub fn is_hyphenated(value: &str) -> bool {
    value
        .split_whitespace()
        .next()
        .is_some_and(|token| token.contains('-'))
}

/// Render a field's subfields as a comparable string.
///
/// Trailing punctuation is stripped from every value, `$6` occurrence
/// numbers are replaced with `XX` and `$8` link numbers with `N`, so that
/// linked fields from different records compare equal when only their
/// numbering differs.
#[must_use]
pub fn field_fingerprint(field: &crate::record::Field) -> String {
    if let Some(value) = &field.value {
        return format!("{} {}", field.tag, value.trim());
    }
    let mut out = format!("{} {}{}", field.tag, field.indicator1, field.indicator2);
    for sf in &field.subfields {
        let value = match sf.code {
            '6' => LINK_OCCURRENCE.replace(&sf.value, "${1}-XX").into_owned(),
            '8' => GROUP_NUMBER.replace(&sf.value, "N").into_owned(),
            _ => strip_trailing_punctuation(&sf.value).to_string(),
        };
        out.push_str(&format!(" ${}{}", sf.code, value));
    }
    out
}
