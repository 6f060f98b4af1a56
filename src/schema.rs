//! MARC 21 bibliographic schema tables consulted by the merge engine.
//!
//! Every per-tag literal the engine needs lives here, built once on first use:
//! tag equivalence classes, non-filing indicators, skip lists, subfield
//! repeatability, matching key codes, placeholder values, synonym vocabularies
//! and indicator legality. The rest of the crate asks questions through the
//! functions in this module instead of carrying its own tag lists.
//!
//! Lookups for the alternate graphic representation field (880) should be made
//! with the tag the 880 links to; see [`crate::linkage::effective_tag`].

use crate::normalize::normalize_for_comparison;
use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};

/// Tag of the alternate graphic representation field.
pub const ALTERNATE_SCRIPT_TAG: &str = "880";

/// Tags that are never merged into an existing field; they are added when not
/// already present verbatim.
pub const DEFAULT_SKIP_MERGE_TAGS: &[&str] = &[
    "001", "003", "005", "006", "007", "008", "035", "LOW", "SID",
];

/// Tags that are never copied from the source record.
pub const DEFAULT_SKIP_ADD_TAGS: &[&str] = &["001", "003", "005", "040", "066", "CAT"];

/// Main entry tags; a record carries at most one of them.
pub const MAIN_ENTRY_TAGS: &[&str] = &["100", "110", "111", "130"];

/// Data field tags of which a record carries at most one.
const AT_MOST_ONE_TAGS: &[&str] = &["100", "110", "111", "130", "240", "245"];

/// Control field tags of which a record carries at most one.
const NON_REPEATABLE_CONTROL_TAGS: &[&str] = &["001", "003", "005", "008"];

/// Subfield codes that describe the title portion of a name/title heading.
pub const TITLE_KEY_CODES: &[char] = &['t', 'f', 'k', 'l', 'm', 'n', 'o', 'p', 'r', 's'];

/// Control subfields that allow a merge only when absent on both sides or
/// present and equal on both.
pub const STRICT_CONTROL_CODES: &[char] = &['3', '5', '9'];

/// Tags whose publication-statement subfields are never duplicated.
const NO_DUPLICATE_SUBFIELD_TAGS: &[&str] = &["260", "264"];

/// Validation rule for a single indicator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndicatorValidation {
    /// Indicator is undefined; blank is required
    Undefined,
    /// Indicator can be any single character
    Any,
    /// Indicator must be one of the specified values
    Values(&'static str),
    /// Indicator counts nonfiling characters (0-9)
    NonFiling,
}

impl IndicatorValidation {
    /// Check if the given character is valid for this indicator
    #[must_use]
    pub fn is_valid(&self, c: char) -> bool {
        match self {
            IndicatorValidation::Undefined => c == ' ' || c == '#',
            IndicatorValidation::Any => true,
            IndicatorValidation::Values(values) => values.contains(c),
            IndicatorValidation::NonFiling => c.is_ascii_digit(),
        }
    }

    /// The only legal value, when the rule allows exactly one
    #[must_use]
    pub fn single_value(&self) -> Option<char> {
        match self {
            IndicatorValidation::Undefined => Some(' '),
            IndicatorValidation::Values(values) if values.chars().count() == 1 => {
                values.chars().next()
            },
            _ => None,
        }
    }
}

/// Placeholder values that carry no information, by tag and subfield code.
const PLACEHOLDERS: &[(&[&str], char, &[&str])] = &[
    (
        &["260", "264"],
        'a',
        &[
            "[S.l.]",
            "[Sine loco]",
            "[Kustannuspaikka tuntematon]",
            "[Julkaisupaikka tuntematon]",
            "[Place of publication not identified]",
            "[Utgivningsort okänd]",
        ],
    ),
    (
        &["260", "264"],
        'b',
        &[
            "[s.n.]",
            "[Sine nomine]",
            "[Kustantaja tuntematon]",
            "[Julkaisija tuntematon]",
            "[publisher not identified]",
            "[Utgivare okänd]",
        ],
    ),
    (
        &["260", "264"],
        'c',
        &[
            "[s.a.]",
            "[Sine anno]",
            "[Julkaisuaika tuntematon]",
            "[date of publication not identified]",
        ],
    ),
    (&["300"], 'a', &["1 nide", "1 volume", "1 band"]),
];

/// Synonym vocabularies: tags, subfield code, groups of equivalent terms.
///
/// The first term of each group is the preferred form.
const SYNONYMS: &[(&[&str], char, &[&[&str]])] = &[
    (
        &["015", "020", "024"],
        'q',
        &[
            &[
                "sidottu",
                "sid.",
                "kovakantinen",
                "hardback",
                "hardcover",
                "inbunden",
                "inb.",
            ],
            &[
                "nidottu",
                "nid.",
                "pehmeäkantinen",
                "paperback",
                "pbk.",
                "häftad",
                "hft.",
            ],
        ],
    ),
    (
        &["775", "776", "787"],
        'i',
        &[
            &[
                "Verkkoaineisto:",
                "Verkkojulkaisu:",
                "Online version:",
                "Elektronisk version:",
            ],
            &[
                "Painettu:",
                "Painettu julkaisu:",
                "Print version:",
                "Tryckt version:",
            ],
        ],
    ),
];

/// Per-tag facts used by counterpart matching and subfield merging.
#[derive(Debug, Clone)]
struct TagRules {
    /// Subfield codes that may occur at most once
    non_repeatable: &'static str,
    /// Subfields that must be present for the field to be merged
    required: &'static [char],
    /// Subfields both fields must have or both lack
    paired: &'static [char],
    /// Codes compared when deciding whether two fields describe the same thing;
    /// `None` compares every alphabetic code
    keys: Option<&'static [char]>,
    /// Whether the field splits into a name part and a title part at `$t`
    name_title: bool,
}

lazy_static! {
    static ref EQUIVALENCE: HashMap<&'static str, &'static [&'static str]> = {
        let classes: &[&'static [&'static str]] = &[
            &["100", "700"],
            &["110", "710"],
            &["111", "711"],
            &["130", "730"],
        ];
        let mut map = HashMap::new();
        for class in classes {
            for tag in *class {
                map.insert(*tag, *class);
            }
        }
        map
    };

    static ref NON_FILING: HashMap<&'static str, u8> = {
        let mut map = HashMap::new();
        for tag in ["130", "630", "730", "740"] {
            map.insert(tag, 1);
        }
        for tag in ["240", "242", "243", "245", "440", "830"] {
            map.insert(tag, 2);
        }
        map
    };

    static ref INDICATORS: HashMap<&'static str, (IndicatorValidation, IndicatorValidation)> =
        build_indicator_rules();

    static ref TAG_RULES: HashMap<&'static str, TagRules> = build_tag_rules();

    static ref PLACEHOLDER_VALUES: HashSet<(String, char, String)> = {
        let mut set = HashSet::new();
        for (tags, code, values) in PLACEHOLDERS {
            for tag in *tags {
                for value in *values {
                    set.insert(((*tag).to_string(), *code, normalize_for_comparison(value)));
                }
            }
        }
        set
    };
}

/// Build MARC21 indicator rules for the tags the engine reasons about
fn build_indicator_rules() -> HashMap<&'static str, (IndicatorValidation, IndicatorValidation)> {
    use IndicatorValidation::{Any, NonFiling, Undefined, Values};

    let mut rules = HashMap::new();

    for tag in [
        "020", "035", "040", "250", "300", "336", "337", "338", "500", "504", "520",
    ] {
        rules.insert(tag, (Undefined, Undefined));
    }
    rules.insert("024", (Values("0123478"), Values(" 01")));
    rules.insert("022", (Values(" 01"), Undefined));
    rules.insert("041", (Values(" 01"), Values(" 7")));

    // Names: ind1 is the form of the entry element
    for tag in ["100", "600", "700", "800"] {
        let ind2 = match tag {
            "600" => Values("01234567"),
            "700" => Values(" 2"),
            _ => Undefined,
        };
        rules.insert(tag, (Values("013"), ind2));
    }
    for tag in ["110", "111", "610", "611", "710", "711", "810", "811"] {
        let ind2 = match tag {
            "610" | "611" => Values("01234567"),
            "710" | "711" => Values(" 2"),
            _ => Undefined,
        };
        rules.insert(tag, (Values("012"), ind2));
    }

    rules.insert("130", (NonFiling, Undefined));
    rules.insert("730", (NonFiling, Values(" 2")));
    rules.insert("240", (Values("01"), NonFiling));
    rules.insert("245", (Values("01"), NonFiling));
    rules.insert("246", (Values("0123"), Values(" 012345678")));
    rules.insert("260", (Values(" 23"), Undefined));
    rules.insert("264", (Values(" 23"), Values("01234")));
    rules.insert("490", (Values("01"), Undefined));
    rules.insert("505", (Values("0128"), Values(" 0")));
    rules.insert("650", (Values(" 012"), Values("01234567")));
    rules.insert("651", (Undefined, Values("01234567")));
    rules.insert("655", (Values(" 0"), Values("01234567")));
    for tag in ["773", "775", "776", "787"] {
        rules.insert(tag, (Values("01"), Values(" 8")));
    }
    rules.insert("830", (Undefined, NonFiling));
    rules.insert("856", (Any, Any));

    rules
}

/// Build per-tag repeatability and matching rules
#[allow(clippy::too_many_lines)]
fn build_tag_rules() -> HashMap<&'static str, TagRules> {
    fn identifier(non_repeatable: &'static str, keys: &'static [char]) -> TagRules {
        TagRules {
            non_repeatable,
            required: &[],
            paired: &[],
            keys: Some(keys),
            name_title: false,
        }
    }
    fn descriptive(non_repeatable: &'static str, keys: &'static [char]) -> TagRules {
        identifier(non_repeatable, keys)
    }

    let mut rules = HashMap::new();

    rules.insert(
        "020",
        TagRules {
            required: &['a'],
            ..identifier("ac6", &['a'])
        },
    );
    rules.insert("022", identifier("al26", &['a', 'l']));
    rules.insert("024", identifier("acd26", &['a']));
    rules.insert("028", identifier("ab6", &['a', 'b']));
    rules.insert("035", identifier("a6", &['a']));
    rules.insert("040", identifier("abc6", &[]));
    rules.insert("041", identifier("26", &[]));
    rules.insert("080", identifier("ab26", &['a']));
    rules.insert("084", identifier("bq26", &['a']));

    // Personal, corporate and meeting names: main entries, subjects, added entries, series
    let personal = ["100", "600", "700", "800"];
    let corporate = ["110", "610", "710", "810"];
    let meeting = ["111", "611", "711", "811"];
    for tag in personal {
        rules.insert(
            tag,
            TagRules {
                non_repeatable: "abdfhlqstux6",
                required: &['a'],
                paired: &['t'],
                keys: Some(&['a', 'b', 'c', 'q']),
                name_title: true,
            },
        );
    }
    for tag in corporate {
        rules.insert(
            tag,
            TagRules {
                non_repeatable: "afhlstux6",
                required: &['a'],
                paired: &['t'],
                keys: Some(&['a', 'b']),
                name_title: true,
            },
        );
    }
    for tag in meeting {
        rules.insert(
            tag,
            TagRules {
                non_repeatable: "afhlqstux6",
                required: &['a'],
                paired: &['t'],
                keys: Some(&['a', 'q']),
                name_title: true,
            },
        );
    }

    // Uniform titles
    for tag in ["130", "240", "630", "730", "830"] {
        rules.insert(
            tag,
            TagRules {
                non_repeatable: "afhlorstx6",
                required: &['a'],
                paired: &['n', 'p'],
                keys: Some(&['a', 'n', 'p']),
                name_title: false,
            },
        );
    }
    rules.insert(
        "245",
        TagRules {
            non_repeatable: "abcfghs6",
            required: &['a'],
            paired: &['n', 'p'],
            keys: Some(&['a', 'b', 'n', 'p']),
            name_title: false,
        },
    );
    rules.insert(
        "246",
        TagRules {
            non_repeatable: "abfghi6",
            required: &['a'],
            paired: &[],
            keys: Some(&['a', 'b', 'n', 'p']),
            name_title: false,
        },
    );
    rules.insert(
        "740",
        TagRules {
            non_repeatable: "ah56",
            required: &['a'],
            paired: &['n', 'p'],
            keys: Some(&['a', 'n', 'p']),
            name_title: false,
        },
    );

    rules.insert("250", descriptive("ab36", &['a']));
    rules.insert("260", descriptive("36", &['a', 'b', 'c']));
    rules.insert("264", descriptive("36", &['a', 'b', 'c']));
    rules.insert("300", descriptive("be36", &['a']));
    for tag in ["336", "337", "338"] {
        rules.insert(tag, descriptive("236", &['a', 'b']));
    }
    rules.insert("490", descriptive("l36", &['a', 'v']));
    rules.insert("500", descriptive("a356", &['a']));
    rules.insert("504", descriptive("ab6", &['a']));
    rules.insert("505", descriptive("a6", &['a']));
    rules.insert("520", descriptive("abc36", &['a']));
    rules.insert("546", descriptive("a36", &['a']));

    // Subject access
    for tag in ["648", "650", "651", "655"] {
        rules.insert(
            tag,
            TagRules {
                non_repeatable: "abcd2356",
                required: &['a'],
                paired: &[],
                keys: Some(&['a', 'v', 'x', 'y', 'z']),
                name_title: false,
            },
        );
    }

    // Linking entries
    for tag in ["773", "775", "776", "787"] {
        rules.insert(
            tag,
            TagRules {
                non_repeatable: "abdhstx67",
                required: &[],
                paired: &[],
                keys: Some(&['t', 'w']),
                name_title: false,
            },
        );
    }

    rules.insert(
        "856",
        TagRules {
            non_repeatable: "q36",
            required: &['u'],
            paired: &[],
            keys: Some(&['u']),
            name_title: false,
        },
    );

    rules
}

/// Tags that may substitute for `tag` when looking for a counterpart.
///
/// Always contains `tag` itself.
///
/// # Examples
///
/// ```
/// use mrrc_merge::schema::equivalent_tags;
///
/// assert_eq!(equivalent_tags("100"), vec!["100", "700"]);
/// assert_eq!(equivalent_tags("650"), vec!["650"]);
/// ```
#[must_use]
pub fn equivalent_tags(tag: &str) -> Vec<&str> {
    match EQUIVALENCE.get(tag) {
        Some(class) => class.to_vec(),
        None => vec![tag],
    }
}

/// The indicator position (1 or 2) counting nonfiling characters for `tag`.
#[must_use]
pub fn non_filing_indicator(tag: &str) -> Option<u8> {
    NON_FILING.get(tag).copied()
}

/// Indicator rule for a tag and position, if the schema defines one.
#[must_use]
pub fn indicator_rule(tag: &str, position: u8) -> Option<&'static IndicatorValidation> {
    INDICATORS
        .get(tag)
        .map(|(ind1, ind2)| if position == 1 { ind1 } else { ind2 })
}

/// The single legal value for an indicator, if the schema allows exactly one.
#[must_use]
pub fn single_legal_indicator(tag: &str, position: u8) -> Option<char> {
    indicator_rule(tag, position).and_then(IndicatorValidation::single_value)
}

/// Whether `value` is legal for an indicator; tags without a rule accept anything.
#[must_use]
pub fn is_legal_indicator(tag: &str, position: u8, value: char) -> bool {
    indicator_rule(tag, position).map_or(true, |rule| rule.is_valid(value))
}

/// Whether a record may carry at most one field with this tag.
#[must_use]
pub fn is_at_most_one(tag: &str) -> bool {
    AT_MOST_ONE_TAGS.contains(&tag) || NON_REPEATABLE_CONTROL_TAGS.contains(&tag)
}

/// Whether `tag` is a main entry (1XX heading) tag.
#[must_use]
pub fn is_main_entry(tag: &str) -> bool {
    MAIN_ENTRY_TAGS.contains(&tag)
}

/// The added entry tag corresponding to a main entry tag (`100` → `700`).
#[must_use]
pub fn added_entry_tag(tag: &str) -> Option<&'static str> {
    match tag {
        "100" => Some("700"),
        "110" => Some("710"),
        "111" => Some("711"),
        "130" => Some("730"),
        _ => None,
    }
}

/// Whether subfield `code` may repeat in a field tagged `tag`.
///
/// Tags without schema rules allow every code except `$6` to repeat.
#[must_use]
pub fn is_repeatable_subfield(tag: &str, code: char) -> bool {
    match TAG_RULES.get(tag) {
        Some(rules) => !rules.non_repeatable.contains(code),
        None => code != '6',
    }
}

/// Subfields that must be present on both sides of a merge.
#[must_use]
pub fn required_subfields(tag: &str) -> &'static [char] {
    TAG_RULES.get(tag).map_or(&[][..], |r| r.required)
}

/// Subfields both sides of a merge must have or lack together.
#[must_use]
pub fn paired_subfields(tag: &str) -> &'static [char] {
    TAG_RULES.get(tag).map_or(&[][..], |r| r.paired)
}

/// Codes compared when matching the name (or whole) part of a field.
///
/// `None` means every alphabetic code is compared.
#[must_use]
pub fn name_key_codes(tag: &str) -> Option<&'static [char]> {
    TAG_RULES.get(tag).and_then(|r| r.keys)
}

/// Whether the field splits into a name part and a title part at `$t`.
#[must_use]
pub fn is_name_title_tag(tag: &str) -> bool {
    TAG_RULES.get(tag).is_some_and(|r| r.name_title)
}

/// Whether `value` is a meaningless placeholder for `(tag, code)`.
///
/// # Examples
///
/// ```
/// use mrrc_merge::schema::is_placeholder;
///
/// assert!(is_placeholder("264", 'b', "[Kustantaja tuntematon],"));
/// assert!(!is_placeholder("264", 'b', "Otava,"));
/// ```
#[must_use]
pub fn is_placeholder(tag: &str, code: char, value: &str) -> bool {
    PLACEHOLDER_VALUES.contains(&(tag.to_string(), code, normalize_for_comparison(value)))
}

/// Whether `(tag, code)` holds identifiers compared after prefix canonicalization.
#[must_use]
pub fn is_identifier_subfield(tag: &str, code: char) -> bool {
    matches!(code, '0' | '1') || (tag == "035" && matches!(code, 'a' | 'z'))
}

/// Whether `(tag, code)` holds a standard number written with optional hyphens.
#[must_use]
pub fn is_hyphenated_identifier(tag: &str, code: char) -> bool {
    matches!(
        (tag, code),
        ("020", 'a' | 'z') | ("022", 'a' | 'l' | 'y' | 'z') | ("024", 'a' | 'z')
    )
}

/// Whether `(tag, code)` must not be compared in normalized form.
///
/// Hyphenated standard numbers and URLs keep formatting variants distinct so
/// that the preferred form can replace the other.
#[must_use]
pub fn is_normalization_exempt(tag: &str, code: char) -> bool {
    is_hyphenated_identifier(tag, code) || (tag == "856" && code == 'u')
}

/// Whether `tag` never receives a second copy of an existing subfield code.
#[must_use]
pub fn forbids_duplicate_subfields(tag: &str) -> bool {
    NO_DUPLICATE_SUBFIELD_TAGS.contains(&tag)
}

/// Synonym group and rank of a value; rank 0 is the preferred form.
#[must_use]
pub fn synonym_rank(tag: &str, code: char, value: &str) -> Option<(usize, usize)> {
    let wanted = normalize_for_comparison(value);
    SYNONYMS
        .iter()
        .filter(|(tags, c, _)| *c == code && tags.contains(&tag))
        .find_map(|(_, _, groups)| {
            groups.iter().enumerate().find_map(|(group, terms)| {
                terms
                    .iter()
                    .position(|term| normalize_for_comparison(term) == wanted)
                    .map(|rank| (group, rank))
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equivalence_is_symmetric() {
        assert_eq!(equivalent_tags("700"), vec!["100", "700"]);
        assert_eq!(equivalent_tags("710"), equivalent_tags("110"));
    }

    #[test]
    fn test_non_filing_indicators() {
        assert_eq!(non_filing_indicator("245"), Some(2));
        assert_eq!(non_filing_indicator("130"), Some(1));
        assert_eq!(non_filing_indicator("100"), None);
    }

    #[test]
    fn test_single_legal_indicator() {
        assert_eq!(single_legal_indicator("100", 2), Some(' '));
        assert_eq!(single_legal_indicator("100", 1), None);
        assert_eq!(single_legal_indicator("020", 1), Some(' '));
        assert_eq!(single_legal_indicator("999", 1), None);
    }

    #[test]
    fn test_indicator_validation() {
        assert!(IndicatorValidation::NonFiling.is_valid('4'));
        assert!(!IndicatorValidation::NonFiling.is_valid('x'));
        assert!(IndicatorValidation::Values("013").is_valid('3'));
        assert!(!IndicatorValidation::Values("013").is_valid('2'));
        assert_eq!(IndicatorValidation::Values("7").single_value(), Some('7'));
        assert_eq!(IndicatorValidation::Any.single_value(), None);

        assert!(is_legal_indicator("650", 2, '7'));
        assert!(!is_legal_indicator("650", 2, 'x'));
        assert!(is_legal_indicator("999", 1, 'x'));
    }

    #[test]
    fn test_repeatability() {
        assert!(!is_repeatable_subfield("100", 'a'));
        assert!(!is_repeatable_subfield("100", 'd'));
        assert!(is_repeatable_subfield("100", 'e'));
        assert!(is_repeatable_subfield("020", 'q'));
        assert!(!is_repeatable_subfield("245", 'b'));
        assert!(is_repeatable_subfield("260", 'a'));
        assert!(is_repeatable_subfield("599", 'a'));
        assert!(!is_repeatable_subfield("599", '6'));
    }

    #[test]
    fn test_key_codes() {
        assert_eq!(name_key_codes("100"), Some(&['a', 'b', 'c', 'q'][..]));
        assert_eq!(name_key_codes("041"), Some(&[][..]));
        assert_eq!(name_key_codes("599"), None);
        assert!(is_name_title_tag("700"));
        assert!(!is_name_title_tag("245"));
    }

    #[test]
    fn test_placeholders() {
        assert!(is_placeholder("260", 'a', "[S.l.] :"));
        assert!(is_placeholder("264", 'c', "[Julkaisuaika tuntematon]"));
        assert!(!is_placeholder("264", 'a', "[s.n.]"));
        assert!(!is_placeholder("500", 'a', "[S.l.]"));
    }

    #[test]
    fn test_synonym_rank() {
        assert_eq!(synonym_rank("020", 'q', "sidottu"), Some((0, 0)));
        assert_eq!(synonym_rank("020", 'q', "hardback"), Some((0, 3)));
        assert_eq!(synonym_rank("020", 'q', "nid."), Some((1, 1)));
        assert_eq!(synonym_rank("776", 'i', "Online version:"), Some((0, 2)));
        assert_eq!(synonym_rank("020", 'q', "kierrekirja"), None);
        assert_eq!(synonym_rank("500", 'q', "sidottu"), None);
    }

    #[test]
    fn test_identifier_tables() {
        assert!(is_identifier_subfield("100", '0'));
        assert!(is_identifier_subfield("035", 'a'));
        assert!(!is_identifier_subfield("245", 'a'));
        assert!(is_hyphenated_identifier("020", 'a'));
        assert!(is_normalization_exempt("856", 'u'));
        assert!(!is_normalization_exempt("245", 'a'));
    }

    #[test]
    fn test_main_entries() {
        assert!(is_main_entry("110"));
        assert!(!is_main_entry("700"));
        assert_eq!(added_entry_tag("100"), Some("700"));
        assert_eq!(added_entry_tag("245"), None);
        assert!(is_at_most_one("245"));
        assert!(is_at_most_one("008"));
        assert!(!is_at_most_one("650"));
    }
}
