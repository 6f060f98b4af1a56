//! ISBD punctuation restoration for fields changed by a merge.
//!
//! Appending or replacing subfields leaves the separators between them
//! inconsistent (`$a Helsinki $b Otava` after a placeholder was replaced). The
//! rule table below states, per tag family, which separator ends a subfield
//! given the code of the next content subfield, or given that it is the last.

use crate::linkage::effective_tag;
use crate::record::Field;

/// Separator punctuation replaced when a rule applies.
const SEPARATORS: &[char] = &['.', ',', ':', ';', '/', '=', '+'];

/// What follows the subfield a rule applies to.
#[derive(Debug, Clone, Copy)]
enum Next {
    /// One of these content codes
    Codes(&'static str),
    /// No further content subfield
    End,
}

#[derive(Debug)]
struct Rule {
    tags: &'static [&'static str],
    code: char,
    next: Next,
    /// Required ending, including any leading space
    ending: &'static str,
}

const PERSONAL_NAMES: &[&str] = &["100", "600", "700", "800"];
const CORPORATE_NAMES: &[&str] = &["110", "610", "710", "810"];
const PUBLICATION: &[&str] = &["260", "264"];

#[rustfmt::skip]
const RULES: &[Rule] = &[
    // Title statement
    Rule { tags: &["245"], code: 'a', next: Next::Codes("b"), ending: " :" },
    Rule { tags: &["245"], code: 'a', next: Next::Codes("c"), ending: " /" },
    Rule { tags: &["245"], code: 'a', next: Next::Codes("np"), ending: "." },
    Rule { tags: &["245"], code: 'b', next: Next::Codes("c"), ending: " /" },
    Rule { tags: &["245"], code: 'b', next: Next::Codes("np"), ending: "." },
    Rule { tags: &["245"], code: 'n', next: Next::Codes("p"), ending: "," },
    Rule { tags: &["245"], code: 'n', next: Next::Codes("c"), ending: " /" },
    Rule { tags: &["245"], code: 'p', next: Next::Codes("c"), ending: " /" },
    Rule { tags: &["245"], code: 'a', next: Next::End, ending: "." },
    Rule { tags: &["245"], code: 'b', next: Next::End, ending: "." },
    Rule { tags: &["245"], code: 'c', next: Next::End, ending: "." },
    Rule { tags: &["245"], code: 'n', next: Next::End, ending: "." },
    Rule { tags: &["245"], code: 'p', next: Next::End, ending: "." },
    // Edition statement
    Rule { tags: &["250"], code: 'a', next: Next::Codes("b"), ending: " /" },
    Rule { tags: &["250"], code: 'a', next: Next::End, ending: "." },
    Rule { tags: &["250"], code: 'b', next: Next::End, ending: "." },
    // Publication, distribution and copyright
    Rule { tags: PUBLICATION, code: 'a', next: Next::Codes("a"), ending: " ;" },
    Rule { tags: PUBLICATION, code: 'a', next: Next::Codes("b"), ending: " :" },
    Rule { tags: PUBLICATION, code: 'a', next: Next::Codes("c"), ending: "," },
    Rule { tags: PUBLICATION, code: 'b', next: Next::Codes("a"), ending: " ;" },
    Rule { tags: PUBLICATION, code: 'b', next: Next::Codes("b"), ending: " :" },
    Rule { tags: PUBLICATION, code: 'b', next: Next::Codes("c"), ending: "," },
    Rule { tags: PUBLICATION, code: 'c', next: Next::End, ending: "." },
    // Physical description
    Rule { tags: &["300"], code: 'a', next: Next::Codes("b"), ending: " :" },
    Rule { tags: &["300"], code: 'a', next: Next::Codes("c"), ending: " ;" },
    Rule { tags: &["300"], code: 'b', next: Next::Codes("c"), ending: " ;" },
    Rule { tags: &["300"], code: 'c', next: Next::Codes("e"), ending: " +" },
    Rule { tags: &["300"], code: 'a', next: Next::Codes("e"), ending: " +" },
    // Series statement
    Rule { tags: &["490"], code: 'a', next: Next::Codes("v"), ending: " ;" },
    Rule { tags: &["490"], code: 'a', next: Next::Codes("x"), ending: "," },
    Rule { tags: &["490"], code: 'x', next: Next::Codes("v"), ending: " ;" },
    Rule { tags: &["490"], code: 'v', next: Next::End, ending: "" },
    // Name headings
    Rule { tags: PERSONAL_NAMES, code: 'a', next: Next::Codes("bcde"), ending: "," },
    Rule { tags: PERSONAL_NAMES, code: 'a', next: Next::Codes("q"), ending: "" },
    Rule { tags: PERSONAL_NAMES, code: 'b', next: Next::Codes("cde"), ending: "," },
    Rule { tags: PERSONAL_NAMES, code: 'c', next: Next::Codes("de"), ending: "," },
    Rule { tags: PERSONAL_NAMES, code: 'q', next: Next::Codes("de"), ending: "," },
    Rule { tags: PERSONAL_NAMES, code: 'd', next: Next::Codes("e"), ending: "," },
    Rule { tags: PERSONAL_NAMES, code: 'e', next: Next::Codes("e"), ending: "," },
    Rule { tags: PERSONAL_NAMES, code: 'd', next: Next::Codes("t"), ending: "." },
    Rule { tags: PERSONAL_NAMES, code: 'e', next: Next::Codes("t"), ending: "." },
    Rule { tags: PERSONAL_NAMES, code: 'a', next: Next::End, ending: "." },
    Rule { tags: PERSONAL_NAMES, code: 'd', next: Next::End, ending: "." },
    Rule { tags: PERSONAL_NAMES, code: 'e', next: Next::End, ending: "." },
    Rule { tags: CORPORATE_NAMES, code: 'a', next: Next::Codes("b"), ending: "." },
    Rule { tags: CORPORATE_NAMES, code: 'b', next: Next::Codes("b"), ending: "." },
    Rule { tags: CORPORATE_NAMES, code: 'a', next: Next::Codes("e"), ending: "," },
    Rule { tags: CORPORATE_NAMES, code: 'b', next: Next::Codes("e"), ending: "," },
    Rule { tags: CORPORATE_NAMES, code: 'e', next: Next::Codes("e"), ending: "," },
    Rule { tags: CORPORATE_NAMES, code: 'a', next: Next::End, ending: "." },
    Rule { tags: CORPORATE_NAMES, code: 'b', next: Next::End, ending: "." },
    Rule { tags: CORPORATE_NAMES, code: 'e', next: Next::End, ending: "." },
];

fn find_rule(tag: &str, code: char, next: Option<char>) -> Option<&'static Rule> {
    RULES.iter().find(|rule| {
        rule.code == code
            && rule.tags.contains(&tag)
            && match (rule.next, next) {
                (Next::Codes(codes), Some(next)) => codes.contains(next),
                (Next::End, None) => true,
                _ => false,
            }
    })
}

/// Whether `value` is a closed life span such as `1984-2020`.
fn is_year_range(value: &str) -> bool {
    let is_year = |part: &str| part.len() == 4 && part.bytes().all(|b| b.is_ascii_digit());
    value
        .split_once('-')
        .is_some_and(|(birth, death)| is_year(birth) && is_year(death))
}

/// Re-derive the ending punctuation of `value`.
///
/// Values ending in an open date range, a closing bracket or terminal
/// punctuation other than a separator keep their ending when a period is
/// required. So does a closed year range in `$d`.
fn punctuate(code: char, value: &str, ending: &str) -> String {
    let trimmed = value.trim_end();
    if trimmed.ends_with('-') || (code == 'd' && ending == "." && is_year_range(trimmed)) {
        return trimmed.to_string();
    }
    let body = trimmed
        .trim_end_matches(|c: char| SEPARATORS.contains(&c) || c.is_whitespace())
        .to_string();
    if ending == "." && body.ends_with(['?', '!', ']', ')', '"']) {
        return body;
    }
    // Abbreviations ending in a period keep it when a period is required
    if ending == "." && trimmed.ends_with('.') {
        return trimmed.to_string();
    }
    body + ending
}

/// Restore separator punctuation in place; returns whether anything changed.
///
/// Control subfields (digit codes) are left untouched and skipped when looking
/// for the next content subfield. Subfields without an applicable rule keep
/// their punctuation.
pub fn restore_punctuation(field: &mut Field) -> bool {
    let tag = effective_tag(field);
    let content: Vec<usize> = field
        .subfields
        .iter()
        .enumerate()
        .filter(|(_, sf)| !sf.is_control())
        .map(|(i, _)| i)
        .collect();

    let mut changed = false;
    for (n, &index) in content.iter().enumerate() {
        let next = content.get(n + 1).map(|&i| field.subfields[i].code);
        let subfield = &mut field.subfields[index];
        let Some(rule) = find_rule(&tag, subfield.code, next) else {
            continue;
        };
        let punctuated = punctuate(subfield.code, &subfield.value, rule.ending);
        if punctuated != subfield.value {
            subfield.value = punctuated;
            changed = true;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(field: &Field) -> Vec<&str> {
        field.subfields.iter().map(|sf| sf.value.as_str()).collect()
    }

    #[test]
    fn test_publication_statement() {
        let mut field = Field::builder("264", ' ', '1')
            .subfield('a', "Helsinki")
            .subfield('b', "Otava")
            .subfield('c', "2020")
            .build();
        assert!(restore_punctuation(&mut field));
        assert_eq!(values(&field), vec!["Helsinki :", "Otava,", "2020."]);
        assert!(!restore_punctuation(&mut field));
    }

    #[test]
    fn test_replaces_wrong_separator() {
        let mut field = Field::builder("245", '1', '0')
            .subfield('a', "Kissojen kirja.")
            .subfield('b', "romaani /")
            .subfield('c', "Matti Virtanen")
            .subfield('6', "880-01")
            .build();
        restore_punctuation(&mut field);
        assert_eq!(
            values(&field),
            vec!["Kissojen kirja :", "romaani /", "Matti Virtanen.", "880-01"]
        );
    }

    #[test]
    fn test_name_heading_open_date() {
        let mut field = Field::builder("100", '1', ' ')
            .subfield('a', "Virtanen, Matti")
            .subfield('d', "1950-")
            .subfield('e', "kirjoittaja")
            .subfield('0', "(FIN11)000123")
            .build();
        restore_punctuation(&mut field);
        assert_eq!(
            values(&field),
            vec!["Virtanen, Matti,", "1950-", "kirjoittaja.", "(FIN11)000123"]
        );
    }

    #[test]
    fn test_closed_life_span_left_as_given() {
        let mut field = Field::builder("100", '1', ' ')
            .subfield('a', "Virtanen, Matti")
            .subfield('d', "1984-2020")
            .build();
        restore_punctuation(&mut field);
        assert_eq!(values(&field), vec!["Virtanen, Matti,", "1984-2020"]);

        let mut field = Field::builder("100", '1', ' ')
            .subfield('a', "Virtanen, Matti,")
            .subfield('d', "1984-2020")
            .subfield('e', "kirjoittaja")
            .build();
        restore_punctuation(&mut field);
        assert_eq!(values(&field), vec!["Virtanen, Matti,", "1984-2020,", "kirjoittaja."]);
    }

    #[test]
    fn test_terminal_punctuation_kept() {
        let mut field = Field::builder("245", '0', '0')
            .subfield('a', "Kuka murhasi?")
            .build();
        assert!(!restore_punctuation(&mut field));

        let mut field = Field::builder("260", ' ', ' ')
            .subfield('a', "[S.l.]")
            .subfield('c', "[1990]")
            .build();
        restore_punctuation(&mut field);
        assert_eq!(values(&field), vec!["[S.l.],", "[1990]"]);
    }

    #[test]
    fn test_alternate_script_uses_linked_rules() {
        let mut field = Field::builder("880", '1', ' ')
            .subfield('6', "100-01/(N")
            .subfield('a', "Толстой, Лев")
            .subfield('d', "1828-1910")
            .build();
        restore_punctuation(&mut field);
        assert_eq!(values(&field), vec!["100-01/(N", "Толстой, Лев,", "1828-1910"]);
    }

    #[test]
    fn test_unknown_tag_untouched() {
        let mut field = Field::builder("500", ' ', ' ').subfield('a', "Huomautus").build();
        assert!(!restore_punctuation(&mut field));
        assert_eq!(values(&field), vec!["Huomautus"]);
    }
}
