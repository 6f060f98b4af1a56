//! Finding the base field an incoming source field should merge into.
//!
//! Candidates are the base fields in the source field's tag equivalence class
//! (an 880 only considers 880s representing an equivalent tag). The first
//! candidate passing [`is_mergeable_pair`] wins.

use crate::config::MergeConfig;
use crate::linkage::effective_tag;
use crate::normalize::{identifier_digits, normalize_for_comparison, normalize_identifier};
use crate::record::{Field, FieldId, Record, Subfield};
use crate::schema::{
    equivalent_tags, is_hyphenated_identifier, is_identifier_subfield, is_name_title_tag,
    name_key_codes, non_filing_indicator, paired_subfields,
    required_subfields, ALTERNATE_SCRIPT_TAG, STRICT_CONTROL_CODES, TITLE_KEY_CODES,
};
use log::trace;
use std::collections::HashSet;

/// Subfields whose values are authority identifiers.
const AUTHORITY_CODES: &[char] = &['0', '1'];

/// Find the base field `source_field` merges into.
///
/// Returns `None` when the tag is merge-skipped or no candidate qualifies, in
/// which case the field is handled as new.
#[must_use]
pub fn find_counterpart(base: &Record, source_field: &Field, config: &MergeConfig) -> Option<FieldId> {
    if source_field.is_control_field() || config.is_merge_skipped(&source_field.tag) {
        return None;
    }
    let tag = effective_tag(source_field);
    let class = equivalent_tags(&tag);
    let alternate = source_field.tag == ALTERNATE_SCRIPT_TAG;

    base.entries()
        .filter(|(_, candidate)| !candidate.is_control_field())
        .filter(|(_, candidate)| (candidate.tag == ALTERNATE_SCRIPT_TAG) == alternate)
        .filter(|(_, candidate)| class.contains(&effective_tag(candidate).as_str()))
        .find(|(_, candidate)| is_mergeable_pair(candidate, source_field, config))
        .map(|(id, _)| id)
}

/// Whether two fields of equivalent tags describe the same thing.
#[must_use]
pub fn is_mergeable_pair(base: &Field, source: &Field, config: &MergeConfig) -> bool {
    let tag = effective_tag(base);
    let tag = tag.as_str();

    let verdict = if !indicators_compatible(tag, base, source, config) {
        Err("indicators")
    } else if !control_subfields_compatible(base, source) {
        Err("control subfields")
    } else if !required_subfields(tag)
        .iter()
        .all(|code| base.has_subfield(*code) && source.has_subfield(*code))
    {
        Err("required subfields")
    } else if !paired_subfields(tag)
        .iter()
        .all(|code| base.has_subfield(*code) == source.has_subfield(*code))
    {
        Err("paired subfields")
    } else if !semantically_equal(tag, base, source) {
        Err("content")
    } else {
        Ok(())
    };

    match verdict {
        Ok(()) => true,
        Err(reason) => {
            trace!("{} is not a counterpart of {}: {reason} differ", base, source);
            false
        },
    }
}

fn indicators_compatible(tag: &str, base: &Field, source: &Field, config: &MergeConfig) -> bool {
    [1u8, 2].iter().all(|&position| {
        base.indicator(position) == source.indicator(position)
            || non_filing_indicator(tag) == Some(position)
            || config.tolerates_indicator(tag, position)
    })
}

fn normalized_values(field: &Field, code: char, normalize: fn(&str) -> String) -> HashSet<String> {
    field.subfields_by_code(code).map(normalize).collect()
}

fn control_subfields_compatible(base: &Field, source: &Field) -> bool {
    if base.has_subfield('8') || source.has_subfield('8') {
        return false;
    }
    let identifiers_agree = AUTHORITY_CODES.iter().all(|&code| {
        let ours = normalized_values(base, code, normalize_identifier);
        let theirs = normalized_values(source, code, normalize_identifier);
        ours.is_empty() || theirs.is_empty() || !ours.is_disjoint(&theirs)
    });
    identifiers_agree
        && STRICT_CONTROL_CODES.iter().all(|&code| {
            normalized_values(base, code, normalize_for_comparison)
                == normalized_values(source, code, normalize_for_comparison)
        })
}

fn authority_ids_match(base: &Field, source: &Field) -> bool {
    AUTHORITY_CODES.iter().any(|&code| {
        let ours = normalized_values(base, code, normalize_identifier);
        let theirs = normalized_values(source, code, normalize_identifier);
        !ours.is_disjoint(&theirs)
    })
}

/// Split a name/title heading at its first `$t`.
fn split_name_title(field: &Field) -> (&[Subfield], &[Subfield]) {
    let split = field
        .subfields
        .iter()
        .position(|sf| sf.code == 't')
        .unwrap_or(field.subfields.len());
    field.subfields.split_at(split)
}

fn semantically_equal(tag: &str, base: &Field, source: &Field) -> bool {
    let keys = name_key_codes(tag);
    if !is_name_title_tag(tag) {
        return subset_or_equal(tag, &base.subfields, &source.subfields, keys);
    }

    let (base_name, base_title) = split_name_title(base);
    let (source_name, source_title) = split_name_title(source);
    let names_match = subset_or_equal(tag, base_name, source_name, keys) || authority_ids_match(base, source);
    let titles_match = (base_title.is_empty() && source_title.is_empty())
        || subset_or_equal(tag, base_title, source_title, Some(TITLE_KEY_CODES));
    names_match && titles_match
}

/// Whether the key subfields of one side are a sub-multiset of the other's.
///
/// `None` keys compare every alphabetic code; an empty key list always matches.
/// Standard numbers compare by digits and identifiers by canonical prefix.
#[must_use]
pub fn subset_or_equal(tag: &str, a: &[Subfield], b: &[Subfield], keys: Option<&[char]>) -> bool {
    if keys.is_some_and(<[char]>::is_empty) {
        return true;
    }
    let selected = |subfields: &[Subfield]| -> Vec<String> {
        let mut values: Vec<String> = subfields
            .iter()
            .filter(|sf| match keys {
                Some(codes) => codes.contains(&sf.code),
                None => sf.code.is_ascii_alphabetic(),
            })
            .map(|sf| format!("{}:{}", sf.code, comparable(tag, sf)))
            .collect();
        values.sort();
        values
    };
    let ours = selected(a);
    let theirs = selected(b);
    is_sub_multiset(&ours, &theirs) || is_sub_multiset(&theirs, &ours)
}

fn comparable(tag: &str, sf: &Subfield) -> String {
    if is_hyphenated_identifier(tag, sf.code) {
        identifier_digits(&sf.value)
    } else if is_identifier_subfield(tag, sf.code) {
        normalize_identifier(&sf.value)
    } else {
        normalize_for_comparison(&sf.value)
    }
}

/// Both inputs sorted.
fn is_sub_multiset(small: &[String], large: &[String]) -> bool {
    let mut rest = large.iter();
    small.iter().all(|wanted| rest.by_ref().any(|have| have == wanted))
}
