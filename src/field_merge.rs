//! Merging one source field into its base counterpart.

use crate::config::MergeConfig;
use crate::context::{MergeContext, Side};
use crate::counterpart::find_counterpart;
use crate::linkage::{effective_tag, retarget_links, LinkageInfo};
use crate::normalize::field_fingerprint;
use crate::record::{Field, FieldId, Record};
use crate::schema::{
    is_legal_indicator, non_filing_indicator, single_legal_indicator, ALTERNATE_SCRIPT_TAG,
};
use crate::subfield_merge::{merge_or_add_subfield, SubfieldDecision};
use log::debug;

/// Id of a base field equal to `field` up to trailing punctuation and
/// linkage numbering.
#[must_use]
pub fn find_duplicate(base: &Record, field: &Field) -> Option<FieldId> {
    let fingerprint = field_fingerprint(field);
    base.entries()
        .find(|(_, existing)| field_fingerprint(existing) == fingerprint)
        .map(|(id, _)| id)
}

/// Merge the indicators of `source` into `target`; returns whether any changed.
///
/// Identical indicators are left alone. A nonfiling indicator takes the larger
/// count; otherwise a configured ranking decides, then the single value the
/// schema allows, and finally the base value is kept. A value the schema
/// does not allow for the tag is never adopted.
pub fn merge_indicators(target: &mut Field, source: &Field, config: &MergeConfig) -> bool {
    let tag = effective_tag(target);
    let mut changed = false;

    for position in [1u8, 2] {
        let ours = target.indicator(position);
        let theirs = source.indicator(position);
        if ours == theirs {
            continue;
        }
        let chosen = if non_filing_indicator(&tag) == Some(position) {
            ours.max(theirs)
        } else if let Some(preferred) = config.preferred_indicator(&tag, position, ours, theirs) {
            preferred
        } else if let Some(legal) = single_legal_indicator(&tag, position) {
            legal
        } else {
            ours
        };
        if chosen != ours && is_legal_indicator(&tag, position, chosen) {
            debug!("{} indicator {position}: '{ours}' -> '{chosen}'", target.tag);
            target.set_indicator(position, chosen);
            changed = true;
        }
    }
    changed
}

/// Merge source field `source_id` into the base.
///
/// Returns `true` when the field was absorbed, either as a duplicate of a base
/// field or by merging into its counterpart; the source field is then marked
/// deleted. Returns `false` when no counterpart exists and the field should be
/// added instead.
pub fn merge_field(ctx: &mut MergeContext<'_>, source_id: FieldId) -> bool {
    let Some(source_field) = ctx.source.get(source_id).cloned() else {
        return false;
    };

    if let Some(existing) = find_duplicate(ctx.base, &source_field) {
        debug!("{source_field} duplicates base field {existing}");
        ctx.consume(source_id);
        ctx.report.duplicates += 1;
        return true;
    }

    let Some(target_id) = find_counterpart(ctx.base, &source_field, ctx.config) else {
        return false;
    };
    let Some(target) = ctx.base.get_mut(target_id) else {
        return false;
    };

    let mut changed = merge_indicators(target, &source_field, ctx.config);
    let mut needs_punctuation = false;
    let mut added_link = None;
    for candidate in &source_field.subfields {
        let decision = merge_or_add_subfield(target, candidate);
        if !decision.changes_field() {
            continue;
        }
        changed = true;
        if !candidate.is_control() {
            needs_punctuation = true;
        }
        if candidate.code == '6' && decision == SubfieldDecision::Append {
            added_link = LinkageInfo::parse(&candidate.value);
        }
    }
    let target_tag = target.tag.clone();
    debug!("Merged {source_field} into {target_id}");

    // The source partner of a newly linked field must point at its new tag
    if let Some(link) = added_link {
        if source_field.tag != ALTERNATE_SCRIPT_TAG && source_field.tag != target_tag {
            retarget_links(ctx.source, &source_field.tag, &target_tag, link.occurrence_number());
        }
    }

    if changed {
        ctx.flags.mark_merged(Side::Base, target_id);
    }
    if needs_punctuation {
        ctx.flags.mark_needs_punctuation(Side::Base, target_id);
    }
    ctx.consume(source_id);
    ctx.report.merged += 1;
    true
}
