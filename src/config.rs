//! Merge configuration.
//!
//! [`MergeConfig`] carries everything a caller may tune about a merge: skip
//! lists overriding the schema defaults, indicator tolerance and preference
//! tables, and the directive lists run before and after merging. It is plain
//! `serde` data; reading it from disk is left to the caller.
//!
//! ```
//! use mrrc_merge::MergeConfig;
//!
//! let config = MergeConfig::from_json(r#"{
//!     "skipAddTags": ["001", "003", "005", "040", "CAT", "LOW"],
//!     "toleratedIndicators": {"650": [2]},
//!     "indicatorPreferences": {"264": {"indicator2": "14032"}},
//!     "postprocess": [{"operation": "removeField", "target": "base", "field": {"tag": "SID"}}]
//! }"#).unwrap();
//!
//! assert!(config.is_add_skipped("LOW"));
//! assert!(config.tolerates_indicator("650", 2));
//! assert_eq!(config.preferred_indicator("264", 2, '4', '1'), Some('1'));
//! ```

use crate::directive::Directive;
use crate::error::Result;
use crate::schema::{DEFAULT_SKIP_ADD_TAGS, DEFAULT_SKIP_MERGE_TAGS};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ranking of indicator values for one tag; earlier characters are preferred.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorPreference {
    /// Ranking for the first indicator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicator1: Option<String>,
    /// Ranking for the second indicator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicator2: Option<String>,
}

/// Tunable merge behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MergeConfig {
    /// Tags never merged into an existing field; replaces the schema default
    pub skip_merge_tags: Option<Vec<String>>,
    /// Tags never copied from the source; replaces the schema default
    pub skip_add_tags: Option<Vec<String>>,
    /// Indicator positions (1 or 2) whose mismatch does not prevent a match
    #[serde(rename = "toleratedIndicators")]
    pub tolerate_indicators: IndexMap<String, Vec<u8>>,
    /// Preferred indicator values per tag
    pub indicator_preferences: IndexMap<String, IndicatorPreference>,
    /// Directives applied before merging
    pub preprocess: Vec<Directive>,
    /// Directives applied after merging
    pub postprocess: Vec<Directive>,
}

impl MergeConfig {
    /// Decode a configuration from JSON and validate its directives.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MergeError::Config`] for malformed JSON and
    /// [`crate::MergeError::InvalidDirective`] for directives whose patterns
    /// do not compile.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: MergeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every directive in the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first [`crate::MergeError::InvalidDirective`] found.
    pub fn validate(&self) -> Result<()> {
        self.preprocess
            .iter()
            .chain(&self.postprocess)
            .try_for_each(Directive::validate)
    }

    /// Whether fields with `tag` are only de-duplicated, never merged into.
    #[must_use]
    pub fn is_merge_skipped(&self, tag: &str) -> bool {
        match &self.skip_merge_tags {
            Some(tags) => tags.iter().any(|t| t == tag),
            None => DEFAULT_SKIP_MERGE_TAGS.contains(&tag),
        }
    }

    /// Whether fields with `tag` are never copied from the source.
    #[must_use]
    pub fn is_add_skipped(&self, tag: &str) -> bool {
        match &self.skip_add_tags {
            Some(tags) => tags.iter().any(|t| t == tag),
            None => DEFAULT_SKIP_ADD_TAGS.contains(&tag),
        }
    }

    /// Whether a mismatch of indicator `position` is tolerated for `tag`.
    #[must_use]
    pub fn tolerates_indicator(&self, tag: &str, position: u8) -> bool {
        self.tolerate_indicators
            .get(tag)
            .is_some_and(|positions| positions.contains(&position))
    }

    /// The preferred of two indicator values, if a ranking ranks either.
    ///
    /// A value missing from the ranking loses to a ranked one.
    #[must_use]
    pub fn preferred_indicator(&self, tag: &str, position: u8, base: char, source: char) -> Option<char> {
        let preference = self.indicator_preferences.get(tag)?;
        let ranking = if position == 1 {
            preference.indicator1.as_deref()?
        } else {
            preference.indicator2.as_deref()?
        };
        match (ranking.find(base), ranking.find(source)) {
            (Some(b), Some(s)) => Some(if s < b { source } else { base }),
            (Some(_), None) => Some(base),
            (None, Some(_)) => Some(source),
            (None, None) => None,
        }
    }
}
