//! Error types for MARC merge operations.
//!
//! This module provides the [`MergeError`] type for all fatal merge conditions
//! and the [`Result`] convenience type. Decisions such as "no counterpart found"
//! or "subfield already present" are not errors; they are expressed through
//! `Option`, `bool` and decision enums by the merge modules themselves.

use thiserror::Error;

/// Error type for all merge library operations.
#[derive(Error, Debug)]
pub enum MergeError {
    /// The two records encode different record types and must not be merged.
    ///
    /// Raised when leader position 6 (type of record) or position 7
    /// (bibliographic level) differ between base and source.
    #[error("Incompatible leaders: base {position} is '{base}', source has '{incoming}'")]
    IncompatibleLeader {
        /// Leader position name that differs
        position: &'static str,
        /// Value in the base record
        base: char,
        /// Value in the source record
        incoming: char,
    },

    /// Error indicating an invalid leader string.
    #[error("Invalid leader: {0}")]
    InvalidLeader(String),

    /// A directive could not be compiled (for example, a bad tag pattern).
    #[error("Invalid directive: {0}")]
    InvalidDirective(String),

    /// Configuration could not be decoded.
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Convenience type alias for [`std::result::Result`] with [`MergeError`].
pub type Result<T> = std::result::Result<T, MergeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incompatible_leader_message() {
        let err = MergeError::IncompatibleLeader {
            position: "type of record",
            base: 'a',
            incoming: 'c',
        };
        assert_eq!(
            err.to_string(),
            "Incompatible leaders: base type of record is 'a', source has 'c'"
        );
    }

    #[test]
    fn test_config_error_from_json() {
        let json_err = serde_json::from_str::<u32>("not a number").unwrap_err();
        let err: MergeError = json_err.into();
        assert!(matches!(err, MergeError::Config(_)));
    }
}
