//! MARC record leader parsing and the record-type merge gate.
//!
//! The MARC leader is a 24-character fixed-length field at the start of every MARC record.
//! It contains metadata describing the record's structure, content type, and encoding.
//!
//! # Structure
//!
//! - Positions 0-4: Record length (5 digits)
//! - Position 5: Record status
//! - Position 6: Record type (a = language material, c = music, etc.)
//! - Position 7: Bibliographic level (m = monograph, s = serial, etc.)
//! - Position 8: Control record type
//! - Position 9: Character coding (space = MARC-8, a = UTF-8)
//! - Position 10: Indicator count (usually 2)
//! - Position 11: Subfield code count (usually 2)
//! - Positions 12-16: Base address of data (5 digits)
//! - Positions 17-19: Encoding level, cataloging form, multipart level
//! - Positions 20-23: Reserved (usually "4500")
//!
//! Two records may only be merged when positions 6 and 7 agree; see
//! [`Leader::check_merge_compatible`].

use crate::error::{MergeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// MARC Leader - 24 characters at the start of every MARC record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leader {
    /// Record length (5 digits) - positions 0-4
    pub record_length: u32,
    /// Record status (1 char) - position 5
    pub record_status: char,
    /// Type of record (1 char) - position 6
    pub record_type: char,
    /// Bibliographic level (1 char) - position 7
    pub bibliographic_level: char,
    /// Type of control record (1 char) - position 8
    pub control_record_type: char,
    /// Character coding scheme (1 char) - position 9
    pub character_coding: char,
    /// Indicator count (1 digit) - position 10 (usually 2)
    pub indicator_count: u8,
    /// Subfield code count (1 digit) - position 11 (usually 2)
    pub subfield_code_count: u8,
    /// Base address of data (5 digits) - positions 12-16
    pub data_base_address: u32,
    /// Encoding level (1 char) - position 17
    pub encoding_level: char,
    /// Cataloging form (1 char) - position 18
    pub cataloging_form: char,
    /// Multipart resource record level (1 char) - position 19
    pub multipart_level: char,
    /// Reserved (4 chars) - positions 20-23
    pub reserved: String,
}

impl Default for Leader {
    /// A new UTF-8 monograph leader: `00000nam a22000007i 4500`.
    fn default() -> Self {
        Leader {
            record_length: 0,
            record_status: 'n',
            record_type: 'a',
            bibliographic_level: 'm',
            control_record_type: ' ',
            character_coding: 'a',
            indicator_count: 2,
            subfield_code_count: 2,
            data_base_address: 0,
            encoding_level: '7',
            cataloging_form: 'i',
            multipart_level: ' ',
            reserved: "4500".to_string(),
        }
    }
}

impl Leader {
    /// Check that a source record leader may be merged into this one.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::IncompatibleLeader`] when the type of record
    /// (position 6) or the bibliographic level (position 7) differ.
    pub fn check_merge_compatible(&self, source: &Leader) -> Result<()> {
        if self.record_type != source.record_type {
            return Err(MergeError::IncompatibleLeader {
                position: "type of record",
                base: self.record_type,
                incoming: source.record_type,
            });
        }
        if self.bibliographic_level != source.bibliographic_level {
            return Err(MergeError::IncompatibleLeader {
                position: "bibliographic level",
                base: self.bibliographic_level,
                incoming: source.bibliographic_level,
            });
        }
        Ok(())
    }
}

impl FromStr for Leader {
    type Err = MergeError;

    /// Parse a leader from its 24-character string form.
    fn from_str(s: &str) -> Result<Self> {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() != 24 {
            return Err(MergeError::InvalidLeader(format!(
                "Leader must be exactly 24 characters, got {}",
                chars.len()
            )));
        }

        let digit = |pos: usize, name: &str| -> Result<u8> {
            chars[pos]
                .to_digit(10)
                .and_then(|d| u8::try_from(d).ok())
                .ok_or_else(|| {
                    MergeError::InvalidLeader(format!(
                        "Invalid {name} at position {pos}: '{}'",
                        chars[pos]
                    ))
                })
        };

        Ok(Leader {
            record_length: parse_digits(&chars[0..5])?,
            record_status: chars[5],
            record_type: chars[6],
            bibliographic_level: chars[7],
            control_record_type: chars[8],
            character_coding: chars[9],
            indicator_count: digit(10, "indicator count")?,
            subfield_code_count: digit(11, "subfield code count")?,
            data_base_address: parse_digits(&chars[12..17])?,
            encoding_level: chars[17],
            cataloging_form: chars[18],
            multipart_level: chars[19],
            reserved: chars[20..24].iter().collect(),
        })
    }
}

impl fmt::Display for Leader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:05}{}{}{}{}{}{}{}{:05}{}{}{}{}",
            self.record_length,
            self.record_status,
            self.record_type,
            self.bibliographic_level,
            self.control_record_type,
            self.character_coding,
            self.indicator_count,
            self.subfield_code_count,
            self.data_base_address,
            self.encoding_level,
            self.cataloging_form,
            self.multipart_level,
            self.reserved
        )
    }
}

/// Parse a 5-digit number; blanks are read as zeros.
fn parse_digits(chars: &[char]) -> Result<u32> {
    let s: String = chars
        .iter()
        .map(|c| if *c == ' ' { '0' } else { *c })
        .collect();
    s.parse::<u32>()
        .map_err(|_| MergeError::InvalidLeader(format!("Invalid numeric field: '{s}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leader_from_str() {
        let leader: Leader = "01234nam a2200289 i 4500".parse().unwrap();

        assert_eq!(leader.record_length, 1234);
        assert_eq!(leader.record_status, 'n');
        assert_eq!(leader.record_type, 'a');
        assert_eq!(leader.bibliographic_level, 'm');
        assert_eq!(leader.control_record_type, ' ');
        assert_eq!(leader.character_coding, 'a');
        assert_eq!(leader.indicator_count, 2);
        assert_eq!(leader.subfield_code_count, 2);
        assert_eq!(leader.data_base_address, 289);
        assert_eq!(leader.encoding_level, ' ');
        assert_eq!(leader.cataloging_form, 'i');
        assert_eq!(leader.multipart_level, ' ');
        assert_eq!(leader.reserved, "4500");
    }

    #[test]
    fn test_leader_roundtrip() {
        let text = "00000cam a22000007i 4500";
        let leader: Leader = text.parse().unwrap();
        assert_eq!(leader.to_string(), text);
    }

    #[test]
    fn test_default_leader_renders() {
        assert_eq!(Leader::default().to_string(), "00000nam a22000007i 4500");
    }

    #[test]
    fn test_leader_wrong_length() {
        assert!("0123456789012".parse::<Leader>().is_err());
    }

    #[test]
    fn test_leader_invalid_indicator_count() {
        let result = "00000nam aX2000007i 4500".parse::<Leader>();
        assert!(matches!(result, Err(MergeError::InvalidLeader(_))));
    }

    #[test]
    fn test_merge_gate_accepts_same_type() {
        let base = Leader::default();
        let mut source = Leader::default();
        source.encoding_level = ' ';
        source.record_status = 'c';
        assert!(base.check_merge_compatible(&source).is_ok());
    }

    #[test]
    fn test_merge_gate_rejects_record_type() {
        let base = Leader::default();
        let mut source = Leader::default();
        source.record_type = 'c';
        let err = base.check_merge_compatible(&source).unwrap_err();
        assert!(matches!(
            err,
            MergeError::IncompatibleLeader {
                base: 'a',
                incoming: 'c',
                ..
            }
        ));
    }

    #[test]
    fn test_merge_gate_rejects_bibliographic_level() {
        let base = Leader::default();
        let mut source = Leader::default();
        source.bibliographic_level = 's';
        assert!(base.check_merge_compatible(&source).is_err());
    }
}
