//! Common test helpers and utilities shared across test suite.

#![allow(dead_code)]

use mrrc_merge::{Field, Leader, Record};

/// Creates a default leader for test records.
///
/// A printed monograph (`am`) in UTF-8, as most merge candidates are.
pub fn create_test_leader() -> Leader {
    Leader {
        record_length: 1000,
        record_status: 'c',
        record_type: 'a',
        bibliographic_level: 'm',
        control_record_type: ' ',
        character_coding: 'a',
        indicator_count: 2,
        subfield_code_count: 2,
        data_base_address: 100,
        encoding_level: ' ',
        cataloging_form: 'i',
        multipart_level: ' ',
        reserved: "4500".to_string(),
    }
}

/// Creates a record from fields with the test leader.
pub fn record_with(fields: Vec<Field>) -> Record {
    let mut record = Record::new(create_test_leader());
    for field in fields {
        record.add_field(field);
    }
    record
}

/// Creates a realistic base record for merge tests.
///
/// Includes control fields, standard numbers, a main entry with its
/// alternate-script 880 partner, title, publication and subject fields.
pub fn create_base_record() -> Record {
    Record::builder(create_test_leader())
        .control_field("001", "000111222")
        .control_field("003", "FI-MELINDA")
        .field(
            Field::builder("020", ' ', ' ')
                .subfield('a', "951-9123-45-6")
                .subfield('q', "sidottu")
                .build(),
        )
        .field(
            Field::builder("035", ' ', ' ')
                .subfield('a', "(FI-MELINDA)000111222")
                .build(),
        )
        .field(Field::builder("041", '0', ' ').subfield('a', "und").build())
        .field(
            Field::builder("100", '1', ' ')
                .subfield('6', "880-01")
                .subfield('a', "Tolstoj, Lev,")
                .subfield('d', "1828-")
                .subfield('e', "kirjoittaja.")
                .build(),
        )
        .field(
            Field::builder("245", '1', '0')
                .subfield('a', "Sota ja rauha /")
                .subfield('c', "Lev Tolstoi.")
                .build(),
        )
        .field(
            Field::builder("264", ' ', '1')
                .subfield('a', "Helsinki :")
                .subfield('b', "WSOY,")
                .subfield('c', "1998.")
                .build(),
        )
        .field(
            Field::builder("650", ' ', '7')
                .subfield('a', "sota")
                .subfield('2', "yso/fin")
                .build(),
        )
        .field(
            Field::builder("880", '1', ' ')
                .subfield('6', "100-01/(N")
                .subfield('a', "Толстой, Лев,")
                .subfield('d', "1828-")
                .build(),
        )
        .build()
}

/// Creates a source record describing the same work as [`create_base_record`].
pub fn create_source_record() -> Record {
    Record::builder(create_test_leader())
        .control_field("001", "999888777")
        .control_field("008", "981010s1998    fi |||||||||||||||||fin||")
        .field(
            Field::builder("020", ' ', ' ')
                .subfield('a', "9519123456")
                .subfield('q', "hardback")
                .build(),
        )
        .field(
            Field::builder("035", ' ', ' ')
                .subfield('a', "(OCoLC)123456")
                .build(),
        )
        .field(Field::builder("041", '0', ' ').subfield('a', "fin").subfield('h', "rus").build())
        .field(
            Field::builder("100", '1', ' ')
                .subfield('6', "880-01")
                .subfield('a', "Tolstoj, Lev,")
                .subfield('d', "1828-1910.")
                .subfield('0', "(FIN11)000012345")
                .build(),
        )
        .field(
            Field::builder("245", '1', '0')
                .subfield('a', "Sota ja rauha /")
                .subfield('c', "Lev Tolstoi.")
                .build(),
        )
        .field(
            Field::builder("264", ' ', '1')
                .subfield('a', "Helsinki :")
                .subfield('b', "WSOY.")
                .build(),
        )
        .field(
            Field::builder("650", ' ', '7')
                .subfield('a', "sota")
                .subfield('x', "historia")
                .subfield('2', "yso/fin")
                .build(),
        )
        .field(
            Field::builder("700", '1', ' ')
                .subfield('6', "880-02")
                .subfield('a', "Dostojevski, Fjodor,")
                .subfield('e', "kirjoittaja.")
                .build(),
        )
        .field(
            Field::builder("880", '1', ' ')
                .subfield('6', "100-01/(N")
                .subfield('a', "Толстой, Лев,")
                .subfield('d', "1828-1910.")
                .build(),
        )
        .field(
            Field::builder("880", '1', ' ')
                .subfield('6', "700-02/(N")
                .subfield('a', "Достоевский, Фёдор,")
                .subfield('e', "kirjoittaja.")
                .build(),
        )
        .build()
}

/// Every non-sentinel `$6` in the record has exactly one reciprocal partner.
pub fn assert_links_paired(record: &Record) {
    use mrrc_merge::linkage::{link_info, partners};
    for (id, field) in record.entries() {
        if let Some(info) = link_info(field) {
            if info.is_sentinel() {
                continue;
            }
            assert_eq!(
                partners(record, id).len(),
                1,
                "{field} should have exactly one linked partner"
            );
        }
    }
}
