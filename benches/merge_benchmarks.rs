#![allow(missing_docs, unused_doc_comments, unused_attributes)]
//! Benchmarks for MRRC record merging.
//!
//! Measures single merges of realistic record pairs and parallel batch merging
//! using Criterion.rs for statistical analysis.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mrrc_merge::{merge_batch, merge_records, Field, Leader, MergeConfig, Record};

/// Build a record describing book `n`, with `variant` selecting base or source wording.
fn make_record(n: usize, variant: bool) -> Record {
    let mut record = Record::builder(Leader::default())
        .control_field("001", format!("{n:09}"))
        .control_field("008", "200101s2020    fi ||||| |||| 00| 0 fin d")
        .field(
            Field::builder("020", ' ', ' ')
                .subfield('a', if variant { "951-9123-45-6" } else { "9519123456" })
                .subfield('q', if variant { "sidottu" } else { "hardback" })
                .build(),
        )
        .field(
            Field::builder("100", '1', ' ')
                .subfield('6', "880-01")
                .subfield('a', format!("Kirjoittaja {n},"))
                .subfield('d', if variant { "1950-" } else { "1950-2020." })
                .build(),
        )
        .field(
            Field::builder("245", '1', '0')
                .subfield('a', format!("Teos numero {n} /"))
                .subfield('c', format!("Kirjoittaja {n}."))
                .build(),
        )
        .field(
            Field::builder("264", ' ', '1')
                .subfield('a', if variant { "[Kustannuspaikka tuntematon] :" } else { "Helsinki :" })
                .subfield('b', "Otava,")
                .subfield('c', "2020.")
                .build(),
        )
        .field(
            Field::builder("880", '1', ' ')
                .subfield('6', "100-01/(N")
                .subfield('a', format!("Писатель {n},"))
                .build(),
        )
        .build();

    for i in 0..10 {
        let mut subject = Field::builder("650", ' ', '7').subfield('a', format!("aihe {}", i + n % 3));
        if !variant {
            subject = subject.subfield('x', "historia");
        }
        record.add_field(subject.subfield('2', "yso/fin").build());
    }
    record
}

fn make_pairs(count: usize) -> Vec<(Record, Record)> {
    (0..count)
        .map(|n| (make_record(n, true), make_record(n, false)))
        .collect()
}

/// Benchmark merging a single record pair.
fn benchmark_merge_pair(c: &mut Criterion) {
    let config = MergeConfig::default();
    let base = make_record(1, true);
    let source = make_record(1, false);

    c.bench_function("merge_pair", |b| {
        b.iter(|| {
            merge_records(black_box(base.clone()), black_box(source.clone()), &config)
                .map(|outcome| outcome.base.len())
        });
    });
}

/// Benchmark merging a record with an identical copy of itself.
fn benchmark_merge_identical(c: &mut Criterion) {
    let config = MergeConfig::default();
    let base = make_record(1, true);

    c.bench_function("merge_identical", |b| {
        b.iter(|| merge_records(black_box(base.clone()), black_box(base.clone()), &config).is_ok());
    });
}

/// Benchmark merging 1,000 pairs sequentially.
fn benchmark_sequential_1k(c: &mut Criterion) {
    let config = MergeConfig::default();
    let pairs = make_pairs(1000);

    c.bench_function("merge_sequential_1k", |b| {
        b.iter(|| {
            pairs
                .iter()
                .cloned()
                .filter_map(|(base, source)| merge_records(base, source, &config).ok())
                .count()
        });
    });
}

/// Benchmark merging 1,000 pairs with the rayon batch entry point.
fn benchmark_batch_1k(c: &mut Criterion) {
    let config = MergeConfig::default();
    let pairs = make_pairs(1000);

    c.bench_function("merge_batch_1k", |b| {
        b.iter(|| {
            merge_batch(black_box(pairs.clone()), &config)
                .into_iter()
                .filter(Result::is_ok)
                .count()
        });
    });
}

criterion_group!(
    benches,
    benchmark_merge_pair,
    benchmark_merge_identical,
    benchmark_sequential_1k,
    benchmark_batch_1k,
);
criterion_main!(benches);
