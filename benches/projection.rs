//! Benchmarks for field projection and re-encoding
//!
//! This benchmark suite measures the per-record cost of:
//! - Projection: few fields vs. many fields vs. tag-heavy lookups
//! - Re-encoding: tag exclusion into a reused buffer
//! - Streaming: advance over an in-memory channel
//!
//! Run with: cargo bench --bench projection
//! Run specific: cargo bench --bench projection -- project

use alnstream::io::bam::header::{write_header, Reference};
use alnstream::io::bam::tags::IntegerType;
use alnstream::io::bam::{
    encode_record, project, AlignmentStream, Field, FieldValues, Header, RecordBuilder,
    RecordView, TagKey, TagValue,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::io::Cursor;

fn generate_sequence(len: usize) -> Vec<u8> {
    (0..len).map(|i| [b'A', b'C', b'G', b'T'][i % 4]).collect()
}

fn header() -> Header {
    Header::new(
        "@SQ\tSN:chr1\tLN:248956422\n".into(),
        vec![Reference::new("chr1", 248_956_422)],
    )
}

/// 150bp record with a realistic tag region
fn generate_record(i: usize) -> Vec<u8> {
    RecordBuilder::new(format!("read_{}", i))
        .reference_id(0)
        .position(10_000 + i as i32)
        .mapq(60)
        .cigar_text("5S140M5S")
        .unwrap()
        .sequence(&generate_sequence(150))
        .quality(&vec![b'I'; 150])
        .tag(*b"NM", TagValue::Integer(IntegerType::UInt8, 2))
        .tag(*b"MD", TagValue::String("70A69".into()))
        .tag(*b"AS", TagValue::Integer(IntegerType::UInt8, 135))
        .tag(*b"XS", TagValue::Integer(IntegerType::UInt8, 20))
        .tag(*b"RG", TagValue::String("lane1".into()))
        .tag(*b"OQ", TagValue::String("#".repeat(150)))
        .build()
        .unwrap()
}

fn bench_project(c: &mut Criterion) {
    let raw = generate_record(0);
    let header = header();
    let field_sets: [(&str, Vec<Field>); 3] = [
        ("core", vec![Field::Flag, Field::Position, Field::MappingQuality]),
        (
            "text",
            vec![Field::QueryName, Field::Cigar, Field::Sequence, Field::Quality],
        ),
        (
            "tags",
            ["NM", "AS", "RG", "ZZ"]
                .iter()
                .filter_map(|n| Field::parse(n))
                .collect(),
        ),
    ];

    let mut group = c.benchmark_group("project");
    group.throughput(Throughput::Elements(1));
    for (name, fields) in &field_sets {
        let mut values = FieldValues::new();
        group.bench_with_input(BenchmarkId::from_parameter(name), fields, |b, fields| {
            b.iter(|| {
                let view = RecordView::new(black_box(&raw)).unwrap();
                project(&view, &header, fields, &mut values).unwrap();
            })
        });
    }
    group.finish();
}

fn bench_encode_excluding(c: &mut Criterion) {
    let raw = generate_record(0);
    let view = RecordView::new(&raw).unwrap();
    let mut out = Vec::with_capacity(raw.len());

    let mut group = c.benchmark_group("encode_record");
    group.throughput(Throughput::Bytes(raw.len() as u64));
    group.bench_function("no_exclusion", |b| {
        b.iter(|| encode_record(black_box(&view), &[], &mut out).unwrap())
    });
    let excluded = [TagKey::new(*b"OQ"), TagKey::new(*b"XS")];
    group.bench_function("exclude_two", |b| {
        b.iter(|| encode_record(black_box(&view), &excluded, &mut out).unwrap())
    });
    group.finish();
}

fn bench_stream(c: &mut Criterion) {
    let n = 10_000;
    let mut data = Vec::new();
    write_header(&mut data, &header()).unwrap();
    for i in 0..n {
        data.extend_from_slice(&generate_record(i));
    }

    let mut group = c.benchmark_group("stream");
    group.throughput(Throughput::Elements(n as u64));
    group.bench_function("advance_10k", |b| {
        b.iter(|| {
            let mut stream = AlignmentStream::from_reader(Cursor::new(black_box(&data[..])));
            stream.set_fields(&["QNAME", "POS", "MAPPED_SEQ_LENGTH", "NM"]);
            let mut values = FieldValues::new();
            let mut count = 0;
            while stream.advance(&mut values).unwrap() {
                count += 1;
            }
            count
        })
    });
    group.finish();
}

criterion_group!(benches, bench_project, bench_encode_excluding, bench_stream);

criterion_main!(benches);
