//! Aggregation and deaggregation throughput.

use std::hint::black_box;

use chrono::Utc;
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use kinesis_agg_core::{
    aggregator::Aggregator,
    deagg::{decode, Envelope},
    record::{Container, UserRecord},
};

fn make_records(n: usize, data_len: usize) -> Vec<UserRecord> {
    (0..n)
        .map(|i| UserRecord::new(format!("partition-{}", i % 64), vec![(i % 251) as u8; data_len]))
        .collect()
}

fn full_envelope() -> Envelope {
    let mut c = Container::new();
    let mut i = 0usize;
    while c.add_user_record(&format!("partition-{}", i % 64), None, vec![0xAB; 512]).unwrap() {
        i += 1;
    }
    let entry = c.to_transport_entry().unwrap();
    Envelope::new(entry.partition_key, "1", Utc::now(), entry.data)
}

fn benchmark_aggregate(c: &mut Criterion) {
    let records = make_records(10_000, 256);
    let bytes: usize = records.iter().map(|r| r.data().len()).sum();

    let mut group = c.benchmark_group("aggregate");
    group.throughput(Throughput::Bytes(bytes as u64));
    group.bench_function("add_user_record_10k_x_256b", |b| {
        b.iter(|| {
            let mut agg = Aggregator::new();
            let mut rotated = 0usize;
            agg.add_all(records.iter().cloned(), |_| rotated += 1).unwrap();
            black_box((rotated, agg.clear_and_get()))
        })
    });
    group.finish();
}

fn benchmark_serialize(c: &mut Criterion) {
    let mut container = Container::new();
    for r in make_records(2_000, 256) {
        container.add(&r).unwrap();
    }

    c.bench_function("to_wire_bytes_2k_records", |b| {
        b.iter(|| black_box(container.to_wire_bytes()))
    });
}

fn benchmark_deaggregate(c: &mut Criterion) {
    let envelope = full_envelope();

    let mut group = c.benchmark_group("deaggregate");
    group.throughput(Throughput::Bytes(envelope.data.len() as u64));
    group.bench_function("decode_full_container", |b| {
        b.iter(|| black_box(decode(black_box(&envelope)).unwrap().count()))
    });
    group.finish();
}

criterion_group!(benches, benchmark_aggregate, benchmark_serialize, benchmark_deaggregate);
criterion_main!(benches);
