//! Codec benchmarks for both packet dialects.
//!
//! Run with: `cargo bench --bench codec`

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use context_envelope::{aad, packet, sealed, EncryptionContext};

/// Ciphertext sizes to benchmark.
const PAYLOAD_SIZES: &[usize] = &[64, 1024, 65_536];

fn bench_context() -> EncryptionContext {
    EncryptionContext::from_pairs([
        ("table_name", "orders"),
        ("database_name", "billing"),
        ("tenant", "acme"),
        ("region", "eu-west-1"),
    ])
    .unwrap()
}

const VARINT_CONTEXT: [(&str, &str); 4] = [
    ("table_name", "orders"),
    ("database_name", "billing"),
    ("tenant", "acme"),
    ("region", "eu-west-1"),
];

// ---------------------------------------------------------------------------
// Context canonicalization
// ---------------------------------------------------------------------------

fn bench_canonicalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("canonicalize");
    let ctx = bench_context();

    group.bench_function("delimiter", |b| {
        b.iter(|| ctx.serialize().unwrap());
    });

    group.bench_function("varint", |b| {
        b.iter(|| aad::serialize_context(Some(VARINT_CONTEXT)).unwrap());
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Encode / decode across payload sizes
// ---------------------------------------------------------------------------

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    let ctx = bench_context();

    for &size in PAYLOAD_SIZES {
        let ciphertext = vec![0x42u8; size];
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("tag_length_v2", size), &ciphertext, |b, ct| {
            b.iter(|| packet::encode(Some(&ctx), ct).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("varint", size), &ciphertext, |b, ct| {
            b.iter(|| sealed::serialize_with_context(ct, Some(VARINT_CONTEXT)).unwrap());
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let ctx = bench_context();

    for &size in PAYLOAD_SIZES {
        let ciphertext = vec![0x42u8; size];
        group.throughput(Throughput::Bytes(size as u64));

        let v2 = packet::encode(Some(&ctx), &ciphertext).unwrap();
        group.bench_with_input(BenchmarkId::new("tag_length_v2", size), &v2, |b, wire| {
            b.iter(|| packet::decode(wire, Some(&ctx)).unwrap());
        });

        let varint = sealed::serialize_with_context(&ciphertext, Some(VARINT_CONTEXT)).unwrap();
        group.bench_with_input(BenchmarkId::new("varint", size), &varint, |b, wire| {
            b.iter(|| sealed::deserialize(wire, Some(VARINT_CONTEXT)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_canonicalize, bench_encode, bench_decode);
criterion_main!(benches);
