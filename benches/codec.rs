use bytes::Bytes;
use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use hessian2::{Map, Object, Value, decode, encode};

fn binary_payload(len: usize) -> Value {
    Value::Binary(Bytes::from(vec![0u8; len]))
}

fn record(i: i32) -> Value {
    Value::object(
        Object::new("bench.Record")
            .with_field("id", i)
            .with_field("name", format!("record-{i}"))
            .with_field("score", f64::from(i) * 0.25)
            .with_field("created", Value::Date(1_700_000_000_000 + i64::from(i))),
    )
}

fn record_map(count: i32) -> Value {
    let mut map = Map::new();
    for i in 0..count {
        map.insert(format!("key-{i}"), record(i));
    }
    Value::map(map)
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    // Small binary (64 bytes)
    let small = binary_payload(64);
    group.throughput(Throughput::Bytes(64));
    group.bench_function("encode_64b", |b| {
        b.iter(|| {
            black_box(encode(&small).unwrap());
        });
    });

    // Medium binary (1 KB)
    let medium = binary_payload(1024);
    group.throughput(Throughput::Bytes(1024));
    group.bench_function("encode_1kb", |b| {
        b.iter(|| {
            black_box(encode(&medium).unwrap());
        });
    });

    // Large binary (64 KB, chunked)
    let large = binary_payload(64 * 1024);
    group.throughput(Throughput::Bytes(64 * 1024));
    group.bench_function("encode_64kb", |b| {
        b.iter(|| {
            black_box(encode(&large).unwrap());
        });
    });

    // Map of 100 objects sharing one class definition
    let graph = record_map(100);
    group.throughput(Throughput::Elements(100));
    group.bench_function("encode_object_map_100", |b| {
        b.iter(|| {
            black_box(encode(&graph).unwrap());
        });
    });

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    // Small binary (64 bytes)
    let small_encoded = encode(&binary_payload(64)).unwrap();
    group.throughput(Throughput::Bytes(64));
    group.bench_function("decode_64b", |b| {
        b.iter(|| {
            black_box(decode(&small_encoded).unwrap());
        });
    });

    // Medium binary (1 KB)
    let medium_encoded = encode(&binary_payload(1024)).unwrap();
    group.throughput(Throughput::Bytes(1024));
    group.bench_function("decode_1kb", |b| {
        b.iter(|| {
            black_box(decode(&medium_encoded).unwrap());
        });
    });

    // Large binary (64 KB, chunked)
    let large_encoded = encode(&binary_payload(64 * 1024)).unwrap();
    group.throughput(Throughput::Bytes(64 * 1024));
    group.bench_function("decode_64kb", |b| {
        b.iter(|| {
            black_box(decode(&large_encoded).unwrap());
        });
    });

    // Map of 100 objects sharing one class definition
    let graph_encoded = encode(&record_map(100)).unwrap();
    group.throughput(Throughput::Elements(100));
    group.bench_function("decode_object_map_100", |b| {
        b.iter(|| {
            black_box(decode(&graph_encoded).unwrap());
        });
    });

    group.finish();
}

fn bench_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    let text = Value::from("hessian ".repeat(128));
    group.throughput(Throughput::Bytes(1024));
    group.bench_function("roundtrip_string_1kb", |b| {
        b.iter(|| {
            let encoded = encode(&text).unwrap();
            black_box(decode(&encoded).unwrap());
        });
    });

    // Same list referenced from every slot
    let shared = Value::list((0..16).map(Value::Int));
    let aliased = Value::list(std::iter::repeat_n(shared, 64));
    group.throughput(Throughput::Elements(64));
    group.bench_function("roundtrip_shared_refs_64", |b| {
        b.iter(|| {
            let encoded = encode(&aliased).unwrap();
            black_box(decode(&encoded).unwrap());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_roundtrip);
criterion_main!(benches);
