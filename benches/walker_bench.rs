//! Benchmarks for du-walker
//!
//! Run with: cargo bench

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use du_walker::fs::FileStat;
use du_walker::prefix::{FileEntry, IdMap, PrefixBuilder, PrefixInfo};

fn stat(mode: u32, uid: u32, gid: u32, size: i64) -> FileStat {
    FileStat {
        size,
        mode,
        mtime: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        uid,
        gid,
        device: 1,
        inode: 42,
        blocks: ((size as u64) + 511) / 512,
    }
}

/// Directory of 10k files where every 7th file has another owner
fn sample_record() -> PrefixInfo {
    let mut builder = PrefixBuilder::new(&stat(0o040755, 1000, 1000, 4096));
    builder.append_files((0..10_000u32).map(|i| {
        let owner = if i % 7 == 0 { 1000 + i % 5 } else { 1000 };
        FileEntry::from_stat(
            format!("file_{:05}.dat", i),
            &stat(0o100644, owner, 1000, i64::from(i) * 13),
        )
    }));
    builder.finalize().unwrap()
}

fn benchmark_prefix_codec(c: &mut Criterion) {
    let info = sample_record();
    let bytes = info.encode();

    c.bench_function("prefix_encode_10k", |b| {
        b.iter(|| black_box(info.encode()))
    });

    c.bench_function("prefix_decode_10k", |b| {
        b.iter(|| black_box(PrefixInfo::decode(black_box(&bytes)).unwrap()))
    });
}

fn benchmark_bit_scan(c: &mut Criterion) {
    let mut map = IdMap::new(7);
    for pos in (0..1_000_000).step_by(3) {
        map.set(pos);
    }

    c.bench_function("bitmap_scan_1m", |b| {
        b.iter(|| black_box(map.iter().count()))
    });

    let info = sample_record();
    c.bench_function("user_scan_10k", |b| {
        b.iter(|| black_box(info.user_scan(1001).count()))
    });
}

criterion_group!(benches, benchmark_prefix_codec, benchmark_bit_scan);
criterion_main!(benches);
