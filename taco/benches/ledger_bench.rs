//! Benchmarks for ledger loading and lookups.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::fmt::Write as _;
use taco::ledger::{header_columns, Ledger};

fn write_ledger(dir: &std::path::Path, rows: usize) -> std::path::PathBuf {
    let mut text = header_columns().join(",");
    text.push('\n');
    for i in 0..rows {
        let _ = writeln!(text, "KIC{i:09},0.0,0.0,1.0,1.0,1.0");
    }
    let path = dir.join(format!("stars_{rows}.csv"));
    std::fs::write(&path, text).unwrap();
    path
}

fn ledger_benchmark(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let mut group = c.benchmark_group("ledger_open");

    for rows in [1_000, 100_000] {
        let path = write_ledger(dir.path(), rows);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &path, |b, path| {
            b.iter(|| black_box(Ledger::open(path.clone()).unwrap()));
        });
    }
    group.finish();

    let ledger = Ledger::open(write_ledger(dir.path(), 100_000)).unwrap();
    c.bench_function("ledger_is_done", |b| {
        b.iter(|| black_box(ledger.is_done(black_box("KIC000054321"))));
    });
}

criterion_group!(benches, ledger_benchmark);
criterion_main!(benches);
