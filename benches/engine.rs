//! Record engine benchmarks: the four primitives through the public API,
//! plus the payload codec on its own.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use slotdb::{Db, Pattern};
use tempfile::tempdir;

fn bench_add_row(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_row");

    for value_len in [16usize, 256, 4096] {
        group.bench_with_input(
            BenchmarkId::from_parameter(value_len),
            &value_len,
            |b, &value_len| {
                let dir = tempdir().unwrap();
                let db = Db::open(dir.path().join("bench.db")).unwrap();
                let mut table = db.add_table("bench").unwrap();
                let value = "v".repeat(value_len);
                let mut i = 0u64;

                b.iter(|| {
                    i += 1;
                    table.add_row(&format!("key{}", i), black_box(&value)).unwrap()
                });
            },
        );
    }
    group.finish();
}

fn bench_get_row(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_row");

    for rows in [10usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, &rows| {
            let dir = tempdir().unwrap();
            let db = Db::open(dir.path().join("bench.db")).unwrap();
            let mut table = db.add_table("bench").unwrap();
            for i in 0..rows {
                table.add_row(&format!("key{}", i), "value").unwrap();
            }
            let target = format!("key{}", rows - 1);

            b.iter(|| table.get_row(black_box(&target)).unwrap());
        });
    }
    group.finish();
}

fn bench_set_value(c: &mut Criterion) {
    c.bench_function("set_value_in_place", |b| {
        let dir = tempdir().unwrap();
        let db = Db::open(dir.path().join("bench.db")).unwrap();
        let mut table = db.add_table("bench").unwrap();
        let mut row = table.add_row("key", "initial").unwrap();

        b.iter(|| row.set_value(black_box("rewritten")).unwrap());
    });
}

fn bench_find_rows(c: &mut Criterion) {
    c.bench_function("find_rows_regex_1000", |b| {
        let dir = tempdir().unwrap();
        let db = Db::open(dir.path().join("bench.db")).unwrap();
        let mut table = db.add_table("bench").unwrap();
        for i in 0..1000 {
            table.add_row(&format!("key{}", i), &format!("value{}", i)).unwrap();
        }
        let pattern = Pattern::regex(b"^key99[0-9]$").unwrap();

        b.iter(|| table.find_rows(black_box(&pattern), &Pattern::any()).unwrap());
    });
}

criterion_group!(
    benches,
    bench_add_row,
    bench_get_row,
    bench_set_value,
    bench_find_rows
);
criterion_main!(benches);
