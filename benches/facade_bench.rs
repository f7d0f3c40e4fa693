use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use xedb::{Config, Store};

fn open_store() -> (Store, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(Config { data_dir: dir.path().to_path_buf(), ..Config::default() }).unwrap();
    (store, dir)
}

fn bench_string_set(c: &mut Criterion) {
    let (store, _dir) = open_store();
    let strings = store.strings();
    let mut i: u64 = 0;
    c.bench_function("string_set", |b| {
        b.iter(|| {
            i += 1;
            let key = format!("key:{}", i % 1024);
            strings.set(key.as_bytes(), Bytes::from_static(b"value")).unwrap();
        })
    });
}

fn bench_string_get(c: &mut Criterion) {
    let (store, _dir) = open_store();
    let strings = store.strings();
    for i in 0..1024 {
        strings.set(format!("key:{i}").as_bytes(), Bytes::from_static(b"value")).unwrap();
    }
    let mut i: u64 = 0;
    c.bench_function("string_get", |b| {
        b.iter(|| {
            i += 1;
            let key = format!("key:{}", i % 1024);
            black_box(strings.get(key.as_bytes()).unwrap());
        })
    });
}

fn bench_zset_add(c: &mut Criterion) {
    let (store, _dir) = open_store();
    let zsets = store.zsets();
    let mut i: u64 = 0;
    c.bench_function("zset_add", |b| {
        b.iter(|| {
            i += 1;
            let member = format!("m:{}", i % 4096);
            zsets.add(b"leaderboard", Bytes::from(member.into_bytes()), i as f64).unwrap();
        })
    });
}

fn bench_prefix_cursor(c: &mut Criterion) {
    let (store, _dir) = open_store();
    let strings = store.strings();
    for i in 0..2048 {
        strings.set(format!("user:{i}").as_bytes(), Bytes::from_static(b"v")).unwrap();
    }
    c.bench_function("prefix_cursor_drain", |b| {
        b.iter(|| {
            let items = store.new_cursor(b"user:").unwrap().collect_remaining();
            black_box(items.len());
        })
    });
}

criterion_group!(benches, bench_string_set, bench_string_get, bench_zset_add, bench_prefix_cursor);
criterion_main!(benches);
