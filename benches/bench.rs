use criterion::{black_box, criterion_group, criterion_main, Criterion};
use slotpool::*;

const BUFFER_SIZE: usize = 4096;

struct Buffer {
    bytes: Vec<u8>,
    id: Option<usize>,
}

impl Buffer {
    fn new() -> Self {
        Buffer {
            bytes: Vec::with_capacity(BUFFER_SIZE),
            id: None,
        }
    }
}

impl Reusable for Buffer {
    #[inline(always)]
    fn reset(&mut self) {
        self.bytes.clear()
    }

    #[inline(always)]
    fn is_invalid(&self) -> bool {
        self.bytes.capacity() != BUFFER_SIZE
    }

    fn allocated_id(&self) -> Option<usize> {
        self.id
    }

    fn set_allocated_id(&mut self, id: Option<usize>) {
        self.id = id;
    }
}

fn strategies() -> [(&'static str, PoolStrategy); 3] {
    [
        ("cached", PoolStrategy::FETCH_FAIL_AS_NEW),
        ("prefetch", PoolStrategy::FETCH_FAIL_AS_NEW.with_prefetch(true)),
        ("must_fetch_in_pool", PoolStrategy::MUST_FETCH_IN_POOL),
    ]
}

fn fetch_release(c: &mut Criterion) {
    for (name, strategy) in strategies() {
        c.bench_function(&format!("slotpool_{name}"), |b| {
            let pool = Pool::with_strategy(Buffer::new, 1024, strategy).unwrap();
            b.iter(|| {
                let obj = black_box(pool.fetch().unwrap().unwrap());
                black_box(obj.bytes.capacity())
            })
        });
    }
    c.bench_function("system", |b| {
        b.iter(|| {
            let obj = black_box(Buffer::new());
            black_box(obj.bytes.capacity())
        })
    });
}

fn fetch_release_multi(c: &mut Criterion) {
    use rayon::prelude::*;
    for (name, strategy) in strategies() {
        c.bench_function(&format!("slotpool_{name}_multi"), |b| {
            let pool = Pool::with_strategy(Buffer::new, 1024, strategy).unwrap();
            b.iter(|| {
                (0..8192).into_par_iter().for_each(|_i| {
                    let obj = black_box(pool.fetch().unwrap().unwrap());
                    black_box(obj.bytes.capacity());
                });
            })
        });
    }

    c.bench_function("system_multi", |b| {
        b.iter(|| {
            (0..8192).into_par_iter().for_each(|_i| {
                let obj = black_box(Buffer::new());
                black_box(obj.bytes.capacity());
            });
        })
    });
}

criterion_group!(benches, fetch_release, fetch_release_multi);
criterion_main!(benches);
