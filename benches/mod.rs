use criterion::{criterion_group, criterion_main};


use engine::register_benchmarks as register_engine_benchmarks;
use hot_path::register_benchmarks as register_hot_path_benchmarks;

criterion_group!(benches, register_hot_path_benchmarks, register_engine_benchmarks);

criterion_main!(benches);
