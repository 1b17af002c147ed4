//! Feature extraction and analyser throughput.
//!
//! Run with: cargo bench --package vf-audio

use std::hint::black_box;
use std::num::NonZeroU32;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use vf_audio::analyser::Analyser;
use vf_audio::features::extract;
use vf_core::config::AnalysisConfig;
use vf_core::frame::Snapshot;

fn spectrum(len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| ((i * 37 + 11) % 256) as u8)
        .collect()
}

fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract");
    for &bins in &[256usize, 1024, 4096] {
        let data = spectrum(bins);
        group.bench_with_input(BenchmarkId::from_parameter(bins), &data, |b, data| {
            let snap = Snapshot::new(data, 48000).expect("non-zero rate");
            b.iter(|| extract(black_box(&snap)));
        });
    }
    group.finish();
}

fn bench_analyser(c: &mut Criterion) {
    let settings = AnalysisConfig::default();
    let rate = NonZeroU32::new(48000).expect("non-zero rate");
    let mut analyser = Analyser::new(&settings, rate);
    let block: Vec<f32> = (0..800)
        .map(|i| (std::f32::consts::TAU * 440.0 * i as f32 / 48000.0).sin())
        .collect();

    c.bench_function("analyser_tick_2048", |b| {
        b.iter(|| {
            analyser.push_samples(black_box(&block));
            let snap = analyser.snapshot();
            black_box(extract(&snap).rms)
        });
    });
}

criterion_group!(benches, bench_extract, bench_analyser);
criterion_main!(benches);
