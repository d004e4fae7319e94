use std::f32::consts::PI;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use ndarray::Array2;
use vocoder_mel::{AnalysisCache, MelExtractor, TransformConfig, Waveform};

const SAMPLE_RATE: f32 = 24_000.0;

fn speech_like(batch: usize, seconds: f32) -> Array2<f32> {
    let len = (SAMPLE_RATE * seconds) as usize;
    Array2::from_shape_fn((batch, len), |(row, i)| {
        let t = i as f32 / SAMPLE_RATE;
        let f0 = 120.0 + 40.0 * row as f32;
        0.4 * (2.0 * PI * f0 * t).sin() + 0.1 * (2.0 * PI * 2_300.0 * t).sin()
    })
}

fn bench_extract(c: &mut Criterion) {
    let cache = AnalysisCache::new();
    let extractor = MelExtractor::new(TransformConfig::default(), &cache).expect("config");
    for batch in [1usize, 8] {
        let signals = speech_like(batch, 5.0);
        c.bench_with_input(
            BenchmarkId::new("extract_5s", batch),
            &signals,
            |b, signals| {
                let waveform = Waveform::batch(signals.view()).expect("waveform");
                b.iter(|| extractor.extract(black_box(&waveform)).expect("extract"));
            },
        );
    }
}

fn bench_cold_cache(c: &mut Criterion) {
    let config = TransformConfig::default();
    c.bench_function("filter_bank_cold", |b| {
        b.iter(|| {
            let cache = AnalysisCache::new();
            cache.filter_bank(black_box(&config)).expect("filter bank")
        });
    });
}

criterion_group!(benches, bench_extract, bench_cold_cache);
criterion_main!(benches);
